//! Shared plumbing for the small, straight-line synthetic functions this
//! pass emits: field stubs, the global initializer, the caller, realized
//! declarations. All of them are a single `entry` block with no branches.

use crate::middle_end::lir::*;

pub struct BodyBuilder {
    scope: FuncId,
    insts: Vec<Instruction>,
    locals: Set<VarId>,
    tmp: u64,
}

impl BodyBuilder {
    pub fn new(scope: FuncId) -> Self {
        BodyBuilder {
            scope,
            insts: Vec::new(),
            locals: Set::new(),
            tmp: 0,
        }
    }

    pub fn fresh(&mut self, typ: Type) -> VarId {
        self.tmp += 1;
        let name = format!("t{}", self.tmp);
        let v = var_id(&name, typ, Some(self.scope.clone()));
        self.locals.insert(v.clone());
        v
    }

    pub fn push(&mut self, inst: Instruction) {
        self.insts.push(inst);
    }

    /// Address of an already-declared variable (a global or a local).
    pub fn addr_of(&mut self, val: VarId) -> VarId {
        let lhs = self.fresh(ptr_ty(val.typ()));
        self.push(Instruction::AddrOf {
            lhs: lhs.clone(),
            op: Operand::Var(val),
        });
        lhs
    }

    pub fn gfp(&mut self, src: VarId, field: FieldId) -> VarId {
        let lhs = self.fresh(ptr_ty(field.typ.clone()));
        self.push(Instruction::Gfp {
            lhs: lhs.clone(),
            src,
            field,
        });
        lhs
    }

    pub fn load(&mut self, src: VarId) -> VarId {
        let lhs = self.fresh(src.typ().base_typ());
        self.push(Instruction::Load {
            lhs: lhs.clone(),
            src,
        });
        lhs
    }

    pub fn store(&mut self, dst: VarId, op: Operand) {
        self.push(Instruction::Store { dst, op });
    }

    pub fn alloc(&mut self, id: StructId) -> VarId {
        let lhs = self.fresh(ptr_ty(struct_ty(id.clone())));
        self.push(Instruction::Alloc {
            lhs: lhs.clone(),
            num: Operand::CInt(1),
            id,
        });
        lhs
    }

    /// Copies the value pointed to by `from_ptr` into the memory pointed to
    /// by `to_ptr`. Both must point at the same type. This is how the pass
    /// models a record-to-record copy: the IR has no aggregate memcpy, but
    /// `Load`/`Store` already work at whole-struct granularity.
    pub fn copy_through(&mut self, from_ptr: VarId, to_ptr: VarId) {
        let v = self.load(from_ptr);
        self.store(to_ptr, Operand::Var(v));
    }

    pub fn into_block(self, id: BbId, term: Terminal) -> (BasicBlock, Set<VarId>) {
        (
            BasicBlock {
                id,
                insts: self.insts,
                term,
            },
            self.locals,
        )
    }

    /// Closes off the instructions accumulated so far into a block, leaving
    /// the builder's locals/temp counter running for the next one. Used by
    /// multi-block synthetic functions (the caller) that chain one call per
    /// block.
    pub fn finish_block(&mut self, id: BbId, term: Terminal) -> BasicBlock {
        let insts = std::mem::take(&mut self.insts);
        BasicBlock { id, insts, term }
    }

    pub fn locals_snapshot(&self) -> Set<VarId> {
        self.locals.clone()
    }
}

/// Wraps a finished [`BodyBuilder`] into a complete, single-block
/// [`Function`] with the given linkage, params and terminal.
pub fn finish_function(
    id: FuncId,
    linkage: Linkage,
    ret_ty: Option<Type>,
    params: Vec<VarId>,
    builder: BodyBuilder,
    term: Terminal,
) -> Function {
    let (block, mut locals) = builder.into_block(bb_id("entry"), term);
    for p in &params {
        locals.insert(p.clone());
    }
    let mut body = Map::new();
    body.insert(block.id.clone(), block);
    Function {
        id,
        linkage,
        ret_ty,
        params,
        locals,
        body: Some(body),
    }
}
