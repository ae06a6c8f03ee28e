//! Decides which record types are "interesting": those whose transitive
//! closure of fields reaches a function-pointer field, pruned down to the
//! ones the module actually mentions somewhere.

use std::collections::VecDeque;

use crate::middle_end::lir::*;

#[derive(Clone, Debug, Default)]
pub struct TypeFilter {
    interesting: Set<StructId>,
}

impl TypeFilter {
    pub fn is_interesting_struct_id(&self, id: &StructId) -> bool {
        self.interesting.contains(id)
    }

    pub fn is_interesting_type(&self, t: &Type) -> bool {
        t.as_struct_id().is_some_and(|id| self.interesting.contains(id))
    }

    pub fn is_ptr_to_interesting_type(&self, t: &Type) -> bool {
        t.as_pointee().is_some_and(|inner| self.is_interesting_type(inner))
    }

    pub fn is_interesting_type_or_ptr(&self, t: &Type) -> bool {
        self.is_interesting_type(t) || self.is_ptr_to_interesting_type(t)
    }

    pub fn interesting_structs(&self) -> impl Iterator<Item = &StructId> {
        self.interesting.iter()
    }

    pub fn len(&self) -> usize {
        self.interesting.len()
    }
}

fn struct_target(t: &Type) -> Option<StructId> {
    t.as_struct_id()
        .cloned()
        .or_else(|| t.as_pointee().and_then(|p| p.as_struct_id()).cloned())
}

/// A field-pointer field is a function-pointer field exactly at depth 1: a
/// pointer whose pointee is a function type, not a pointer to a pointer to
/// a function.
fn is_func_ptr_field(field: &FieldId) -> bool {
    field.typ.is_func_ptr()
}

pub fn build(program: &Program) -> TypeFilter {
    let mut reverse: Map<StructId, Set<StructId>> = Map::new();
    let mut seeds: Set<StructId> = Set::new();

    for (id, fields) in &program.structs {
        for field in fields {
            if is_func_ptr_field(field) {
                seeds.insert(id.clone());
            }
            if let Some(target) = struct_target(&field.typ) {
                reverse.entry(target).or_default().insert(id.clone());
            }
        }
    }

    let mut interesting: Set<StructId> = Set::new();
    let mut queue: VecDeque<StructId> = seeds.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        if interesting.insert(id.clone()) {
            if let Some(parents) = reverse.get(&id) {
                for p in parents {
                    queue.push_back(p.clone());
                }
            }
        }
    }

    let mentioned = mentioned_structs(program);
    interesting.retain(|id| mentioned.contains(id));

    TypeFilter { interesting }
}

/// The set of record types that appear somewhere other than a struct
/// declaration: a function signature, an instruction's operand/result type,
/// or a non-zero global initializer. A record type reachable only through
/// other records' field declarations, but never actually used, is pruned.
fn mentioned_structs(program: &Program) -> Set<StructId> {
    let mut out = Set::new();

    for f in program.functions.values() {
        if let Some(ret) = &f.ret_ty {
            note_type(ret, &mut out);
        }
        for p in &f.params {
            note_type(&p.typ(), &mut out);
        }
        let Some(body) = &f.body else { continue };
        for bb in body.values() {
            for inst in &bb.insts {
                note_instruction(inst, &mut out);
            }
            note_terminal(&bb.term, &mut out);
        }
    }

    for global in program.globals.values() {
        // The global's own declared type always counts as used, even when
        // its initializer is all-zero (the common case for a plain `struct
        // foo g;` in C) - only the recursion into *nested* field types below
        // depends on those sub-initializers being non-zero.
        note_type(&global.id.typ(), &mut out);
        note_init(&global.init, &global.id.typ(), program, &mut out);
    }

    out
}

fn note_type(t: &Type, out: &mut Set<StructId>) {
    if let Some(id) = t.as_struct_id() {
        out.insert(id.clone());
    }
    if let Some(id) = t.as_pointee().and_then(|p| p.as_struct_id()) {
        out.insert(id.clone());
    }
}

fn note_operand(op: &Operand, out: &mut Set<StructId>) {
    note_type(&op.typ(), out);
}

fn note_instruction(inst: &Instruction, out: &mut Set<StructId>) {
    match inst {
        Instruction::AddrOf { lhs, op } => {
            note_type(&lhs.typ(), out);
            note_operand(op, out);
        }
        Instruction::Alloc { lhs, .. } => note_type(&lhs.typ(), out),
        Instruction::Arith { lhs, op1, op2, .. } => {
            note_type(&lhs.typ(), out);
            note_operand(op1, out);
            note_operand(op2, out);
        }
        Instruction::Cmp { lhs, op1, op2, .. } => {
            note_type(&lhs.typ(), out);
            note_operand(op1, out);
            note_operand(op2, out);
        }
        Instruction::CallExt { lhs, args, .. } => {
            if let Some(lhs) = lhs {
                note_type(&lhs.typ(), out);
            }
            args.iter().for_each(|a| note_operand(a, out));
        }
        Instruction::Copy { lhs, op } => {
            note_type(&lhs.typ(), out);
            note_operand(op, out);
        }
        Instruction::Gep { lhs, src, .. } => {
            note_type(&lhs.typ(), out);
            note_type(&src.typ(), out);
        }
        Instruction::Gfp { lhs, src, field } => {
            note_type(&lhs.typ(), out);
            note_type(&src.typ(), out);
            note_type(&field.typ, out);
        }
        Instruction::Load { lhs, src } => {
            note_type(&lhs.typ(), out);
            note_type(&src.typ(), out);
        }
        Instruction::Store { dst, op } => {
            note_type(&dst.typ(), out);
            note_operand(op, out);
        }
        Instruction::Cast { lhs, op, to } => {
            note_type(&lhs.typ(), out);
            note_operand(op, out);
            note_type(to, out);
        }
        Instruction::Phi { lhs, preds } => {
            note_type(&lhs.typ(), out);
            preds.values().for_each(|o| note_operand(o, out));
        }
    }
}

fn note_terminal(term: &Terminal, out: &mut Set<StructId>) {
    match term {
        Terminal::Jump(_) => {}
        Terminal::Branch { cond, .. } => note_operand(cond, out),
        Terminal::CallDirect { lhs, args, .. } => {
            if let Some(lhs) = lhs {
                note_type(&lhs.typ(), out);
            }
            args.iter().for_each(|a| note_operand(a, out));
        }
        Terminal::CallIndirect { lhs, callee, args, .. } => {
            if let Some(lhs) = lhs {
                note_type(&lhs.typ(), out);
            }
            note_type(&callee.typ(), out);
            args.iter().for_each(|a| note_operand(a, out));
        }
        Terminal::Ret(op) => {
            if let Some(op) = op {
                note_operand(op, out);
            }
        }
    }
}

fn is_nonzero_init(init: &ConstInit) -> bool {
    match init {
        ConstInit::ZeroInt | ConstInit::NullPtr => false,
        ConstInit::FuncRef(_) | ConstInit::GlobalRef(_) => true,
        ConstInit::Struct(fields) => fields.iter().any(is_nonzero_init),
    }
}

/// Recurses into a struct literal initializer, noting the struct type of
/// every nested record field whose own sub-initializer is non-zero.
fn note_init(init: &ConstInit, typ: &Type, program: &Program, out: &mut Set<StructId>) {
    let ConstInit::Struct(field_inits) = init else {
        return;
    };
    let Some(sid) = typ.as_struct_id() else { return };
    for (field, field_init) in program.fields(sid).iter().zip(field_inits) {
        if is_nonzero_init(field_init) {
            note_type(&field.typ, out);
        }
        note_init(field_init, &field.typ, program, out);
    }
}
