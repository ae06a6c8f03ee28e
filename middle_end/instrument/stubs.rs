//! Field stub synthesis, singleton initializer computation, and the alias
//! plumbing that keeps a nested interesting record's own singleton in sync
//! with its occurrence inside a containing singleton.

use crate::middle_end::lir::*;

use super::error::InstrumentError;
use super::State;

pub fn synthesize_all(program: &mut Program, state: &mut State) -> Result<(), InstrumentError> {
    let sids: Vec<StructId> = state.filter.interesting_structs().cloned().collect();

    for sid in &sids {
        let fields = program.fields(sid).to_vec();
        let mut field_inits = Vec::with_capacity(fields.len());

        for (idx, field) in fields.iter().enumerate() {
            let init = if field.typ.is_func_ptr() {
                let stub = build_stub(&state.config.prefix, sid, idx, field, singleton_of(state, sid));
                let stub_id = stub.id.clone();
                program.functions.insert(stub_id.clone(), stub);
                state.new_functions.insert(stub_id.clone());
                state.synthetic_only.insert(stub_id.clone());
                state.stubs.insert((sid.clone(), idx), stub_id.clone());
                ConstInit::FuncRef(stub_id)
            } else if state.filter.is_interesting_type(&field.typ) {
                plumb_nested_by_value(state, sid, field);
                ConstInit::ZeroInt
            } else if state.filter.is_ptr_to_interesting_type(&field.typ) {
                let target = field.typ.as_pointee().and_then(Type::as_struct_id).unwrap().clone();
                ConstInit::GlobalRef(singleton_of(state, &target))
            } else {
                ConstInit::zero_for(&field.typ)
            };
            field_inits.push(init);
        }

        let singleton_id = state.singletons[sid].clone();
        if let Some(global) = program.globals.get_mut(&singleton_id) {
            global.init = ConstInit::Struct(field_inits);
        }
    }

    Ok(())
}

fn singleton_of(state: &State, sid: &StructId) -> VarId {
    state.singletons[sid].clone()
}

fn build_stub(
    prefix: &str,
    sid: &StructId,
    idx: usize,
    field: &FieldId,
    singleton: VarId,
) -> Function {
    let stub_id = func_id(&format!("{prefix}_{sid}_{idx}_stub"));
    let (ret_ty, param_ty) = match &*field
        .typ
        .as_pointee()
        .expect("function-pointer field must be a pointer")
        .0
    {
        LirType::Function { ret_ty, param_ty } => (ret_ty.clone(), param_ty.clone()),
        other => unreachable!("field {} is not a function-pointer field: {other:?}", field.name),
    };

    let params: Vec<VarId> = param_ty
        .iter()
        .enumerate()
        .map(|(i, t)| var_id(&format!("arg{i}"), t.clone(), Some(stub_id.clone())))
        .collect();

    let mut b = super::builder::BodyBuilder::new(stub_id.clone());
    let self_ptr = b.addr_of(singleton);
    let field_ptr = b.gfp(self_ptr, field.clone());
    let callee = b.load(field_ptr);
    let lhs = ret_ty.clone().map(|rt| b.fresh(rt));
    let (entry, mut locals) = b.into_block(
        bb_id("entry"),
        Terminal::CallIndirect {
            lhs: lhs.clone(),
            callee,
            args: params.iter().cloned().map(Operand::Var).collect(),
            next_bb: bb_id("ret"),
        },
    );
    let ret_block = BasicBlock {
        id: bb_id("ret"),
        insts: Vec::new(),
        term: Terminal::Ret(lhs.map(Operand::Var)),
    };

    for p in &params {
        locals.insert(p.clone());
    }
    let mut body = Map::new();
    body.insert(entry.id.clone(), entry);
    body.insert(ret_block.id.clone(), ret_block);

    Function {
        id: stub_id,
        linkage: Linkage::Internal,
        ret_ty,
        params,
        locals,
        body: Some(body),
    }
}

/// A field whose type is itself an interesting record, held by value,
/// unifies the container's singleton and the nested type's singleton: the
/// global initializer gets a bidirectional copy between `S(outer).field`
/// and `S(inner)`, so a write through either is observed at both.
fn plumb_nested_by_value(state: &mut State, outer: &StructId, field: &FieldId) {
    let inner = field.typ.as_struct_id().expect("checked by caller").clone();

    let outer_self = state.singletons[outer].clone();
    let inner_self = state.singletons[&inner].clone();

    let outer_ptr = state.global_init.addr_of(outer_self);
    let field_ptr = state.global_init.gfp(outer_ptr, field.clone());
    let inner_ptr = state.global_init.addr_of(inner_self);

    state.global_init.copy_through(field_ptr.clone(), inner_ptr.clone());
    state.global_init.copy_through(inner_ptr, field_ptr);
}
