//! Emits the one global singleton per interesting record type. The actual
//! constant initializer is filled in by [`super::stubs`] once the field
//! stubs exist; here we only reserve the symbol with a zero-shaped
//! placeholder so later components can refer to it.

use crate::middle_end::lir::*;

use super::State;

pub fn singleton_name(prefix: &str, sid: &StructId) -> VarId {
    var_id(
        &format!("{prefix}_{sid}_singleton"),
        struct_ty(sid.clone()),
        None,
    )
}

pub fn create_all(program: &mut Program, state: &mut State) {
    let sids: Vec<StructId> = state.filter.interesting_structs().cloned().collect();

    for sid in sids {
        let id = singleton_name(&state.config.prefix, &sid);
        let field_count = program.fields(&sid).len();
        let placeholder = ConstInit::Struct(vec![ConstInit::ZeroInt; field_count]);

        program.globals.insert(
            id.clone(),
            Global {
                id: id.clone(),
                linkage: Linkage::Internal,
                init: placeholder,
            },
        );
        state.singletons.insert(sid, id);
    }
}
