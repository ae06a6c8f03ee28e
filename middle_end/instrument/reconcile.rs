//! Copies every authored global of an interesting record type into its
//! singleton, so a pointer analysis sees static data flowing into the
//! observation point. `structs.rs` handles arrays of records as separate
//! same-typed globals (this IR has no array type), each reconciled the same
//! way.

use crate::middle_end::lir::*;

use super::State;

pub fn reconcile_globals(program: &Program, state: &mut State) {
    let singleton_ids: Set<VarId> = state.singletons.values().cloned().collect();

    let mut authored: Vec<(VarId, StructId)> = program
        .globals
        .values()
        .filter(|g| !singleton_ids.contains(&g.id))
        .filter_map(|g| {
            g.id.typ()
                .as_struct_id()
                .filter(|sid| state.filter.is_interesting_struct_id(sid))
                .map(|sid| (g.id.clone(), sid.clone()))
        })
        .collect();
    authored.sort();

    for (global_id, sid) in authored {
        let singleton = state.singletons[&sid].clone();
        let global_ptr = state.global_init.addr_of(global_id);
        let singleton_ptr = state.global_init.addr_of(singleton);
        state.global_init.copy_through(global_ptr, singleton_ptr);
    }
}
