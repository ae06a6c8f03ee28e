//! Declaration realizer: gives every declared-only function whose signature
//! touches an interesting type a body that, worst-case, both reads and
//! writes its pointer-to-interesting-record parameters through their
//! singleton.

use crate::middle_end::lir::*;

use super::builder::BodyBuilder;
use super::caller::default_operand;
use super::State;

fn touches_interesting(state: &State, f: &Function) -> bool {
    let ret_touches = f
        .ret_ty
        .as_ref()
        .is_some_and(|rt| state.filter.is_interesting_type_or_ptr(rt));
    ret_touches
        || f.params
            .iter()
            .any(|p| state.filter.is_interesting_type_or_ptr(&p.typ()))
}

pub fn realize_declarations(program: &mut Program, state: &mut State) {
    let candidates: Vec<FuncId> = program
        .functions
        .iter()
        .filter(|(_, f)| f.is_declaration() && touches_interesting(state, f))
        .map(|(id, _)| id.clone())
        .collect();

    for id in candidates {
        let (ret_ty, params, linkage) = {
            let f = &program.functions[&id];
            (f.ret_ty.clone(), f.params.clone(), f.linkage)
        };

        let mut b = BodyBuilder::new(id.clone());
        for p in &params {
            let Some(sid) = p
                .typ()
                .as_pointee()
                .filter(|t| state.filter.is_interesting_type(t))
                .and_then(Type::as_struct_id)
                .cloned()
            else {
                continue;
            };
            let singleton = state.singletons[&sid].clone();
            let singleton_ptr = b.addr_of(singleton);
            b.copy_through(p.clone(), singleton_ptr.clone());
            b.copy_through(singleton_ptr, p.clone());
        }

        let ret_op = ret_ty
            .clone()
            .map(|rt| default_operand(&state.filter, &state.singletons, &mut b, &rt));
        let (block, mut locals) = b.into_block(bb_id("entry"), Terminal::Ret(ret_op));
        for p in &params {
            locals.insert(p.clone());
        }
        let mut body = Map::new();
        body.insert(block.id.clone(), block);

        program.functions.insert(
            id.clone(),
            Function {
                id: id.clone(),
                linkage,
                ret_ty,
                params,
                locals,
                body: Some(body),
            },
        );
        // Tracked in `new_functions` only, not `synthetic_only`: this is a
        // real function that merely gained a body, so it stays eligible for
        // the call-site generator that runs after this pass.
        state.new_functions.insert(id);
    }
}
