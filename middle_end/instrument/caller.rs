//! Synthesizes the `caller` function: one call per externally-reachable,
//! interesting-type-touching function, fed with singleton-derived
//! arguments, so a pointer analysis sees every such function invoked at
//! least once.

use crate::middle_end::lir::*;

use super::State;

fn touches_interesting(state: &State, f: &Function) -> bool {
    if let Some(ret) = &f.ret_ty {
        if state.filter.is_interesting_type_or_ptr(ret) {
            return true;
        }
    }
    f.params
        .iter()
        .any(|p| state.filter.is_interesting_type_or_ptr(&p.typ()))
}

fn eligible(state: &State, id: &FuncId, f: &Function) -> bool {
    // `new_functions` also holds declarations the realizer just gave a body
    // to; those are meant to be called here (spec scenario: calling the
    // caller once reaches a realized declaration), so only pass-internal
    // synthetic functions (stubs, the global initializer, this function
    // itself) are excluded.
    !state.synthetic_only.contains(id)
        && !f.is_declaration()
        && f.linkage != Linkage::Private
        && touches_interesting(state, f)
}

/// Name of the `n`th block in the caller's call chain; block 0 is always
/// `entry`, as every function body must have one.
fn block_name(n: usize) -> BbId {
    if n == 0 {
        bb_id("entry")
    } else {
        bb_id(&format!("call_{n}"))
    }
}

pub fn generate_caller(program: &Program, state: &mut State) {
    let mut callees: Vec<FuncId> = program
        .functions
        .iter()
        .filter(|(id, f)| eligible(state, id, f))
        .map(|(id, _)| id.clone())
        .collect();
    callees.sort();

    for (i, callee) in callees.into_iter().enumerate() {
        let f = &program.functions[&callee];
        let args: Vec<Operand> = f
            .param_types()
            .iter()
            .map(|t| default_operand(&state.filter, &state.singletons, &mut state.caller, t))
            .collect();

        let lhs = f.ret_ty.clone().map(|rt| state.caller.fresh(rt));

        match (&f.ret_ty, &lhs) {
            (Some(rt), Some(lhs)) if state.filter.is_ptr_to_interesting_type(rt) => {
                let sid = rt.as_pointee().and_then(Type::as_struct_id).unwrap().clone();
                let singleton = state.singletons[&sid].clone();
                let singleton_ptr = state.caller.addr_of(singleton);
                // Queued after the call itself is emitted below; stash it so
                // it lands in the *next* block rather than this one.
                state.caller_post_call = Some((lhs.clone(), singleton_ptr));
            }
            (Some(rt), Some(_)) if state.filter.is_interesting_type(rt) => {
                log::warn!(
                    "{callee} returns interesting record {rt:?} by value; \
                     no record-copy synthesized (size/layout ambiguous)"
                );
            }
            _ => {}
        }

        let next_bb = block_name(i + 1);
        let block = state.caller.finish_block(
            block_name(i),
            Terminal::CallDirect {
                lhs,
                callee: callee.clone(),
                args,
                next_bb,
            },
        );
        state.caller_blocks.push(block);

        if let Some((dst_ptr, singleton_ptr)) = state.caller_post_call.take() {
            state.caller.copy_through(dst_ptr, singleton_ptr);
        }
    }
}

/// Builds an argument value per the rules of the call-site generator
/// (reused, unmodified, by the declaration realizer's default return
/// value): a zero int, the singleton for an interesting pointer/record, a
/// null stand-in for anything else. Takes the pieces of [`State`] it needs
/// as disjoint borrows so callers can pass a builder other than
/// `state.caller` (the declaration realizer builds into its own body).
pub fn default_operand(
    filter: &super::type_filter::TypeFilter,
    singletons: &Map<StructId, VarId>,
    b: &mut super::builder::BodyBuilder,
    t: &Type,
) -> Operand {
    if t.is_int() {
        return Operand::CInt(0);
    }
    if filter.is_ptr_to_interesting_type(t) {
        let sid = t.as_pointee().and_then(Type::as_struct_id).unwrap().clone();
        let singleton = singletons[&sid].clone();
        let ptr = b.addr_of(singleton);
        return Operand::Var(ptr);
    }
    if t.is_ptr() {
        return Operand::CInt(0);
    }
    if let Some(sid) = t.as_struct_id() {
        if filter.is_interesting_type(t) {
            let singleton = singletons[sid].clone();
            return Operand::Var(singleton);
        }
        let ptr = b.alloc(sid.clone());
        let val = b.load(ptr);
        return Operand::Var(val);
    }
    Operand::CInt(0)
}

pub fn finalize_caller(program: &mut Program, state: &mut State) {
    let id = func_id(&format!("{}_function_caller", state.config.prefix));

    let blocks = std::mem::take(&mut state.caller_blocks);
    let n = blocks.len();
    let tail_id = block_name(n);
    let tail = state.caller.finish_block(tail_id.clone(), Terminal::Ret(None));

    let mut body = Map::new();
    if blocks.is_empty() {
        body.insert(bb_id("entry"), BasicBlock {
            id: bb_id("entry"),
            insts: tail.insts,
            term: Terminal::Ret(None),
        });
    } else {
        for b in blocks {
            body.insert(b.id.clone(), b);
        }
        body.insert(tail.id.clone(), tail);
    }

    let func = Function {
        id: id.clone(),
        linkage: Linkage::Internal,
        ret_ty: None,
        params: Vec::new(),
        locals: state.caller.locals_snapshot(),
        body: Some(body),
    };
    program.functions.insert(id.clone(), func);
    state.new_functions.insert(id.clone());
    state.synthetic_only.insert(id);
}
