//! Struct instrumentation: rewrites a module so that every indirect call
//! through a function-pointer field of a record type resolves, under a
//! field-sensitive pointer analysis, to a finite, statically discoverable
//! candidate set.
//!
//! See each submodule for one pipeline stage; [`instrument`] runs them in
//! the only order that works: the type filter must run first (everything
//! else consults its interesting-type set), singletons and stubs must
//! exist before their initializers and the scrubber can refer to them, and
//! the negative-offset scrub must run before the cast scrub (it produces
//! casts for the cast scrub to then retarget).
//!
//! The declaration realizer runs before the call-site generator: a
//! declared-only function that gains a synthesized body is meant to be
//! called by the synthetic caller just like any other eligible function
//! (calling it once is the whole point of giving it a body), so by the
//! time `caller::generate_caller` evaluates eligibility, realized
//! declarations must already have bodies and must not be mistaken for
//! pass-internal synthetic functions. `State::synthetic_only` tracks the
//! latter (stubs, the global initializer, the caller itself) separately
//! from `new_functions` (every function this pass added or replaced) so
//! the caller's eligibility check can exclude only the former.

use crate::commons::Valid;
use crate::middle_end::lir::*;

mod builder;
mod caller;
mod declare;
mod error;
mod reconcile;
mod scrub;
mod singleton;
mod stubs;
mod type_filter;

pub use error::InstrumentError;
pub use type_filter::TypeFilter;

#[cfg(test)]
mod tests;

pub const DEFAULT_PREFIX: &str = "mypass";

#[derive(Clone, Debug)]
pub struct InstrumentConfig {
    /// Prefix used for every synthetic symbol this pass emits.
    pub prefix: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        InstrumentConfig {
            prefix: DEFAULT_PREFIX.to_owned(),
        }
    }
}

pub(crate) struct State {
    pub config: InstrumentConfig,
    pub filter: TypeFilter,
    pub singletons: Map<StructId, VarId>,
    pub stubs: Map<(StructId, usize), FuncId>,
    pub new_functions: Set<FuncId>,
    pub synthetic_only: Set<FuncId>,
    pub global_init: builder::BodyBuilder,
    pub caller: builder::BodyBuilder,
    pub caller_blocks: Vec<BasicBlock>,
    pub caller_post_call: Option<(VarId, VarId)>,
    pub next_gep_addr: i64,
}

impl State {
    fn new(config: InstrumentConfig) -> Self {
        let global_init_id = func_id(&format!("{}_global_initializer", config.prefix));
        let caller_id = func_id(&format!("{}_function_caller", config.prefix));
        State {
            config,
            filter: TypeFilter::default(),
            singletons: Map::new(),
            stubs: Map::new(),
            new_functions: Set::new(),
            synthetic_only: Set::new(),
            global_init: builder::BodyBuilder::new(global_init_id),
            caller: builder::BodyBuilder::new(caller_id),
            caller_blocks: Vec::new(),
            caller_post_call: None,
            next_gep_addr: 1024,
        }
    }
}

/// Runs the struct-instrumentation pass. Unlike this crate's other passes
/// (`Valid<Program> -> Valid<Program>`), this one can hit genuine fail-fast
/// internal errors (see the error kinds in [`InstrumentError`]), so it
/// returns a `Result` instead of unwrapping internally.
pub fn instrument(
    valid_program: Valid<Program>,
    config: &InstrumentConfig,
) -> Result<Valid<Program>, InstrumentError> {
    let mut program = valid_program.into_inner();
    let mut state = State::new(config.clone());

    state.filter = type_filter::build(&program);
    log::debug!("{} interesting struct types", state.filter.len());

    singleton::create_all(&mut program, &mut state);
    stubs::synthesize_all(&mut program, &mut state)?;

    reconcile::reconcile_globals(&program, &mut state);

    let replaced = scrub::replace_negative_geps(&mut program, &mut state);
    log::info!("negative field-offset computations replaced: {replaced}");
    scrub::replace_restricted_casts(&mut program, &state);

    declare::realize_declarations(&mut program, &mut state);
    caller::generate_caller(&program, &mut state);

    finalize_global_initializer(&mut program, &mut state);
    caller::finalize_caller(&mut program, &mut state);

    program.validate().map_err(InstrumentError::from)
}

fn finalize_global_initializer(program: &mut Program, state: &mut State) {
    let id = func_id(&format!("{}_global_initializer", state.config.prefix));
    let builder = std::mem::replace(&mut state.global_init, builder::BodyBuilder::new(id.clone()));
    let (block, locals) = builder.into_block(bb_id("entry"), Terminal::Ret(None));

    let mut body = Map::new();
    body.insert(block.id.clone(), block);

    program.functions.insert(
        id.clone(),
        Function {
            id: id.clone(),
            linkage: Linkage::Internal,
            ret_ty: None,
            params: Vec::new(),
            locals,
            body: Some(body),
        },
    );
    state.new_functions.insert(id.clone());
    state.synthetic_only.insert(id);
}
