//! Rewrites the two instruction patterns that confuse field-sensitive
//! pointer analyses: negative field-offset computations (the container-of
//! idiom) and bit-casts that cross into or out of an interesting record
//! type. Order matters - [`replace_negative_geps`] must run first, since it
//! turns a negative GEP into an int-to-pointer cast that
//! [`replace_restricted_casts`] then picks up.

use crate::middle_end::lir::*;

use super::State;

pub fn replace_negative_geps(program: &mut Program, state: &mut State) -> usize {
    let mut replaced = 0;

    for (id, func) in program.functions.iter_mut() {
        if state.new_functions.contains(id) {
            continue;
        }
        let Some(body) = &mut func.body else { continue };

        for bb in body.values_mut() {
            for inst in bb.insts.iter_mut() {
                let Instruction::Gep { lhs, idx, .. } = inst else {
                    continue;
                };
                let Operand::CInt(n) = idx else { continue };
                if *n >= 0 {
                    continue;
                }

                let addr = state.next_gep_addr;
                state.next_gep_addr += 1024;
                let to = lhs.typ();
                *inst = Instruction::Cast {
                    lhs: lhs.clone(),
                    op: Operand::CInt(addr),
                    to,
                };
                replaced += 1;
            }
        }
    }

    replaced
}

pub fn replace_restricted_casts(program: &mut Program, state: &State) {
    for (id, func) in program.functions.iter_mut() {
        if state.new_functions.contains(id) {
            continue;
        }
        let Some(body) = &mut func.body else { continue };

        for bb in body.values_mut() {
            for inst in bb.insts.iter_mut() {
                match inst {
                    Instruction::Cast { lhs, to, .. } => {
                        if let Some(sid) = interesting_pointee(state, to) {
                            let singleton = state.singletons[&sid].clone();
                            *inst = Instruction::AddrOf {
                                lhs: lhs.clone(),
                                op: Operand::Var(singleton),
                            };
                        }
                    }
                    Instruction::Load { lhs, src } => {
                        if let Some(sid) = double_pointee(state, &src.typ()) {
                            let singleton = state.singletons[&sid].clone();
                            *inst = Instruction::AddrOf {
                                lhs: lhs.clone(),
                                op: Operand::Var(singleton),
                            };
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

/// `to` is `R*` for an interesting `R`.
fn interesting_pointee(state: &State, to: &Type) -> Option<StructId> {
    let inner = to.as_pointee()?;
    let sid = inner.as_struct_id()?;
    state.filter.is_interesting_type(inner).then(|| sid.clone())
}

/// `t` is `R**` for an interesting `R`.
fn double_pointee(state: &State, t: &Type) -> Option<StructId> {
    let once = t.as_pointee()?;
    interesting_pointee(state, once)
}
