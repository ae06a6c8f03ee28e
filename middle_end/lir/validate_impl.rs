//! Structural validation for [`Program`](super::Program).
//!
//! This is deliberately shallow compared to a real verifier: it checks the
//! invariants the rest of this crate actually relies on (every referenced
//! variable, block and struct exists; every function has an `entry` block
//! when it has a body at all) rather than full type-checking every
//! instruction.

use super::*;
use crate::commons::ValidationError;

pub fn validate(program: &Program) -> Result<(), ValidationError> {
    let mut err = ValidationError::new();

    err += check_struct_fields(program);
    err += check_functions(program);

    if err.is_empty() {
        Ok(())
    } else {
        Err(err)
    }
}

fn check_struct_fields(program: &Program) -> ValidationError {
    let mut err = ValidationError::new();

    for (id, fields) in &program.structs {
        if fields.is_empty() {
            err += ValidationError::from_string(format!("struct {id} has no fields"));
        }
        let mut seen = Set::new();
        for f in fields {
            if !seen.insert(&f.name) {
                err += ValidationError::from_string(format!(
                    "struct {id} declares field {} more than once",
                    f.name
                ));
            }
        }
    }

    err
}

fn check_functions(program: &Program) -> ValidationError {
    let mut err = ValidationError::new();

    for (id, f) in &program.functions {
        if f.id != *id {
            err += ValidationError::from_string(format!(
                "function keyed as {id} but has id {}",
                f.id
            ));
        }

        let Some(body) = &f.body else { continue };

        if !body.contains_key(&bb_id("entry")) {
            err += ValidationError::from_string(format!("function {id} has no entry block"));
        }

        for (bbid, bb) in body {
            if bb.id != *bbid {
                err += ValidationError::from_string(format!(
                    "in {id}: block keyed as {bbid} but has id {}",
                    bb.id
                ));
            }

            for target in successors(&bb.term) {
                if !body.contains_key(&target) {
                    err += ValidationError::from_string(format!(
                        "in {id}: block {bbid} branches to undefined block {target}"
                    ));
                }
            }

            if let Terminal::CallDirect { callee, .. } = &bb.term {
                if !program.functions.contains_key(callee) {
                    err += ValidationError::from_string(format!(
                        "in {id}: direct call to undefined function {callee}"
                    ));
                }
            }

            for inst in &bb.insts {
                if let Instruction::Gfp { src, field, .. } = inst {
                    if let Some(sid) = src.typ().base_typ().as_struct_id() {
                        if program.field_index(sid, &field.name).is_none() {
                            err += ValidationError::from_string(format!(
                                "in {id}.{bbid}: field {} does not exist on struct {sid}",
                                field.name
                            ));
                        }
                    }
                }
            }
        }
    }

    err
}

fn successors(term: &Terminal) -> Vec<BbId> {
    match term {
        Terminal::Jump(bb) => vec![bb.clone()],
        Terminal::Branch { tt, ff, .. } => vec![tt.clone(), ff.clone()],
        Terminal::CallDirect { next_bb, .. } | Terminal::CallIndirect { next_bb, .. } => {
            vec![next_bb.clone()]
        }
        Terminal::Ret(_) => vec![],
    }
}
