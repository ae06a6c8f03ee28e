//! The store-purger: a small, independent pass that deletes stores of
//! pointer-to-record values for a configured list of record types.
//!
//! Kernel-style intrusive collections (list nodes, hash-list nodes,
//! lock-less-list nodes) wire objects into pervasive linked structures
//! purely for bookkeeping; those stores are, by construction, irrelevant to
//! which function ends up in a callee set, and left in place they are a
//! major source of false aliasing. Running this before [`super::instrument`]
//! is recommended but not required.

use crate::commons::Valid;
use crate::middle_end::lir::*;

/// Record type names whose pointer-to-record stores get purged by default,
/// matching three common kernel intrusive-list idioms.
pub const DEFAULT_PURGE_TYPES: &[&str] = &["list_head", "hlist_node", "llist_node"];

fn is_purged_store(inst: &Instruction, purge: &Set<StructId>) -> bool {
    let Instruction::Store { op, .. } = inst else {
        return false;
    };
    op.typ()
        .as_pointee()
        .and_then(Type::as_struct_id)
        .is_some_and(|sid| purge.contains(sid))
}

pub fn purge_stores(valid_program: Valid<Program>, purge_types: &[String]) -> Valid<Program> {
    let mut program = valid_program.into_inner();
    let purge: Set<StructId> = purge_types.iter().map(|n| struct_id(n)).collect();

    let mut removed = 0usize;
    for f in program.functions.values_mut() {
        let Some(body) = &mut f.body else { continue };
        for bb in body.values_mut() {
            let before = bb.insts.len();
            bb.insts.retain(|inst| !is_purged_store(inst, &purge));
            removed += before - bb.insts.len();
        }
    }
    log::info!("store-purger removed {removed} store(s)");

    program.validate().unwrap()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn list_head_program() -> Program {
        let list_head = struct_id("list_head");
        let next = field_id("next", ptr_ty(struct_ty(list_head.clone())));
        let mut structs = Map::new();
        structs.insert(list_head.clone(), vec![next.clone()]);

        let f = func_id("link");
        let node = var_id("n", ptr_ty(struct_ty(list_head.clone())), Some(f.clone()));
        let other = var_id("o", ptr_ty(struct_ty(list_head.clone())), Some(f.clone()));
        let counter = var_id("c", ptr_ty(int_ty()), Some(f.clone()));
        let mut locals = Set::new();
        locals.insert(node.clone());
        locals.insert(other.clone());
        locals.insert(counter.clone());

        let mut body = Map::new();
        body.insert(
            bb_id("entry"),
            BasicBlock {
                id: bb_id("entry"),
                insts: vec![
                    // A list-pointer store: this is the intrusive-list
                    // bookkeeping write the purger exists to drop.
                    Instruction::Store { dst: node, op: Operand::Var(other.clone()) },
                    // An ordinary int store: unrelated to the list type and
                    // must survive purging regardless of purge-type config.
                    Instruction::Store { dst: counter.clone(), op: Operand::CInt(1) },
                ],
                term: Terminal::Ret(None),
            },
        );

        let mut functions = Map::new();
        functions.insert(
            f.clone(),
            Function {
                id: f,
                linkage: Linkage::External,
                ret_ty: None,
                params: vec![other],
                locals,
                body: Some(body),
            },
        );

        Program { structs, globals: Map::new(), functions }
    }

    #[test]
    fn purges_only_stores_of_the_configured_type() {
        let program = list_head_program();
        let valid = program.validate().unwrap();

        let out = purge_stores(valid, &["list_head".to_string()]).into_inner();
        let body = out.functions[&func_id("link")].body.as_ref().unwrap();
        let insts = &body[&bb_id("entry")].insts;
        assert_eq!(insts.len(), 1);
        assert!(matches!(&insts[0], Instruction::Store { op: Operand::CInt(1), .. }));
    }

    #[test]
    fn leaves_stores_alone_when_type_not_in_the_purge_list() {
        let program = list_head_program();
        let valid = program.validate().unwrap();

        let out = purge_stores(valid, &["hlist_node".to_string()]).into_inner();
        let body = out.functions[&func_id("link")].body.as_ref().unwrap();
        assert_eq!(body[&bb_id("entry")].insts.len(), 2);
    }
}
