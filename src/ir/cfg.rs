//! CFG maintenance utilities: dead-block pruning and phi simplification.
//!
//! Edge wiring itself lives on `Func` (`make_merge`/`make_split`/
//! `make_switch`) so terminator records and predecessor lists always change
//! together; the passes here clean up after construction.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::ir::{walk_op_uses, BlockId, Func, OpId, OpKind, Terminator, DETACHED_BLOCK};

/// Remove dead blocks: anything already detached, and anything not
/// reachable from the entry block. Reachability subsumes the simple
/// "empty with no incoming edges" rule and also catches non-empty dead
/// blocks (the unreachable continuations left behind by `return`, `break`
/// and `goto`), whose outgoing edges would otherwise pollute predecessor
/// lists and confuse phi construction. The entry block always survives.
pub fn prune_blocks(func: &mut Func) {
    if func.block_order.is_empty() {
        return;
    }

    let entry = func.block_order[0];
    let mut reachable: FxHashSet<BlockId> = FxHashSet::default();
    let mut worklist = vec![entry];
    while let Some(block) = worklist.pop() {
        if !reachable.insert(block) {
            continue;
        }
        worklist.extend(func.succs(block));
    }

    let dead: Vec<BlockId> = func
        .block_order
        .iter()
        .copied()
        .filter(|&b| !reachable.contains(&b) || func.block(b).id == DETACHED_BLOCK)
        .collect();

    for &block_id in &dead {
        for succ in func.succs(block_id) {
            func.block_mut(succ).preds.retain(|p| *p != block_id);
        }
        let block = func.block_mut(block_id);
        block.id = DETACHED_BLOCK;
        block.term = Terminator::None;
    }
    let order: Vec<BlockId> = func
        .block_order
        .iter()
        .copied()
        .filter(|&b| b == entry || func.blocks.get(b.0).id != DETACHED_BLOCK)
        .collect();
    func.block_order = order;

    // dead predecessors may linger in live blocks' pred lists when the
    // edge was wired before the source became unreachable
    for &block_id in &func.block_order.clone() {
        func.block_mut(block_id).preds.retain(|p| reachable.contains(p));
    }
}

/// Simplify trivial phis: a phi whose entries all resolve to one value that
/// is not the phi itself is replaced by that value at every use and
/// removed. Runs to a fixpoint so chains of trivial phis collapse.
pub fn simplify_phis(func: &mut Func) {
    loop {
        let mut replacements: FxHashMap<OpId, OpId> = FxHashMap::default();

        for op_id in func.op_ids() {
            let op = func.op(op_id);
            let OpKind::Phi { entries } = &op.kind else {
                continue;
            };

            let mut unique: Option<OpId> = None;
            let mut trivial = true;
            for entry in entries {
                if entry.value == op_id {
                    continue;
                }
                match unique {
                    None => unique = Some(entry.value),
                    Some(v) if v == entry.value => {}
                    Some(_) => {
                        trivial = false;
                        break;
                    }
                }
            }

            if trivial {
                if let Some(value) = unique {
                    replacements.insert(op_id, value);
                }
            }
        }

        if replacements.is_empty() {
            break;
        }

        // chase chains so a->b, b->c resolves a straight to c
        let resolve = |mut id: OpId| {
            let mut hops = 0;
            while let Some(&next) = replacements.get(&id) {
                id = next;
                hops += 1;
                debug_assert!(hops <= replacements.len(), "cycle of trivial phis");
            }
            id
        };

        for op_id in func.op_ids() {
            if replacements.contains_key(&op_id) {
                continue;
            }
            let mut kind = std::mem::replace(&mut func.op_mut(op_id).kind, OpKind::Undef);
            walk_op_uses(&mut kind, |use_id| {
                *use_id = resolve(*use_id);
            });
            func.op_mut(op_id).kind = kind;
        }

        // drop the replaced phis from their statements
        for (&phi, _) in &replacements {
            let stmt = func.op(phi).stmt;
            func.stmt_mut(stmt).ops.retain(|&o| o != phi);
        }
    }
}

/// Blocks of the function in layout order, skipping detached ones.
pub fn live_blocks(func: &Func) -> Vec<BlockId> {
    func.block_order
        .iter()
        .copied()
        .filter(|&b| func.block(b).id != DETACHED_BLOCK)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ir::{OpKind, PhiEntry};
    use crate::ir::ty::{FuncTyFlags, IrFuncTy, IR_TY_I32, IR_TY_NONE};
    use smallvec::smallvec;

    fn empty_func() -> Func {
        Func::new(
            "f".to_string(),
            IrFuncTy { ret: IR_TY_I32, params: vec![], flags: FuncTyFlags::empty() },
        )
    }

    #[test]
    fn prune_removes_unreachable_empty_blocks() {
        let mut func = empty_func();
        let entry = func.alloc_block();
        let dead = func.alloc_block();
        let stmt = func.alloc_stmt(entry);
        func.append_op(stmt, OpKind::Ret { value: None }, IR_TY_NONE);
        func.make_ret(entry);
        func.alloc_stmt(dead); // empty statement, no preds

        prune_blocks(&mut func);

        assert_eq!(func.block_order, vec![entry]);
        assert_eq!(func.block(dead).id, DETACHED_BLOCK);
    }

    #[test]
    fn prune_cascades_through_chains() {
        // entry -> a -> b, where a and b are empty; pruning b first leaves a
        // pointing nowhere, then a gets pruned too... but a has a pred, so
        // both survive only through entry. Make them truly unreachable.
        let mut func = empty_func();
        let entry = func.alloc_block();
        let a = func.alloc_block();
        let b = func.alloc_block();
        let stmt = func.alloc_stmt(entry);
        func.append_op(stmt, OpKind::Ret { value: None }, IR_TY_NONE);
        func.make_ret(entry);
        // a is unreachable and empty; it merges into b, so b has a pred
        func.make_merge(a, b);

        prune_blocks(&mut func);

        assert_eq!(func.block_order, vec![entry]);
    }

    #[test]
    fn entry_block_is_never_pruned() {
        let mut func = empty_func();
        let entry = func.alloc_block();
        func.alloc_stmt(entry);
        prune_blocks(&mut func);
        assert_eq!(func.block_order, vec![entry]);
    }

    #[test]
    fn trivial_phi_collapses_to_value() {
        let mut func = empty_func();
        let entry = func.alloc_block();
        let join = func.alloc_block();
        func.make_merge(entry, join);

        let stmt = func.alloc_stmt(entry);
        let value = func.append_op(stmt, OpKind::CnstInt(1), IR_TY_I32);

        let phi = func.insert_phi(join, IR_TY_I32);
        if let OpKind::Phi { entries } = &mut func.op_mut(phi).kind {
            *entries = smallvec![PhiEntry { pred: entry, value }];
        }
        let join_stmt = func.alloc_stmt(join);
        let ret = func.append_op(join_stmt, OpKind::Ret { value: Some(phi) }, IR_TY_NONE);
        func.make_ret(join);

        simplify_phis(&mut func);

        assert!(matches!(func.op(ret).kind, OpKind::Ret { value: Some(v) } if v == value));
        // phi op removed from its statement
        let head = func.block(join).stmts[0];
        assert!(func.stmt(head).ops.is_empty());
    }

    #[test]
    fn self_referencing_loop_phi_simplifies() {
        // phi entries: [self via backedge, v] -> all non-self entries agree
        let mut func = empty_func();
        let entry = func.alloc_block();
        let header = func.alloc_block();
        func.make_merge(entry, header);
        func.make_merge(header, header); // backedge

        let stmt = func.alloc_stmt(entry);
        let value = func.append_op(stmt, OpKind::CnstInt(7), IR_TY_I32);
        let phi = func.insert_phi(header, IR_TY_I32);
        if let OpKind::Phi { entries } = &mut func.op_mut(phi).kind {
            *entries = smallvec![
                PhiEntry { pred: entry, value },
                PhiEntry { pred: header, value: phi },
            ];
        }
        let body_stmt = func.alloc_stmt(header);
        let use_op = func.append_op(
            stmt,
            OpKind::Binary { op: crate::ir::ir::BinaryOp::Add, lhs: phi, rhs: phi },
            IR_TY_I32,
        );
        let _ = body_stmt;

        simplify_phis(&mut func);

        assert!(
            matches!(func.op(use_op).kind, OpKind::Binary { lhs, rhs, .. } if lhs == value && rhs == value)
        );
    }

    #[test]
    fn non_trivial_phi_is_kept() {
        let mut func = empty_func();
        let a = func.alloc_block();
        let b = func.alloc_block();
        let join = func.alloc_block();
        func.make_merge(a, join);
        func.make_merge(b, join);

        let sa = func.alloc_stmt(a);
        let va = func.append_op(sa, OpKind::CnstInt(1), IR_TY_I32);
        let sb = func.alloc_stmt(b);
        let vb = func.append_op(sb, OpKind::CnstInt(2), IR_TY_I32);

        let phi = func.insert_phi(join, IR_TY_I32);
        if let OpKind::Phi { entries } = &mut func.op_mut(phi).kind {
            *entries = smallvec![
                PhiEntry { pred: a, value: va },
                PhiEntry { pred: b, value: vb },
            ];
        }

        simplify_phis(&mut func);

        assert!(matches!(&func.op(phi).kind, OpKind::Phi { entries } if entries.len() == 2));
    }
}
