//! Statement and control-flow lowering.
//!
//! Statement builders take the block to build into and return the block
//! where control continues. Break/continue sites are pushed onto a jump
//! stack and wired by the enclosing loop or switch; `goto` branches carry
//! their label name until the post-body fix-up pass; deferred statements
//! replay in LIFO order at every exit of their scope, including exits via
//! return, break and continue.

use crate::frontend::ast::{self, DeclOrExpr, Expr, StorageClass};
use crate::ir::ir::*;
use crate::ir::ty::{IrType, IR_TY_NONE};
use crate::ir::var_refs::VarRefKind;

use super::{init, CaseKind, CaseRecord, Cursor, DeferRecord, FuncBuilder, Jump, JumpKind};

/// Continue/break targets of one loop.
struct Loop {
    entry: BlockId,
    exit: BlockId,
}

impl<'a, 'u> FuncBuilder<'a, 'u> {
    pub(crate) fn build_stmt(&mut self, block: BlockId, stmt: &'a ast::Stmt) -> BlockId {
        match &stmt.kind {
            ast::StmtKind::Null => block,
            ast::StmtKind::Expr(expr) => {
                let mut cursor = self.cursor_at(block);
                self.build_expr(&mut cursor, expr);
                cursor.block
            }
            ast::StmtKind::Decl(decl) => {
                let mut cursor = self.cursor_at(block);
                self.build_declaration(&mut cursor, decl);
                cursor.block
            }
            ast::StmtKind::Compound(stmts) => self.build_compound(block, stmts),
            ast::StmtKind::If { cond, body } => self.build_if(block, cond, body),
            ast::StmtKind::IfElse { cond, then_body, else_body } => {
                self.build_ifelse(block, cond, then_body, else_body)
            }
            ast::StmtKind::Switch { ctrl, body } => self.build_switch(block, ctrl, body),
            ast::StmtKind::While { .. }
            | ast::StmtKind::DoWhile { .. }
            | ast::StmtKind::For { .. } => self.build_iter(block, stmt),
            ast::StmtKind::Label(..) | ast::StmtKind::Case(..) | ast::StmtKind::Default(..) => {
                self.build_labeled(block, stmt)
            }
            ast::StmtKind::Goto(label) => {
                let mut cursor = self.cursor_at(block);
                self.build_goto(&mut cursor, label)
            }
            ast::StmtKind::Break => {
                let mut cursor = self.cursor_at(block);
                self.build_break(&mut cursor)
            }
            ast::StmtKind::Continue => {
                let mut cursor = self.cursor_at(block);
                self.build_continue(&mut cursor)
            }
            ast::StmtKind::Return(expr) => {
                let mut cursor = self.cursor_at(block);
                self.build_ret(&mut cursor, expr.as_ref())
            }
            ast::StmtKind::Defer(inner) => {
                self.defers.push(DeferRecord::Defer(inner));
                block
            }
        }
    }

    fn cursor_at(&mut self, block: BlockId) -> Cursor {
        let stmt = self.func.alloc_stmt(block);
        Cursor { block, stmt }
    }

    // ── defers ───────────────────────────────────────────────────────────────

    /// Replay deferred statements in LIFO order, innermost first, down to
    /// (but excluding) stack depth `depth` — without popping, since the
    /// fall-through path still owns them.
    fn replay_defers_down_to(&mut self, cursor: &mut Cursor, depth: usize) {
        self.fresh_stmt(cursor);
        let mut i = self.defers.len();
        while i > depth {
            i -= 1;
            if let DeferRecord::Defer(stmt) = self.defers[i] {
                let block = self.build_stmt(cursor.block, stmt);
                self.move_to_block(cursor, block);
            }
        }
    }

    /// Defer-stack depth `break` unwinds to: the nearest loop or switch.
    fn break_defer_depth(&self) -> usize {
        self.jumps
            .iter()
            .rev()
            .find(|j| matches!(j.kind, JumpKind::NewLoop | JumpKind::NewSwitch))
            .map(|j| j.defer_depth)
            .expect("break outside loop or switch")
    }

    /// Defer-stack depth `continue` unwinds to: the nearest loop, skipping
    /// switches.
    fn continue_defer_depth(&self) -> usize {
        self.jumps
            .iter()
            .rev()
            .find(|j| j.kind == JumpKind::NewLoop)
            .map(|j| j.defer_depth)
            .expect("continue outside loop")
    }

    // ── compound statements ──────────────────────────────────────────────────

    fn build_compound(&mut self, mut block: BlockId, stmts: &'a [ast::Stmt]) -> BlockId {
        self.defers.push(DeferRecord::NewScope);

        for stmt in stmts {
            block = self.build_stmt(block, stmt);
        }

        // scope exit: run this scope's defers, innermost first
        loop {
            match self.defers.pop().expect("unbalanced defer scope") {
                DeferRecord::NewScope => break,
                DeferRecord::Defer(stmt) => {
                    block = self.build_stmt(block, stmt);
                }
            }
        }

        block
    }

    // ── selection ────────────────────────────────────────────────────────────

    fn build_if(&mut self, block: BlockId, cond: &'a Expr, body: &'a ast::Stmt) -> BlockId {
        let mut cursor = self.cursor_at(block);
        let cond_op = self.build_expr_value(&mut cursor, cond);
        let pre_block = cursor.block;

        let br_stmt = self.func.alloc_stmt(pre_block);
        self.func.append_op(br_stmt, OpKind::BrCond { cond: cond_op }, IR_TY_NONE);

        let body_start = self.func.alloc_block();
        let body_end = self.build_stmt(body_start, body);

        // a redundant branch keeps the property that every block ends in one
        let stmt = self.func.alloc_stmt(body_end);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

        let after = self.func.alloc_block();
        self.func.make_split(pre_block, body_start, after);
        self.func.make_merge(body_end, after);

        after
    }

    fn build_ifelse(
        &mut self,
        block: BlockId,
        cond: &'a Expr,
        then_body: &'a ast::Stmt,
        else_body: &'a ast::Stmt,
    ) -> BlockId {
        let mut cursor = self.cursor_at(block);
        let cond_op = self.build_expr_value(&mut cursor, cond);
        let pre_block = cursor.block;

        let then_start = self.func.alloc_block();
        let then_end = self.build_stmt(then_start, then_body);

        let else_start = self.func.alloc_block();
        let else_end = self.build_stmt(else_start, else_body);

        let after = self.func.alloc_block();

        self.func.make_split(pre_block, then_start, else_start);
        let br_stmt = self.func.alloc_stmt(pre_block);
        self.func.append_op(br_stmt, OpKind::BrCond { cond: cond_op }, IR_TY_NONE);

        let stmt = self.func.alloc_stmt(then_end);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);
        self.func.make_merge(then_end, after);

        let stmt = self.func.alloc_stmt(else_end);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);
        self.func.make_merge(else_end, after);

        after
    }

    fn build_switch(&mut self, block: BlockId, ctrl: &'a Expr, body: &'a ast::Stmt) -> BlockId {
        let defer_depth = self.defers.len();
        self.jumps.push(Jump { kind: JumpKind::NewSwitch, block, defer_depth });
        self.switch_cases.push(CaseRecord { kind: CaseKind::NewSwitch, target: block });

        let mut cursor = self.cursor_at(block);
        let ctrl_op = self.build_expr_value(&mut cursor, ctrl);
        let ctrl_block = cursor.block;

        let switch_stmt = self.func.alloc_stmt(ctrl_block);
        self.func.append_op(switch_stmt, OpKind::BrSwitch { value: ctrl_op }, IR_TY_NONE);

        let body_start = self.func.alloc_block();
        let body_end = self.build_stmt(body_start, body);

        let after = self.func.alloc_block();
        self.func.make_merge(body_end, after);
        let stmt = self.func.alloc_stmt(body_end);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

        // collect the body's case labels into the terminator
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            let record = self.switch_cases.pop().expect("missing switch marker");
            match record.kind {
                CaseKind::NewSwitch => break,
                CaseKind::Case(value) => cases.push(SwitchCase { value, target: record.target }),
                CaseKind::Default => default = Some(record.target),
            }
        }
        self.func.make_switch(ctrl_block, cases, default.unwrap_or(after));

        // wire breaks; continues belong to the enclosing loop
        let mut continues = Vec::new();
        loop {
            let jump = self.jumps.pop().expect("missing switch jump marker");
            match jump.kind {
                JumpKind::NewSwitch => break,
                JumpKind::Break => {
                    self.func.make_merge(jump.block, after);
                    let stmt = self.func.alloc_stmt(jump.block);
                    self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);
                }
                JumpKind::Continue => continues.push(jump),
                JumpKind::NewLoop => panic!("unbalanced loop marker inside switch"),
            }
        }
        self.jumps.extend(continues);

        after
    }

    // ── iteration ────────────────────────────────────────────────────────────

    fn build_iter(&mut self, block: BlockId, stmt: &'a ast::Stmt) -> BlockId {
        let defer_depth = self.defers.len();
        self.jumps.push(Jump { kind: JumpKind::NewLoop, block, defer_depth });

        let looped = match &stmt.kind {
            ast::StmtKind::While { cond, body } => self.build_while(block, cond, body),
            ast::StmtKind::DoWhile { body, cond } => self.build_dowhile(block, body, cond),
            ast::StmtKind::For { init, cond, iter, body } => {
                self.build_for(block, init.as_deref(), cond.as_ref(), iter.as_ref(), body)
            }
            _ => unreachable!(),
        };

        loop {
            let jump = self.jumps.pop().expect("missing loop marker");
            let target = match jump.kind {
                JumpKind::NewLoop => return looped.exit,
                JumpKind::Break => looped.exit,
                JumpKind::Continue => looped.entry,
                JumpKind::NewSwitch => panic!("unbalanced switch marker inside loop"),
            };
            self.func.make_merge(jump.block, target);
            let stmt = self.func.alloc_stmt(jump.block);
            self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);
        }
    }

    fn build_while(&mut self, block: BlockId, cond: &'a Expr, body: &'a ast::Stmt) -> Loop {
        let cond_block = self.func.alloc_block();
        self.func.make_merge(block, cond_block);
        let stmt = self.func.alloc_stmt(block);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

        let mut cursor = self.cursor_at(cond_block);
        let cond_op = self.build_expr_value(&mut cursor, cond);
        let cond_end = cursor.block;
        let br_stmt = self.func.alloc_stmt(cond_end);
        self.func.append_op(br_stmt, OpKind::BrCond { cond: cond_op }, IR_TY_NONE);

        let body_start = self.func.alloc_block();
        let body_end = self.build_stmt(body_start, body);
        let after = self.func.alloc_block();

        self.func.make_split(cond_end, body_start, after);

        self.func.make_merge(body_end, cond_block);
        let stmt = self.func.alloc_stmt(body_end);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

        Loop { entry: cond_block, exit: after }
    }

    fn build_dowhile(&mut self, block: BlockId, body: &'a ast::Stmt, cond: &'a Expr) -> Loop {
        let body_start = self.func.alloc_block();
        self.func.make_merge(block, body_start);
        let stmt = self.func.alloc_stmt(block);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

        let body_end = self.build_stmt(body_start, body);

        let cond_block = self.func.alloc_block();
        self.func.make_merge(body_end, cond_block);
        let stmt = self.func.alloc_stmt(body_end);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

        let mut cursor = self.cursor_at(cond_block);
        let cond_op = self.build_expr_value(&mut cursor, cond);
        let cond_end = cursor.block;
        let br_stmt = self.func.alloc_stmt(cond_end);
        self.func.append_op(br_stmt, OpKind::BrCond { cond: cond_op }, IR_TY_NONE);

        let after = self.func.alloc_block();
        self.func.make_split(cond_end, body_start, after);

        Loop { entry: cond_block, exit: after }
    }

    fn build_for(
        &mut self,
        block: BlockId,
        for_init: Option<&'a DeclOrExpr>,
        cond: Option<&'a Expr>,
        iter: Option<&'a Expr>,
        body: &'a ast::Stmt,
    ) -> Loop {
        let mut before_cond = block;

        if let Some(for_init) = for_init {
            let mut cursor = self.cursor_at(before_cond);
            match for_init {
                DeclOrExpr::Decl(decl) => self.build_declaration(&mut cursor, decl),
                DeclOrExpr::Expr(expr) => {
                    self.build_expr(&mut cursor, expr);
                }
            }
            before_cond = cursor.block;
        }

        // where the end of the body jumps back to: the cond block if there
        // is one, else straight to the body
        let (cond_block, body_start, cond_end) = match cond {
            Some(cond) => {
                let cond_block = self.func.alloc_block();
                self.func.make_merge(before_cond, cond_block);
                let stmt = self.func.alloc_stmt(before_cond);
                self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

                let mut cursor = self.cursor_at(cond_block);
                let cond_op = self.build_expr_value(&mut cursor, cond);
                let cond_end = cursor.block;
                let br_stmt = self.func.alloc_stmt(cond_end);
                self.func.append_op(br_stmt, OpKind::BrCond { cond: cond_op }, IR_TY_NONE);

                let body_start = self.func.alloc_block();
                (Some(cond_block), body_start, Some(cond_end))
            }
            None => {
                let body_start = self.func.alloc_block();
                self.func.make_merge(before_cond, body_start);
                let stmt = self.func.alloc_stmt(before_cond);
                self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);
                (None, body_start, None)
            }
        };

        let body_end = self.build_stmt(body_start, body);

        // the iter expression runs at the end of each iteration and is the
        // `continue` target
        let loop_tail = match iter {
            Some(iter) => {
                let iter_block = self.func.alloc_block();
                self.func.make_merge(body_end, iter_block);
                let stmt = self.func.alloc_stmt(body_end);
                self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

                let mut cursor = self.cursor_at(iter_block);
                self.build_expr(&mut cursor, iter);
                cursor.block
            }
            None => body_end,
        };

        let back_target = cond_block.unwrap_or(body_start);
        self.func.make_merge(loop_tail, back_target);
        let stmt = self.func.alloc_stmt(loop_tail);
        self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

        let after = self.func.alloc_block();
        if let Some(cond_end) = cond_end {
            self.func.make_split(cond_end, body_start, after);
        }

        Loop { entry: loop_tail, exit: after }
    }

    // ── jumps ────────────────────────────────────────────────────────────────

    /// Lower a `return`. Runs every pending defer (all scopes), then emits
    /// the return; an unreachable continuation block is handed back for any
    /// trailing code.
    fn build_ret(&mut self, cursor: &mut Cursor, ret_expr: Option<&'a Expr>) -> BlockId {
        self.replay_defers_down_to(cursor, 0);

        let value = ret_expr.map(|expr| {
            let op = self.build_expr_value(cursor, expr);
            self.store_load_if_needed(cursor, op)
        });

        self.fresh_stmt(cursor);
        let ty = value.map(|v| self.func.op(v).ty.clone()).unwrap_or(IR_TY_NONE);
        self.func.append_op(cursor.stmt, OpKind::Ret { value }, ty);
        self.func.make_ret(cursor.block);

        self.func.alloc_block()
    }

    fn build_break(&mut self, cursor: &mut Cursor) -> BlockId {
        let depth = self.break_defer_depth();
        self.replay_defers_down_to(cursor, depth);

        self.jumps.push(Jump { kind: JumpKind::Break, block: cursor.block, defer_depth: depth });
        self.func.alloc_block()
    }

    fn build_continue(&mut self, cursor: &mut Cursor) -> BlockId {
        let depth = self.continue_defer_depth();
        self.replay_defers_down_to(cursor, depth);

        self.jumps.push(Jump { kind: JumpKind::Continue, block: cursor.block, defer_depth: depth });
        self.func.alloc_block()
    }

    /// Lower `goto`. The branch records its label name; edges are wired by
    /// the fix-up pass once all labels are known. For a backward goto the
    /// label's scope depth is already known, so defers of the scopes being
    /// left replay here.
    fn build_goto(&mut self, cursor: &mut Cursor, label: &str) -> BlockId {
        if let Some(depth) = self
            .labels
            .iter()
            .find(|l| l.name == label)
            .map(|l| l.defer_depth)
        {
            if depth < self.defers.len() {
                self.replay_defers_down_to(cursor, depth);
            }
        }

        let br_stmt = self.func.alloc_stmt(cursor.block);
        let br = self.func.append_op(br_stmt, OpKind::Br, IR_TY_NONE);
        self.func.op_mut(br).metadata = OpMetadata::GotoTarget(label.to_string());

        self.func.alloc_block()
    }

    // ── labels ───────────────────────────────────────────────────────────────

    fn build_labeled(&mut self, block: BlockId, stmt: &'a ast::Stmt) -> BlockId {
        let next = self.func.alloc_block();
        self.func.make_merge(block, next);
        let br_stmt = self.func.alloc_stmt(block);
        self.func.append_op(br_stmt, OpKind::Br, IR_TY_NONE);

        let inner = match &stmt.kind {
            ast::StmtKind::Label(name, inner) => {
                self.add_label(name, next);
                inner
            }
            ast::StmtKind::Case(value, inner) => {
                self.switch_cases.push(CaseRecord { kind: CaseKind::Case(*value), target: next });
                inner
            }
            ast::StmtKind::Default(inner) => {
                self.switch_cases.push(CaseRecord { kind: CaseKind::Default, target: next });
                inner
            }
            _ => unreachable!(),
        };

        self.build_stmt(next, inner)
    }

    // ── declarations ─────────────────────────────────────────────────────────

    /// Lower a declaration list appearing inside a function (default
    /// storage is automatic).
    pub(crate) fn build_declaration(&mut self, cursor: &mut Cursor, decl: &'a ast::Declaration) {
        if decl.storage == StorageClass::Typedef {
            return;
        }

        for var_decl in &decl.decls {
            let automatic = !var_decl.ty.is_func()
                && matches!(
                    decl.storage,
                    StorageClass::None | StorageClass::Auto | StorageClass::Register
                );

            if automatic {
                self.build_auto_var(cursor, var_decl);
            } else {
                // static locals, extern declarations, local function decls
                let func_name = self.func.name.clone();
                init::build_global_var(
                    self.unit,
                    &mut self.var_refs,
                    Some(&func_name),
                    decl.storage,
                    decl.is_inline,
                    var_decl,
                );
            }
        }
    }

    fn build_auto_var(&mut self, cursor: &mut Cursor, decl: &'a ast::VarDecl) {
        let var_ty = self.ty_for_ast(&decl.ty);

        // addressable kinds (and spill-all builds) get a slot up front;
        // scalars stay SSA until their address is taken
        let needs_slot = self.flags.contains(super::BuildFlags::SPILL_ALL)
            || var_ty.is_aggregate()
            || matches!(var_ty, IrType::Array { .. });

        let lcl = if needs_slot {
            let lcl = self.func.add_local(var_ty.clone());
            let key = self.var_key(&decl.var);
            self.var_refs.entry(key, VarRefKind::Local).local = Some(lcl);
            Some(lcl)
        } else {
            None
        };

        let assignment = match &decl.init {
            Some(init) => {
                let address = lcl.map(|lcl| {
                    self.func.append_op(
                        cursor.stmt,
                        OpKind::Addr(AddrTarget::Local(lcl)),
                        crate::ir::ty::IR_TY_POINTER,
                    )
                });
                self.build_init(cursor, address, init)
            }
            None => {
                if lcl.is_none() {
                    // declared but uninitialised: define the SSA name as
                    // undef so every read has a reaching definition
                    Some(self.func.append_op(cursor.stmt, OpKind::Undef, var_ty.clone()))
                } else {
                    None
                }
            }
        };

        match (lcl, assignment) {
            (Some(lcl), Some(value)) => {
                // `char buf[] = "literal"`: the initializer arrives as the
                // literal's address; the store wants the bytes
                let lcl_ty = self.func.local(lcl).ty.clone();
                if matches!(lcl_ty, IrType::Array { .. }) {
                    if let OpKind::Addr(AddrTarget::Global(glb)) = self.func.op(value).kind {
                        let op = self.func.op_mut(value);
                        op.kind = OpKind::Load { src: MemLoc::Global(glb) };
                        op.ty = lcl_ty;
                    }
                }
                self.func.append_op(
                    cursor.stmt,
                    OpKind::Store { dst: MemLoc::Local(lcl), value },
                    IR_TY_NONE,
                );
            }
            (None, Some(value)) => {
                self.var_assg(cursor.stmt, cursor.block, value, &decl.var);
            }
            _ => {}
        }
    }
}
