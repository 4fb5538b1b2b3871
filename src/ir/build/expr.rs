//! Expression lowering.
//!
//! Every expression kind maps to op construction; `build_expr` yields the
//! op holding the expression's r-value. Lvalue-producing expressions have
//! parallel address builders that yield a pointer without dereferencing, so
//! assignments and address-of never churn through load/store pairs.

use smallvec::smallvec;

use crate::frontend::ast::{self, AssignOp, AstType, Expr, ExprKind, StringLiteral, Var, VarKind};
use crate::ir::builtins;
use crate::ir::ir::*;
use crate::ir::ty::{IrType, Primitive, IR_TY_I32, IR_TY_NONE, IR_TY_POINTER};
use crate::ir::var_refs::{Resolved, VarRefKind};

use super::{
    get_member_info, mangle_static_name, needs_cast_op, Cursor, FuncBuilder,
};

/// Whether a compound literal should yield its address or its loaded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompoundLiteralMode {
    Addr,
    Load,
}

/// How a cast is performed when one is needed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CastInfo {
    /// Canonicalise to bool: emit `!= 0` instead of a cast op.
    pub cmp_nz: bool,
    pub op: CastOp,
}

impl<'a, 'u> FuncBuilder<'a, 'u> {
    // ── entry points ─────────────────────────────────────────────────────────

    /// Lower an expression to its r-value op. `None` only for expressions
    /// with no value at all (e.g. `__builtin_va_end`, a statement
    /// expression ending in a declaration).
    pub(crate) fn build_expr(&mut self, cursor: &mut Cursor, expr: &'a Expr) -> Option<OpId> {
        let var_ty = self.ty_for_ast(&expr.ty);

        match &expr.kind {
            ExprKind::ConstInt(_) | ExprKind::ConstFloat(_) | ExprKind::ConstString(_) => {
                Some(self.build_cnst(cursor, var_ty, expr))
            }
            ExprKind::Var(var) => Some(self.build_var(cursor, var_ty, var)),
            ExprKind::Unary { op, expr: operand } => {
                self.build_unaryop(cursor, expr, *op, operand)
            }
            ExprKind::Cast { expr: operand } => Some(self.build_cast(cursor, expr, operand)),
            ExprKind::Binary { op, lhs, rhs } => {
                Some(self.build_binaryop(cursor, expr, *op, lhs, rhs))
            }
            ExprKind::Ternary { cond, then_expr, else_expr } => {
                Some(self.build_ternary(cursor, var_ty, cond, then_expr.as_deref(), else_expr))
            }
            ExprKind::Assign { .. } => Some(self.build_assign(cursor, expr)),
            ExprKind::Call { .. } => self.build_call(cursor, expr),
            ExprKind::Builtin(name) => panic!("builtin '{}' outside call position", name),
            ExprKind::ArrayAccess { base, index } => {
                Some(self.build_arrayaccess(cursor, base, index))
            }
            ExprKind::MemberAccess { base, member } => {
                Some(self.build_memberaccess(cursor, var_ty, base, member))
            }
            ExprKind::PointerAccess { base, member } => {
                Some(self.build_pointeraccess(cursor, var_ty, base, member))
            }
            ExprKind::SizeOf(of_ty) => {
                let info = self.type_info(&self.ty_for_ast(of_ty));
                Some(self.func.append_op(cursor.stmt, OpKind::CnstInt(info.size as u64), var_ty))
            }
            ExprKind::AlignOf(of_ty) => {
                let info = self.type_info(&self.ty_for_ast(of_ty));
                Some(self.func.append_op(cursor.stmt, OpKind::CnstInt(info.align as u64), var_ty))
            }
            ExprKind::CompoundLiteral { .. } => {
                Some(self.build_compound_literal(cursor, None, CompoundLiteralMode::Load, expr))
            }
            ExprKind::Comma(exprs) => self.build_comma(cursor, exprs),
            ExprKind::StmtExpr(stmts) => self.build_stmt_expr(cursor, stmts),
            ExprKind::VaArg { list } => Some(self.build_va_arg(cursor, var_ty, list)),
        }
    }

    /// Lower an expression that must produce a value.
    pub(crate) fn build_expr_value(&mut self, cursor: &mut Cursor, expr: &'a Expr) -> OpId {
        self.build_expr(cursor, expr).expect("expression produced no value")
    }

    // ── constants and variables ──────────────────────────────────────────────

    fn build_cnst(&mut self, cursor: &mut Cursor, var_ty: IrType, expr: &'a Expr) -> OpId {
        match &expr.kind {
            ExprKind::ConstInt(value) => {
                self.func.append_op(cursor.stmt, OpKind::CnstInt(*value), var_ty)
            }
            ExprKind::ConstFloat(value) => {
                self.func.append_op(cursor.stmt, OpKind::CnstFlt(*value), var_ty)
            }
            ExprKind::ConstString(literal) => {
                let glb = build_str_literal(self.unit, &expr.ty, literal);
                self.func
                    .append_op(cursor.stmt, OpKind::Addr(AddrTarget::Global(glb)), IR_TY_POINTER)
            }
            _ => unreachable!(),
        }
    }

    /// Lower a variable read. A read in a block with no visible def inserts
    /// an empty phi that finalisation back-patches.
    pub(crate) fn build_var(&mut self, cursor: &mut Cursor, var_ty: IrType, var: &Var) -> OpId {
        if var.name == "__func__" {
            let glb = self.func_name_global(cursor);
            return self
                .func
                .append_op(cursor.stmt, OpKind::Addr(AddrTarget::Global(glb)), IR_TY_POINTER);
        }

        // reading an array or function lvalue decays to its address
        if matches!(var_ty, IrType::Array { .. } | IrType::Func(_)) {
            return self.build_addressof_var(cursor, var);
        }

        if let VarKind::Enumerator(value) = var.kind {
            return self.func.append_op(cursor.stmt, OpKind::CnstInt(value as u64), var_ty);
        }

        match self.lookup_ref(var, Some(cursor.block)) {
            Some((_, Resolved::Ssa(op))) => op,
            Some((_, Resolved::Local(lcl))) => {
                let lcl_ty = self.func.local(lcl).ty.clone();
                if matches!(lcl_ty, IrType::Array { .. } | IrType::Func(_)) {
                    return self.build_addressof_var(cursor, var);
                }
                let ty = match var_ty {
                    IrType::Array { .. } => IR_TY_POINTER,
                    other => other,
                };
                self.func.append_op(cursor.stmt, OpKind::Load { src: MemLoc::Local(lcl) }, ty)
            }
            Some((_, Resolved::Global(glb))) => {
                let glb_ty = self.unit.global(glb).ty.clone();
                if matches!(glb_ty, IrType::Array { .. } | IrType::Func(_)) {
                    return self.build_addressof_var(cursor, var);
                }
                self.func.append_op(cursor.stmt, OpKind::Load { src: MemLoc::Global(glb) }, var_ty)
            }
            None => {
                // no def visible here: empty phi, back-patched after the
                // whole body is built
                let phi = self.func.insert_phi(cursor.block, var_ty);
                self.add_var_write(phi, var);
                self.func.op_mut(phi).metadata =
                    OpMetadata::PendingPhi { name: var.name.clone(), scope: var.scope };

                let key = self.var_key(var);
                self.var_refs.entry(key, VarRefKind::Ssa).record_def(cursor.block, phi);
                phi
            }
        }
    }

    /// Cached `__func__` string global for the current function.
    fn func_name_global(&mut self, _cursor: &mut Cursor) -> GlobalId {
        if let Some(glb) = self.func_name_global {
            return glb;
        }
        let value = self.func.name.clone();
        let ty = IrType::array(IrType::Primitive(Primitive::I8), value.len() + 1);
        let name = mangle_static_name(Some(&self.func.name), "__func__");
        let glb = self.unit.add_global(GlobalKind::Data, ty, DefState::Defined, Some(name));
        self.unit.global_mut(glb).linkage = Linkage::Internal;
        self.unit.global_mut(glb).var = Some(GlobalVar {
            kind: DataKind::StringLiteral,
            value: GlobalValue::Str(StrValue::Ascii(value.into_bytes())),
        });
        self.func_name_global = Some(glb);
        glb
    }

    // ── address builders ─────────────────────────────────────────────────────

    /// Lower an lvalue expression to a pointer op without reading it.
    pub(crate) fn build_addressof(&mut self, cursor: &mut Cursor, expr: &'a Expr) -> OpId {
        match &expr.kind {
            ExprKind::ArrayAccess { base, index } => self.build_array_address(cursor, base, index),
            ExprKind::MemberAccess { base, member } => {
                self.build_member_address(cursor, base, member).0
            }
            ExprKind::PointerAccess { base, member } => {
                self.build_pointer_address(cursor, base, member).0
            }
            ExprKind::CompoundLiteral { .. } => {
                self.build_compound_literal(cursor, None, CompoundLiteralMode::Addr, expr)
            }
            ExprKind::Var(var) => self.build_addressof_var(cursor, var),
            ExprKind::ConstString(_) => {
                // `&"foo"` is the same pointer as `"foo"`
                let var_ty = self.ty_for_ast(&expr.ty);
                self.build_cnst(cursor, var_ty, expr)
            }
            ExprKind::Call { .. } => {
                // spill the returned value so it has a stable address
                let value = self.build_expr_value(cursor, expr);
                let lcl = self.func.add_local(self.func.op(value).ty.clone());
                self.func.append_op(
                    cursor.stmt,
                    OpKind::Store { dst: MemLoc::Local(lcl), value },
                    IR_TY_NONE,
                );
                self.func
                    .append_op(cursor.stmt, OpKind::Addr(AddrTarget::Local(lcl)), IR_TY_POINTER)
            }
            ExprKind::Unary { op: ast::UnaryOp::Deref, expr: inner } => {
                // `&*p` cancels
                self.build_expr_value(cursor, inner)
            }
            ExprKind::Cast { expr: inner } => {
                let to = self.ty_for_ast(&expr.ty);
                let from = self.ty_for_ast(&inner.ty);
                assert!(
                    !needs_cast_op(&self.target, &to, &from),
                    "cannot take the address through a value-changing cast"
                );
                self.build_addressof(cursor, inner)
            }
            ExprKind::Comma(exprs) => {
                // `(a, b)(args)` takes the address of `b`
                let (last, init) = exprs.split_last().expect("empty comma expression");
                for e in init {
                    self.build_expr(cursor, e);
                    self.fresh_stmt(cursor);
                }
                self.build_addressof(cursor, last)
            }
            other => panic!("cannot take the address of {:?}", std::mem::discriminant(other)),
        }
    }

    fn build_addressof_var(&mut self, cursor: &mut Cursor, var: &Var) -> OpId {
        let (key, resolved) = self
            .lookup_ref(var, None)
            .unwrap_or_else(|| panic!("address of unknown variable '{}'", var.name));

        let target = match resolved {
            Resolved::Ssa(latest) => {
                // the variable has only lived in registers so far; give it a
                // slot and store the current value through the normal read
                // path (which phis across blocks if needed)
                let ty = self.func.op(latest).ty.clone();
                let value = self.build_var(cursor, ty, var);
                let lcl = self.func.spill_op(value);
                // not a register-pressure spill, just a change of home
                self.func.op_mut(value).flags.remove(OpFlags::SPILLED);

                self.var_refs
                    .entry_mut(&key)
                    .expect("SSA ref vanished during promotion")
                    .promote_to_local(lcl);
                AddrTarget::Local(lcl)
            }
            Resolved::Local(lcl) => AddrTarget::Local(lcl),
            Resolved::Global(glb) => AddrTarget::Global(glb),
        };

        self.func.append_op(cursor.stmt, OpKind::Addr(target), IR_TY_POINTER)
    }

    /// `base[index]` address: decay the base if it is an array, then a
    /// single address-offset scaled by the element size.
    pub(crate) fn build_array_address(
        &mut self,
        cursor: &mut Cursor,
        base_expr: &'a Expr,
        index_expr: &'a Expr,
    ) -> OpId {
        let (base, elem_ast) = if let AstType::Array { elem, .. } = &base_expr.ty {
            (self.build_addressof(cursor, base_expr), (**elem).clone())
        } else {
            let base = self.build_expr_value(cursor, base_expr);
            (base, base_expr.ty.underlying().clone())
        };

        let index = self.build_expr_value(cursor, index_expr);
        let index = self.promote_to_pointer_width(cursor, index, index_expr.ty.is_signed());

        let elem_info = self.type_info(&self.ty_for_ast(&elem_ast));
        self.func.append_op(
            cursor.stmt,
            OpKind::AddrOffset {
                base,
                index: Some(index),
                scale: elem_info.size as u64,
                offset: 0,
            },
            IR_TY_POINTER,
        )
    }

    /// `base.member` address plus the member's bitfield slice, if any.
    pub(crate) fn build_member_address(
        &mut self,
        cursor: &mut Cursor,
        base_expr: &'a Expr,
        member: &str,
    ) -> (OpId, Option<Bitfield>) {
        let base = self.build_addressof(cursor, base_expr);
        let info = get_member_info(&self.target, &base_expr.ty, member);
        self.member_offset_address(cursor, base, info.offset, info.bitfield)
    }

    /// `base->member` address plus the member's bitfield slice, if any.
    pub(crate) fn build_pointer_address(
        &mut self,
        cursor: &mut Cursor,
        base_expr: &'a Expr,
        member: &str,
    ) -> (OpId, Option<Bitfield>) {
        debug_assert!(base_expr.ty.is_pointer(), "-> through non-pointer");
        let base = self.build_expr_value(cursor, base_expr);
        let info = get_member_info(&self.target, base_expr.ty.underlying(), member);
        self.member_offset_address(cursor, base, info.offset, info.bitfield)
    }

    fn member_offset_address(
        &mut self,
        cursor: &mut Cursor,
        base: OpId,
        offset: usize,
        bitfield: Option<Bitfield>,
    ) -> (OpId, Option<Bitfield>) {
        if offset == 0 {
            return (base, bitfield);
        }
        let addr = self.func.append_op(
            cursor.stmt,
            OpKind::AddrOffset { base, index: None, scale: 0, offset: offset as u64 },
            IR_TY_POINTER,
        );
        (addr, bitfield)
    }

    // ── unary ops and casts ──────────────────────────────────────────────────

    fn build_unaryop(
        &mut self,
        cursor: &mut Cursor,
        expr: &'a Expr,
        op: ast::UnaryOp,
        operand: &'a Expr,
    ) -> Option<OpId> {
        let var_ty = self.ty_for_ast(&expr.ty);

        if op == ast::UnaryOp::AddrOf {
            // address-of does not read its operand
            return Some(self.build_addressof(cursor, operand));
        }

        if matches!(
            op,
            ast::UnaryOp::PreInc | ast::UnaryOp::PreDec | ast::UnaryOp::PostInc | ast::UnaryOp::PostDec
        ) {
            return Some(self.build_inc_dec(cursor, op, operand));
        }

        let value = self.build_expr_value(cursor, operand);

        match op {
            ast::UnaryOp::Deref => {
                Some(self.func.append_op(cursor.stmt, OpKind::Load { src: MemLoc::Addr(value) }, var_ty))
            }
            ast::UnaryOp::Plus => Some(value),
            ast::UnaryOp::Minus => {
                let unary_op = if expr.ty.is_fp() { UnaryOp::FNeg } else { UnaryOp::Neg };
                Some(self.func.append_op(cursor.stmt, OpKind::Unary { op: unary_op, value }, var_ty))
            }
            ast::UnaryOp::LogicalNot => Some(self.func.append_op(
                cursor.stmt,
                OpKind::Unary { op: UnaryOp::LogicalNot, value },
                var_ty,
            )),
            ast::UnaryOp::BitNot => {
                Some(self.func.append_op(cursor.stmt, OpKind::Unary { op: UnaryOp::Not, value }, var_ty))
            }
            _ => unreachable!(),
        }
    }

    /// Pre/post inc/dec, desugared to `lhs = lhs ± 1`. The one-constant is
    /// given a pointer-sized integer type for pointer operands so the
    /// lowering takes the pointer-plus-integer path, not pointer difference.
    fn build_inc_dec(
        &mut self,
        cursor: &mut Cursor,
        op: ast::UnaryOp,
        operand: &'a Expr,
    ) -> OpId {
        let is_postfix = matches!(op, ast::UnaryOp::PostInc | ast::UnaryOp::PostDec);
        let ast_op = match op {
            ast::UnaryOp::PreInc | ast::UnaryOp::PostInc => ast::BinaryOp::Add,
            _ => ast::BinaryOp::Sub,
        };

        let one_ty = if operand.ty.is_pointer() || matches!(operand.ty, AstType::Array { .. }) {
            AstType::pointer_sized_int(&self.target)
        } else {
            operand.ty.clone()
        };

        let current = self.build_expr_value(cursor, operand);
        let one_ir_ty = self.ty_for_ast(&one_ty);
        let one = if one_ir_ty.is_fp() {
            self.func.append_op(cursor.stmt, OpKind::CnstFlt(1.0), one_ir_ty)
        } else {
            self.func.append_op(cursor.stmt, OpKind::CnstInt(1), one_ir_ty)
        };

        let value = self.alloc_binaryop(
            cursor,
            ast_op,
            &operand.ty,
            &operand.ty,
            &one_ty,
            current,
            one,
        );
        self.assign_to_lvalue(cursor, operand, value);

        if is_postfix {
            current
        } else {
            value
        }
    }

    fn build_cast(&mut self, cursor: &mut Cursor, expr: &'a Expr, operand: &'a Expr) -> OpId {
        let value = self.build_expr_value(cursor, operand);

        if expr.ty == AstType::Void {
            // value dropped; leave it as an unused node
            return value;
        }

        let to = self.ty_for_ast(&expr.ty);
        let from = self.func.op(value).ty.clone();
        if needs_cast_op(&self.target, &to, &from) {
            let info = cast_info(&self.target, &operand.ty, &expr.ty);
            self.insert_cast(cursor, value, to, info)
        } else {
            // representation no-op: retype in place
            self.func.op_mut(value).ty = to;
            value
        }
    }

    pub(crate) fn insert_cast_if_needed(
        &mut self,
        cursor: &mut Cursor,
        value: OpId,
        from_ast: &AstType,
        to_ast: &AstType,
    ) -> OpId {
        let to = self.ty_for_ast(to_ast);
        let from = self.ty_for_ast(from_ast);
        if needs_cast_op(&self.target, &to, &from) {
            let info = cast_info(&self.target, from_ast, to_ast);
            self.insert_cast(cursor, value, to, info)
        } else {
            self.func.op_mut(value).ty = to;
            value
        }
    }

    fn insert_cast(&mut self, cursor: &mut Cursor, value: OpId, to: IrType, info: CastInfo) -> OpId {
        if info.cmp_nz {
            let value_ty = self.func.op(value).ty.clone();
            let is_fp = value_ty.is_fp();
            let zero = self.func.mk_zero_constant(cursor.stmt, &value_ty);
            let op = if is_fp { BinaryOp::FNe } else { BinaryOp::Ne };
            self.func.append_op(cursor.stmt, OpKind::Binary { op, lhs: value, rhs: zero }, to)
        } else {
            self.func.append_op(cursor.stmt, OpKind::Cast { op: info.op, value }, to)
        }
    }

    /// Widen (or narrow) an index to the pointer width so address
    /// arithmetic is always pointer-sized.
    pub(crate) fn promote_to_pointer_width(
        &mut self,
        cursor: &mut Cursor,
        value: OpId,
        signed: bool,
    ) -> OpId {
        let ptr_prim = IrType::pointer_primitive(&self.target);
        let ty = self.func.op(value).ty.clone();
        match ty {
            IrType::Pointer => value,
            IrType::Primitive(p) if p == ptr_prim => value,
            IrType::Primitive(p) if p.is_integral() => {
                let op = if p > ptr_prim {
                    CastOp::Trunc
                } else if signed {
                    CastOp::Sext
                } else {
                    CastOp::Zext
                };
                self.func
                    .append_op(cursor.stmt, OpKind::Cast { op, value }, IrType::Primitive(ptr_prim))
            }
            other => panic!("non-integral index of type {:?}", other),
        }
    }

    // ── binary ops ───────────────────────────────────────────────────────────

    fn build_binaryop(
        &mut self,
        cursor: &mut Cursor,
        expr: &'a Expr,
        op: ast::BinaryOp,
        lhs_expr: &'a Expr,
        rhs_expr: &'a Expr,
    ) -> OpId {
        let var_ty = self.ty_for_ast(&expr.ty);
        let lhs = self.build_expr_value(cursor, lhs_expr);

        if matches!(op, ast::BinaryOp::LogicalAnd | ast::BinaryOp::LogicalOr) {
            return self.build_short_circuit(cursor, var_ty, op, lhs, rhs_expr);
        }

        let rhs = self.build_expr_value(cursor, rhs_expr);
        self.alloc_binaryop(cursor, op, &expr.ty, &lhs_expr.ty, &rhs_expr.ty, lhs, rhs)
    }

    /// `a && b` / `a || b`: a short-circuit CFG whose join block phis the
    /// materialised 0/1 constants.
    fn build_short_circuit(
        &mut self,
        cursor: &mut Cursor,
        var_ty: IrType,
        op: ast::BinaryOp,
        lhs: OpId,
        rhs_expr: &'a Expr,
    ) -> OpId {
        let entry_block = cursor.block;
        let rhs_block = self.func.alloc_block();
        let true_block = self.func.alloc_block();
        let false_block = self.func.alloc_block();
        let end_block = self.func.alloc_block();

        if op == ast::BinaryOp::LogicalAnd {
            self.func.make_split(entry_block, rhs_block, false_block);
        } else {
            self.func.make_split(entry_block, true_block, rhs_block);
        }
        let entry_stmt = self.func.alloc_stmt(entry_block);
        self.func.append_op(entry_stmt, OpKind::BrCond { cond: lhs }, IR_TY_NONE);

        self.move_to_block(cursor, rhs_block);
        let rhs = self.build_expr_value(cursor, rhs_expr);
        let rhs_end_block = cursor.block;
        let rhs_br_stmt = self.func.alloc_stmt(rhs_end_block);
        self.func.append_op(rhs_br_stmt, OpKind::BrCond { cond: rhs }, IR_TY_NONE);
        self.func.make_split(rhs_end_block, true_block, false_block);

        let true_stmt = self.func.alloc_stmt(true_block);
        let true_op = self.func.mk_int_constant(true_stmt, Primitive::I32, 1);
        self.func.make_merge(true_block, end_block);
        let true_br_stmt = self.func.alloc_stmt(true_block);
        self.func.append_op(true_br_stmt, OpKind::Br, IR_TY_NONE);

        let false_stmt = self.func.alloc_stmt(false_block);
        let false_op = self.func.mk_int_constant(false_stmt, Primitive::I32, 0);
        self.func.make_merge(false_block, end_block);
        let false_br_stmt = self.func.alloc_stmt(false_block);
        self.func.append_op(false_br_stmt, OpKind::Br, IR_TY_NONE);

        let phi = self.func.insert_phi(end_block, var_ty);
        if let OpKind::Phi { entries } = &mut self.func.op_mut(phi).kind {
            *entries = smallvec![
                PhiEntry { pred: true_block, value: true_op },
                PhiEntry { pred: false_block, value: false_op },
            ];
        }

        self.move_to_block(cursor, end_block);
        phi
    }

    /// Construct one binary operation, routing pointer arithmetic through
    /// address-offset (ptr ± int) or subtract-then-divide (ptr − ptr).
    pub(crate) fn alloc_binaryop(
        &mut self,
        cursor: &mut Cursor,
        op: ast::BinaryOp,
        result_ty: &AstType,
        lhs_ty: &AstType,
        rhs_ty: &AstType,
        lhs: OpId,
        rhs: OpId,
    ) -> OpId {
        debug_assert!(
            !(matches!(self.func.op(lhs).ty, IrType::Array { .. })
                && matches!(self.func.op(rhs).ty, IrType::Array { .. })),
            "arrays should have decayed to pointers"
        );

        let var_ty = self.ty_for_ast(result_ty);
        let ptr_like =
            |ty: &AstType| ty.is_pointer() || matches!(ty, AstType::Array { .. });

        if !op.is_comparison() && (ptr_like(lhs_ty) || ptr_like(rhs_ty)) {
            if result_ty.is_integral() {
                // pointer difference: byte difference, then divide by the
                // element size (signed; the difference may be negative)
                let pointee = if ptr_like(lhs_ty) { lhs_ty } else { rhs_ty };
                let elem = self.ty_for_ast(pointee.underlying());
                let elem_size = self.type_info(&elem).size;

                let size_op = self.func.mk_pointer_constant(cursor.stmt, &self.target, elem_size as u64);
                let diff = self.func.append_op(
                    cursor.stmt,
                    OpKind::Binary { op: BinaryOp::Sub, lhs, rhs },
                    var_ty.clone(),
                );
                return self.func.append_op(
                    cursor.stmt,
                    OpKind::Binary { op: BinaryOp::SDiv, lhs: diff, rhs: size_op },
                    var_ty,
                );
            }

            debug_assert!(result_ty.is_pointer(), "pointer arithmetic with non-pointer result");
            let elem = self.ty_for_ast(result_ty.underlying());
            let elem_size = self.type_info(&elem).size as u64;

            if op == ast::BinaryOp::Add {
                let (base, index, index_signed) = if ptr_like(lhs_ty) {
                    (lhs, rhs, rhs_ty.is_signed())
                } else {
                    (rhs, lhs, lhs_ty.is_signed())
                };
                let index = self.promote_to_pointer_width(cursor, index, index_signed);
                return self.func.append_op(
                    cursor.stmt,
                    OpKind::AddrOffset { base, index: Some(index), scale: elem_size, offset: 0 },
                    var_ty,
                );
            }

            // ptr - int: scale the integer, then subtract
            let index = self.promote_to_pointer_width(cursor, rhs, rhs_ty.is_signed());
            let size_op = self.func.mk_pointer_constant(cursor.stmt, &self.target, elem_size);
            let scaled = self.func.append_op(
                cursor.stmt,
                OpKind::Binary { op: BinaryOp::Mul, lhs: size_op, rhs: index },
                var_ty.clone(),
            );
            return self.func.append_op(
                cursor.stmt,
                OpKind::Binary { op: BinaryOp::Sub, lhs, rhs: scaled },
                var_ty,
            );
        }

        let is_fp = self.func.op(lhs).ty.is_fp();
        let is_signed = lhs_ty.is_signed();

        use ast::BinaryOp as B;
        let ir_op = match op {
            B::LogicalAnd | B::LogicalOr => {
                panic!("logical and/or need CFG adjustment and are handled by the caller")
            }
            B::Eq => pick(is_fp, BinaryOp::FEq, BinaryOp::Eq),
            B::Ne => pick(is_fp, BinaryOp::FNe, BinaryOp::Ne),
            B::Gt => pick3(is_fp, is_signed, BinaryOp::FGt, BinaryOp::Sgt, BinaryOp::Ugt),
            B::Ge => pick3(is_fp, is_signed, BinaryOp::FGe, BinaryOp::Sge, BinaryOp::Uge),
            B::Lt => pick3(is_fp, is_signed, BinaryOp::FLt, BinaryOp::Slt, BinaryOp::Ult),
            B::Le => pick3(is_fp, is_signed, BinaryOp::FLe, BinaryOp::Sle, BinaryOp::Ule),
            B::Add => pick(is_fp, BinaryOp::FAdd, BinaryOp::Add),
            B::Sub => pick(is_fp, BinaryOp::FSub, BinaryOp::Sub),
            B::Mul => pick(is_fp, BinaryOp::FMul, BinaryOp::Mul),
            B::Div => pick3(is_fp, is_signed, BinaryOp::FDiv, BinaryOp::SDiv, BinaryOp::UDiv),
            B::Mod => pick(is_signed, BinaryOp::SMod, BinaryOp::UMod),
            B::Shl => BinaryOp::Shl,
            B::Shr => pick(is_signed, BinaryOp::SShr, BinaryOp::UShr),
            B::BitAnd => BinaryOp::And,
            B::BitOr => BinaryOp::Or,
            B::BitXor => BinaryOp::Xor,
        };

        self.func.append_op(cursor.stmt, OpKind::Binary { op: ir_op, lhs, rhs }, var_ty)
    }

    // ── ternaries ────────────────────────────────────────────────────────────

    fn build_ternary(
        &mut self,
        cursor: &mut Cursor,
        var_ty: IrType,
        cond: &'a Expr,
        then_expr: Option<&'a Expr>,
        else_expr: &'a Expr,
    ) -> OpId {
        let cond_op = self.build_expr_value(cursor, cond);
        let pre_block = cursor.block;
        let br_stmt = self.func.alloc_stmt(pre_block);
        self.func.append_op(br_stmt, OpKind::BrCond { cond: cond_op }, IR_TY_NONE);

        match then_expr {
            Some(then_expr) => {
                // full form: two arms and a join phi
                let true_block = self.func.alloc_block();
                let false_block = self.func.alloc_block();
                let end_block = self.func.alloc_block();
                self.func.make_split(pre_block, true_block, false_block);

                self.move_to_block(cursor, true_block);
                let mut true_op = self.build_expr_value(cursor, then_expr);
                let true_end = cursor.block;
                let stmt = self.func.alloc_stmt(true_end);
                self.func.make_merge(true_end, end_block);
                self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

                self.move_to_block(cursor, false_block);
                let mut false_op = self.build_expr_value(cursor, else_expr);
                let false_end = cursor.block;
                let stmt = self.func.alloc_stmt(false_end);
                self.func.make_merge(false_end, end_block);
                self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

                // aggregate arms: phi the addresses, then one load after the
                // join, so no aggregate value crosses a block boundary
                let mut load_ty = None;
                if self.func.op(true_op).ty.is_aggregate()
                    && self.func.op(false_op).ty.is_aggregate()
                {
                    debug_assert!(
                        self.func.op(true_op).ty == self.func.op(false_op).ty,
                        "ternary arms of differing aggregate type"
                    );
                    load_ty = Some(self.func.op(true_op).ty.clone());
                    true_op = self.addr_of_value(true_op);
                    false_op = self.addr_of_value(false_op);
                }

                let phi_ty = if load_ty.is_some() { IR_TY_POINTER } else { var_ty };
                let phi = self.func.insert_phi(end_block, phi_ty);
                if let OpKind::Phi { entries } = &mut self.func.op_mut(phi).kind {
                    *entries = smallvec![
                        PhiEntry { pred: false_end, value: false_op },
                        PhiEntry { pred: true_end, value: true_op },
                    ];
                }

                self.move_to_block(cursor, end_block);
                match load_ty {
                    Some(ty) => self.func.append_op(
                        cursor.stmt,
                        OpKind::Load { src: MemLoc::Addr(phi) },
                        ty,
                    ),
                    None => phi,
                }
            }
            None => {
                // `c ?: e`: the condition value doubles as the true arm
                let false_block = self.func.alloc_block();
                let end_block = self.func.alloc_block();
                self.func.make_split(pre_block, end_block, false_block);

                self.move_to_block(cursor, false_block);
                let mut false_op = self.build_expr_value(cursor, else_expr);
                let false_end = cursor.block;
                let stmt = self.func.alloc_stmt(false_end);
                self.func.make_merge(false_end, end_block);
                self.func.append_op(stmt, OpKind::Br, IR_TY_NONE);

                let mut true_op = cond_op;
                let mut load_ty = None;
                if self.func.op(false_op).ty.is_aggregate() {
                    load_ty = Some(self.func.op(false_op).ty.clone());
                    true_op = self.addr_of_value(true_op);
                    false_op = self.addr_of_value(false_op);
                }

                let phi_ty = if load_ty.is_some() { IR_TY_POINTER } else { var_ty };
                let phi = self.func.insert_phi(end_block, phi_ty);
                if let OpKind::Phi { entries } = &mut self.func.op_mut(phi).kind {
                    *entries = smallvec![
                        PhiEntry { pred: false_end, value: false_op },
                        PhiEntry { pred: pre_block, value: true_op },
                    ];
                }

                self.move_to_block(cursor, end_block);
                match load_ty {
                    Some(ty) => self.func.append_op(
                        cursor.stmt,
                        OpKind::Load { src: MemLoc::Addr(phi) },
                        ty,
                    ),
                    None => phi,
                }
            }
        }
    }

    /// A pointer to `value`'s storage: loads reuse their source address;
    /// anything else (notably calls returning aggregates) is spilled.
    fn addr_of_value(&mut self, value: OpId) -> OpId {
        let stmt = self.func.op(value).stmt;
        if let OpKind::Load { src } = self.func.op(value).kind {
            match src {
                MemLoc::Addr(addr) => return addr,
                MemLoc::Local(lcl) => {
                    return self.func.append_op(stmt, OpKind::Addr(AddrTarget::Local(lcl)), IR_TY_POINTER)
                }
                MemLoc::Global(glb) => {
                    return self.func.append_op(stmt, OpKind::Addr(AddrTarget::Global(glb)), IR_TY_POINTER)
                }
            }
        }
        let lcl = self.func.spill_op(value);
        self.func.append_op(stmt, OpKind::Addr(AddrTarget::Local(lcl)), IR_TY_POINTER)
    }

    // ── assignment ───────────────────────────────────────────────────────────

    fn build_assign(&mut self, cursor: &mut Cursor, expr: &'a Expr) -> OpId {
        let ExprKind::Assign {
            op,
            assignee,
            value,
            assignee_ty,
            result_ty,
            cast_assignee,
            cast_result,
        } = &expr.kind
        else {
            unreachable!()
        };

        let new_value = if *op == AssignOp::None {
            self.build_expr_value(cursor, value)
        } else {
            // compound assignment: read, optionally widen, operate, and
            // optionally narrow back, as annotated by the checker
            let current = self.build_expr_value(cursor, assignee);
            let lhs = if *cast_assignee {
                self.insert_cast_if_needed(cursor, current, &assignee.ty, assignee_ty)
            } else {
                current
            };

            let rhs = self.build_expr_value(cursor, value);
            let ast_op = match op {
                AssignOp::Add => ast::BinaryOp::Add,
                AssignOp::Sub => ast::BinaryOp::Sub,
                AssignOp::Mul => ast::BinaryOp::Mul,
                AssignOp::Div => ast::BinaryOp::Div,
                AssignOp::Mod => ast::BinaryOp::Mod,
                AssignOp::BitAnd => ast::BinaryOp::BitAnd,
                AssignOp::BitOr => ast::BinaryOp::BitOr,
                AssignOp::BitXor => ast::BinaryOp::BitXor,
                AssignOp::Shl => ast::BinaryOp::Shl,
                AssignOp::Shr => ast::BinaryOp::Shr,
                AssignOp::None => unreachable!(),
            };

            let result =
                self.alloc_binaryop(cursor, ast_op, result_ty, assignee_ty, &value.ty, lhs, rhs);
            if *cast_result {
                self.insert_cast_if_needed(cursor, result, result_ty, &assignee.ty)
            } else {
                result
            }
        };

        self.assign_to_lvalue(cursor, assignee, new_value)
    }

    /// Store `value` into the lvalue `assignee`. Plain variables update the
    /// reference table; everything else stores through an address, with
    /// bitfield members using the dedicated store opcode.
    pub(crate) fn assign_to_lvalue(
        &mut self,
        cursor: &mut Cursor,
        assignee: &'a Expr,
        value: OpId,
    ) -> OpId {
        let (address, bitfield) = match &assignee.kind {
            ExprKind::Var(var) => {
                let var = var.clone();
                return self.var_assg(cursor.stmt, cursor.block, value, &var);
            }
            ExprKind::ArrayAccess { base, index } => {
                (self.build_array_address(cursor, base, index), None)
            }
            ExprKind::MemberAccess { base, member } => {
                let (addr, bitfield) = self.build_member_address(cursor, base, member);
                (addr, bitfield)
            }
            ExprKind::PointerAccess { base, member } => {
                let (addr, bitfield) = self.build_pointer_address(cursor, base, member);
                (addr, bitfield)
            }
            ExprKind::Unary { op: ast::UnaryOp::Deref, expr: pointer } => {
                (self.build_expr_value(cursor, pointer), None)
            }
            other => panic!("assignment to non-lvalue {:?}", std::mem::discriminant(other)),
        };

        match bitfield {
            Some(bitfield) => {
                self.func.append_op(
                    cursor.stmt,
                    OpKind::StoreBitfield { addr: address, value, bitfield },
                    IR_TY_NONE,
                );
            }
            None => {
                self.func.append_op(
                    cursor.stmt,
                    OpKind::Store { dst: MemLoc::Addr(address), value },
                    IR_TY_NONE,
                );
            }
        }

        value
    }

    /// Record an assignment to a plain variable: an SSA redefinition, or a
    /// store for variables living in a local or global.
    pub(crate) fn var_assg(&mut self, stmt: StmtId, block: BlockId, value: OpId, var: &Var) -> OpId {
        let resolved = self.lookup_ref(var, Some(block)).map(|(_, r)| r);

        match resolved {
            None | Some(Resolved::Ssa(_)) => {
                let key = self.var_key(var);
                self.var_refs.entry(key, VarRefKind::Ssa).record_def(block, value);
                self.add_var_write(value, var);
                value
            }
            Some(Resolved::Local(lcl)) => {
                self.func.append_op(
                    stmt,
                    OpKind::Store { dst: MemLoc::Local(lcl), value },
                    IR_TY_NONE,
                );
                // later reads through this name reload; the assigned value
                // itself is fine to hand back
                value
            }
            Some(Resolved::Global(glb)) => {
                self.func.append_op(
                    stmt,
                    OpKind::Store { dst: MemLoc::Global(glb), value },
                    IR_TY_NONE,
                );
                value
            }
        }
    }

    // ── member / array reads ─────────────────────────────────────────────────

    fn build_arrayaccess(
        &mut self,
        cursor: &mut Cursor,
        base_expr: &'a Expr,
        index_expr: &'a Expr,
    ) -> OpId {
        let elem_ast = base_expr.ty.underlying().clone();
        let var_ty = self.ty_for_ast(&elem_ast);

        let address = self.build_array_address(cursor, base_expr, index_expr);
        if matches!(var_ty, IrType::Array { .. }) {
            // multi-dimensional access: stay an address
            return address;
        }
        self.func.append_op(cursor.stmt, OpKind::Load { src: MemLoc::Addr(address) }, var_ty)
    }

    fn build_memberaccess(
        &mut self,
        cursor: &mut Cursor,
        var_ty: IrType,
        base_expr: &'a Expr,
        member: &str,
    ) -> OpId {
        let (address, bitfield) = self.build_member_address(cursor, base_expr, member);
        self.load_member(cursor, var_ty, address, bitfield)
    }

    fn build_pointeraccess(
        &mut self,
        cursor: &mut Cursor,
        var_ty: IrType,
        base_expr: &'a Expr,
        member: &str,
    ) -> OpId {
        let (address, bitfield) = self.build_pointer_address(cursor, base_expr, member);
        self.load_member(cursor, var_ty, address, bitfield)
    }

    fn load_member(
        &mut self,
        cursor: &mut Cursor,
        var_ty: IrType,
        address: OpId,
        bitfield: Option<Bitfield>,
    ) -> OpId {
        match bitfield {
            Some(bitfield) => self.func.append_op(
                cursor.stmt,
                OpKind::LoadBitfield { addr: address, bitfield },
                var_ty,
            ),
            None => self.func.append_op(
                cursor.stmt,
                OpKind::Load { src: MemLoc::Addr(address) },
                var_ty,
            ),
        }
    }

    // ── calls ────────────────────────────────────────────────────────────────

    fn build_call(&mut self, cursor: &mut Cursor, expr: &'a Expr) -> Option<OpId> {
        let ExprKind::Call { target, args } = &expr.kind else { unreachable!() };

        // well-known math calls lower to dedicated unary ops
        if let ExprKind::Var(var) = &target.kind {
            if var.scope == ast::SCOPE_GLOBAL && var.kind == VarKind::Var {
                if let Some(unary_op) = builtins::intrinsic_unary(&var.name) {
                    debug_assert!(args.len() == 1, "intrinsic with wrong arity");
                    let ret_ty = self.ty_for_ast(&expr.ty);
                    let value = self.build_expr_value(cursor, &args[0]);
                    return Some(self.func.append_op(
                        cursor.stmt,
                        OpKind::Unary { op: unary_op, value },
                        ret_ty,
                    ));
                }
            }
        }

        if let ExprKind::Builtin(name) = &target.kind {
            return self.build_builtin_call(cursor, name, args);
        }

        // one level of dereference can occur on the target type
        let func_ast_ty = match &target.ty {
            AstType::Pointer(inner) => (**inner).clone(),
            AstType::Array { elem, .. } => (**elem).clone(),
            other => other.clone(),
        };
        let func_ty = self.ty_for_ast(&func_ast_ty);
        let IrType::Func(sig) = &func_ty else {
            panic!("call target is not a function type")
        };
        let ret_ty = sig.ret.clone();
        let num_fixed = sig.params.len();

        // arguments first, left to right, so the IR stays in evaluation
        // order; aggregates get stored-and-reloaded for a stable address
        let mut arg_ops = Vec::with_capacity(args.len());
        let mut arg_tys = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let mut op = self.build_expr_value(cursor, arg);
            op = self.store_load_if_needed(cursor, op);
            if i >= num_fixed {
                self.func.op_mut(op).flags |= OpFlags::VARIADIC_ARG;
            }
            arg_tys.push(self.func.op(op).ty.clone());
            arg_ops.push(op);
        }

        // a function designator is called through its address; a pointer
        // value is used as-is
        let callee = if target.ty.is_pointer() {
            self.build_expr_value(cursor, target)
        } else {
            self.build_addressof(cursor, target)
        };

        self.func.flags |= FuncFlags::MAKES_CALL;
        let call = self.func.append_op(
            cursor.stmt,
            OpKind::Call { target: callee, func_ty, args: arg_ops, arg_tys },
            ret_ty,
        );
        // a call is a sequence point; later ops start a fresh statement
        self.fresh_stmt(cursor);
        Some(call)
    }

    fn build_builtin_call(
        &mut self,
        cursor: &mut Cursor,
        name: &str,
        args: &'a [Expr],
    ) -> Option<OpId> {
        use builtins::Builtin;

        let builtin = builtins::lookup(name)
            .unwrap_or_else(|| panic!("unrecognised builtin '{}'", name));

        match builtin {
            Builtin::VaStart => {
                self.func.flags |= FuncFlags::USES_VA_ARGS;
                let list_addr = self.build_addressof(cursor, &args[0]);
                Some(self.func.append_op(
                    cursor.stmt,
                    OpKind::VaStart { list_addr },
                    IR_TY_NONE,
                ))
            }
            Builtin::VaEnd => None, // nop
            Builtin::VaCopy => {
                // all targets support bitwise copy of va_list; by-ref
                // targets copy through the decayed pointer
                let dst_addr = self.build_addressof(cursor, &args[0]);
                let mut src = self.build_expr_value(cursor, &args[1]);

                if self.target.va_list_convention()
                    == crate::common::target::VaListConvention::ByRef
                {
                    let load_ty = self.ty_for_ast(args[1].ty.underlying());
                    src = self.func.append_op(
                        cursor.stmt,
                        OpKind::Load { src: MemLoc::Addr(src) },
                        load_ty,
                    );
                }

                Some(self.func.append_op(
                    cursor.stmt,
                    OpKind::Store { dst: MemLoc::Addr(dst_addr), value: src },
                    IR_TY_NONE,
                ))
            }
            Builtin::Popcount => self.unary_builtin(cursor, &args[0], UnaryOp::Popcount),
            Builtin::Clz => self.unary_builtin(cursor, &args[0], UnaryOp::Clz),
            Builtin::Ctz => self.unary_builtin(cursor, &args[0], UnaryOp::Ctz),
            Builtin::Bswap => {
                let value = self.build_expr_value(cursor, &args[0]);
                let ty = self.func.op(value).ty.clone();
                Some(self.func.append_op(cursor.stmt, OpKind::Unary { op: UnaryOp::Rev, value }, ty))
            }
            Builtin::Memset => {
                let addr = self.build_expr_value(cursor, &args[0]);
                let value = self.build_expr_value(cursor, &args[1]);
                let len = self.build_expr_value(cursor, &args[2]);
                Some(self.func.append_op(cursor.stmt, OpKind::MemSet { addr, value, len }, IR_TY_NONE))
            }
            Builtin::Memcpy => {
                let dst = self.build_expr_value(cursor, &args[0]);
                let src = self.build_expr_value(cursor, &args[1]);
                let len = self.build_expr_value(cursor, &args[2]);
                Some(self.func.append_op(cursor.stmt, OpKind::MemCopy { dst, src, len }, IR_TY_NONE))
            }
            Builtin::Memmove => {
                let dst = self.build_expr_value(cursor, &args[0]);
                let src = self.build_expr_value(cursor, &args[1]);
                let len = self.build_expr_value(cursor, &args[2]);
                Some(self.func.append_op(cursor.stmt, OpKind::MemMove { dst, src, len }, IR_TY_NONE))
            }
            Builtin::Memcmp => {
                let lhs = self.build_expr_value(cursor, &args[0]);
                let rhs = self.build_expr_value(cursor, &args[1]);
                let len = self.build_expr_value(cursor, &args[2]);
                Some(self.func.append_op(cursor.stmt, OpKind::MemCmp { lhs, rhs, len }, IR_TY_I32))
            }
            Builtin::Unreachable => None,
        }
    }

    fn unary_builtin(&mut self, cursor: &mut Cursor, arg: &'a Expr, op: UnaryOp) -> Option<OpId> {
        let value = self.build_expr_value(cursor, arg);
        Some(self.func.append_op(cursor.stmt, OpKind::Unary { op, value }, IR_TY_I32))
    }

    /// Aggregate values are not kept as SSA temporaries across uses: store
    /// into a fresh local and reload, so consumers see a loaded value with
    /// a stable address behind it.
    pub(crate) fn store_load_if_needed(&mut self, cursor: &mut Cursor, op: OpId) -> OpId {
        let ty = self.func.op(op).ty.clone();
        if !ty.is_aggregate() || matches!(self.func.op(op).kind, OpKind::Load { .. }) {
            return op;
        }

        let lcl = self.func.add_local(ty.clone());
        self.func.append_op(
            cursor.stmt,
            OpKind::Store { dst: MemLoc::Local(lcl), value: op },
            IR_TY_NONE,
        );
        self.func.append_op(cursor.stmt, OpKind::Load { src: MemLoc::Local(lcl) }, ty)
    }

    // ── compound literals, sequences, va_arg ─────────────────────────────────

    pub(crate) fn build_compound_literal(
        &mut self,
        cursor: &mut Cursor,
        address: Option<OpId>,
        mode: CompoundLiteralMode,
        expr: &'a Expr,
    ) -> OpId {
        let ExprKind::CompoundLiteral { init } = &expr.kind else { unreachable!() };

        if mode == CompoundLiteralMode::Load && expr.ty.is_scalar() {
            debug_assert!(init.inits.len() == 1, "scalar compound literal with several inits");
            let ast::Init::Expr(value) = &init.inits[0].init else {
                panic!("scalar compound literal with list init")
            };
            return self.build_expr_value(cursor, value);
        }

        let var_ty = self.ty_for_ast(&expr.ty);
        let address = address.unwrap_or_else(|| {
            let lcl = self.func.add_local(var_ty.clone());
            self.func.append_op(cursor.stmt, OpKind::Addr(AddrTarget::Local(lcl)), IR_TY_POINTER)
        });

        self.build_init_list(cursor, address, init);

        match mode {
            CompoundLiteralMode::Load => {
                self.func.append_op(cursor.stmt, OpKind::Load { src: MemLoc::Addr(address) }, var_ty)
            }
            CompoundLiteralMode::Addr => address,
        }
    }

    fn build_comma(&mut self, cursor: &mut Cursor, exprs: &'a [Expr]) -> Option<OpId> {
        let mut op = None;
        for expr in exprs {
            op = self.build_expr(cursor, expr);
            // each operand is a sequence point
            self.fresh_stmt(cursor);
        }
        op
    }

    /// GNU statement expression: run the statements, then evaluate the
    /// trailing expression statement (if any) as the value.
    fn build_stmt_expr(&mut self, cursor: &mut Cursor, stmts: &'a [ast::Stmt]) -> Option<OpId> {
        let (value_stmt, body) = match stmts.split_last() {
            Some((last, body)) if matches!(last.kind, ast::StmtKind::Expr(_)) => (Some(last), body),
            _ => (None, stmts),
        };

        let mut block = cursor.block;
        for stmt in body {
            block = self.build_stmt(block, stmt);
        }
        self.move_to_block(cursor, block);

        match value_stmt {
            Some(stmt) => {
                let ast::StmtKind::Expr(expr) = &stmt.kind else { unreachable!() };
                self.build_expr(cursor, expr)
            }
            None => None,
        }
    }

    fn build_va_arg(&mut self, cursor: &mut Cursor, var_ty: IrType, list: &'a Expr) -> OpId {
        let list_addr = self.build_addressof(cursor, list);
        self.func.append_op(
            cursor.stmt,
            OpKind::VaArg { list_addr, arg_ty: var_ty.clone() },
            var_ty,
        )
    }
}

// ── string literals ───────────────────────────────────────────────────────────

/// Materialise a string literal as an anonymous global. Literals with
/// embedded NULs (or wide literals) are plain const data; NUL-free narrow
/// literals may go in a mergeable string section.
pub(crate) fn build_str_literal(
    unit: &mut Unit,
    _ast_ty: &AstType,
    literal: &StringLiteral,
) -> GlobalId {
    let (value, char_ty, kind) = match literal {
        StringLiteral::Ascii(bytes) => {
            let kind = if bytes.contains(&0) { DataKind::ConstData } else { DataKind::StringLiteral };
            (StrValue::Ascii(bytes.clone()), IrType::Primitive(Primitive::I8), kind)
        }
        StringLiteral::Wide(chars) => {
            (StrValue::Wide(chars.clone()), IrType::Primitive(Primitive::I32), DataKind::ConstData)
        }
    };

    let len = match literal {
        StringLiteral::Ascii(bytes) => bytes.len(),
        StringLiteral::Wide(chars) => chars.len(),
    };
    let ty = IrType::array(char_ty, len + 1); // trailing NUL

    let glb = unit.add_global(GlobalKind::Data, ty, DefState::Defined, None);
    unit.global_mut(glb).linkage = Linkage::Internal;
    unit.global_mut(glb).var = Some(GlobalVar { kind, value: GlobalValue::Str(value) });
    glb
}

// ── cast selection ────────────────────────────────────────────────────────────

/// Choose how to cast between two AST types that genuinely need a run-time
/// cast op (the no-op cases were already ruled out by `needs_cast_op`).
pub(crate) fn cast_info(
    target: &crate::common::target::Target,
    from: &AstType,
    to: &AstType,
) -> CastInfo {
    let from_prim = |t: &AstType| super::ty_for_ast(target, t);
    let from_ir = from_prim(from);
    let to_ir = from_prim(to);

    debug_assert!(
        !(from_ir == IR_TY_POINTER && to_ir == IR_TY_POINTER),
        "pointer-to-pointer casts are representation no-ops"
    );

    // any scalar to bool: compare against zero
    if to_ir == IrType::Primitive(Primitive::I1) {
        return CastInfo { cmp_nz: true, op: CastOp::Trunc };
    }

    let ptr_prim = IrType::pointer_primitive(target);

    if from_ir != IR_TY_POINTER && to_ir == IR_TY_POINTER {
        // integer → pointer of a different width
        let from_p = from_ir.primitive();
        let op = if ptr_prim < from_p {
            CastOp::Trunc
        } else if from.is_signed() {
            CastOp::Sext
        } else {
            CastOp::Zext
        };
        return CastInfo { cmp_nz: false, op };
    }

    if from_ir == IR_TY_POINTER && to_ir != IR_TY_POINTER {
        // pointer → narrower integer
        return CastInfo { cmp_nz: false, op: CastOp::Trunc };
    }

    let from_p = from_ir.primitive();
    let to_p = to_ir.primitive();

    if from_p.is_fp() && to_p.is_fp() {
        return CastInfo { cmp_nz: false, op: CastOp::FConv };
    }

    if from_p.is_fp() || to_p.is_fp() {
        // exactly one side is floating: pick signed/unsigned conversion by
        // the signedness of the integer side
        let int_side = if from_p.is_fp() { to } else { from };
        let op = if int_side.is_signed() { CastOp::SConv } else { CastOp::UConv };
        return CastInfo { cmp_nz: false, op };
    }

    if to_p < from_p {
        CastInfo { cmp_nz: false, op: CastOp::Trunc }
    } else {
        debug_assert!(from_p != to_p, "same-width integer cast should be a no-op");
        let op = if from.is_signed() { CastOp::Sext } else { CastOp::Zext };
        CastInfo { cmp_nz: false, op }
    }
}

fn pick<T>(cond: bool, a: T, b: T) -> T {
    if cond {
        a
    } else {
        b
    }
}

fn pick3<T>(fp: bool, signed: bool, f: T, s: T, u: T) -> T {
    if fp {
        f
    } else if signed {
        s
    } else {
        u
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::target::X86_64_LINUX;
    use crate::frontend::ast::Scalar;

    fn sc(s: Scalar) -> AstType {
        AstType::Scalar(s)
    }

    #[test]
    fn cast_to_bool_is_compare_not_zero() {
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::SignedInt), &sc(Scalar::Bool));
        assert!(info.cmp_nz);
    }

    #[test]
    fn widening_follows_source_signedness() {
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::SignedShort), &sc(Scalar::SignedInt));
        assert!(matches!(info.op, CastOp::Sext));
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::UnsignedShort), &sc(Scalar::SignedInt));
        assert!(matches!(info.op, CastOp::Zext));
    }

    #[test]
    fn narrowing_truncates() {
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::SignedLong), &sc(Scalar::SignedChar));
        assert!(matches!(info.op, CastOp::Trunc));
    }

    #[test]
    fn float_conversions() {
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::Float), &sc(Scalar::Double));
        assert!(matches!(info.op, CastOp::FConv));
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::SignedInt), &sc(Scalar::Double));
        assert!(matches!(info.op, CastOp::SConv));
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::UnsignedInt), &sc(Scalar::Double));
        assert!(matches!(info.op, CastOp::UConv));
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::Double), &sc(Scalar::UnsignedLong));
        assert!(matches!(info.op, CastOp::UConv));
    }

    #[test]
    fn int_to_wider_pointer_extends() {
        let ptr = AstType::ptr_to(sc(Scalar::SignedInt));
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::SignedInt), &ptr);
        assert!(matches!(info.op, CastOp::Sext));
        let info = cast_info(&X86_64_LINUX, &sc(Scalar::UnsignedInt), &ptr);
        assert!(matches!(info.op, CastOp::Zext));
    }

    #[test]
    fn no_op_casts_are_rejected_by_needs_cast_op() {
        use crate::ir::build::needs_cast_op;
        use crate::ir::ty::{IR_TY_I64, IR_TY_POINTER};
        // same-size pointer/integer on x86-64
        assert!(!needs_cast_op(&X86_64_LINUX, &IR_TY_POINTER, &IR_TY_I64));
        assert!(!needs_cast_op(&X86_64_LINUX, &IR_TY_I64, &IR_TY_POINTER));
        // bool widening to char is a no-op (storage is 0/1)
        assert!(!needs_cast_op(
            &X86_64_LINUX,
            &IrType::Primitive(Primitive::I8),
            &IrType::Primitive(Primitive::I1)
        ));
        // but anything to bool needs the compare
        assert!(needs_cast_op(
            &X86_64_LINUX,
            &IrType::Primitive(Primitive::I1),
            &IrType::Primitive(Primitive::I8)
        ));
    }
}
