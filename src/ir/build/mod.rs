//! AST → IR lowering.
//!
//! The builder is a recursive descent over the typed AST carrying a mutable
//! cursor (current block + current statement). Construction is total for a
//! well-typed AST: anything unexpected here is a type-checker bug and
//! panics.
//!
//! Layout of the submodules:
//! - `expr`: expression lowering (r-value and address builders, casts,
//!   short-circuiting, calls, builtins)
//! - `stmt`: statement and control-flow lowering (loops, switch, goto,
//!   defer, declarations)
//! - `init`: initializer layout for locals and globals
//!
//! This module owns the per-function builder state, unit-level declaration
//! processing, and function finalisation: goto fix-up, implicit returns,
//! pruning, phi back-patching, phi simplification, and the def/use type
//! validator.

mod expr;
mod init;
mod stmt;

use log::debug;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::common::target::Target;
use crate::frontend::ast::{self, AstType, Var, SCOPE_GLOBAL, SCOPE_PARAMS};
use crate::ir::cfg;
use crate::ir::ir::*;
use crate::ir::ty::{type_info, IrFuncTy, IrType, Primitive, TypeInfo, IR_TY_NONE, IR_TY_POINTER};
use crate::ir::var_refs::{Resolved, VarKey, VarRefKind, VarRefs};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BuildFlags: u32 {
        /// Give every variable a stack slot instead of an SSA value.
        /// Used by debug builds so every variable has an address.
        const SPILL_ALL = 1 << 0;
    }
}

/// The builder's "current statement": ops are appended here, and control
/// flow constructs advance it across blocks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    pub block: BlockId,
    pub stmt: StmtId,
}

// ── AST type → IR type ────────────────────────────────────────────────────────

fn primitive_for_scalar(target: &Target, scalar: ast::Scalar) -> Primitive {
    use ast::Scalar::*;
    match scalar {
        Bool => Primitive::I1,
        Char | SignedChar | UnsignedChar => Primitive::I8,
        SignedShort | UnsignedShort => Primitive::I16,
        SignedInt | UnsignedInt => Primitive::I32,
        SignedLong | UnsignedLong => match target.long_size() {
            crate::common::target::LongSize::Lp32 => Primitive::I32,
            crate::common::target::LongSize::Lp64 => Primitive::I64,
        },
        SignedLongLong | UnsignedLongLong => Primitive::I64,
        Int128 | UInt128 => Primitive::I128,
        Half => Primitive::F16,
        Float => Primitive::F32,
        Double | LongDouble => Primitive::F64,
    }
}

fn ty_for_ast_impl(target: &Target, ty: &AstType, allow_incomplete: bool) -> IrType {
    match ty {
        AstType::Void => IR_TY_NONE,
        AstType::Variadic => IrType::Variadic,
        AstType::Scalar(s) => IrType::Primitive(primitive_for_scalar(target, *s)),
        AstType::Pointer(_) => IR_TY_POINTER,
        AstType::Array { elem, len } => {
            IrType::array(ty_for_ast_impl(target, elem, allow_incomplete), *len)
        }
        AstType::Func(func) => {
            let params = func
                .params
                .iter()
                .map(|p| ty_for_ast_impl(target, &p.ty, allow_incomplete))
                .collect();
            IrType::func(
                ty_for_ast_impl(target, &func.ret, allow_incomplete),
                params,
                func.variadic,
            )
        }
        AstType::Aggregate(agg) => {
            let fields: Vec<IrType> = agg
                .fields
                .iter()
                .map(|f| ty_for_ast_impl(target, &f.ty, allow_incomplete))
                .collect();
            match agg.kind {
                ast::AggregateKind::Struct => IrType::Struct { fields: fields.into() },
                ast::AggregateKind::Union => IrType::Union { fields: fields.into() },
            }
        }
        AstType::IncompleteAggregate { name } => {
            if allow_incomplete {
                // only the symbol's address can be formed, so a pointer works
                IR_TY_POINTER
            } else {
                panic!("incomplete type '{}' reached IR construction", name)
            }
        }
    }
}

/// Map a resolved AST type to its IR type.
pub(crate) fn ty_for_ast(target: &Target, ty: &AstType) -> IrType {
    ty_for_ast_impl(target, ty, false)
}

/// Like `ty_for_ast`, but tolerates incomplete aggregates (`extern struct s
/// x;` declarations never touch the object's layout).
pub(crate) fn ty_for_decl_ast(target: &Target, ty: &AstType) -> IrType {
    ty_for_ast_impl(target, ty, true)
}

// ── No-op cast decisions ──────────────────────────────────────────────────────

/// Whether converting `from` into `to` needs a run-time cast op, or is a
/// representation no-op (pointer/array/function shuffling, same-size
/// pointer↔integer, `i1`→`i8`).
pub(crate) fn needs_cast_op(target: &Target, to: &IrType, from: &IrType) -> bool {
    if to.is_none() {
        // void casts are nops
        return false;
    }

    if to.is_aggregate() && from.is_aggregate() {
        return false;
    }

    if to == from {
        return false;
    }

    let ptr_like = |ty: &IrType| matches!(ty, IrType::Pointer | IrType::Array { .. });
    if (matches!(to, IrType::Func(_)) && *from == IrType::Pointer)
        || (matches!(from, IrType::Func(_)) && *to == IrType::Pointer)
    {
        return false;
    }
    if ptr_like(to) && ptr_like(from) {
        return false;
    }

    if *to == IrType::Primitive(Primitive::I1) {
        return true;
    }
    if *to == IrType::Primitive(Primitive::I8) && *from == IrType::Primitive(Primitive::I1) {
        // bool is always 0/1 in storage
        return false;
    }

    let pointer_prim = IrType::pointer_primitive(target);
    let ptr_sized = |ty: &IrType| {
        *ty == IrType::Pointer
            || matches!(ty, IrType::Primitive(p) if p.is_integral() && *p == pointer_prim)
    };
    if ptr_sized(to) && ptr_sized(from) {
        return false;
    }

    true
}

// ── Aggregate member lookup ───────────────────────────────────────────────────

/// Everything the builder needs to know about one named member access.
pub(crate) struct MemberInfo {
    pub ty: IrType,
    pub index: usize,
    pub offset: usize,
    pub bitfield: Option<Bitfield>,
    pub ast_ty: AstType,
}

fn try_get_member_info(
    target: &Target,
    aggregate: &AstType,
    member_name: &str,
) -> Option<MemberInfo> {
    let AstType::Aggregate(agg) = aggregate else {
        panic!("member access on non-aggregate type");
    };

    let ir_aggregate = ty_for_ast(target, aggregate);
    let info = type_info(target, &ir_aggregate);

    for (index, field) in agg.fields.iter().enumerate() {
        let field_offset = info.offsets.as_ref().map(|offs| offs[index]).unwrap_or(0);
        match &field.name {
            None => {
                // anonymous nested aggregate: descend transparently
                if let Some(mut inner) = try_get_member_info(target, &field.ty, member_name) {
                    inner.offset += field_offset;
                    inner.index = index;
                    return Some(inner);
                }
            }
            Some(name) if name == member_name => {
                let bitfield = field
                    .bitfield_width
                    // each bitfield currently gets its own storage field
                    .map(|width| Bitfield { offset: 0, width });

                let mut member_ty = ty_for_ast(target, &field.ty);
                if let IrType::Array { elem, .. } = &member_ty {
                    // pointer decay for the loaded value
                    member_ty = (**elem).clone();
                }

                return Some(MemberInfo {
                    ty: member_ty,
                    index,
                    offset: field_offset,
                    bitfield,
                    ast_ty: field.ty.clone(),
                });
            }
            Some(_) => {}
        }
    }

    None
}

pub(crate) fn get_member_info(target: &Target, aggregate: &AstType, member: &str) -> MemberInfo {
    try_get_member_info(target, aggregate, member)
        .unwrap_or_else(|| panic!("no member '{}' in aggregate", member))
}

// ── Builder state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JumpKind {
    /// Delimits the jump records of one loop nesting level.
    NewLoop,
    /// Delimits the jump records of one switch nesting level. `break` binds
    /// to it; `continue` does not.
    NewSwitch,
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Jump {
    pub kind: JumpKind,
    pub block: BlockId,
    /// Defer-stack depth at the jump site, so the enclosing construct can
    /// account for scopes already replayed.
    pub defer_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaseKind {
    /// Delimits the case records of one switch nesting level.
    NewSwitch,
    Case(i64),
    Default,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CaseRecord {
    pub kind: CaseKind,
    pub target: BlockId,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum DeferRecord<'a> {
    /// Scope delimiter pushed at compound-statement entry.
    NewScope,
    Defer(&'a ast::Stmt),
}

/// A registered `label:`, with the defer depth at its definition so
/// backward gotos know how many scopes they leave.
#[derive(Debug)]
pub(crate) struct Label {
    pub name: String,
    pub block: BlockId,
    pub defer_depth: usize,
}

pub(crate) const INVALID_OP: OpId = OpId(u32::MAX);

/// Per-function builder.
pub(crate) struct FuncBuilder<'a, 'u> {
    pub flags: BuildFlags,
    pub target: Target,
    pub unit: &'u mut Unit,
    pub func: Func,

    pub var_refs: VarRefs,
    pub global_refs: &'u mut VarRefs,

    /// Cached `__func__` string global.
    pub func_name_global: Option<GlobalId>,

    pub labels: Vec<Label>,
    /// Per variable, the ops that (re)define it; consumed by phi
    /// back-patching.
    pub var_writes: FxHashMap<VarKey, Vec<OpId>>,

    pub jumps: Vec<Jump>,
    pub switch_cases: Vec<CaseRecord>,
    pub defers: Vec<DeferRecord<'a>>,
}

impl<'a, 'u> FuncBuilder<'a, 'u> {
    fn new(
        unit: &'u mut Unit,
        global_refs: &'u mut VarRefs,
        name: String,
        sig: IrFuncTy,
        flags: BuildFlags,
    ) -> Self {
        let target = unit.target;
        FuncBuilder {
            flags,
            target,
            unit,
            func: Func::new(name, sig),
            var_refs: VarRefs::new(),
            global_refs,
            func_name_global: None,
            labels: Vec::new(),
            var_writes: FxHashMap::default(),
            jumps: Vec::new(),
            switch_cases: Vec::new(),
            defers: Vec::new(),
        }
    }

    pub(crate) fn ty_for_ast(&self, ty: &AstType) -> IrType {
        ty_for_ast(&self.target, ty)
    }

    pub(crate) fn type_info(&self, ty: &IrType) -> TypeInfo {
        type_info(&self.target, ty)
    }

    /// Open a fresh statement in the cursor's block (a sequence point).
    pub(crate) fn fresh_stmt(&mut self, cursor: &mut Cursor) {
        cursor.stmt = self.func.alloc_stmt(cursor.block);
    }

    /// Move the cursor to `block`, opening a statement there.
    pub(crate) fn move_to_block(&mut self, cursor: &mut Cursor, block: BlockId) {
        cursor.block = block;
        cursor.stmt = self.func.alloc_stmt(block);
    }

    pub(crate) fn var_key(&self, var: &Var) -> VarKey {
        VarKey::new(var.name.clone(), var.scope)
    }

    /// The reference lookup order: the function table under the reading
    /// block, then the unit table, then the unit table at file scope (a
    /// scope-less lookup must still find functions, which always have file
    /// scope).
    pub(crate) fn lookup_ref(
        &self,
        var: &Var,
        block: Option<BlockId>,
    ) -> Option<(VarKey, Resolved)> {
        let key = self.var_key(var);
        if let Some(resolved) = self.var_refs.get(&key, block) {
            return Some((key, resolved));
        }
        if let Some(resolved) = self.global_refs.get(&key, None) {
            return Some((key, resolved));
        }
        let glb_key = VarKey::new(var.name.clone(), SCOPE_GLOBAL);
        if let Some(resolved) = self.global_refs.get(&glb_key, None) {
            return Some((glb_key, resolved));
        }
        None
    }

    pub(crate) fn add_var_write(&mut self, op: OpId, var: &Var) {
        let key = self.var_key(var);
        self.var_writes.entry(key).or_default().push(op);
    }

    pub(crate) fn add_label(&mut self, name: &str, block: BlockId) {
        let defer_depth = self.defers.len();
        self.labels.push(Label { name: name.to_string(), block, defer_depth });
    }

    // ── function build ───────────────────────────────────────────────────────

    fn build_params(&mut self, def: &'a ast::FuncDef, entry: BlockId) {
        // params live in the first stmt, which also serves as the entry
        // block's phi slot
        let param_stmt = self.func.alloc_stmt_at_head(entry, StmtFlags::PARAMS);
        let after_params = self.func.alloc_stmt(entry);

        let AstType::Func(func_ty) = &def.ty else {
            panic!("function definition with non-function type");
        };

        for param in &func_ty.params {
            if param.ty == AstType::Variadic {
                continue;
            }

            let param_ir_ty = self.ty_for_ast(&param.ty);
            let var = param
                .name
                .as_ref()
                .map(|name| Var::new(name.clone(), SCOPE_PARAMS));

            if param_ir_ty.is_aggregate() {
                // give it a slot and let the prologue copy in from the ABI
                let lcl = self.func.add_local(param_ir_ty);
                self.func.locals.get_mut(lcl.0).flags |= LocalFlags::PARAM;

                let addr = self
                    .func
                    .append_op(param_stmt, OpKind::Addr(AddrTarget::Local(lcl)), IR_TY_POINTER);
                self.func.op_mut(addr).flags |= OpFlags::PARAM;

                if let Some(var) = var {
                    let key = self.var_key(&var);
                    self.var_refs.entry(key, VarRefKind::Local).local = Some(lcl);
                }
            } else {
                let param_ir_ty = match param_ir_ty {
                    // arrays arrive as pointers
                    IrType::Array { .. } => IR_TY_POINTER,
                    other => other,
                };

                let mov = self
                    .func
                    .append_op(param_stmt, OpKind::Mov { value: None }, param_ir_ty.clone());
                self.func.op_mut(mov).flags |= OpFlags::PARAM;

                if let Some(var) = var {
                    if self.flags.contains(BuildFlags::SPILL_ALL) {
                        let lcl = self.func.add_local(param_ir_ty);
                        let key = self.var_key(&var);
                        self.var_refs.entry(key, VarRefKind::Local).local = Some(lcl);
                        self.func.append_op(
                            after_params,
                            OpKind::Store { dst: MemLoc::Local(lcl), value: mov },
                            IR_TY_NONE,
                        );
                    } else {
                        self.var_assg(after_params, entry, mov, &var);
                    }
                }
            }
        }
    }

    /// Wire `goto` branches to their labels. Any `Br` op still carrying a
    /// label annotation is matched against the registered labels.
    fn fix_up_gotos(&mut self) {
        for op_id in self.func.op_ids() {
            let op = self.func.op(op_id);
            if !matches!(op.kind, OpKind::Br) {
                continue;
            }
            let OpMetadata::GotoTarget(name) = &op.metadata else {
                continue;
            };
            let name = name.clone();

            let label = self
                .labels
                .iter()
                .find(|l| l.name == name)
                .unwrap_or_else(|| panic!("goto to unknown label '{}'", name));
            let target = label.block;
            let block = self.func.block_of_op(op_id);
            self.func.make_merge(block, target);
            self.func.op_mut(op_id).metadata = OpMetadata::None;
        }
    }

    /// Guarantee the function's last block ends in a return; `main` gets an
    /// implicit `return 0`.
    fn ensure_final_ret(&mut self, mut last_block: Option<BlockId>) {
        let needs_new_block = match last_block {
            None => true,
            Some(block) => {
                let b = self.func.block(block);
                b.id == DETACHED_BLOCK || {
                    match self.func.last_op(block) {
                        Some(op) => {
                            let kind = &self.func.op(op).kind;
                            kind.is_terminator() && !matches!(kind, OpKind::Ret { .. })
                        }
                        None => false,
                    }
                }
            }
        };

        if needs_new_block {
            debug!("adding block for implicit return in {}", self.func.name);
            last_block = Some(self.func.alloc_block());
        }
        let block = last_block.expect("no last block");

        let ends_in_ret = self
            .func
            .last_op(block)
            .map(|op| matches!(self.func.op(op).kind, OpKind::Ret { .. }))
            .unwrap_or(false);
        if ends_in_ret {
            return;
        }

        let stmt = self.func.alloc_stmt(block);
        let value = if self.func.name == "main" {
            debug!("adding implicit return 0 to {}", block);
            Some(self.func.mk_int_constant(stmt, Primitive::I32, 0))
        } else {
            None
        };
        self.func.append_op(stmt, OpKind::Ret { value }, IR_TY_NONE);
        self.func.make_ret(block);
    }

    // ── phi back-patching ────────────────────────────────────────────────────

    /// Insert a load of a spilled/global variable at the end of `block`,
    /// before its terminator.
    fn materialise_ref_load(&mut self, block: BlockId, src: MemLoc, ty: IrType) -> OpId {
        match self.func.last_op(block) {
            Some(last) if self.func.op(last).kind.is_terminator() => {
                self.func.insert_op_before(last, OpKind::Load { src }, ty)
            }
            _ => {
                let stmt = self.func.alloc_stmt(block);
                self.func.append_op(stmt, OpKind::Load { src }, ty)
            }
        }
    }

    /// Back-fill one pending phi by walking predecessors. A worklist of
    /// (phi, entry-slot, predecessor) drives the fixpoint, so cycles through
    /// loop headers terminate instead of recursing forever.
    fn find_phi_exprs(&mut self, phi: OpId) {
        let OpMetadata::PendingPhi { name, scope } = self.func.op(phi).metadata.clone() else {
            panic!("find_phi_exprs on op without a pending variable");
        };
        let key = VarKey::new(name, scope);
        debug_assert!(
            self.var_writes.contains_key(&key),
            "phi for '{}' with no recorded writes",
            key.name
        );
        let var_ty = self.func.op(phi).ty.clone();
        let block = self.func.block_of_op(phi);

        // per-block cache of the op chosen for this variable
        let mut block_ops: FxHashMap<BlockId, OpId> = FxHashMap::default();
        block_ops.insert(block, phi);

        let preds: Vec<BlockId> = self.func.block(block).preds.to_vec();
        self.set_phi_placeholder(phi, &preds);

        let mut worklist: Vec<(OpId, usize, BlockId)> = preds
            .iter()
            .enumerate()
            .map(|(slot, &pred)| (phi, slot, pred))
            .collect();

        let mut head = 0;
        while head < worklist.len() {
            let (dst_phi, slot, pred) = worklist[head];
            head += 1;

            // the full keyed lookup; an SSA ref in the predecessor wins over
            // any op this walk already cached for that block
            let found = match self.var_refs.get(&key, Some(pred)) {
                Some(Resolved::Ssa(op)) => Some(op),
                Some(Resolved::Local(lcl)) => {
                    Some(self.materialise_ref_load(pred, MemLoc::Local(lcl), var_ty.clone()))
                }
                Some(Resolved::Global(glb)) => {
                    Some(self.materialise_ref_load(pred, MemLoc::Global(glb), var_ty.clone()))
                }
                None => block_ops.get(&pred).copied(),
            };

            if let Some(op) = found {
                self.fill_phi_entry(dst_phi, slot, pred, op);
                block_ops.insert(pred, op);
                continue;
            }

            // the variable is not defined in this block: phi recursively
            let pred_preds: Vec<BlockId> = self.func.block(pred).preds.to_vec();
            assert!(
                !pred_preds.is_empty(),
                "variable '{}' read but never written on some path",
                key.name
            );

            let new_phi = self.func.insert_phi(pred, var_ty.clone());
            self.set_phi_placeholder(new_phi, &pred_preds);
            self.fill_phi_entry(dst_phi, slot, pred, new_phi);
            block_ops.insert(pred, new_phi);

            self.var_refs.entry(key.clone(), VarRefKind::Ssa).record_def(pred, new_phi);

            for (slot, &pp) in pred_preds.iter().enumerate() {
                worklist.push((new_phi, slot, pp));
            }
        }
    }

    fn set_phi_placeholder(&mut self, phi: OpId, preds: &[BlockId]) {
        let entries: SmallVec<[PhiEntry; 2]> = preds
            .iter()
            .map(|&pred| PhiEntry { pred, value: INVALID_OP })
            .collect();
        if let OpKind::Phi { entries: slot } = &mut self.func.op_mut(phi).kind {
            *slot = entries;
        } else {
            panic!("placeholder target is not a phi");
        }
    }

    fn fill_phi_entry(&mut self, phi: OpId, slot: usize, pred: BlockId, value: OpId) {
        if let OpKind::Phi { entries } = &mut self.func.op_mut(phi).kind {
            entries[slot] = PhiEntry { pred, value };
        } else {
            panic!("fill target is not a phi");
        }
    }

    fn resolve_pending_phis(&mut self) {
        for op_id in self.func.op_ids() {
            let op = self.func.op(op_id);
            if matches!(op.kind, OpKind::Phi { .. })
                && matches!(op.metadata, OpMetadata::PendingPhi { .. })
            {
                self.find_phi_exprs(op_id);
                self.func.op_mut(op_id).metadata = OpMetadata::None;
            }
        }
    }

    // ── validation ───────────────────────────────────────────────────────────

    /// Re-check def/use type compatibility over the whole function. A use
    /// is fine whenever no cast op would be required between the operand's
    /// type and what the consumer expects (the no-op cast table).
    fn validate(&self) {
        let compatible = |expected: &IrType, use_id: OpId| {
            !needs_cast_op(&self.target, expected, &self.func.op(use_id).ty)
        };

        for op_id in self.func.op_ids() {
            let op = self.func.op(op_id);

            // every operand slot must have been resolved
            for_each_op_use(&op.kind, |use_id| {
                assert!(
                    use_id != INVALID_OP,
                    "unfilled operand slot in {} of {}",
                    op_id,
                    self.func.name
                );
            });

            let ok = match &op.kind {
                OpKind::Phi { entries } => {
                    entries.iter().all(|entry| compatible(&op.ty, entry.value))
                }
                OpKind::Mov { value: Some(value) } => compatible(&op.ty, *value),
                OpKind::Ret { value: Some(value) } => compatible(&op.ty, *value),
                OpKind::AddrOffset { base, index, .. } => {
                    compatible(&IR_TY_POINTER, *base)
                        && index.map_or(true, |index| compatible(&IR_TY_POINTER, index))
                }
                OpKind::Binary { op: bin_op, lhs, rhs } => {
                    if bin_op.is_comparison() {
                        // result type is independent; the arms must agree
                        compatible(&self.func.op(*lhs).ty, *rhs)
                    } else {
                        compatible(&op.ty, *lhs) && compatible(&op.ty, *rhs)
                    }
                }
                // loads/stores are through opaque pointers; calls were
                // coerced argument-by-argument by the checker; casts convert
                // by definition
                _ => true,
            };

            assert!(ok, "op {} has a use with incompatible type in {}", op_id, self.func.name);
        }
    }
}

// ── Unit building ─────────────────────────────────────────────────────────────

/// Mangle a function-scope static (or `__func__`) name so it cannot collide
/// with file-scope symbols: `.func.name`.
pub(crate) fn mangle_static_name(func_name: Option<&str>, name: &str) -> String {
    match func_name {
        Some(func) => format!(".{}.{}", func, name),
        None => format!(".{}", name),
    }
}

fn build_function(
    unit: &mut Unit,
    global_refs: &mut VarRefs,
    def: &ast::FuncDef,
    flags: BuildFlags,
) -> Func {
    let sig_ty = ty_for_ast(&unit.target, &def.ty);
    let IrType::Func(sig) = sig_ty else {
        panic!("function definition with non-function type");
    };
    let sig = IrFuncTy {
        ret: sig.ret.clone(),
        params: sig.params.clone(),
        flags: sig.flags,
    };

    let mut builder = FuncBuilder::new(unit, global_refs, def.var.name.clone(), sig, flags);

    let entry = builder.func.alloc_block();
    builder.build_params(def, entry);

    let last_block = builder.build_stmt(entry, &def.body);

    builder.fix_up_gotos();
    cfg::prune_blocks(&mut builder.func);
    builder.ensure_final_ret(Some(last_block));
    cfg::prune_blocks(&mut builder.func);
    builder.resolve_pending_phis();
    cfg::simplify_phis(&mut builder.func);
    builder.validate();

    builder.func
}

/// Lower a whole translation unit.
pub fn build_unit(target: Target, tu: &ast::TranslationUnit, flags: BuildFlags) -> Unit {
    let mut unit = Unit::new(target);
    let mut global_refs = VarRefs::new();

    for external in &tu.decls {
        match external {
            ast::ExternalDecl::Declaration(decl) => {
                init::build_global_declaration(&mut unit, &mut global_refs, None, decl);
            }
            ast::ExternalDecl::FuncDef(def) => {
                // functions do not necessarily have a separate declaration
                init::build_global_var(
                    &mut unit,
                    &mut global_refs,
                    None,
                    def.storage,
                    def.is_inline,
                    &ast::VarDecl { var: def.var.clone(), ty: def.ty.clone(), init: None },
                );

                let func = build_function(&mut unit, &mut global_refs, def, flags);

                let key = VarKey::new(def.var.name.clone(), SCOPE_GLOBAL);
                let Some(Resolved::Global(glb)) = global_refs.get(&key, None) else {
                    panic!("function global not registered");
                };

                let idx = unit.funcs.len();
                unit.funcs.push(func);
                let global = unit.global_mut(glb);
                global.def = DefState::Defined;
                global.func = Some(idx);
            }
        }
    }

    // promote surviving tentative definitions to zero-filled definitions
    for global in unit.globals.iter_mut() {
        if global.def == DefState::Tentative {
            debug_assert!(global.kind == GlobalKind::Data, "tentative function");
            global.def = DefState::Defined;
            global.var = Some(GlobalVar { kind: DataKind::Data, value: GlobalValue::Zero });
        }
    }

    unit
}

#[cfg(test)]
mod tests;
