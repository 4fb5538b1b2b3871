//! Initializer layout.
//!
//! `(type, init-list)` pairs flatten into `(byte offset, bitfield?, expr)`
//! records: struct fields in declaration order with designators moving the
//! cursor, the single active member for unions, index designators for
//! arrays, and transparent descent through anonymous aggregates and
//! non-scalar compound literals.
//!
//! For locals the records become stores, preceded by a memset-to-zero of
//! the whole object. The over-zeroing is deliberate: unspecified bytes
//! (padding and omitted members) are guaranteed zero without any gap
//! analysis, and a later pass may drop the memset when every byte is
//! provably stored.
//!
//! For globals the records fold into a constant value-list; the residual
//! expressions handled here are the ones the type checker does not reduce:
//! addresses of globals (with member/index offset chains), string
//! literals, enum constants, hoisted compound literals, and
//! pointer-shaped constant casts.

use crate::common::target::Target;
use crate::frontend::ast::{
    self, AstType, Designator, Expr, ExprKind, Init, InitList, StorageClass, VarDecl, VarKind,
    SCOPE_GLOBAL,
};
use crate::ir::ir::*;
use crate::ir::ty::{type_info, IrType, Primitive, IR_TY_NONE, IR_TY_POINTER};
use crate::ir::var_refs::{Resolved, VarKey, VarRefKind, VarRefs};

use super::{
    get_member_info, mangle_static_name, ty_for_ast, ty_for_decl_ast, Cursor, FuncBuilder,
};
use super::expr::CompoundLiteralMode;

// ── Flattening ────────────────────────────────────────────────────────────────

/// One flattened initializer record.
pub(crate) struct FlatInit<'l> {
    pub offset: usize,
    pub bitfield: Option<Bitfield>,
    pub expr: &'l Expr,
}

/// Flatten a (possibly nested, possibly designated) initializer list.
pub(crate) fn flatten_init_list<'l>(target: &Target, list: &'l InitList) -> Vec<FlatInit<'l>> {
    let mut inits = Vec::new();
    flatten_entry(target, list, &list.ty, 0, &mut inits);
    inits
}

fn flatten_entry<'l>(
    target: &Target,
    list: &'l InitList,
    ty: &AstType,
    base_offset: usize,
    out: &mut Vec<FlatInit<'l>>,
) {
    enum Shape {
        Record,
        Array { elem: AstType, elem_size: usize },
    }

    let shape = match ty {
        AstType::Aggregate(_) => Shape::Record,
        AstType::Array { elem, .. } => {
            let elem_size = type_info(target, &ty_for_ast(target, elem)).size;
            Shape::Array { elem: (**elem).clone(), elem_size }
        }
        other => panic!("initializer list for non-aggregate type {:?}", other),
    };

    let mut member_idx = 0usize;
    for entry in &list.inits {
        let mut bitfield = None;
        let mut offset = base_offset;

        let member_ty = if !entry.designators.is_empty() {
            let (designated_offset, designated_idx, designated_bitfield, designated_ty) =
                resolve_designators(target, ty, &entry.designators);
            offset += designated_offset;
            member_idx = designated_idx;
            bitfield = designated_bitfield;
            designated_ty
        } else {
            match &shape {
                Shape::Record => {
                    let AstType::Aggregate(agg) = ty else { unreachable!() };
                    let field = agg
                        .fields
                        .get(member_idx)
                        .unwrap_or_else(|| panic!("excess initializer for aggregate"));
                    let ir_ty = ty_for_ast(target, ty);
                    let info = type_info(target, &ir_ty);
                    offset += info.offsets.as_ref().map(|o| o[member_idx]).unwrap_or(0);
                    bitfield = field.bitfield_width.map(|width| Bitfield { offset: 0, width });
                    field.ty.clone()
                }
                Shape::Array { elem, elem_size } => {
                    offset += member_idx * elem_size;
                    elem.clone()
                }
            }
        };

        member_idx += 1;

        match &entry.init {
            Init::Expr(expr) => {
                // a compound literal initializing a non-scalar member is
                // descended rather than built as a value
                if let ExprKind::CompoundLiteral { init } = &expr.kind {
                    if !member_ty.is_scalar() {
                        flatten_entry(target, init, &init.ty, offset, out);
                        continue;
                    }
                }
                out.push(FlatInit { offset, bitfield, expr });
            }
            Init::List(nested) => {
                flatten_entry(target, nested, &nested.ty, offset, out);
            }
        }
    }
}

/// Resolve a designator chain against `ty`: the byte offset, the member
/// index the cursor continues from, any bitfield slice, and the designated
/// member's type.
fn resolve_designators(
    target: &Target,
    ty: &AstType,
    designators: &[Designator],
) -> (usize, usize, Option<Bitfield>, AstType) {
    let mut offset = 0usize;
    let mut member_idx = 0usize;
    let mut bitfield = None;
    let mut cur_ty = ty.clone();

    for designator in designators {
        match designator {
            Designator::Field(name) => {
                let info = get_member_info(target, &cur_ty, name);
                offset += info.offset;
                member_idx = info.index;
                bitfield = info.bitfield;
                cur_ty = info.ast_ty;
            }
            Designator::Index(index) => {
                let AstType::Array { elem, .. } = &cur_ty else {
                    panic!("index designator on non-array type")
                };
                let elem_size = type_info(target, &ty_for_ast(target, elem)).size;
                offset += elem_size * index;
                member_idx = *index;
                bitfield = None;
                cur_ty = (**elem).clone();
            }
        }
    }

    (offset, member_idx, bitfield, cur_ty)
}

// ── Local emission ────────────────────────────────────────────────────────────

impl<'a, 'u> FuncBuilder<'a, 'u> {
    /// Lower one declarator initializer. Returns the value to assign for
    /// scalar initializers; `None` when the stores were already emitted
    /// through `address`.
    pub(crate) fn build_init(
        &mut self,
        cursor: &mut Cursor,
        address: Option<OpId>,
        init: &'a Init,
    ) -> Option<OpId> {
        match init {
            Init::Expr(expr) => {
                if let ExprKind::CompoundLiteral { .. } = &expr.kind {
                    let mode = if expr.ty.is_scalar() {
                        CompoundLiteralMode::Load
                    } else {
                        CompoundLiteralMode::Addr
                    };
                    let value = self.build_compound_literal(cursor, address, mode, expr);
                    // in Addr mode the literal wrote through `address`
                    // itself, so there is nothing left to store
                    return (mode == CompoundLiteralMode::Load).then_some(value);
                }
                Some(self.build_expr_value(cursor, expr))
            }
            Init::List(list) => {
                let address = address.expect("initializer list without a destination");
                self.build_init_list(cursor, address, list);
                None
            }
        }
    }

    /// Emit an initializer list into the object at `address`.
    pub(crate) fn build_init_list(
        &mut self,
        cursor: &mut Cursor,
        address: OpId,
        list: &'a InitList,
    ) {
        if list.ty.is_scalar() {
            debug_assert!(list.inits.len() == 1, "scalar initializer with several entries");
            let Init::Expr(expr) = &list.inits[0].init else {
                panic!("scalar initializer with nested list")
            };
            let value = self.build_expr_value(cursor, expr);
            self.func.append_op(
                cursor.stmt,
                OpKind::Store { dst: MemLoc::Addr(address), value },
                IR_TY_NONE,
            );
            return;
        }

        let layout = flatten_init_list(&self.target, list);

        let mut first_store = None;
        for flat in &layout {
            let value = self.build_expr_value(cursor, flat.expr);

            let init_address = if flat.offset != 0 {
                self.func.append_op(
                    cursor.stmt,
                    OpKind::AddrOffset {
                        base: address,
                        index: None,
                        scale: 0,
                        offset: flat.offset as u64,
                    },
                    IR_TY_POINTER,
                )
            } else {
                address
            };

            let store = match flat.bitfield {
                Some(bitfield) => self.func.append_op(
                    cursor.stmt,
                    OpKind::StoreBitfield { addr: init_address, value, bitfield },
                    IR_TY_NONE,
                ),
                None => self.func.append_op(
                    cursor.stmt,
                    OpKind::Store { dst: MemLoc::Addr(init_address), value },
                    IR_TY_NONE,
                ),
            };

            if first_store.is_none() {
                first_store = Some(store);
            }
        }

        // zero the whole object ahead of the explicit stores; designated
        // initializers may land in any order and padding must not be left
        // undefined
        let total = self.type_info(&self.ty_for_ast(&list.ty)).size;
        self.build_zero_range(cursor, first_store, address, total);
    }

    fn build_zero_range(
        &mut self,
        cursor: &mut Cursor,
        insert_before: Option<OpId>,
        address: OpId,
        byte_size: usize,
    ) {
        if byte_size == 0 {
            return;
        }

        let ptr_prim = IrType::pointer_primitive(&self.target);
        match insert_before {
            Some(before) => {
                let value = self.func.insert_op_before(
                    before,
                    OpKind::CnstInt(0),
                    IrType::Primitive(Primitive::I8),
                );
                let len = self.func.insert_op_before(
                    before,
                    OpKind::CnstInt(byte_size as u64),
                    IrType::Primitive(ptr_prim),
                );
                // the fill operands were inserted just above, so they still
                // precede the memset itself
                self.func.insert_op_before(
                    before,
                    OpKind::MemSet { addr: address, value, len },
                    IR_TY_NONE,
                );
            }
            None => {
                let value = self.func.append_op(
                    cursor.stmt,
                    OpKind::CnstInt(0),
                    IrType::Primitive(Primitive::I8),
                );
                let len = self.func.append_op(
                    cursor.stmt,
                    OpKind::CnstInt(byte_size as u64),
                    IrType::Primitive(ptr_prim),
                );
                self.func.append_op(
                    cursor.stmt,
                    OpKind::MemSet { addr: address, value, len },
                    IR_TY_NONE,
                );
            }
        }
    }
}

// ── Global declarations ───────────────────────────────────────────────────────

/// Lower one file-scope declaration list.
pub(crate) fn build_global_declaration(
    unit: &mut Unit,
    refs: &mut VarRefs,
    func_name: Option<&str>,
    decl: &ast::Declaration,
) {
    if decl.storage == StorageClass::Typedef {
        return;
    }
    for var_decl in &decl.decls {
        build_global_var(unit, refs, func_name, decl.storage, decl.is_inline, var_decl);
    }
}

/// Lower one global (or function-scope static/extern) declarator:
/// linkage and definition-state bookkeeping, symbol creation or reuse on
/// redeclaration, and the initial value.
pub(crate) fn build_global_var(
    unit: &mut Unit,
    refs: &mut VarRefs,
    func_name: Option<&str>,
    storage: StorageClass,
    is_inline: bool,
    decl: &VarDecl,
) {
    let var_ty = ty_for_decl_ast(&unit.target, &decl.ty);

    let is_func = decl.ty.is_func();
    let is_extern = storage == StorageClass::Extern;
    let is_static = storage == StorageClass::Static;
    let is_unspecified = storage == StorageClass::None;

    let symbol_name = if is_static && !is_func {
        mangle_static_name(func_name, &decl.var.name)
    } else {
        decl.var.name.clone()
    };

    // functions always have file scope, whatever scope the declaration
    // appeared in
    let scope = if is_func { SCOPE_GLOBAL } else { decl.var.scope };
    let key = VarKey::new(decl.var.name.clone(), scope);
    let is_file_scope = scope == SCOPE_GLOBAL;

    let existing = match refs.get(&key, None) {
        Some(Resolved::Global(glb)) => Some(glb),
        Some(_) => panic!("redeclaration of non-global '{}'", decl.var.name),
        None => None,
    };

    let mut linkage = if (is_func && !is_static && !is_inline)
        || is_extern
        || (is_file_scope && !is_inline && !is_static)
    {
        Linkage::External
    } else if is_file_scope && is_static {
        Linkage::Internal
    } else {
        Linkage::None
    };

    let already_defined =
        existing.map_or(false, |glb| unit.global(glb).def == DefState::Defined);
    let def = if decl.init.is_some() || !is_file_scope || already_defined {
        DefState::Defined
    } else if is_file_scope && !is_func && (is_unspecified || is_static) {
        DefState::Tentative
    } else {
        DefState::Undefined
    };

    // `static int x; extern int x;` stays internal
    if let Some(glb) = existing {
        if linkage == Linkage::External && unit.global(glb).linkage == Linkage::Internal {
            linkage = Linkage::Internal;
        }
    }

    let kind = if is_func { GlobalKind::Func } else { GlobalKind::Data };
    let glb = match existing {
        Some(glb) => glb,
        None => {
            let glb = unit.add_global(kind, var_ty.clone(), def, Some(symbol_name));
            refs.entry(key, VarRefKind::Global).global = Some(glb);
            glb
        }
    };

    {
        let global = unit.global_mut(glb);
        global.def = def;
        global.linkage = linkage;
    }

    if def == DefState::Tentative || is_func {
        return;
    }

    // attach the initial value; a redeclaration without initializer must
    // not clobber a value attached earlier
    let has_value = unit.global(glb).var.is_some();
    if let Some(init) = &decl.init {
        let value = build_global_value(unit, refs, init, &decl.ty);
        unit.global_mut(glb).var = Some(GlobalVar { kind: DataKind::Data, value });
    } else if !has_value {
        unit.global_mut(glb).var =
            Some(GlobalVar { kind: DataKind::Data, value: GlobalValue::Zero });
    }
}

// ── Global values ─────────────────────────────────────────────────────────────

/// Reduce a global initializer to a constant value.
pub(crate) fn build_global_value(
    unit: &mut Unit,
    refs: &VarRefs,
    init: &Init,
    ty: &AstType,
) -> GlobalValue {
    match init {
        Init::Expr(expr) => global_value_expr(unit, refs, expr, ty),
        Init::List(list) => global_value_init_list(unit, refs, list, ty),
    }
}

fn global_value_init_list(
    unit: &mut Unit,
    refs: &VarRefs,
    list: &InitList,
    _ty: &AstType,
) -> GlobalValue {
    if list.ty.is_scalar() {
        debug_assert!(list.inits.len() == 1, "scalar initializer with several entries");
        let Init::Expr(expr) = &list.inits[0].init else {
            panic!("scalar initializer with nested list")
        };
        return global_value_expr(unit, refs, expr, &list.ty);
    }

    let target = unit.target;
    let layout = flatten_init_list(&target, list);

    let mut elements = Vec::with_capacity(layout.len());
    for flat in &layout {
        assert!(flat.bitfield.is_none(), "bitfield members in global initializers");
        let value = global_value_expr(unit, refs, flat.expr, &flat.expr.ty);
        elements.push((flat.offset, value));
    }

    GlobalValue::List { elements }
}

fn global_value_expr(unit: &mut Unit, refs: &VarRefs, expr: &Expr, ty: &AstType) -> GlobalValue {
    let ir_ty = ty_for_ast(&unit.target, ty);

    match &expr.kind {
        ExprKind::ConstInt(value) => GlobalValue::Int { ty: ir_ty, value: *value },
        ExprKind::ConstFloat(value) => GlobalValue::Flt { ty: ir_ty, value: *value },
        ExprKind::ConstString(literal) => match ty {
            AstType::Array { .. } => {
                let value = match literal {
                    ast::StringLiteral::Ascii(bytes) => StrValue::Ascii(bytes.clone()),
                    ast::StringLiteral::Wide(chars) => StrValue::Wide(chars.clone()),
                };
                GlobalValue::Str(value)
            }
            _ => {
                let glb = super::expr::build_str_literal(unit, &expr.ty, literal);
                GlobalValue::Addr { glb, offset: 0 }
            }
        },
        ExprKind::Var(var) => match var.kind {
            VarKind::Enumerator(value) => GlobalValue::Int { ty: ir_ty, value: value as u64 },
            VarKind::Var => global_value_addr(unit, refs, expr, None, ty),
        },
        ExprKind::Unary { op: ast::UnaryOp::AddrOf, expr: inner } => {
            // `&(((struct s *)0)->field)` is offsetof
            if let ExprKind::PointerAccess { base, member } = &inner.kind {
                if matches!(base.kind, ExprKind::ConstInt(0)) {
                    let info = get_member_info(&unit.target, base.ty.underlying(), member);
                    assert!(info.bitfield.is_none(), "address of bitfield member");
                    return GlobalValue::Int { ty: ir_ty, value: info.offset as u64 };
                }
            }
            if let ExprKind::CompoundLiteral { .. } = &inner.kind {
                let glb = hoist_compound_literal(unit, refs, inner);
                return GlobalValue::Addr { glb, offset: 0 };
            }
            global_value_addr(unit, refs, inner, None, ty)
        }
        ExprKind::Cast { expr: inner } => global_value_cast(unit, refs, expr, inner, ty),
        ExprKind::Binary { op: ast::BinaryOp::Add, lhs, rhs } => {
            global_value_addr(unit, refs, lhs, Some(rhs), ty)
        }
        ExprKind::CompoundLiteral { init } => {
            if matches!(expr.ty, AstType::Array { .. }) && ty.is_pointer() {
                // decay: the literal's storage is hoisted and its address used
                let glb = hoist_compound_literal(unit, refs, expr);
                return GlobalValue::Addr { glb, offset: 0 };
            }
            global_value_init_list(unit, refs, init, &expr.ty)
        }
        other => panic!(
            "global initializer expression not reduced by the checker: {:?}",
            std::mem::discriminant(other)
        ),
    }
}

/// Constant casts in global initializers: pointer-shaped casts retype, and
/// integer/float conversions evaluate.
fn global_value_cast(
    unit: &mut Unit,
    refs: &VarRefs,
    cast: &Expr,
    inner: &Expr,
    ty: &AstType,
) -> GlobalValue {
    let value = global_value_expr(unit, refs, inner, &inner.ty);
    let ir_ty = ty_for_ast(&unit.target, ty);

    let ptr_like = |t: &AstType| {
        t.is_pointer() || matches!(t, AstType::Array { .. } | AstType::Func(_))
    };

    if ptr_like(&inner.ty) || ptr_like(&cast.ty) {
        // address-preserving: only the recorded type changes
        return match value {
            GlobalValue::Int { value, .. } => GlobalValue::Int { ty: ir_ty, value },
            other => other,
        };
    }

    match value {
        GlobalValue::Int { value, .. } => {
            if cast.ty.is_fp() {
                let as_float = if inner.ty.is_signed() {
                    value as i64 as f64
                } else {
                    value as f64
                };
                GlobalValue::Flt { ty: ir_ty, value: as_float }
            } else {
                GlobalValue::Int { ty: ir_ty, value }
            }
        }
        GlobalValue::Flt { value, .. } => {
            if cast.ty.is_fp() {
                GlobalValue::Flt { ty: ir_ty, value }
            } else if cast.ty.is_signed() {
                GlobalValue::Int { ty: ir_ty, value: value as i64 as u64 }
            } else {
                GlobalValue::Int { ty: ir_ty, value: value as u64 }
            }
        }
        other => other,
    }
}

/// An address-valued initializer: the base global plus a byte offset
/// accumulated through member/index accesses and pointer `+`.
fn global_value_addr(
    unit: &mut Unit,
    refs: &VarRefs,
    addr: &Expr,
    index: Option<&Expr>,
    ty: &AstType,
) -> GlobalValue {
    let index_offset = |unit: &mut Unit, refs: &VarRefs, pointee: &AstType| -> u64 {
        match index {
            None => 0,
            Some(index_expr) => {
                let value = global_value_expr(unit, refs, index_expr, &index_expr.ty);
                let GlobalValue::Int { value, .. } = value else {
                    panic!("non-constant offset in global address")
                };
                let elem_size =
                    type_info(&unit.target, &ty_for_ast(&unit.target, pointee)).size as u64;
                value * elem_size
            }
        }
    };

    match &addr.kind {
        ExprKind::Var(var) => {
            let key = VarKey::new(var.name.clone(), var.scope);
            let resolved = refs
                .get(&key, None)
                .or_else(|| refs.get(&VarKey::new(var.name.clone(), SCOPE_GLOBAL), None));
            let Some(Resolved::Global(glb)) = resolved else {
                panic!("address of non-global '{}' in global initializer", var.name)
            };

            let pointee = match ty {
                AstType::Pointer(inner) => (**inner).clone(),
                _ => addr.ty.clone(),
            };
            let offset = index_offset(unit, refs, &pointee);
            GlobalValue::Addr { glb, offset }
        }
        ExprKind::Unary { op: ast::UnaryOp::AddrOf, expr: inner } => {
            global_value_addr(unit, refs, inner, index, ty)
        }
        ExprKind::ArrayAccess { base, index: access_index } => {
            let elem = base.ty.underlying().clone();
            let base_value = global_value_addr(unit, refs, base, None, ty);
            let GlobalValue::Addr { glb, offset } = base_value else {
                panic!("non-address base in global array access")
            };
            let idx = global_value_expr(unit, refs, access_index, &access_index.ty);
            let GlobalValue::Int { value, .. } = idx else {
                panic!("non-constant index in global initializer")
            };
            let elem_size = type_info(&unit.target, &ty_for_ast(&unit.target, &elem)).size as u64;
            GlobalValue::Addr { glb, offset: offset + value * elem_size }
        }
        ExprKind::MemberAccess { base, member } => {
            let info = get_member_info(&unit.target, &base.ty, member);
            let base_value = global_value_addr(unit, refs, base, None, ty);
            let GlobalValue::Addr { glb, offset } = base_value else {
                panic!("non-address base in global member access")
            };
            GlobalValue::Addr { glb, offset: offset + info.offset as u64 }
        }
        ExprKind::PointerAccess { base, member } => {
            let info = get_member_info(&unit.target, base.ty.underlying(), member);
            let base_value = global_value_addr(unit, refs, base, None, ty);
            let GlobalValue::Addr { glb, offset } = base_value else {
                panic!("non-address base in global pointer access")
            };
            GlobalValue::Addr { glb, offset: offset + info.offset as u64 }
        }
        ExprKind::Binary { op: ast::BinaryOp::Add, lhs, rhs } => {
            global_value_addr(unit, refs, lhs, Some(rhs), ty)
        }
        ExprKind::CompoundLiteral { .. } => {
            let glb = hoist_compound_literal(unit, refs, addr);
            GlobalValue::Addr { glb, offset: 0 }
        }
        ExprKind::ConstString(literal) => {
            let glb = super::expr::build_str_literal(unit, &addr.ty, literal);
            GlobalValue::Addr { glb, offset: 0 }
        }
        other => panic!(
            "unsupported address expression in global initializer: {:?}",
            std::mem::discriminant(other)
        ),
    }
}

/// A compound literal in static context: its storage becomes a fresh
/// anonymous defined global.
fn hoist_compound_literal(unit: &mut Unit, refs: &VarRefs, expr: &Expr) -> GlobalId {
    let ExprKind::CompoundLiteral { init } = &expr.kind else {
        panic!("hoisting a non-compound-literal")
    };

    let var_ty = ty_for_ast(&unit.target, &expr.ty);
    let glb = unit.add_global(GlobalKind::Data, var_ty, DefState::Defined, None);
    unit.global_mut(glb).linkage = Linkage::Internal;

    let value = global_value_init_list(unit, refs, init, &expr.ty);
    unit.global_mut(glb).var = Some(GlobalVar { kind: DataKind::Data, value });
    glb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::target::X86_64_LINUX;
    use crate::frontend::ast::testing::*;
    use crate::frontend::ast::{InitEntry, Scalar};

    fn entry(expr: Expr) -> InitEntry {
        InitEntry { designators: vec![], init: Init::Expr(expr) }
    }

    fn designated(designators: Vec<Designator>, expr: Expr) -> InitEntry {
        InitEntry { designators, init: Init::Expr(expr) }
    }

    #[test]
    fn struct_fields_flatten_in_declaration_order() {
        // struct { int x; int y; } = { 1, 2 }
        let ty = struct_ty("P", vec![("x", int_ty()), ("y", int_ty())]);
        let list = InitList { ty: ty.clone(), inits: vec![entry(int(1)), entry(int(2))] };

        let flat = flatten_init_list(&X86_64_LINUX, &list);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].offset, 0);
        assert_eq!(flat[1].offset, 4);
    }

    #[test]
    fn designators_reposition_the_cursor() {
        // struct { int a, b, c; } = { .c = 3, 1 } -> offsets 8 then... the
        // cursor continues after c, so the 1 lands past the end -- use
        // { .b = 2, 3 } instead: b at 4, then c at 8
        let ty = struct_ty("T", vec![("a", int_ty()), ("b", int_ty()), ("c", int_ty())]);
        let list = InitList {
            ty: ty.clone(),
            inits: vec![
                designated(vec![Designator::Field("b".to_string())], int(2)),
                entry(int(3)),
            ],
        };

        let flat = flatten_init_list(&X86_64_LINUX, &list);
        assert_eq!(flat[0].offset, 4);
        assert_eq!(flat[1].offset, 8);
    }

    #[test]
    fn array_index_designators() {
        // int a[8] = { [4] = 1, 2 }
        let ty = AstType::Array { elem: Box::new(int_ty()), len: 8 };
        let list = InitList {
            ty: ty.clone(),
            inits: vec![designated(vec![Designator::Index(4)], int(1)), entry(int(2))],
        };

        let flat = flatten_init_list(&X86_64_LINUX, &list);
        assert_eq!(flat[0].offset, 16);
        assert_eq!(flat[1].offset, 20);
    }

    #[test]
    fn nested_lists_recurse_with_their_offset() {
        // struct { struct { int x; int y; } p; int z; } = { { 1, 2 }, 3 }
        let inner = struct_ty("I", vec![("x", int_ty()), ("y", int_ty())]);
        let outer = struct_ty("O", vec![("p", inner.clone()), ("z", int_ty())]);
        let list = InitList {
            ty: outer,
            inits: vec![
                InitEntry {
                    designators: vec![],
                    init: Init::List(InitList {
                        ty: inner,
                        inits: vec![entry(int(1)), entry(int(2))],
                    }),
                },
                entry(int(3)),
            ],
        };

        let flat = flatten_init_list(&X86_64_LINUX, &list);
        let offsets: Vec<usize> = flat.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[test]
    fn anonymous_aggregates_are_descended() {
        // struct { struct { int x; }; int y; } with .x designator
        let anon = AstType::Aggregate(std::sync::Arc::new(ast::AggregateType {
            kind: ast::AggregateKind::Struct,
            name: None,
            fields: vec![ast::Field {
                name: Some("x".to_string()),
                ty: int_ty(),
                bitfield_width: None,
            }],
        }));
        let outer = AstType::Aggregate(std::sync::Arc::new(ast::AggregateType {
            kind: ast::AggregateKind::Struct,
            name: Some("O".to_string()),
            fields: vec![
                ast::Field { name: None, ty: anon, bitfield_width: None },
                ast::Field { name: Some("y".to_string()), ty: int_ty(), bitfield_width: None },
            ],
        }));

        let info = get_member_info(&X86_64_LINUX, &outer, "x");
        assert_eq!(info.offset, 0);
        let info = get_member_info(&X86_64_LINUX, &outer, "y");
        assert_eq!(info.offset, 4);
    }

    #[test]
    fn union_members_share_offset_zero() {
        let ty = AstType::Aggregate(std::sync::Arc::new(ast::AggregateType {
            kind: ast::AggregateKind::Union,
            name: Some("U".to_string()),
            fields: vec![
                ast::Field { name: Some("i".to_string()), ty: int_ty(), bitfield_width: None },
                ast::Field {
                    name: Some("d".to_string()),
                    ty: AstType::Scalar(Scalar::Double),
                    bitfield_width: None,
                },
            ],
        }));
        let list = InitList { ty, inits: vec![entry(int(1))] };

        let flat = flatten_init_list(&X86_64_LINUX, &list);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].offset, 0);
    }
}
