//! The IR type language and target-aware layout.
//!
//! Types are structural: two struct types with the same field list are the
//! same type. Pointers are opaque (no pointee); what a load or store moves
//! is decided by the op's own type, not by the pointer's.

use std::rc::Rc;

use crate::common::target::Target;

/// The primitive value types. The declaration order is meaningful: for two
/// integer primitives, the later one is wider, which is what cast selection
/// keys off when picking truncate vs extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Primitive {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    F16,
    F32,
    F64,
}

impl Primitive {
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Primitive::I1 | Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 | Primitive::I128
        )
    }

    pub fn is_fp(self) -> bool {
        matches!(self, Primitive::F16 | Primitive::F32 | Primitive::F64)
    }

    pub fn size(self) -> usize {
        match self {
            Primitive::I1 | Primitive::I8 => 1,
            Primitive::I16 | Primitive::F16 => 2,
            Primitive::I32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::F64 => 8,
            Primitive::I128 => 16,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FuncTyFlags: u32 {
        const VARIADIC = 1 << 0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrFuncTy {
    pub ret: IrType,
    pub params: Vec<IrType>,
    pub flags: FuncTyFlags,
}

impl IrFuncTy {
    pub fn is_variadic(&self) -> bool {
        self.flags.contains(FuncTyFlags::VARIADIC)
    }
}

/// An IR type. Equality is structural; aggregates are reference counted only
/// to keep clones cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum IrType {
    /// The absence of a value (`void`, and the type of stores/branches).
    None,
    /// The `...` marker in function types.
    Variadic,
    Primitive(Primitive),
    Pointer,
    Array { elem: Rc<IrType>, len: usize },
    Func(Rc<IrFuncTy>),
    Struct { fields: Rc<Vec<IrType>> },
    Union { fields: Rc<Vec<IrType>> },
}

pub const IR_TY_NONE: IrType = IrType::None;
pub const IR_TY_I1: IrType = IrType::Primitive(Primitive::I1);
pub const IR_TY_I8: IrType = IrType::Primitive(Primitive::I8);
pub const IR_TY_I16: IrType = IrType::Primitive(Primitive::I16);
pub const IR_TY_I32: IrType = IrType::Primitive(Primitive::I32);
pub const IR_TY_I64: IrType = IrType::Primitive(Primitive::I64);
pub const IR_TY_F32: IrType = IrType::Primitive(Primitive::F32);
pub const IR_TY_F64: IrType = IrType::Primitive(Primitive::F64);
pub const IR_TY_POINTER: IrType = IrType::Pointer;

impl IrType {
    pub fn array(elem: IrType, len: usize) -> IrType {
        IrType::Array { elem: Rc::new(elem), len }
    }

    pub fn func(ret: IrType, params: Vec<IrType>, variadic: bool) -> IrType {
        let flags = if variadic { FuncTyFlags::VARIADIC } else { FuncTyFlags::empty() };
        IrType::Func(Rc::new(IrFuncTy { ret, params, flags }))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, IrType::None)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, IrType::Primitive(p) if p.is_integral())
    }

    pub fn is_fp(&self) -> bool {
        matches!(self, IrType::Primitive(p) if p.is_fp())
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, IrType::Struct { .. } | IrType::Union { .. })
    }

    pub fn primitive(&self) -> Primitive {
        match self {
            IrType::Primitive(p) => *p,
            _ => panic!("primitive() on non-primitive type"),
        }
    }

    /// The integer primitive with the width of a pointer on `target`.
    pub fn pointer_primitive(target: &Target) -> Primitive {
        match target.pointer_size() {
            4 => Primitive::I32,
            _ => Primitive::I64,
        }
    }
}

/// Size, alignment, and (for structs) member byte offsets of a type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub size: usize,
    pub align: usize,
    /// Byte offsets per field for structs; `None` for every other type
    /// (union members all sit at offset 0).
    pub offsets: Option<Vec<usize>>,
}

fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Compute layout for a type under the given target.
pub fn type_info(target: &Target, ty: &IrType) -> TypeInfo {
    match ty {
        IrType::None | IrType::Variadic => TypeInfo { size: 0, align: 1, offsets: None },
        IrType::Primitive(p) => {
            let size = p.size();
            TypeInfo { size, align: size.max(1), offsets: None }
        }
        IrType::Pointer | IrType::Func(_) => {
            let size = target.pointer_size();
            TypeInfo { size, align: size, offsets: None }
        }
        IrType::Array { elem, len } => {
            let elem_info = type_info(target, elem);
            TypeInfo {
                size: elem_info.size * len,
                align: elem_info.align,
                offsets: None,
            }
        }
        IrType::Struct { fields } => {
            let mut offsets = Vec::with_capacity(fields.len());
            let mut offset = 0usize;
            let mut align = 1usize;
            for field in fields.iter() {
                let info = type_info(target, field);
                offset = align_up(offset, info.align);
                offsets.push(offset);
                offset += info.size;
                align = align.max(info.align);
            }
            TypeInfo {
                size: align_up(offset, align),
                align,
                offsets: Some(offsets),
            }
        }
        IrType::Union { fields } => {
            let mut size = 0usize;
            let mut align = 1usize;
            for field in fields.iter() {
                let info = type_info(target, field);
                size = size.max(info.size);
                align = align.max(info.align);
            }
            TypeInfo { size: align_up(size, align), align, offsets: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::target::{RV32I_LINUX, X86_64_LINUX};

    #[test]
    fn structural_equality() {
        let a = IrType::Struct { fields: Rc::new(vec![IR_TY_I32, IR_TY_I32]) };
        let b = IrType::Struct { fields: Rc::new(vec![IR_TY_I32, IR_TY_I32]) };
        let c = IrType::Struct { fields: Rc::new(vec![IR_TY_I32, IR_TY_I64]) };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn struct_layout_with_padding() {
        // struct { char c; int i; long l; } -> offsets 0, 4, 8; size 16
        let ty = IrType::Struct { fields: Rc::new(vec![IR_TY_I8, IR_TY_I32, IR_TY_I64]) };
        let info = type_info(&X86_64_LINUX, &ty);
        assert_eq!(info.offsets.as_deref(), Some(&[0, 4, 8][..]));
        assert_eq!(info.size, 16);
        assert_eq!(info.align, 8);
    }

    #[test]
    fn tail_padding() {
        // struct { long l; char c; } -> size rounds up to 16
        let ty = IrType::Struct { fields: Rc::new(vec![IR_TY_I64, IR_TY_I8]) };
        let info = type_info(&X86_64_LINUX, &ty);
        assert_eq!(info.size, 16);
    }

    #[test]
    fn union_layout() {
        let ty = IrType::Union { fields: Rc::new(vec![IR_TY_I8, IR_TY_I64]) };
        let info = type_info(&X86_64_LINUX, &ty);
        assert_eq!(info.size, 8);
        assert_eq!(info.align, 8);
    }

    #[test]
    fn pointer_size_follows_target() {
        assert_eq!(type_info(&X86_64_LINUX, &IR_TY_POINTER).size, 8);
        assert_eq!(type_info(&RV32I_LINUX, &IR_TY_POINTER).size, 4);
        assert_eq!(IrType::pointer_primitive(&RV32I_LINUX), Primitive::I32);
    }

    #[test]
    fn integer_primitive_width_order() {
        assert!(Primitive::I8 < Primitive::I32);
        assert!(Primitive::I32 < Primitive::I64);
    }

    #[test]
    fn array_layout() {
        let ty = IrType::array(IR_TY_I32, 10);
        let info = type_info(&X86_64_LINUX, &ty);
        assert_eq!(info.size, 40);
        assert_eq!(info.align, 4);
    }
}
