//! Textual IR dump, for debugging and test assertions.

use std::fmt::Write;

use crate::ir::ir::*;
use crate::ir::ty::IrType;

fn fmt_ty(ty: &IrType) -> String {
    match ty {
        IrType::None => "none".to_string(),
        IrType::Variadic => "...".to_string(),
        IrType::Primitive(p) => format!("{:?}", p).to_lowercase(),
        IrType::Pointer => "ptr".to_string(),
        IrType::Array { elem, len } => format!("[{} x {}]", len, fmt_ty(elem)),
        IrType::Func(f) => {
            let params: Vec<String> = f.params.iter().map(fmt_ty).collect();
            format!("fn({}) -> {}", params.join(", "), fmt_ty(&f.ret))
        }
        IrType::Struct { fields } => {
            let fields: Vec<String> = fields.iter().map(fmt_ty).collect();
            format!("struct {{ {} }}", fields.join(", "))
        }
        IrType::Union { fields } => {
            let fields: Vec<String> = fields.iter().map(fmt_ty).collect();
            format!("union {{ {} }}", fields.join(", "))
        }
    }
}

fn fmt_mem_loc(loc: &MemLoc) -> String {
    match loc {
        MemLoc::Local(l) => format!("LCL({})", l.0),
        MemLoc::Global(g) => format!("GLB({})", g.0),
        MemLoc::Addr(op) => format!("[{}]", op),
    }
}

fn fmt_op(op: &Op) -> String {
    let body = match &op.kind {
        OpKind::Undef => "undf".to_string(),
        OpKind::CnstInt(v) => format!("cnst {}", *v as i64),
        OpKind::CnstFlt(v) => format!("cnst {}", v),
        OpKind::Addr(AddrTarget::Local(l)) => format!("addr LCL({})", l.0),
        OpKind::Addr(AddrTarget::Global(g)) => format!("addr GLB({})", g.0),
        OpKind::AddrOffset { base, index, scale, offset } => {
            let mut s = format!("addr.off {}", base);
            if let Some(index) = index {
                write!(s, " + {} * {}", index, scale).unwrap();
            }
            if *offset != 0 {
                write!(s, " + {}", offset).unwrap();
            }
            s
        }
        OpKind::Load { src } => format!("load {}", fmt_mem_loc(src)),
        OpKind::Store { dst, value } => format!("store {}, {}", fmt_mem_loc(dst), value),
        OpKind::LoadBitfield { addr, bitfield } => {
            format!("load.bf [{}] #({}, {})", addr, bitfield.offset, bitfield.width)
        }
        OpKind::StoreBitfield { addr, value, bitfield } => {
            format!("store.bf [{}], {} #({}, {})", addr, value, bitfield.offset, bitfield.width)
        }
        OpKind::Unary { op, value } => format!("{:?} {}", op, value).to_lowercase(),
        OpKind::Binary { op, lhs, rhs } => format!("{:?} {}, {}", op, lhs, rhs).to_lowercase(),
        OpKind::Cast { op, value } => format!("{:?} {}", op, value).to_lowercase(),
        OpKind::Call { target, args, .. } => {
            let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            format!("call {} ({})", target, args.join(", "))
        }
        OpKind::Br => "br".to_string(),
        OpKind::BrCond { cond } => format!("br.cond {}", cond),
        OpKind::BrSwitch { value } => format!("br.switch {}", value),
        OpKind::Phi { entries } => {
            let entries: Vec<String> =
                entries.iter().map(|e| format!("[{}: {}]", e.pred, e.value)).collect();
            format!("phi {}", entries.join(", "))
        }
        OpKind::Mov { value: Some(v) } => format!("mov {}", v),
        OpKind::Mov { value: None } => "mov <param>".to_string(),
        OpKind::MemSet { addr, value, len } => format!("mem.set [{}], {}, {}", addr, value, len),
        OpKind::MemCopy { dst, src, len } => format!("mem.copy [{}], [{}], {}", dst, src, len),
        OpKind::MemMove { dst, src, len } => format!("mem.move [{}], [{}], {}", dst, src, len),
        OpKind::MemCmp { lhs, rhs, len } => format!("mem.cmp [{}], [{}], {}", lhs, rhs, len),
        OpKind::VaStart { list_addr } => format!("va.start [{}]", list_addr),
        OpKind::VaArg { list_addr, .. } => format!("va.arg [{}]", list_addr),
        OpKind::Ret { value: Some(v) } => format!("ret {}", v),
        OpKind::Ret { value: None } => "ret".to_string(),
    };

    let mut line = format!("  {}: {} = {}", op.id, fmt_ty(&op.ty), body);
    if op.flags.contains(OpFlags::PARAM) {
        line.push_str(" (param)");
    }
    if op.flags.contains(OpFlags::VARIADIC_ARG) {
        line.push_str(" (variadic)");
    }
    line
}

fn fmt_term(term: &Terminator) -> String {
    match term {
        Terminator::None => "<none>".to_string(),
        Terminator::Ret => "ret".to_string(),
        Terminator::Merge { target } => format!("merge -> {}", target),
        Terminator::Split { true_target, false_target } => {
            format!("split -> {}, {}", true_target, false_target)
        }
        Terminator::Switch { cases, default } => {
            let cases: Vec<String> =
                cases.iter().map(|c| format!("{} -> {}", c.value, c.target)).collect();
            format!("switch [{}], default {}", cases.join(", "), default)
        }
    }
}

/// Render one function.
pub fn print_func(func: &Func) -> String {
    let mut out = String::new();
    let params: Vec<String> = func.sig.params.iter().map(fmt_ty).collect();
    writeln!(out, "func {} ({}) -> {}:", func.name, params.join(", "), fmt_ty(&func.sig.ret))
        .unwrap();

    for (i, local) in func.locals.iter().enumerate() {
        writeln!(out, "  LCL({}): {}", i, fmt_ty(&local.ty)).unwrap();
    }

    for &block_id in &func.block_order {
        let block = func.block(block_id);
        let preds: Vec<String> = block.preds.iter().map(|p| p.to_string()).collect();
        writeln!(out, "{}: preds [{}]", block_id, preds.join(", ")).unwrap();
        for &stmt_id in &block.stmts {
            for &op_id in &func.stmt(stmt_id).ops {
                writeln!(out, "{}", fmt_op(func.op(op_id))).unwrap();
            }
        }
        writeln!(out, "  ; {}", fmt_term(&block.term)).unwrap();
    }
    out
}

/// Render a whole unit: globals then function bodies.
pub fn print_unit(unit: &Unit) -> String {
    let mut out = String::new();
    for global in unit.globals.iter() {
        let name = global
            .name
            .clone()
            .unwrap_or_else(|| format!("<anon.{}>", global.id.0));
        writeln!(
            out,
            "glb {} : {} ({:?}, {:?}, {:?})",
            name, fmt_ty(&global.ty), global.kind, global.linkage, global.def
        )
        .unwrap();
    }
    for func in &unit.funcs {
        out.push('\n');
        out.push_str(&print_func(func));
    }
    out
}
