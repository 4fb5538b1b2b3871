//! The IR interpreter driver.
//!
//! Executes a built unit directly, starting at `main` (or a named
//! entrypoint), and yields the process exit code. One flat byte-addressed
//! memory holds globals and stack frames; function "addresses" are tagged
//! values resolved back to their global on call.
//!
//! The interpreter is deliberately host-free: calls to undefined externs
//! are runtime errors rather than FFI.

use rustc_hash::FxHashMap;

use crate::ir::ir::*;
use crate::ir::ty::{IrType, Primitive};

/// Function addresses are tagged so data pointers and function pointers
/// share one value representation.
const FUNC_TAG: u64 = 1 << 48;

/// Per-frame slot alignment; keeps every local suitably aligned without
/// consulting each type.
const SLOT_ALIGN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum InterpError {
    #[error("no entrypoint '{0}' in unit")]
    NoEntrypoint(String),

    #[error("call to undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("indirect call through non-function value")]
    BadFunctionPointer,

    #[error("memory access out of bounds at address {0:#x}")]
    OutOfBounds(u64),

    #[error("division by zero")]
    DivideByZero,

    #[error("interpreter limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

type Result<T> = std::result::Result<T, InterpError>;

/// A runtime value: raw integer/pointer bits, a float, or aggregate bytes.
#[derive(Debug, Clone)]
enum Value {
    Int(u64),
    Flt(f64),
    Bytes(Vec<u8>),
    /// Produced by valueless ops; reading one is a builder bug.
    Unit,
}

impl Value {
    fn as_int(&self) -> u64 {
        match self {
            Value::Int(v) => *v,
            Value::Flt(v) => *v as u64,
            _ => panic!("aggregate used as scalar"),
        }
    }

    fn as_flt(&self) -> f64 {
        match self {
            Value::Flt(v) => *v,
            Value::Int(v) => *v as f64,
            _ => panic!("aggregate used as scalar"),
        }
    }
}

pub struct Interp<'u> {
    unit: &'u Unit,
    memory: Vec<u8>,
    /// Base address of each data global's storage.
    global_addrs: FxHashMap<GlobalId, u64>,
    /// Stack pointer for frame allocation.
    stack_top: usize,
    /// Cooperative recursion bound.
    depth: usize,
}

/// Result of executing a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecInfo {
    pub exit_code: i32,
}

impl<'u> Interp<'u> {
    pub fn new(unit: &'u Unit) -> Result<Interp<'u>> {
        let mut interp = Interp {
            unit,
            // address 0 stays unmapped so null pointers fault
            memory: vec![0u8; 64],
            global_addrs: FxHashMap::default(),
            stack_top: 0,
            depth: 0,
        };
        interp.layout_globals()?;
        interp.stack_top = interp.memory.len();
        // a few MiB of stack is plenty for interpreted programs
        interp.memory.resize(interp.memory.len() + (8 << 20), 0);
        Ok(interp)
    }

    /// Run `entrypoint` with no arguments and return its exit code.
    pub fn exec(&mut self, entrypoint: &str) -> Result<ExecInfo> {
        let unit = self.unit;
        let func = unit
            .func_by_name(entrypoint)
            .ok_or_else(|| InterpError::NoEntrypoint(entrypoint.to_string()))?;
        let ret = self.call_func(func, &[])?;
        let exit_code = match ret {
            Some(value) => value.as_int() as i32,
            None => 0,
        };
        Ok(ExecInfo { exit_code })
    }

    // ── global layout ────────────────────────────────────────────────────────

    fn layout_globals(&mut self) -> Result<()> {
        // storage first, so cross-references resolve when values are written
        for global in self.unit.globals.iter() {
            if global.kind != GlobalKind::Data || global.def != DefState::Defined {
                continue;
            }
            let info = self.unit.type_info(&global.ty);
            let addr = align_up(self.memory.len(), info.align.max(1));
            self.memory.resize(addr + info.size.max(1), 0);
            self.global_addrs.insert(global.id, addr as u64);
        }

        for global in self.unit.globals.iter() {
            let Some(&addr) = self.global_addrs.get(&global.id) else {
                continue;
            };
            if let Some(var) = &global.var {
                let ty = global.ty.clone();
                self.write_global_value(addr, &ty, &var.value)?;
            }
        }
        Ok(())
    }

    fn global_addr(&self, glb: GlobalId) -> u64 {
        let global = self.unit.global(glb);
        match global.kind {
            GlobalKind::Func => FUNC_TAG | glb.0 as u64,
            GlobalKind::Data => *self
                .global_addrs
                .get(&glb)
                .unwrap_or_else(|| panic!("address of undefined global '{:?}'", global.name)),
        }
    }

    fn write_global_value(&mut self, addr: u64, ty: &IrType, value: &GlobalValue) -> Result<()> {
        match value {
            GlobalValue::Zero => Ok(()),
            GlobalValue::Int { ty, value } => {
                let size = self.unit.type_info(ty).size.max(1);
                self.store_int(addr, size, *value)
            }
            GlobalValue::Flt { ty, value } => match ty {
                IrType::Primitive(Primitive::F32) => {
                    self.store_int(addr, 4, (*value as f32).to_bits() as u64)
                }
                _ => self.store_int(addr, 8, value.to_bits()),
            },
            GlobalValue::Str(StrValue::Ascii(bytes)) => {
                for (i, b) in bytes.iter().enumerate() {
                    self.store_int(addr + i as u64, 1, *b as u64)?;
                }
                self.store_int(addr + bytes.len() as u64, 1, 0)
            }
            GlobalValue::Str(StrValue::Wide(chars)) => {
                for (i, c) in chars.iter().enumerate() {
                    self.store_int(addr + 4 * i as u64, 4, *c as u64)?;
                }
                self.store_int(addr + 4 * chars.len() as u64, 4, 0)
            }
            GlobalValue::Addr { glb, offset } => {
                let target = self.global_addr(*glb) + offset;
                let ptr_size = self.unit.target.pointer_size();
                self.store_int(addr, ptr_size, target)
            }
            GlobalValue::List { elements } => {
                for (offset, element) in elements {
                    self.write_global_value(addr + *offset as u64, ty, element)?;
                }
                Ok(())
            }
        }
    }

    // ── memory ───────────────────────────────────────────────────────────────

    fn check(&self, addr: u64, len: usize) -> Result<usize> {
        let addr = addr as usize;
        if addr == 0 || addr.checked_add(len).map_or(true, |end| end > self.memory.len()) {
            return Err(InterpError::OutOfBounds(addr as u64));
        }
        Ok(addr)
    }

    fn load_int(&self, addr: u64, size: usize) -> Result<u64> {
        let addr = self.check(addr, size)?;
        let mut out = 0u64;
        for i in (0..size.min(8)).rev() {
            out = (out << 8) | self.memory[addr + i] as u64;
        }
        Ok(out)
    }

    fn store_int(&mut self, addr: u64, size: usize, value: u64) -> Result<()> {
        let addr = self.check(addr, size)?;
        for i in 0..size.min(8) {
            self.memory[addr + i] = (value >> (8 * i)) as u8;
        }
        // wider-than-8 stores (i128) zero-fill the upper half
        for i in 8..size {
            self.memory[addr + i] = 0;
        }
        Ok(())
    }

    fn load_value(&self, addr: u64, ty: &IrType) -> Result<Value> {
        match ty {
            IrType::Primitive(Primitive::F16) => {
                panic!("_Float16 values are not supported by the interpreter")
            }
            IrType::Primitive(Primitive::F32) => {
                Ok(Value::Flt(f32::from_bits(self.load_int(addr, 4)? as u32) as f64))
            }
            IrType::Primitive(Primitive::F64) => {
                Ok(Value::Flt(f64::from_bits(self.load_int(addr, 8)?)))
            }
            IrType::Struct { .. } | IrType::Union { .. } | IrType::Array { .. } => {
                let size = self.unit.type_info(ty).size;
                let addr = self.check(addr, size)?;
                Ok(Value::Bytes(self.memory[addr..addr + size].to_vec()))
            }
            _ => {
                let size = self.unit.type_info(ty).size.max(1);
                Ok(Value::Int(self.load_int(addr, size)?))
            }
        }
    }

    fn store_value(&mut self, addr: u64, ty: &IrType, value: &Value) -> Result<()> {
        match value {
            Value::Bytes(bytes) => {
                let addr = self.check(addr, bytes.len())?;
                self.memory[addr..addr + bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            Value::Flt(f) => match ty {
                IrType::Primitive(Primitive::F32) => {
                    self.store_int(addr, 4, (*f as f32).to_bits() as u64)
                }
                _ => self.store_int(addr, 8, f.to_bits()),
            },
            Value::Int(v) => {
                let size = self.unit.type_info(ty).size.max(1);
                self.store_int(addr, size, *v)
            }
            Value::Unit => panic!("storing a valueless op"),
        }
    }

    // ── frames ───────────────────────────────────────────────────────────────

    fn call_func(&mut self, func: &'u Func, args: &[Value]) -> Result<Option<Value>> {
        self.depth += 1;
        if self.depth > 4096 {
            return Err(InterpError::LimitExceeded("call depth"));
        }

        // lay the frame's locals out at the current stack top
        let frame_base = align_up(self.stack_top, SLOT_ALIGN);
        let mut local_addrs = Vec::with_capacity(func.locals.len());
        let mut offset = frame_base;
        for local in func.locals.iter() {
            let info = self.unit.type_info(&local.ty);
            offset = align_up(offset, info.align.max(1).max(8));
            local_addrs.push(offset as u64);
            offset += info.size.max(1);
        }
        let frame_end = align_up(offset, SLOT_ALIGN);
        if frame_end > self.memory.len() {
            return Err(InterpError::LimitExceeded("stack"));
        }
        let saved_stack = self.stack_top;
        self.stack_top = frame_end;

        let result = self.run_body(func, args, &local_addrs);

        self.stack_top = saved_stack;
        self.depth -= 1;
        result
    }

    fn run_body(
        &mut self,
        func: &'u Func,
        args: &[Value],
        local_addrs: &[u64],
    ) -> Result<Option<Value>> {
        let mut values: Vec<Option<Value>> = vec![None; func.ops.len()];

        // variadic tail beyond the named parameters
        let named = func.sig.params.iter().filter(|p| **p != IrType::Variadic).count();
        let varargs: Vec<Value> = args.iter().skip(named).cloned().collect();

        // bind parameters: the entry block's params statement materialises
        // them in declaration order
        let mut next_arg = 0usize;
        let entry = func.entry_block();
        for &stmt in &func.block(entry).stmts {
            if !func.stmt(stmt).flags.contains(StmtFlags::PARAMS) {
                continue;
            }
            for &op_id in &func.stmt(stmt).ops {
                let op = func.op(op_id);
                if !op.flags.contains(OpFlags::PARAM) {
                    continue;
                }
                let arg = args.get(next_arg).cloned().unwrap_or(Value::Int(0));
                next_arg += 1;
                match &op.kind {
                    OpKind::Mov { value: None } => {
                        values[op_id.0 as usize] = Some(arg);
                    }
                    OpKind::Addr(AddrTarget::Local(lcl)) => {
                        // aggregate parameter: copy the bytes into its slot
                        let addr = local_addrs[lcl.0 as usize];
                        let ty = func.local(*lcl).ty.clone();
                        self.store_value(addr, &ty, &arg)?;
                        values[op_id.0 as usize] = Some(Value::Int(addr));
                    }
                    other => panic!("unexpected param op {:?}", other),
                }
            }
        }

        let mut block = entry;
        let mut prev_block: Option<BlockId> = None;
        let mut steps = 0u64;

        'blocks: loop {
            steps += 1;
            if steps > 100_000_000 {
                return Err(InterpError::LimitExceeded("steps"));
            }

            // phis read their predecessor's values before anything else in
            // the block executes
            let mut phi_updates: Vec<(OpId, Value)> = Vec::new();
            for &stmt in &func.block(block).stmts {
                for &op_id in &func.stmt(stmt).ops {
                    let op = func.op(op_id);
                    if let OpKind::Phi { entries } = &op.kind {
                        let pred = prev_block.expect("phi in entry block");
                        let entry = entries
                            .iter()
                            .find(|e| e.pred == pred)
                            .unwrap_or_else(|| panic!("phi {} missing entry for {}", op_id, pred));
                        let value = values[entry.value.0 as usize]
                            .clone()
                            .expect("phi operand not yet evaluated");
                        phi_updates.push((op_id, value));
                    }
                }
            }
            for (op_id, value) in phi_updates {
                values[op_id.0 as usize] = Some(value);
            }

            for &stmt in &func.block(block).stmts {
                for &op_id in &func.stmt(stmt).ops {
                    let op = func.op(op_id);
                    match &op.kind {
                        OpKind::Phi { .. } => {}
                        OpKind::Mov { value: None } => {} // param, already bound
                        OpKind::Ret { value } => {
                            let ret = match value {
                                Some(v) => Some(
                                    values[v.0 as usize].clone().expect("return of unevaluated op"),
                                ),
                                None => None,
                            };
                            return Ok(ret);
                        }
                        OpKind::Br | OpKind::BrCond { .. } | OpKind::BrSwitch { .. } => {
                            let next = self.branch_target(func, block, &op.kind, &values)?;
                            prev_block = Some(block);
                            block = next;
                            continue 'blocks;
                        }
                        _ => {
                            let value =
                                self.eval_op(func, op, &mut values, local_addrs, &varargs)?;
                            values[op_id.0 as usize] = Some(value);
                        }
                    }
                }
            }

            // fall off the end of a block without a branch op: follow the
            // recorded terminator (merge blocks synthesised by fix-ups)
            match &func.block(block).term {
                Terminator::Merge { target } => {
                    prev_block = Some(block);
                    block = *target;
                }
                Terminator::Ret => return Ok(None),
                other => panic!("block {} ended without terminator: {:?}", block, other),
            }
        }
    }

    fn branch_target(
        &self,
        func: &Func,
        block: BlockId,
        kind: &OpKind,
        values: &[Option<Value>],
    ) -> Result<BlockId> {
        let term = &func.block(block).term;
        Ok(match (kind, term) {
            (OpKind::Br, Terminator::Merge { target }) => *target,
            (OpKind::BrCond { cond }, Terminator::Split { true_target, false_target }) => {
                let cond = values[cond.0 as usize].as_ref().expect("unevaluated condition");
                let taken = match cond {
                    Value::Flt(f) => *f != 0.0,
                    other => other.as_int() != 0,
                };
                if taken {
                    *true_target
                } else {
                    *false_target
                }
            }
            (OpKind::BrSwitch { value }, Terminator::Switch { cases, default }) => {
                let v = values[value.0 as usize].as_ref().expect("unevaluated switch value").as_int();
                cases
                    .iter()
                    .find(|case| case.value as u64 == v)
                    .map(|case| case.target)
                    .unwrap_or(*default)
            }
            (kind, term) => panic!("terminator mismatch: {:?} in block with {:?}", kind, term),
        })
    }

    fn eval_op(
        &mut self,
        func: &'u Func,
        op: &'u Op,
        values: &mut [Option<Value>],
        local_addrs: &[u64],
        varargs: &[Value],
    ) -> Result<Value> {
        let val = |id: OpId| -> Value {
            values[id.0 as usize].clone().unwrap_or_else(|| panic!("use of unevaluated op {}", id))
        };

        Ok(match &op.kind {
            OpKind::Undef => Value::Int(0),
            // constants are normalised to their type's width so later
            // width-aware comparisons see consistent bit patterns
            OpKind::CnstInt(v) => Value::Int(truncate(*v, self.width_of(&op.ty))),
            OpKind::CnstFlt(v) => Value::Flt(*v),
            OpKind::Addr(AddrTarget::Local(lcl)) => Value::Int(local_addrs[lcl.0 as usize]),
            OpKind::Addr(AddrTarget::Global(glb)) => Value::Int(self.global_addr(*glb)),
            OpKind::AddrOffset { base, index, scale, offset } => {
                let mut addr = val(*base).as_int();
                if let Some(index) = index {
                    addr = addr.wrapping_add(val(*index).as_int().wrapping_mul(*scale));
                }
                Value::Int(addr.wrapping_add(*offset))
            }
            OpKind::Load { src } => {
                let addr = self.mem_loc_addr(src, local_addrs, values);
                self.load_value(addr, &op.ty)?
            }
            OpKind::Store { dst, value } => {
                let addr = self.mem_loc_addr(dst, local_addrs, values);
                let ty = func.op(*value).ty.clone();
                let v = val(*value);
                self.store_value(addr, &ty, &v)?;
                Value::Unit
            }
            OpKind::LoadBitfield { addr, bitfield } => {
                let size = self.unit.type_info(&op.ty).size.max(1);
                let word = self.load_int(val(*addr).as_int(), size)?;
                let mask = mask_of(bitfield.width);
                Value::Int((word >> bitfield.offset) & mask)
            }
            OpKind::StoreBitfield { addr, value, bitfield } => {
                let ty = func.op(*value).ty.clone();
                let size = self.unit.type_info(&ty).size.max(1);
                let addr = val(*addr).as_int();
                let mask = mask_of(bitfield.width);
                let old = self.load_int(addr, size)?;
                let new = (old & !(mask << bitfield.offset))
                    | ((val(*value).as_int() & mask) << bitfield.offset);
                self.store_int(addr, size, new)?;
                Value::Unit
            }
            OpKind::Unary { op: unary, value } => {
                let operand_ty = func.op(*value).ty.clone();
                self.eval_unary(*unary, &op.ty, &operand_ty, val(*value))?
            }
            OpKind::Binary { op: binary, lhs, rhs } => {
                let operand_width = self.width_of(&func.op(*lhs).ty);
                self.eval_binary(*binary, &op.ty, operand_width, val(*lhs), val(*rhs))?
            }
            OpKind::Cast { op: cast, value } => {
                let from_ty = &func.op(*value).ty;
                self.eval_cast(*cast, from_ty, &op.ty, val(*value))
            }
            OpKind::Call { target, args, .. } => {
                let callee = val(*target).as_int();
                if callee & FUNC_TAG == 0 {
                    return Err(InterpError::BadFunctionPointer);
                }
                let glb = GlobalId((callee & !FUNC_TAG) as u32);
                let unit = self.unit;
                let global = unit.global(glb);
                let Some(idx) = global.func else {
                    return Err(InterpError::UndefinedFunction(
                        global.name.clone().unwrap_or_default(),
                    ));
                };
                let arg_values: Vec<Value> = args.iter().map(|&a| val(a)).collect();
                match self.call_func(&unit.funcs[idx], &arg_values)? {
                    Some(v) => v,
                    None => Value::Unit,
                }
            }
            OpKind::Mov { value: Some(value) } => val(*value),
            OpKind::Mov { value: None } => Value::Int(0),
            OpKind::MemSet { addr, value, len } => {
                let base = val(*addr).as_int();
                let fill = val(*value).as_int() as u8;
                let len = val(*len).as_int() as usize;
                let start = self.check(base, len)?;
                self.memory[start..start + len].fill(fill);
                Value::Unit
            }
            OpKind::MemCopy { dst, src, len } | OpKind::MemMove { dst, src, len } => {
                let len = val(*len).as_int() as usize;
                let src = self.check(val(*src).as_int(), len)?;
                let dst = self.check(val(*dst).as_int(), len)?;
                self.memory.copy_within(src..src + len, dst);
                Value::Unit
            }
            OpKind::MemCmp { lhs, rhs, len } => {
                let len = val(*len).as_int() as usize;
                let lhs = self.check(val(*lhs).as_int(), len)?;
                let rhs = self.check(val(*rhs).as_int(), len)?;
                let a = &self.memory[lhs..lhs + len];
                let b = &self.memory[rhs..rhs + len];
                Value::Int(match a.cmp(b) {
                    std::cmp::Ordering::Less => -1i64 as u64,
                    std::cmp::Ordering::Equal => 0,
                    std::cmp::Ordering::Greater => 1,
                })
            }
            OpKind::VaStart { list_addr } => {
                // the va_list object holds the cursor itself, so a bitwise
                // va_copy copies the position too
                let addr = val(*list_addr).as_int();
                self.store_int(addr, 8, 0)?;
                Value::Unit
            }
            OpKind::VaArg { list_addr, arg_ty } => {
                let list = val(*list_addr).as_int();
                let cursor = self.load_int(list, 8)? as usize;
                let value = varargs.get(cursor).cloned().unwrap_or(Value::Int(0));
                self.store_int(list, 8, cursor as u64 + 1)?;
                let _ = arg_ty;
                value
            }
            OpKind::Ret { .. } | OpKind::Br | OpKind::BrCond { .. } | OpKind::BrSwitch { .. }
            | OpKind::Phi { .. } => {
                unreachable!("control ops handled by the block loop")
            }
        })
    }

    fn mem_loc_addr(&self, loc: &MemLoc, local_addrs: &[u64], values: &[Option<Value>]) -> u64 {
        match loc {
            MemLoc::Local(lcl) => local_addrs[lcl.0 as usize],
            MemLoc::Global(glb) => self.global_addr(*glb),
            MemLoc::Addr(op) => values[op.0 as usize]
                .as_ref()
                .expect("address not yet evaluated")
                .as_int(),
        }
    }

    fn width_of(&self, ty: &IrType) -> usize {
        self.unit.type_info(ty).size.max(1) * 8
    }

    fn eval_unary(
        &self,
        op: UnaryOp,
        result_ty: &IrType,
        operand_ty: &IrType,
        value: Value,
    ) -> Result<Value> {
        let width = self.width_of(result_ty);
        let operand_width = self.width_of(operand_ty);
        Ok(match op {
            UnaryOp::Neg => Value::Int(truncate(value.as_int().wrapping_neg(), width)),
            UnaryOp::FNeg => Value::Flt(-value.as_flt()),
            UnaryOp::Not => Value::Int(truncate(!value.as_int(), width)),
            UnaryOp::LogicalNot => {
                let zero = match value {
                    Value::Flt(f) => f == 0.0,
                    other => other.as_int() == 0,
                };
                Value::Int(zero as u64)
            }
            UnaryOp::Fabs => Value::Flt(value.as_flt().abs()),
            UnaryOp::Fsqrt => Value::Flt(value.as_flt().sqrt()),
            UnaryOp::Popcount => Value::Int(value.as_int().count_ones() as u64),
            UnaryOp::Clz => {
                let v = value.as_int();
                let lz = v.leading_zeros() as usize;
                Value::Int(lz.saturating_sub(64 - operand_width) as u64)
            }
            UnaryOp::Ctz => {
                let v = value.as_int();
                let tz = (v.trailing_zeros() as usize).min(operand_width);
                Value::Int(tz as u64)
            }
            UnaryOp::Rev => {
                let size = operand_width / 8;
                let swapped = value.as_int().swap_bytes() >> (64 - size * 8);
                Value::Int(swapped)
            }
        })
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        result_ty: &IrType,
        operand_width: usize,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        use BinaryOp::*;

        let width = self.width_of(result_ty);

        let fl = lhs.as_flt();
        let fr = rhs.as_flt();
        if matches!(op, FAdd | FSub | FMul | FDiv | FEq | FNe | FGt | FGe | FLt | FLe) {
            return Ok(match op {
                FAdd => Value::Flt(fl + fr),
                FSub => Value::Flt(fl - fr),
                FMul => Value::Flt(fl * fr),
                FDiv => Value::Flt(fl / fr),
                FEq => Value::Int((fl == fr) as u64),
                FNe => Value::Int((fl != fr) as u64),
                FGt => Value::Int((fl > fr) as u64),
                FGe => Value::Int((fl >= fr) as u64),
                FLt => Value::Int((fl < fr) as u64),
                FLe => Value::Int((fl <= fr) as u64),
                _ => unreachable!(),
            });
        }

        let l = lhs.as_int();
        let r = rhs.as_int();
        // signed views at the operands' width; results narrow to the
        // consumer's width
        let sl = sext(l, operand_width) as i64;
        let sr = sext(r, operand_width) as i64;

        let out = match op {
            Add => truncate(l.wrapping_add(r), width),
            Sub => truncate(l.wrapping_sub(r), width),
            Mul => truncate(l.wrapping_mul(r), width),
            SDiv => {
                if r == 0 {
                    return Err(InterpError::DivideByZero);
                }
                truncate((sl.wrapping_div(sr)) as u64, width)
            }
            UDiv => {
                if r == 0 {
                    return Err(InterpError::DivideByZero);
                }
                truncate(l / r, width)
            }
            SMod => {
                if r == 0 {
                    return Err(InterpError::DivideByZero);
                }
                truncate((sl.wrapping_rem(sr)) as u64, width)
            }
            UMod => {
                if r == 0 {
                    return Err(InterpError::DivideByZero);
                }
                truncate(l % r, width)
            }
            And => l & r,
            Or => l | r,
            Xor => l ^ r,
            Shl => truncate(l.wrapping_shl(r as u32), width),
            SShr => truncate((sl >> (r as u32).min(63)) as u64, width),
            UShr => l.wrapping_shr(r as u32),
            Eq => (l == r) as u64,
            Ne => (l != r) as u64,
            Sgt => (sl > sr) as u64,
            Sge => (sl >= sr) as u64,
            Slt => (sl < sr) as u64,
            Sle => (sl <= sr) as u64,
            Ugt => (l > r) as u64,
            Uge => (l >= r) as u64,
            Ult => (l < r) as u64,
            Ule => (l <= r) as u64,
            _ => unreachable!(),
        };
        Ok(Value::Int(out))
    }

    fn eval_cast(&self, op: CastOp, from_ty: &IrType, to_ty: &IrType, value: Value) -> Value {
        let to_width = self.unit.type_info(to_ty).size.max(1) * 8;
        match op {
            CastOp::Trunc => Value::Int(truncate(value.as_int(), to_width)),
            CastOp::Zext => {
                let from_width = self.unit.type_info(from_ty).size.max(1) * 8;
                Value::Int(truncate(value.as_int(), from_width))
            }
            CastOp::Sext => {
                let from_width = self.unit.type_info(from_ty).size.max(1) * 8;
                Value::Int(truncate(sext(value.as_int(), from_width), to_width))
            }
            CastOp::FConv => Value::Flt(match to_ty {
                IrType::Primitive(Primitive::F32) => value.as_flt() as f32 as f64,
                _ => value.as_flt(),
            }),
            CastOp::SConv => {
                if to_ty.is_fp() {
                    let from_width = self.unit.type_info(from_ty).size.max(1) * 8;
                    Value::Flt(sext(value.as_int(), from_width) as i64 as f64)
                } else {
                    Value::Int(truncate(value.as_flt() as i64 as u64, to_width))
                }
            }
            CastOp::UConv => {
                if to_ty.is_fp() {
                    Value::Flt(value.as_int() as f64)
                } else {
                    Value::Int(truncate(value.as_flt() as u64, to_width))
                }
            }
        }
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

fn mask_of(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Keep the low `width` bits.
fn truncate(value: u64, width: usize) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    }
}

/// Sign-extend the low `width` bits to 64.
fn sext(value: u64, width: usize) -> u64 {
    if width >= 64 {
        return value;
    }
    let shift = 64 - width;
    (((value << shift) as i64) >> shift) as u64
}

/// Convenience used by the driver: build-and-run one unit.
pub fn exec_unit(unit: &Unit, entrypoint: &str) -> Result<ExecInfo> {
    Interp::new(unit)?.exec(entrypoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::target::X86_64_LINUX;
    use crate::ir::ty::{FuncTyFlags, IrFuncTy, IR_TY_I32, IR_TY_NONE};

    #[test]
    fn width_helpers() {
        assert_eq!(truncate(0x1_ffff_ffff, 32), 0xffff_ffff);
        assert_eq!(truncate(0xff, 64), 0xff);
        assert_eq!(sext(0x80, 8), 0xffff_ffff_ffff_ff80);
        assert_eq!(sext(0x7f, 8), 0x7f);
        assert_eq!(mask_of(3), 0b111);
        assert_eq!(mask_of(64), u64::MAX);
    }

    #[test]
    fn executes_hand_built_unit() {
        // main: %0 = cnst 40; %1 = cnst 2; %2 = add; ret %2
        let mut unit = Unit::new(X86_64_LINUX);
        let mut func = Func::new(
            "main".to_string(),
            IrFuncTy { ret: IR_TY_I32, params: vec![], flags: FuncTyFlags::empty() },
        );
        let entry = func.alloc_block();
        let stmt = func.alloc_stmt(entry);
        let a = func.append_op(stmt, OpKind::CnstInt(40), IR_TY_I32);
        let b = func.append_op(stmt, OpKind::CnstInt(2), IR_TY_I32);
        let sum = func.append_op(
            stmt,
            OpKind::Binary { op: BinaryOp::Add, lhs: a, rhs: b },
            IR_TY_I32,
        );
        func.append_op(stmt, OpKind::Ret { value: Some(sum) }, IR_TY_NONE);
        func.make_ret(entry);

        let glb = unit.add_global(
            GlobalKind::Func,
            crate::ir::ty::IrType::func(IR_TY_I32, vec![], false),
            DefState::Defined,
            Some("main".to_string()),
        );
        unit.funcs.push(func);
        unit.global_mut(glb).func = Some(0);

        assert_eq!(exec_unit(&unit, "main").unwrap().exit_code, 42);
    }

    #[test]
    fn signed_comparison_is_width_aware() {
        // i32 -1 < 0 must hold even though the raw bits are large unsigned
        let mut unit = Unit::new(X86_64_LINUX);
        let mut func = Func::new(
            "main".to_string(),
            IrFuncTy { ret: IR_TY_I32, params: vec![], flags: FuncTyFlags::empty() },
        );
        let entry = func.alloc_block();
        let stmt = func.alloc_stmt(entry);
        let minus_one = func.append_op(stmt, OpKind::CnstInt((-1i64) as u64), IR_TY_I32);
        let zero = func.append_op(stmt, OpKind::CnstInt(0), IR_TY_I32);
        let cmp = func.append_op(
            stmt,
            OpKind::Binary { op: BinaryOp::Slt, lhs: minus_one, rhs: zero },
            IR_TY_I32,
        );
        func.append_op(stmt, OpKind::Ret { value: Some(cmp) }, IR_TY_NONE);
        func.make_ret(entry);

        let glb = unit.add_global(
            GlobalKind::Func,
            crate::ir::ty::IrType::func(IR_TY_I32, vec![], false),
            DefState::Defined,
            Some("main".to_string()),
        );
        unit.funcs.push(func);
        unit.global_mut(glb).func = Some(0);

        assert_eq!(exec_unit(&unit, "main").unwrap().exit_code, 1);
    }
}
