//! The IR data model.
//!
//! A `Unit` owns its globals and function bodies. A `Func` owns four
//! id-indexed arenas — blocks, statements, ops, locals — and a block order
//! list. All cross-references are ids; the CFG's cycles (predecessor lists,
//! branch targets, phi entries) never involve owning pointers.
//!
//! Structural invariants maintained by the constructors and mutators here:
//! every reachable block ends in exactly one terminating op; phi ops live
//! only in the leading phi/params statement of their block; predecessor
//! lists match the edges recorded in block terminators.

use smallvec::SmallVec;

use crate::common::arena::Arena;
use crate::common::target::Target;
use crate::ir::ty::{type_info, IrFuncTy, IrType, Primitive, IR_TY_NONE};

// ── Ids ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

/// Sentinel id carried by pruned (detached) basic blocks.
pub const DETACHED_BLOCK: BlockId = BlockId(u32::MAX);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

// ── Flags ─────────────────────────────────────────────────────────────────────

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpFlags: u32 {
        /// Parameter materialisation op; codegen binds it to an ABI slot.
        const PARAM = 1 << 0;
        /// Call argument in variadic position.
        const VARIADIC_ARG = 1 << 1;
        /// Value has been spilled to a local.
        const SPILLED = 1 << 2;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StmtFlags: u32 {
        /// The distinguished statement holding parameter definitions.
        const PARAMS = 1 << 0;
        /// The leading statement of a block, holding its phis.
        const PHIS = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FuncFlags: u32 {
        const MAKES_CALL = 1 << 0;
        const USES_VA_ARGS = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LocalFlags: u32 {
        /// Aggregate parameter materialised into this slot by the prologue.
        const PARAM = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GlobalFlags: u32 {
        const WEAK = 1 << 0;
    }
}

// ── Globals ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    Func,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    External,
    Internal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefState {
    Undefined,
    /// File-scope data declaration without initializer; promoted to a
    /// zero-initialised definition at end of unit if nothing stronger
    /// appears.
    Tentative,
    Defined,
}

/// How a defined data global's bytes are classified for emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Data,
    ConstData,
    /// NUL-terminated, NUL-free string that may go in a mergeable section.
    StringLiteral,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrValue {
    Ascii(Vec<u8>),
    Wide(Vec<u32>),
}

impl StrValue {
    pub fn byte_len(&self) -> usize {
        match self {
            StrValue::Ascii(bytes) => bytes.len(),
            StrValue::Wide(chars) => chars.len() * 4,
        }
    }
}

/// A constant initializer value for a data global.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalValue {
    Zero,
    Int { ty: IrType, value: u64 },
    Flt { ty: IrType, value: f64 },
    Str(StrValue),
    /// Address of another global plus a byte offset.
    Addr { glb: GlobalId, offset: u64 },
    /// Flattened (offset, value) list for aggregate initializers.
    List { elements: Vec<(usize, GlobalValue)> },
}

#[derive(Debug)]
pub struct GlobalVar {
    pub kind: DataKind,
    pub value: GlobalValue,
}

#[derive(Debug)]
pub struct Global {
    pub id: GlobalId,
    /// `None` for anonymous data (string literals, hoisted compound
    /// literals); emitters label these by id.
    pub name: Option<String>,
    pub ty: IrType,
    pub kind: GlobalKind,
    pub linkage: Linkage,
    pub def: DefState,
    pub flags: GlobalFlags,
    /// Initial value, for defined data globals.
    pub var: Option<GlobalVar>,
    /// Body index into `Unit::funcs`, for defined functions.
    pub func: Option<usize>,
}

// ── Unit ──────────────────────────────────────────────────────────────────────

/// A compilation unit: one translation unit's worth of IR.
#[derive(Debug)]
pub struct Unit {
    pub target: Target,
    pub globals: Arena<Global>,
    pub funcs: Vec<Func>,
}

impl Unit {
    pub fn new(target: Target) -> Unit {
        Unit { target, globals: Arena::new(), funcs: Vec::new() }
    }

    pub fn add_global(
        &mut self,
        kind: GlobalKind,
        ty: IrType,
        def: DefState,
        name: Option<String>,
    ) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.alloc(Global {
            id,
            name,
            ty,
            kind,
            linkage: Linkage::None,
            def,
            flags: GlobalFlags::default(),
            var: None,
            func: None,
        });
        id
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        self.globals.get(id.0)
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut Global {
        self.globals.get_mut(id.0)
    }

    pub fn type_info(&self, ty: &IrType) -> crate::ir::ty::TypeInfo {
        type_info(&self.target, ty)
    }

    /// The function body attached to a global, if any.
    pub fn func_of_global(&self, id: GlobalId) -> Option<&Func> {
        self.global(id).func.map(|idx| &self.funcs[idx])
    }

    /// Find a defined function body by symbol name.
    pub fn func_by_name(&self, name: &str) -> Option<&Func> {
        self.funcs.iter().find(|f| f.name == name)
    }
}

// ── Function bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Local {
    pub id: LocalId,
    pub ty: IrType,
    pub flags: LocalFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCase {
    pub value: i64,
    pub target: BlockId,
}

/// Block terminator record. Wired atomically with the trailing branch op by
/// `make_merge` / `make_split` / `make_switch` / `make_ret`.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Block under construction (or detached); must not survive build.
    None,
    Ret,
    Merge { target: BlockId },
    Split { true_target: BlockId, false_target: BlockId },
    Switch { cases: Vec<SwitchCase>, default: BlockId },
}

#[derive(Debug)]
pub struct Block {
    pub id: BlockId,
    pub preds: SmallVec<[BlockId; 2]>,
    pub stmts: Vec<StmtId>,
    pub term: Terminator,
}

#[derive(Debug)]
pub struct Stmt {
    pub id: StmtId,
    pub block: BlockId,
    pub flags: StmtFlags,
    pub ops: Vec<OpId>,
}

/// Where a load reads from or a store writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemLoc {
    Local(LocalId),
    Global(GlobalId),
    Addr(OpId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrTarget {
    Local(LocalId),
    Global(GlobalId),
}

/// Bit range of a bitfield member within its storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitfield {
    pub offset: u32,
    pub width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    FNeg,
    Not,
    LogicalNot,
    Fabs,
    Fsqrt,
    Popcount,
    Clz,
    Ctz,
    /// Byte reverse.
    Rev,
}

/// Binary opcodes. Integer compares and div/mod/shift are split by
/// signedness; float variants are distinct opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SMod,
    UMod,
    And,
    Or,
    Xor,
    Shl,
    SShr,
    UShr,
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
    Ugt,
    Uge,
    Ult,
    Ule,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FEq,
    FNe,
    FGt,
    FGe,
    FLt,
    FLe,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            Eq | Ne | Sgt | Sge | Slt | Sle | Ugt | Uge | Ult | Ule | FEq | FNe | FGt | FGe | FLt | FLe
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    Trunc,
    Sext,
    Zext,
    /// Float-to-float conversion.
    FConv,
    /// Signed integer ↔ float.
    SConv,
    /// Unsigned integer ↔ float.
    UConv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiEntry {
    pub pred: BlockId,
    pub value: OpId,
}

/// Builder-internal annotation carried on an op until finalisation resolves
/// it; no op reaches downstream passes with metadata still attached.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpMetadata {
    #[default]
    None,
    /// An empty phi awaiting back-patching, with the variable it reads.
    PendingPhi { name: String, scope: u32 },
    /// A branch created by `goto label`, fixed up after body build.
    GotoTarget(String),
}

/// Operation payload. This is a closed set: downstream rewriters match
/// exhaustively and the compiler flags unhandled variants.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Undef,
    CnstInt(u64),
    CnstFlt(f64),
    Addr(AddrTarget),
    /// `base + index * scale + offset`, a single node so code generators can
    /// select indexed addressing.
    AddrOffset { base: OpId, index: Option<OpId>, scale: u64, offset: u64 },
    Load { src: MemLoc },
    Store { dst: MemLoc, value: OpId },
    LoadBitfield { addr: OpId, bitfield: Bitfield },
    StoreBitfield { addr: OpId, value: OpId, bitfield: Bitfield },
    Unary { op: UnaryOp, value: OpId },
    Binary { op: BinaryOp, lhs: OpId, rhs: OpId },
    Cast { op: CastOp, value: OpId },
    Call { target: OpId, func_ty: IrType, args: Vec<OpId>, arg_tys: Vec<IrType> },
    /// Unconditional branch; target recorded in the block's `Merge` terminator.
    Br,
    /// Conditional branch; targets in the block's `Split` terminator.
    BrCond { cond: OpId },
    /// Multi-way branch; cases in the block's `Switch` terminator.
    BrSwitch { value: OpId },
    Phi { entries: SmallVec<[PhiEntry; 2]> },
    /// Value copy; with `value: None` and the PARAM flag, a parameter
    /// materialisation bound to an ABI slot by the code generator.
    Mov { value: Option<OpId> },
    MemSet { addr: OpId, value: OpId, len: OpId },
    MemCopy { dst: OpId, src: OpId, len: OpId },
    MemMove { dst: OpId, src: OpId, len: OpId },
    MemCmp { lhs: OpId, rhs: OpId, len: OpId },
    VaStart { list_addr: OpId },
    VaArg { list_addr: OpId, arg_ty: IrType },
    Ret { value: Option<OpId> },
}

impl OpKind {
    /// True for ops that end a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(self, OpKind::Br | OpKind::BrCond { .. } | OpKind::BrSwitch { .. } | OpKind::Ret { .. })
    }
}

#[derive(Debug)]
pub struct Op {
    pub id: OpId,
    pub ty: IrType,
    pub flags: OpFlags,
    pub stmt: StmtId,
    pub kind: OpKind,
    pub metadata: OpMetadata,
}

impl Op {
    /// Whether this op defines a value other ops may use.
    pub fn produces_value(&self) -> bool {
        !self.ty.is_none()
    }
}

/// A function under construction or built.
#[derive(Debug)]
pub struct Func {
    pub name: String,
    pub sig: IrFuncTy,
    pub flags: FuncFlags,
    pub blocks: Arena<Block>,
    pub stmts: Arena<Stmt>,
    pub ops: Arena<Op>,
    pub locals: Arena<Local>,
    /// Layout order of live blocks. Pruning removes entries here and marks
    /// the arena slot detached; arena storage is never reclaimed early.
    pub block_order: Vec<BlockId>,
}

impl Func {
    pub fn new(name: String, sig: IrFuncTy) -> Func {
        Func {
            name,
            sig,
            flags: FuncFlags::default(),
            blocks: Arena::new(),
            stmts: Arena::new(),
            ops: Arena::new(),
            locals: Arena::new(),
            block_order: Vec::new(),
        }
    }

    // ── accessors ────────────────────────────────────────────────────────────

    pub fn block(&self, id: BlockId) -> &Block {
        self.blocks.get(id.0)
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        self.blocks.get_mut(id.0)
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        self.stmts.get(id.0)
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        self.stmts.get_mut(id.0)
    }

    pub fn op(&self, id: OpId) -> &Op {
        self.ops.get(id.0)
    }

    pub fn op_mut(&mut self, id: OpId) -> &mut Op {
        self.ops.get_mut(id.0)
    }

    pub fn local(&self, id: LocalId) -> &Local {
        self.locals.get(id.0)
    }

    pub fn block_of_op(&self, id: OpId) -> BlockId {
        self.stmt(self.op(id).stmt).block
    }

    pub fn entry_block(&self) -> BlockId {
        self.block_order[0]
    }

    /// The last op of a block, if any.
    pub fn last_op(&self, block: BlockId) -> Option<OpId> {
        self.block(block)
            .stmts
            .iter()
            .rev()
            .flat_map(|&s| self.stmt(s).ops.iter().rev())
            .next()
            .copied()
    }

    // ── constructors ─────────────────────────────────────────────────────────

    pub fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.alloc(Block {
            id,
            preds: SmallVec::new(),
            stmts: Vec::new(),
            term: Terminator::None,
        });
        self.block_order.push(id);
        id
    }

    pub fn alloc_stmt(&mut self, block: BlockId) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.alloc(Stmt { id, block, flags: StmtFlags::default(), ops: Vec::new() });
        self.block_mut(block).stmts.push(id);
        id
    }

    /// Allocate a statement at the front of `block` (the phi/params slot).
    pub fn alloc_stmt_at_head(&mut self, block: BlockId, flags: StmtFlags) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.alloc(Stmt { id, block, flags, ops: Vec::new() });
        self.block_mut(block).stmts.insert(0, id);
        id
    }

    /// Append a new op to a statement.
    pub fn append_op(&mut self, stmt: StmtId, kind: OpKind, ty: IrType) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.alloc(Op {
            id,
            ty,
            flags: OpFlags::default(),
            stmt,
            kind,
            metadata: OpMetadata::None,
        });
        self.stmt_mut(stmt).ops.push(id);
        id
    }

    /// Insert a new op immediately before an existing one, in the same
    /// statement.
    pub fn insert_op_before(&mut self, before: OpId, kind: OpKind, ty: IrType) -> OpId {
        let stmt = self.op(before).stmt;
        let id = OpId(self.ops.len() as u32);
        self.ops.alloc(Op {
            id,
            ty,
            flags: OpFlags::default(),
            stmt,
            kind,
            metadata: OpMetadata::None,
        });
        let ops = &mut self.stmt_mut(stmt).ops;
        let pos = ops.iter().position(|&o| o == before).expect("op not in its statement");
        ops.insert(pos, id);
        id
    }

    /// Place an empty phi at the head of `block`. Phis live only in the
    /// block's leading phi statement (shared with the params statement in
    /// the entry block); one is created on first use.
    pub fn insert_phi(&mut self, block: BlockId, ty: IrType) -> OpId {
        let head = self.block(block).stmts.first().copied();
        let stmt = match head {
            Some(s)
                if self
                    .stmt(s)
                    .flags
                    .intersects(StmtFlags::PHIS | StmtFlags::PARAMS) =>
            {
                s
            }
            _ => self.alloc_stmt_at_head(block, StmtFlags::PHIS),
        };
        self.append_op(stmt, OpKind::Phi { entries: SmallVec::new() }, ty)
    }

    pub fn add_local(&mut self, ty: IrType) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.alloc(Local { id, ty, flags: LocalFlags::default() });
        id
    }

    // ── edge wiring ──────────────────────────────────────────────────────────

    fn add_pred(&mut self, block: BlockId, pred: BlockId) {
        let b = self.block_mut(block);
        if !b.preds.contains(&pred) {
            b.preds.push(pred);
        }
    }

    /// Wire `from` to unconditionally continue at `to`.
    pub fn make_merge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).term = Terminator::Merge { target: to };
        self.add_pred(to, from);
    }

    /// Wire `from` to conditionally branch to `true_target` / `false_target`.
    pub fn make_split(&mut self, from: BlockId, true_target: BlockId, false_target: BlockId) {
        self.block_mut(from).term = Terminator::Split { true_target, false_target };
        self.add_pred(true_target, from);
        self.add_pred(false_target, from);
    }

    /// Wire `from` as a multi-way switch.
    pub fn make_switch(&mut self, from: BlockId, cases: Vec<SwitchCase>, default: BlockId) {
        for case in &cases {
            self.add_pred(case.target, from);
        }
        self.add_pred(default, from);
        self.block_mut(from).term = Terminator::Switch { cases, default };
    }

    pub fn make_ret(&mut self, block: BlockId) {
        self.block_mut(block).term = Terminator::Ret;
    }

    /// Successor blocks recorded in a block's terminator.
    pub fn succs(&self, block: BlockId) -> Vec<BlockId> {
        match &self.block(block).term {
            Terminator::None | Terminator::Ret => Vec::new(),
            Terminator::Merge { target } => vec![*target],
            Terminator::Split { true_target, false_target } => {
                if true_target == false_target {
                    vec![*true_target]
                } else {
                    vec![*true_target, *false_target]
                }
            }
            Terminator::Switch { cases, default } => {
                let mut out = Vec::with_capacity(cases.len() + 1);
                for case in cases {
                    if !out.contains(&case.target) {
                        out.push(case.target);
                    }
                }
                if !out.contains(default) {
                    out.push(*default);
                }
                out
            }
        }
    }

    // ── walkers ──────────────────────────────────────────────────────────────

    /// All live op ids in layout order. Snapshot, so the function may be
    /// mutated while iterating the result.
    pub fn op_ids(&self) -> Vec<OpId> {
        let mut out = Vec::with_capacity(self.ops.len());
        for &block in &self.block_order {
            for &stmt in &self.block(block).stmts {
                out.extend_from_slice(&self.stmt(stmt).ops);
            }
        }
        out
    }

    /// Spill a value-producing op into a fresh local: a store is inserted
    /// right after the op in its statement. Returns the new local.
    pub fn spill_op(&mut self, op: OpId) -> LocalId {
        let ty = self.op(op).ty.clone();
        debug_assert!(!ty.is_none(), "spilling a valueless op");
        let lcl = self.add_local(ty);

        let stmt = self.op(op).stmt;
        let store = OpId(self.ops.len() as u32);
        self.ops.alloc(Op {
            id: store,
            ty: IR_TY_NONE,
            flags: OpFlags::default(),
            stmt,
            kind: OpKind::Store { dst: MemLoc::Local(lcl), value: op },
            metadata: OpMetadata::None,
        });
        let ops = &mut self.stmt_mut(stmt).ops;
        let pos = ops.iter().position(|&o| o == op).expect("op not in its statement");
        ops.insert(pos + 1, store);

        self.op_mut(op).flags |= OpFlags::SPILLED;
        lcl
    }

    /// Make an integral constant op.
    pub fn mk_int_constant(&mut self, stmt: StmtId, prim: Primitive, value: u64) -> OpId {
        self.append_op(stmt, OpKind::CnstInt(value), IrType::Primitive(prim))
    }

    /// Make a pointer-sized integer constant (element sizes, scales).
    pub fn mk_pointer_constant(&mut self, stmt: StmtId, target: &Target, value: u64) -> OpId {
        let prim = IrType::pointer_primitive(target);
        self.append_op(stmt, OpKind::CnstInt(value), IrType::Primitive(prim))
    }

    /// Make the zero constant of a primitive or pointer type.
    pub fn mk_zero_constant(&mut self, stmt: StmtId, ty: &IrType) -> OpId {
        let kind = if ty.is_fp() { OpKind::CnstFlt(0.0) } else { OpKind::CnstInt(0) };
        self.append_op(stmt, kind, ty.clone())
    }
}

/// Visit every operand slot of an op's payload exactly once, in evaluation
/// order. The callback may rewrite the id in place.
pub fn walk_op_uses(kind: &mut OpKind, mut f: impl FnMut(&mut OpId)) {
    match kind {
        OpKind::Undef
        | OpKind::CnstInt(_)
        | OpKind::CnstFlt(_)
        | OpKind::Addr(_)
        | OpKind::Br => {}
        OpKind::AddrOffset { base, index, .. } => {
            f(base);
            if let Some(index) = index {
                f(index);
            }
        }
        OpKind::Load { src } => {
            if let MemLoc::Addr(addr) = src {
                f(addr);
            }
        }
        OpKind::Store { dst, value } => {
            if let MemLoc::Addr(addr) = dst {
                f(addr);
            }
            f(value);
        }
        OpKind::LoadBitfield { addr, .. } => f(addr),
        OpKind::StoreBitfield { addr, value, .. } => {
            f(addr);
            f(value);
        }
        OpKind::Unary { value, .. } => f(value),
        OpKind::Binary { lhs, rhs, .. } => {
            f(lhs);
            f(rhs);
        }
        OpKind::Cast { value, .. } => f(value),
        OpKind::Call { target, args, .. } => {
            f(target);
            for arg in args {
                f(arg);
            }
        }
        OpKind::BrCond { cond } => f(cond),
        OpKind::BrSwitch { value } => f(value),
        OpKind::Phi { entries } => {
            for entry in entries {
                f(&mut entry.value);
            }
        }
        OpKind::Mov { value } => {
            if let Some(value) = value {
                f(value);
            }
        }
        OpKind::MemSet { addr, value, len } => {
            f(addr);
            f(value);
            f(len);
        }
        OpKind::MemCopy { dst, src, len } | OpKind::MemMove { dst, src, len } => {
            f(dst);
            f(src);
            f(len);
        }
        OpKind::MemCmp { lhs, rhs, len } => {
            f(lhs);
            f(rhs);
            f(len);
        }
        OpKind::VaStart { list_addr } => f(list_addr),
        OpKind::VaArg { list_addr, .. } => f(list_addr),
        OpKind::Ret { value } => {
            if let Some(value) = value {
                f(value);
            }
        }
    }
}

/// Read-only variant of `walk_op_uses`.
pub fn for_each_op_use(kind: &OpKind, mut f: impl FnMut(OpId)) {
    let mut cloned = kind.clone();
    walk_op_uses(&mut cloned, |id| f(*id));
}
