//! The variable-reference table.
//!
//! Tracks, per `(identifier, scope)` pair, where the variable's value
//! lives: SSA ops, a local slot, or a global symbol. For SSA variables the
//! table keeps the latest defining op *per basic block*: a read resolves
//! against the reading block, and a miss there is what makes the builder
//! insert a phi. The phi back-patcher later queries predecessors with the
//! same `(name, scope, block)` key, and an SSA def recorded for a block
//! always wins over anything the back-patching walk has cached for it.
//!
//! Lookups *without* a block (taking an address, unit-level symbols) see
//! the most recent SSA def regardless of block.
//!
//! Scope numbers come from the type checker, so shadowing is already
//! resolved; the scope *frames* here only delimit table lifetimes (one per
//! function build, one for the unit).

use rustc_hash::FxHashMap;

use crate::frontend::ast::ScopeId;
use crate::ir::ir::{BlockId, GlobalId, LocalId, OpId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarKey {
    pub name: String,
    pub scope: ScopeId,
}

impl VarKey {
    pub fn new(name: impl Into<String>, scope: ScopeId) -> VarKey {
        VarKey { name: name.into(), scope }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRefKind {
    Ssa,
    Local,
    Global,
}

/// What a lookup resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// The defining op for the variable in the queried block (or the most
    /// recent def, for block-less queries).
    Ssa(OpId),
    Local(LocalId),
    Global(GlobalId),
}

#[derive(Debug, Clone)]
pub struct VarRef {
    pub kind: VarRefKind,
    pub local: Option<LocalId>,
    pub global: Option<GlobalId>,
    /// Most recent defining op (any block). Kept after a spill to a local:
    /// the address-taking path still needs the pre-spill value.
    pub op: Option<OpId>,
    pub block: Option<BlockId>,
    /// Latest SSA def per block.
    defs: FxHashMap<BlockId, OpId>,
}

impl VarRef {
    fn new(kind: VarRefKind) -> VarRef {
        VarRef {
            kind,
            local: None,
            global: None,
            op: None,
            block: None,
            defs: FxHashMap::default(),
        }
    }

    /// Record an SSA (re)definition of the variable in `block`.
    pub fn record_def(&mut self, block: BlockId, op: OpId) {
        debug_assert!(self.kind == VarRefKind::Ssa, "def recorded on non-SSA ref");
        self.defs.insert(block, op);
        self.op = Some(op);
        self.block = Some(block);
    }

    pub fn def_in(&self, block: BlockId) -> Option<OpId> {
        self.defs.get(&block).copied()
    }

    /// Rewrite an SSA ref into a local ref after its address was taken.
    /// Per-block defs are retained for reads already in flight.
    pub fn promote_to_local(&mut self, local: LocalId) {
        self.kind = VarRefKind::Local;
        self.local = Some(local);
    }

    fn resolve(&self, block: Option<BlockId>) -> Option<Resolved> {
        match self.kind {
            VarRefKind::Local => Some(Resolved::Local(self.local.expect("local ref without slot"))),
            VarRefKind::Global => {
                Some(Resolved::Global(self.global.expect("global ref without symbol")))
            }
            VarRefKind::Ssa => match block {
                Some(block) => self.def_in(block).map(Resolved::Ssa),
                None => self.op.map(Resolved::Ssa),
            },
        }
    }
}

#[derive(Debug, Default)]
struct VarRefScope {
    vars: FxHashMap<VarKey, VarRef>,
}

/// A stack of scope frames of variable references.
#[derive(Debug)]
pub struct VarRefs {
    scopes: Vec<VarRefScope>,
}

impl VarRefs {
    pub fn new() -> VarRefs {
        VarRefs { scopes: vec![VarRefScope::default()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(VarRefScope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Get or create the entry for a key in the innermost frame.
    pub fn entry(&mut self, key: VarKey, kind: VarRefKind) -> &mut VarRef {
        let scope = self.scopes.last_mut().expect("no scope frame");
        scope.vars.entry(key).or_insert_with(|| VarRef::new(kind))
    }

    /// The raw entry for a key, searching frames innermost-first.
    pub fn entry_mut(&mut self, key: &VarKey) -> Option<&mut VarRef> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.vars.get_mut(key))
    }

    /// Resolve a reference. `block` is the reading block; SSA refs resolve
    /// only through a def recorded for that block, unless no block is given.
    pub fn get(&self, key: &VarKey, block: Option<BlockId>) -> Option<Resolved> {
        for scope in self.scopes.iter().rev() {
            let Some(var_ref) = scope.vars.get(key) else {
                continue;
            };
            if let Some(resolved) = var_ref.resolve(block) {
                return Some(resolved);
            }
            // SSA ref with no def in the queried block: a phi is needed, not
            // a match from an outer frame
            return None;
        }
        None
    }
}

impl Default for VarRefs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssa_defs_resolve_per_block() {
        let mut refs = VarRefs::new();
        let key = VarKey::new("x", 2);
        let var_ref = refs.entry(key.clone(), VarRefKind::Ssa);
        var_ref.record_def(BlockId(0), OpId(5));
        var_ref.record_def(BlockId(1), OpId(9));

        assert_eq!(refs.get(&key, Some(BlockId(0))), Some(Resolved::Ssa(OpId(5))));
        assert_eq!(refs.get(&key, Some(BlockId(1))), Some(Resolved::Ssa(OpId(9))));
        // no def in block 2: the reader must phi
        assert_eq!(refs.get(&key, Some(BlockId(2))), None);
        // block-less lookups see the most recent def
        assert_eq!(refs.get(&key, None), Some(Resolved::Ssa(OpId(9))));
    }

    #[test]
    fn redefinition_in_a_block_wins() {
        let mut refs = VarRefs::new();
        let key = VarKey::new("x", 2);
        let var_ref = refs.entry(key.clone(), VarRefKind::Ssa);
        var_ref.record_def(BlockId(0), OpId(5));
        var_ref.record_def(BlockId(0), OpId(8));
        assert_eq!(refs.get(&key, Some(BlockId(0))), Some(Resolved::Ssa(OpId(8))));
    }

    #[test]
    fn local_refs_are_visible_everywhere() {
        let mut refs = VarRefs::new();
        let key = VarKey::new("x", 2);
        refs.entry(key.clone(), VarRefKind::Local).local = Some(LocalId(3));

        assert_eq!(refs.get(&key, Some(BlockId(7))), Some(Resolved::Local(LocalId(3))));
        assert_eq!(refs.get(&key, None), Some(Resolved::Local(LocalId(3))));
    }

    #[test]
    fn distinct_scopes_do_not_collide() {
        let mut refs = VarRefs::new();
        refs.entry(VarKey::new("x", 2), VarRefKind::Local).local = Some(LocalId(0));
        refs.entry(VarKey::new("x", 3), VarRefKind::Local).local = Some(LocalId(1));

        assert_eq!(refs.get(&VarKey::new("x", 2), None), Some(Resolved::Local(LocalId(0))));
        assert_eq!(refs.get(&VarKey::new("x", 3), None), Some(Resolved::Local(LocalId(1))));
    }

    #[test]
    fn promote_to_local_rewrites_kind_keeping_op() {
        let mut refs = VarRefs::new();
        let key = VarKey::new("x", 2);
        let var_ref = refs.entry(key.clone(), VarRefKind::Ssa);
        var_ref.record_def(BlockId(0), OpId(9));
        var_ref.promote_to_local(LocalId(4));

        assert_eq!(refs.get(&key, Some(BlockId(3))), Some(Resolved::Local(LocalId(4))));
        // pre-spill op retained
        assert_eq!(refs.entry_mut(&key).unwrap().op, Some(OpId(9)));
    }

    #[test]
    fn outer_scope_frame_is_searched() {
        let mut refs = VarRefs::new();
        refs.entry(VarKey::new("g", 0), VarRefKind::Global).global = Some(GlobalId(1));
        refs.push_scope();
        assert_eq!(refs.get(&VarKey::new("g", 0), None), Some(Resolved::Global(GlobalId(1))));
        refs.pop_scope();
        assert!(refs.get(&VarKey::new("g", 0), None).is_some());
    }
}
