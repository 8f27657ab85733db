use crate::collections::ref_store::RefVec;
use crate::num::Weight;
use crate::theory::atoms::{AtomId, DiffEdge, EdgeId, RawEdge, VarLabel, Vert};
use std::collections::HashMap;

/// Assignment status of a base atom pair with respect to the SAT trail.
/// `negation` selects which member of the pair holds: `false` for the
/// canonical edge, `true` for its negation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomState {
    Inactive,
    Active { negation: bool },
    Implied { negation: bool },
}

/// Result of declaring an atom. Contains the atom's signed handle and
/// indicates whether the declaration created a new edge pair or was unified
/// with an existing one (possibly as its negation).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomRecording {
    Created(AtomId),
    Unified(AtomId),
}

impl AtomRecording {
    pub fn atom(self) -> AtomId {
        match self {
            AtomRecording::Created(a) | AtomRecording::Unified(a) => a,
        }
    }
}

/// Owns the vertices, the edge pairs and the adjacency views of the
/// constraint graph.
///
/// Edges are never destroyed; activation and deduction only move them
/// between the adjacency views. The inactive views are maintained only when
/// deduction is enabled, since they exist solely to feed the scanner.
#[derive(Clone)]
pub struct GraphStore<W> {
    /// Vertex potentials; kept feasible by the negative-cycle check.
    pi: RefVec<Vert, W>,
    labels: HashMap<VarLabel, Vert>,
    /// Both edges of pair `k` at indices `2k` and `2k + 1`.
    edges: RefVec<EdgeId, DiffEdge<W>>,
    /// Assignment state, indexed by base id.
    states: Vec<AtomState>,
    /// Maps a canonical edge to the base id of its pair.
    lookup: HashMap<DiffEdge<W>, u32>,
    static_adj: RefVec<Vert, Vec<EdgeId>>,
    active_adj: RefVec<Vert, Vec<EdgeId>>,
    active_adj_in: RefVec<Vert, Vec<EdgeId>>,
    inactive_adj: RefVec<Vert, Vec<EdgeId>>,
    inactive_adj_in: RefVec<Vert, Vec<EdgeId>>,
    num_active: usize,
}

impl<W: Weight> Default for GraphStore<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Weight> GraphStore<W> {
    /// Creates an empty store holding only the origin vertex.
    pub fn new() -> GraphStore<W> {
        let mut store = GraphStore {
            pi: Default::default(),
            labels: HashMap::new(),
            edges: Default::default(),
            states: Vec::new(),
            lookup: HashMap::new(),
            static_adj: Default::default(),
            active_adj: Default::default(),
            active_adj_in: Default::default(),
            inactive_adj: Default::default(),
            inactive_adj_in: Default::default(),
            num_active: 0,
        };
        let origin = store.new_vertex();
        debug_assert_eq!(origin, Vert::ORIGIN);
        store
    }

    fn new_vertex(&mut self) -> Vert {
        let v = self.pi.push(W::zero());
        self.static_adj.push(Vec::new());
        self.active_adj.push(Vec::new());
        self.active_adj_in.push(Vec::new());
        self.inactive_adj.push(Vec::new());
        self.inactive_adj_in.push(Vec::new());
        v
    }

    /// Returns the vertex of the given label, allocating it on first mention.
    /// `None` stands for the origin.
    pub fn vertex(&mut self, label: Option<VarLabel>) -> Vert {
        match label {
            None => Vert::ORIGIN,
            Some(l) => match self.labels.get(&l) {
                Some(&v) => v,
                None => {
                    let v = self.new_vertex();
                    self.labels.insert(l, v);
                    v
                }
            },
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.pi.len()
    }

    pub fn num_active(&self) -> usize {
        self.num_active
    }

    pub fn num_atoms(&self) -> usize {
        self.edges.len() / 2
    }

    pub fn pi(&self, v: Vert) -> W {
        self.pi[v]
    }

    pub(crate) fn set_pi(&mut self, v: Vert, value: W) {
        self.pi[v] = value;
    }

    pub fn edge(&self, e: EdgeId) -> DiffEdge<W> {
        self.edges[e]
    }

    pub fn state(&self, base_id: u32) -> AtomState {
        self.states[base_id as usize]
    }

    pub fn is_unassigned(&self, base_id: u32) -> bool {
        self.states[base_id as usize] == AtomState::Inactive
    }

    pub fn active_out(&self, v: Vert) -> &[EdgeId] {
        &self.active_adj[v]
    }

    pub fn active_in(&self, v: Vert) -> &[EdgeId] {
        &self.active_adj_in[v]
    }

    pub fn inactive_out(&self, v: Vert) -> &[EdgeId] {
        &self.inactive_adj[v]
    }

    pub fn inactive_in(&self, v: Vert) -> &[EdgeId] {
        &self.inactive_adj_in[v]
    }

    /// Ensures the edge pair of the given constraint exists and is indexed in
    /// the static (and, with deduction enabled, inactive) views. Idempotent:
    /// a constraint matching an existing pair, or the negation of one,
    /// returns the existing pair's handle.
    pub fn declare(&mut self, raw: RawEdge<W>, deduction: bool) -> AtomRecording {
        let src = self.vertex(raw.src);
        let tgt = self.vertex(raw.tgt);
        let edge = DiffEdge::new(src, tgt, raw.weight);
        let (canonical, negated) = if edge.is_canonical() {
            (edge, false)
        } else {
            (edge.negated(), true)
        };
        if let Some(&base) = self.lookup.get(&canonical) {
            return AtomRecording::Unified(AtomId::new(base, negated));
        }
        let base = (self.edges.len() / 2) as u32;
        let pos = self.edges.push(canonical);
        let neg = self.edges.push(canonical.negated());
        debug_assert_eq!(pos, EdgeId::new(base, false));
        debug_assert_eq!(neg, EdgeId::new(base, true));
        self.lookup.insert(canonical, base);
        self.states.push(AtomState::Inactive);
        self.static_adj[canonical.src].push(pos);
        self.static_adj[canonical.negated().src].push(neg);
        if deduction {
            self.insert_inactive(base);
        }
        AtomRecording::Created(AtomId::new(base, negated))
    }

    /// Moves the given edge into the active views.
    /// Pre: the atom is currently `Inactive`.
    pub fn activate(&mut self, e: EdgeId, deduction: bool) {
        debug_assert_eq!(self.state(e.base_id()), AtomState::Inactive);
        let d = self.edges[e];
        self.active_adj[d.src].push(e);
        self.active_adj_in[d.tgt].push(e);
        self.states[e.base_id() as usize] = AtomState::Active {
            negation: e.is_negation(),
        };
        self.num_active += 1;
        if deduction {
            self.remove_inactive(e.base_id());
        }
    }

    /// The exact inverse of `activate`. Activations must be undone in LIFO
    /// order: the edge is required to be the most recent entry of its
    /// adjacency lists.
    pub fn deactivate(&mut self, e: EdgeId, deduction: bool) {
        debug_assert_eq!(
            self.state(e.base_id()),
            AtomState::Active {
                negation: e.is_negation()
            }
        );
        let d = self.edges[e];
        let out = self.active_adj[d.src].pop();
        debug_assert_eq!(out, Some(e));
        let inc = self.active_adj_in[d.tgt].pop();
        debug_assert_eq!(inc, Some(e));
        self.states[e.base_id() as usize] = AtomState::Inactive;
        self.num_active -= 1;
        if deduction {
            self.insert_inactive(e.base_id());
        }
    }

    /// Records the given edge as implied by the deduction scanner. Does not
    /// touch the active views: an implied constraint is subsumed by an
    /// active path and contributes nothing to shortest paths.
    pub fn imply(&mut self, e: EdgeId, deduction: bool) {
        debug_assert_eq!(self.state(e.base_id()), AtomState::Inactive);
        self.states[e.base_id() as usize] = AtomState::Implied {
            negation: e.is_negation(),
        };
        if deduction {
            self.remove_inactive(e.base_id());
        }
    }

    pub fn unimply(&mut self, e: EdgeId, deduction: bool) {
        debug_assert_eq!(
            self.state(e.base_id()),
            AtomState::Implied {
                negation: e.is_negation()
            }
        );
        self.states[e.base_id() as usize] = AtomState::Inactive;
        if deduction {
            self.insert_inactive(e.base_id());
        }
    }

    /// Silent promotion of an implied atom that the SAT driver decided to
    /// assert with the same polarity. A no-op for the graph structure.
    pub fn promote(&mut self, e: EdgeId) {
        debug_assert_eq!(
            self.state(e.base_id()),
            AtomState::Implied {
                negation: e.is_negation()
            }
        );
        self.states[e.base_id() as usize] = AtomState::Active {
            negation: e.is_negation(),
        };
    }

    pub fn demote(&mut self, e: EdgeId) {
        debug_assert_eq!(
            self.state(e.base_id()),
            AtomState::Active {
                negation: e.is_negation()
            }
        );
        self.states[e.base_id() as usize] = AtomState::Implied {
            negation: e.is_negation(),
        };
    }

    /// True if an already-active parallel edge dominates `e`: activation of a
    /// dominated edge cannot entail anything new, so deduction is skipped.
    pub fn has_dominating_parallel(&self, e: EdgeId) -> bool {
        let d = self.edges[e];
        self.active_adj[d.src]
            .iter()
            .any(|&o| o != e && self.edges[o].tgt == d.tgt && self.edges[o].weight <= d.weight)
    }

    fn insert_inactive(&mut self, base_id: u32) {
        for e in [EdgeId::new(base_id, false), EdgeId::new(base_id, true)] {
            let d = self.edges[e];
            self.inactive_adj[d.src].push(e);
            self.inactive_adj_in[d.tgt].push(e);
        }
    }

    fn remove_inactive(&mut self, base_id: u32) {
        for e in [EdgeId::new(base_id, false), EdgeId::new(base_id, true)] {
            let d = self.edges[e];
            remove_entry(&mut self.inactive_adj[d.src], e);
            remove_entry(&mut self.inactive_adj_in[d.tgt], e);
        }
    }

    /// Sorted copy of an adjacency view, for state comparisons in tests.
    #[cfg(test)]
    pub(crate) fn inactive_snapshot(&self) -> Vec<Vec<EdgeId>> {
        self.inactive_adj
            .entries()
            .map(|(_, l)| {
                let mut l = l.clone();
                l.sort();
                l
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn potential_snapshot(&self) -> Vec<W> {
        self.pi.keys().map(|v| self.pi[v]).collect()
    }

    #[cfg(test)]
    pub(crate) fn active_snapshot(&self) -> Vec<Vec<EdgeId>> {
        self.active_adj.entries().map(|(_, l)| l.clone()).collect()
    }
}

fn remove_entry(list: &mut Vec<EdgeId>, e: EdgeId) {
    let pos = list.iter().position(|&x| x == e);
    debug_assert!(pos.is_some());
    if let Some(pos) = pos {
        list.swap_remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::atoms::RawEdge;

    fn diff(store: &mut GraphStore<i64>, a: VarLabel, b: VarLabel, c: i64) -> AtomRecording {
        store.declare(
            RawEdge {
                src: Some(b),
                tgt: Some(a),
                weight: c,
            },
            true,
        )
    }

    #[test]
    fn test_unification() {
        let store = &mut GraphStore::new();
        let id1 = diff(store, 1, 2, 3).atom();
        let id2 = diff(store, 1, 2, 3);
        assert_eq!(id2, AtomRecording::Unified(id1));

        // the negation of `a - b <= 3` is `b - a <= -4` and maps to the same pair
        let nid = diff(store, 2, 1, -4).atom();
        assert_eq!(nid.base_id(), id1.base_id());
        assert_ne!(nid.is_negated(), id1.is_negated());

        // an unrelated weight creates a fresh pair
        let other = diff(store, 1, 2, 4).atom();
        assert_ne!(other.base_id(), id1.base_id());
    }

    #[test]
    fn test_state_machine() {
        let store = &mut GraphStore::new();
        let a = diff(store, 1, 2, 3).atom();
        let e = EdgeId::from(a);
        assert!(store.is_unassigned(a.base_id()));

        store.activate(e, true);
        assert_eq!(store.state(a.base_id()), AtomState::Active { negation: false });
        assert_eq!(store.num_active(), 1);
        store.deactivate(e, true);
        assert!(store.is_unassigned(a.base_id()));
        assert_eq!(store.num_active(), 0);

        store.imply(e, true);
        assert_eq!(store.state(a.base_id()), AtomState::Implied { negation: false });
        store.promote(e);
        assert_eq!(store.state(a.base_id()), AtomState::Active { negation: false });
        store.demote(e);
        store.unimply(e, true);
        assert!(store.is_unassigned(a.base_id()));
    }

    #[test]
    fn test_adjacency_views() {
        let store = &mut GraphStore::new();
        let a = diff(store, 1, 2, 3).atom();
        let b = store.vertex(Some(2));
        let ab = EdgeId::from(a);

        // both polarities of the pair are indexed in the inactive views
        assert_eq!(store.inactive_out(b), &[ab]);
        assert_eq!(store.inactive_in(b), &[!ab]);
        assert!(store.active_out(b).is_empty());

        store.activate(ab, true);
        assert_eq!(store.active_out(b), &[ab]);
        assert!(store.inactive_out(b).is_empty());
        assert!(store.inactive_in(b).is_empty());

        store.deactivate(ab, true);
        assert_eq!(store.inactive_out(b).len(), 1);
        assert_eq!(store.inactive_in(b).len(), 1);
    }

    #[test]
    fn test_parallel_domination() {
        let store = &mut GraphStore::new();
        let tight = diff(store, 1, 2, 3).atom();
        let loose = diff(store, 1, 2, 5).atom();
        store.activate(EdgeId::from(tight), true);
        assert!(store.has_dominating_parallel(EdgeId::from(loose)));
        assert!(!store.has_dominating_parallel(EdgeId::from(tight)));
    }

    #[test]
    fn test_lifo_deactivation() {
        let store = &mut GraphStore::new();
        let a = diff(store, 1, 2, 3).atom();
        let b = diff(store, 1, 2, 7).atom();
        store.activate(EdgeId::from(a), true);
        store.activate(EdgeId::from(b), true);
        store.deactivate(EdgeId::from(b), true);
        store.deactivate(EdgeId::from(a), true);
        assert_eq!(store.num_active(), 0);
    }
}
