use crate::collections::epoch::{EpochMap, EpochSet};
use crate::collections::heap::MinHeap;
use crate::collections::ref_store::RefMap;
use crate::num::Weight;
use crate::theory::atoms::{EdgeId, Vert};
use crate::theory::graph::GraphStore;
use crate::theory::Interrupter;
use crate::DlError;

/// Outcome of a feasibility check for one newly activated edge.
pub(crate) enum Feasibility {
    Feasible,
    /// The activation closed a negative cycle; the payload is the set of
    /// active edges on that cycle (the activated edge included).
    Infeasible(Vec<EdgeId>),
}

/// Incremental feasibility check: repairs the vertex potentials after an
/// edge activation or exhibits a negative cycle.
///
/// The potentials `pi` satisfy `pi[src] + w - pi[tgt] >= 0` for every active
/// edge. Activating `e: u -> v, w` can only break this for `v`; the amount by
/// which a vertex still has to move is its slack `gamma`. Vertices are
/// repaired most-negative slack first; if a repair wave makes it back to `u`
/// with negative slack, the conflict edges recorded along the way form a
/// negative cycle.
#[derive(Clone)]
pub(crate) struct CycleFinder<W> {
    heap: MinHeap<Vert, W>,
    gamma: EpochMap<Vert, W>,
    /// Vertices whose potential was already repaired in this call.
    repaired: EpochSet<Vert>,
    /// For each vertex touched by the wave, the edge through which its slack
    /// was last lowered. Stale entries from earlier calls are never read:
    /// cycle reconstruction only walks entries written in the current call.
    conflict_edges: RefMap<Vert, EdgeId>,
    /// `(vertex, previous pi)` for each potential mutated by the current
    /// call. Drained by the caller into the journal on success; replayed to
    /// undo the mutations on conflict.
    changed: Vec<(Vert, W)>,
    relaxations: u64,
}

impl<W: Weight> Default for CycleFinder<W> {
    fn default() -> Self {
        CycleFinder {
            heap: Default::default(),
            gamma: Default::default(),
            repaired: Default::default(),
            conflict_edges: Default::default(),
            changed: Vec::new(),
            relaxations: 0,
        }
    }
}

impl<W: Weight> CycleFinder<W> {
    /// Checks whether the active graph stays feasible after the activation of
    /// `e`, repairing the potentials as needed.
    ///
    /// On `Feasible`, the repaired potentials are kept and the list of
    /// `(vertex, old_pi)` changes is left in `self` for the caller to
    /// journal (see [CycleFinder::drain_changes]). On `Infeasible` or
    /// interruption, all potentials are restored before returning.
    pub fn check(
        &mut self,
        graph: &mut GraphStore<W>,
        e: EdgeId,
        interrupt: &Interrupter,
    ) -> Result<Feasibility, DlError> {
        debug_assert!(self.heap.is_empty() && self.changed.is_empty());
        let d = graph.edge(e);
        let (u, v) = (d.src, d.tgt);

        if u == v {
            // trivial self loop, not supported by the repair wave
            return if d.weight < W::zero() {
                Ok(Feasibility::Infeasible(vec![e]))
            } else {
                Ok(Feasibility::Feasible)
            };
        }

        let slack = graph.pi(u) + d.weight - graph.pi(v);
        if slack >= W::zero() {
            return Ok(Feasibility::Feasible);
        }

        self.gamma.advance();
        self.repaired.advance();
        self.gamma.set(v, slack);
        self.heap.insert(v, slack);
        self.conflict_edges.insert(v, e);

        while let Some((s, _)) = self.heap.pop() {
            if interrupt.is_triggered() {
                self.abort();
                graph_restore(graph, &mut self.changed);
                return Err(DlError::Interrupted);
            }
            let gs = self.gamma.get(s).unwrap();
            if !self.repaired.contains(s) {
                self.changed.push((s, graph.pi(s)));
                self.repaired.insert(s);
            }
            graph.set_pi(s, graph.pi(s) + gs);
            self.gamma.set(s, W::zero());

            for i in 0..graph.active_out(s).len() {
                let edge = graph.active_out(s)[i];
                let de = graph.edge(edge);
                let t = de.tgt;
                if self.repaired.contains(t) {
                    continue;
                }
                let gt = match self.gamma.get(t) {
                    Some(g) => g,
                    None => {
                        self.gamma.set(t, W::zero());
                        W::zero()
                    }
                };
                let value = graph.pi(s) + de.weight - graph.pi(t);
                if value < gt {
                    self.relaxations += 1;
                    self.conflict_edges.insert(t, edge);
                    if t == u {
                        // the wave came back to the activation source:
                        // the recorded conflict edges close a negative cycle
                        let cycle = self.collect_cycle(graph, u);
                        self.abort();
                        graph_restore(graph, &mut self.changed);
                        return Ok(Feasibility::Infeasible(cycle));
                    }
                    self.gamma.set(t, value);
                    if self.heap.contains(t) {
                        self.heap.decrease(t, value);
                    } else {
                        self.heap.insert(t, value);
                    }
                }
            }
        }

        Ok(Feasibility::Feasible)
    }

    /// Walks `conflict_edges` backwards from the activation source until the
    /// cycle closes.
    fn collect_cycle(&self, graph: &GraphStore<W>, u: Vert) -> Vec<EdgeId> {
        let mut cycle = Vec::with_capacity(4);
        let mut s = u;
        loop {
            let edge = self.conflict_edges[s];
            cycle.push(edge);
            s = graph.edge(edge).src;
            if s == u {
                return cycle;
            }
        }
    }

    fn abort(&mut self) {
        self.heap.clear();
    }

    /// `(vertex, old_pi)` pairs of the latest successful check, oldest first.
    pub fn drain_changes(&mut self) -> impl Iterator<Item = (Vert, W)> + '_ {
        self.changed.drain(..)
    }

    pub fn take_relaxations(&mut self) -> u64 {
        std::mem::take(&mut self.relaxations)
    }
}

fn graph_restore<W: Weight>(graph: &mut GraphStore<W>, changed: &mut Vec<(Vert, W)>) {
    while let Some((v, old)) = changed.pop() {
        graph.set_pi(v, old);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::atoms::RawEdge;

    fn setup(edges: &[(u32, u32, i64)]) -> (GraphStore<i64>, Vec<EdgeId>) {
        let mut g = GraphStore::new();
        let ids = edges
            .iter()
            .map(|&(x, y, c)| {
                // x - y <= c, edge y -> x
                let rec = g.declare(
                    RawEdge {
                        src: Some(y),
                        tgt: Some(x),
                        weight: c,
                    },
                    false,
                );
                EdgeId::from(rec.atom())
            })
            .collect();
        (g, ids)
    }

    fn check(g: &mut GraphStore<i64>, finder: &mut CycleFinder<i64>, e: EdgeId) -> Feasibility {
        g.activate(e, false);
        let res = finder.check(g, e, &Interrupter::default()).unwrap();
        finder.drain_changes().for_each(drop);
        res
    }

    fn assert_potentials_feasible(g: &GraphStore<i64>) {
        for v in (0..g.num_vertices()).map(Vert::from) {
            for &e in g.active_out(v) {
                let d = g.edge(e);
                assert!(g.pi(d.src) + d.weight - g.pi(d.tgt) >= 0, "infeasible edge {:?}", d);
            }
        }
    }

    #[test]
    fn test_feasible_chain() {
        let (mut g, ids) = setup(&[(1, 2, 3), (2, 3, -2), (3, 4, 0)]);
        let mut finder = CycleFinder::default();
        for &e in &ids {
            assert!(matches!(check(&mut g, &mut finder, e), Feasibility::Feasible));
            assert_potentials_feasible(&g);
        }
    }

    #[test]
    fn test_negative_cycle() {
        // a - b <= 3, b - c <= -2, c - a <= -2 sums to -1
        let (mut g, ids) = setup(&[(1, 2, 3), (2, 3, -2), (3, 1, -2)]);
        let mut finder = CycleFinder::default();
        let before: Vec<i64> = g.potential_snapshot();
        assert!(matches!(check(&mut g, &mut finder, ids[0]), Feasibility::Feasible));
        assert!(matches!(check(&mut g, &mut finder, ids[1]), Feasibility::Feasible));
        let snapshot = g.potential_snapshot();
        match check(&mut g, &mut finder, ids[2]) {
            Feasibility::Infeasible(mut cycle) => {
                cycle.sort();
                assert_eq!(cycle, ids.clone());
            }
            Feasibility::Feasible => panic!("expected a negative cycle"),
        }
        // potentials restored to their pre-conflict values
        assert_eq!(g.potential_snapshot(), snapshot);
        assert_ne!(before, snapshot);
    }

    #[test]
    fn test_negative_self_loop() {
        let (mut g, ids) = setup(&[(1, 1, -1)]);
        let mut finder = CycleFinder::default();
        match check(&mut g, &mut finder, ids[0]) {
            Feasibility::Infeasible(cycle) => assert_eq!(cycle, vec![ids[0]]),
            Feasibility::Feasible => panic!("negative self loop must conflict"),
        }
    }

    #[test]
    fn test_zero_weight_cycle_is_feasible() {
        let (mut g, ids) = setup(&[(1, 2, 0), (2, 1, 0)]);
        let mut finder = CycleFinder::default();
        for &e in &ids {
            assert!(matches!(check(&mut g, &mut finder, e), Feasibility::Feasible));
        }
        assert_potentials_feasible(&g);
    }

    #[test]
    fn test_interruption_restores_potentials() {
        let (mut g, ids) = setup(&[(1, 2, -5), (2, 3, -5), (3, 4, -5)]);
        let mut finder = CycleFinder::default();
        for &e in &ids[..2] {
            assert!(matches!(check(&mut g, &mut finder, e), Feasibility::Feasible));
        }
        let snapshot = g.potential_snapshot();
        let interrupter = Interrupter::default();
        interrupter.interrupt();
        g.activate(ids[2], false);
        let res = finder.check(&mut g, ids[2], &interrupter);
        assert!(matches!(res, Err(DlError::Interrupted)));
        g.deactivate(ids[2], false);
        assert_eq!(g.potential_snapshot(), snapshot);
    }
}
