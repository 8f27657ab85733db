use crate::collections::epoch::{EpochMap, EpochSet};
use crate::collections::heap::MinHeap;
use crate::num::Weight;
use crate::theory::atoms::{EdgeId, Vert};
use crate::theory::graph::GraphStore;
use crate::theory::Interrupter;
use crate::DlError;

/// Traversal direction of a shortest-path pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    /// Along out-edges, from the source of the activated edge.
    Forward,
    /// Along in-edges, from the target of the activated edge.
    Backward,
}

/// Scratch state of one single-source pass, reusable across activations.
///
/// Distances are reduced weights (`rwt = pi[src] + w - pi[tgt] >= 0`), which
/// keeps Dijkstra applicable to graphs with negative edge weights.
///
/// A vertex is *relevant* when its shortest path from the root traverses the
/// freshly activated edge; only such paths can entail something that was not
/// already entailed before the activation. Relevance is seeded on the far
/// endpoint of the activated edge and propagated along tree edges; the pass
/// stops as soon as the frontier holds no relevant vertex.
#[derive(Clone)]
pub(crate) struct Pass<W> {
    pub dist: EpochMap<Vert, W>,
    settled: EpochSet<Vert>,
    /// Hop depth from the root, tracked for relevant vertices.
    depth: EpochMap<Vert, u32>,
    pub relevant: EpochMap<Vert, bool>,
    heap: MinHeap<Vert, W>,
    /// Parent edge of each reached vertex in the shortest-path tree, keyed by
    /// the vertex away from the root. Only filled when reasons are generated
    /// eagerly.
    pub spt: EpochMap<Vert, EdgeId>,
    /// Relevant vertices with final distances, in settling order.
    pub settled_relevant: Vec<Vert>,
    /// Summed inactive degree of the settled relevant vertices, used to pick
    /// the cheaper side to scan.
    pub degree_sum: usize,
}

impl<W: Weight> Default for Pass<W> {
    fn default() -> Self {
        Pass {
            dist: Default::default(),
            settled: Default::default(),
            depth: Default::default(),
            relevant: Default::default(),
            heap: Default::default(),
            spt: Default::default(),
            settled_relevant: Vec::new(),
            degree_sum: 0,
        }
    }
}

impl<W: Weight> Pass<W> {
    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        rwt: &mut EpochMap<EdgeId, W>,
        graph: &GraphStore<W>,
        dir: Direction,
        root: Vert,
        seed: Vert,
        eager_spt: bool,
        interrupt: &Interrupter,
    ) -> Result<PassStats, DlError> {
        debug_assert!(self.heap.is_empty());
        debug_assert_ne!(root, seed);
        self.dist.advance();
        self.settled.advance();
        self.depth.advance();
        self.relevant.advance();
        self.spt.advance();
        self.settled_relevant.clear();
        self.degree_sum = 0;

        let mut stats = PassStats::default();
        let mut live_relevant: i64 = 0;

        self.relevant.set(seed, true);
        self.dist.set(root, W::zero());
        self.depth.set(root, 0);
        self.relevant.set(root, false);
        self.heap.insert(root, W::zero());

        while let Some((x, dx)) = self.heap.pop() {
            if interrupt.is_triggered() {
                self.heap.clear();
                return Err(DlError::Interrupted);
            }
            self.settled.insert(x);
            let x_rel = self.relevant.get(x) == Some(true);
            if x_rel {
                self.settled_relevant.push(x);
                self.degree_sum += match dir {
                    Direction::Forward => graph.inactive_in(x).len(),
                    Direction::Backward => graph.inactive_out(x).len(),
                };
                live_relevant -= 1;
            }

            let edges = match dir {
                Direction::Forward => graph.active_out(x),
                Direction::Backward => graph.active_in(x),
            };
            stats.max_adjacency = stats.max_adjacency.max(edges.len());
            for &edge in edges {
                let de = graph.edge(edge);
                let t = match dir {
                    Direction::Forward => de.tgt,
                    Direction::Backward => de.src,
                };
                // a settled vertex keeps its distance; its incident reduced
                // weights may then stay unmemoized for this round
                if self.settled.contains(t) {
                    continue;
                }
                let r = match rwt.get(edge) {
                    Some(r) => r,
                    None => {
                        let r = graph.pi(de.src) + de.weight - graph.pi(de.tgt);
                        debug_assert!(r >= W::zero());
                        rwt.set(edge, r);
                        r
                    }
                };
                let nd = dx + r;
                match self.dist.get(t) {
                    None => {
                        stats.relaxations += 1;
                        self.dist.set(t, nd);
                        if eager_spt {
                            self.spt.set(t, edge);
                        }
                        if !self.relevant.is_set(t) {
                            self.relevant.set(t, x_rel);
                        }
                        self.heap.insert(t, nd);
                        if self.relevant.get(t) == Some(true) {
                            live_relevant += 1;
                            let depth = self.depth.get(x).unwrap_or(0) + 1;
                            self.depth.set(t, depth);
                            stats.max_depth = stats.max_depth.max(depth);
                        }
                    }
                    Some(old) if nd < old => {
                        stats.relaxations += 1;
                        self.dist.set(t, nd);
                        if eager_spt {
                            self.spt.set(t, edge);
                        }
                        let was_rel = self.relevant.get(t) == Some(true);
                        if !was_rel && x_rel {
                            live_relevant += 1;
                        } else if was_rel && !x_rel {
                            live_relevant -= 1;
                        }
                        self.relevant.set(t, x_rel);
                        self.heap.decrease(t, nd);
                        if x_rel {
                            let depth = self.depth.get(x).unwrap_or(0) + 1;
                            self.depth.set(t, depth);
                            stats.max_depth = stats.max_depth.max(depth);
                        }
                    }
                    _ => {}
                }
            }

            if live_relevant <= 0 {
                break;
            }
        }
        self.heap.clear();
        Ok(stats)
    }
}

#[derive(Default, Copy, Clone)]
pub(crate) struct PassStats {
    pub relaxations: u64,
    pub max_depth: u32,
    pub max_adjacency: usize,
}

/// The two shortest-path trees grown around a freshly activated edge, plus
/// the per-round reduced-weight memo shared by both passes.
#[derive(Clone)]
pub(crate) struct SsspEngine<W> {
    pub fwd: Pass<W>,
    pub bwd: Pass<W>,
    rwt: EpochMap<EdgeId, W>,
    pub relaxations: u64,
    pub max_depth: u32,
    /// Longest active adjacency list encountered by the passes.
    pub max_adjacency: usize,
}

impl<W: Weight> Default for SsspEngine<W> {
    fn default() -> Self {
        SsspEngine {
            fwd: Default::default(),
            bwd: Default::default(),
            rwt: Default::default(),
            relaxations: 0,
            max_depth: 0,
            max_adjacency: 0,
        }
    }
}

impl<W: Weight> SsspEngine<W> {
    /// Runs both passes for the activated edge `e: u -> v`: forward from `u`
    /// with `v` seeded relevant, backward from `v` with `u` seeded relevant.
    pub fn run(
        &mut self,
        graph: &GraphStore<W>,
        e: EdgeId,
        eager_spt: bool,
        interrupt: &Interrupter,
    ) -> Result<(), DlError> {
        let d = graph.edge(e);
        debug_assert_ne!(d.src, d.tgt);
        self.rwt.advance();
        let f = self.fwd.run(
            &mut self.rwt,
            graph,
            Direction::Forward,
            d.src,
            d.tgt,
            eager_spt,
            interrupt,
        )?;
        let b = self.bwd.run(
            &mut self.rwt,
            graph,
            Direction::Backward,
            d.tgt,
            d.src,
            eager_spt,
            interrupt,
        )?;
        self.relaxations += f.relaxations + b.relaxations;
        self.max_depth = self.max_depth.max(f.max_depth).max(b.max_depth);
        self.max_adjacency = self.max_adjacency.max(f.max_adjacency).max(b.max_adjacency);
        Ok(())
    }

    /// Reduced weight of an active edge, memoized for the current round.
    pub fn reduced_weight(&mut self, graph: &GraphStore<W>, e: EdgeId) -> W {
        match self.rwt.get(e) {
            Some(r) => r,
            None => {
                let d = graph.edge(e);
                let r = graph.pi(d.src) + d.weight - graph.pi(d.tgt);
                debug_assert!(r >= W::zero());
                self.rwt.set(e, r);
                r
            }
        }
    }
}
