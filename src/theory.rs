pub mod atoms;
mod deduction;
mod distances;
mod feasibility;
pub mod graph;
mod sssp;

use crate::backtrack::{Backtrack, Trail};
use crate::collections::ref_store::RefMap;
use crate::env::EnvParam;
use crate::num::Weight;
use crate::theory::atoms::{normalize, AtomId, EdgeId, LeqAtom, Vert};
use crate::theory::deduction::find_heavy_edges;
use crate::theory::distances::DijkstraState;
use crate::theory::feasibility::{CycleFinder, Feasibility};
use crate::theory::graph::{AtomRecording, AtomState, GraphStore};
use crate::theory::sssp::{Direction, SsspEngine};
use crate::DlError;
use log::{debug, trace};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub static DL_THEORY_PROPAGATION: EnvParam<bool> = EnvParam::new("DLNET_THEORY_PROPAGATION", "true");
pub static DL_LAZY_GENERATION: EnvParam<bool> = EnvParam::new("DLNET_LAZY_GENERATION", "false");
pub static DL_LOGIC: EnvParam<Logic> = EnvParam::new("DLNET_LOGIC", "integer");
pub static DL_RESCALE: EnvParam<bool> = EnvParam::new("DLNET_RESCALE", "true");

/// The arithmetic flavor of the difference constraints.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Logic {
    IntegerDl,
    RationalDl,
}

impl FromStr for Logic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(Logic::IntegerDl),
            "rational" => Ok(Logic::RationalDl),
            x => Err(format!("Unknown logic: {}. Valid options: integer, rational", x)),
        }
    }
}

/// Options of the difference-logic core.
///
/// The default value of all parameters can be set through environment variables.
#[derive(Clone, Debug)]
pub struct DlConfig {
    /// If true, each feasible activation is followed by a deduction round
    /// that reports inactive atoms entailed by the active ones.
    pub theory_propagation: bool,
    /// If true, the reason of a deduced atom is reconstructed on demand when
    /// an explanation is requested, instead of being captured from the
    /// shortest-path trees at deduction time.
    pub lazy_generation: bool,
    pub logic: Logic,
    /// Whether rational weights are rescaled to integral values with the
    /// factor provided by the term store (see `DlTheory::set_rescale_factor`).
    pub rescale: bool,
}

impl Default for DlConfig {
    fn default() -> Self {
        DlConfig {
            theory_propagation: DL_THEORY_PROPAGATION.get(),
            lazy_generation: DL_LAZY_GENERATION.get(),
            logic: DL_LOGIC.get(),
            rescale: DL_RESCALE.get(),
        }
    }
}

/// A cloneable handle used to request early termination of a running check.
/// The flag is polled between vertex extractions; an interrupted operation
/// rolls back its partial mutations and returns [DlError::Interrupted].
#[derive(Clone, Default)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Re-arms the core after an interruption was observed.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A conjunction of asserted signed atoms that entails a conflict or an
/// implied atom.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Explanation {
    pub lits: SmallVec<[AtomId; 8]>,
}

impl Explanation {
    fn of_edges(edges: &[EdgeId]) -> Explanation {
        Explanation {
            lits: edges.iter().map(|&e| AtomId::from(e)).collect(),
        }
    }

    /// Literals in a canonical order, for set comparisons.
    pub fn sorted(&self) -> Vec<AtomId> {
        let mut lits: Vec<AtomId> = self.lits.to_vec();
        lits.sort();
        lits
    }
}

/// Result of an assertion.
#[derive(Clone, Debug)]
pub enum TheoryStatus {
    Consistent,
    /// The assertion closed a negative cycle; the explanation holds the
    /// atoms whose edges lie on it, the asserted one included.
    Inconsistent(Explanation),
}

/// An entailed atom reported by the deduction scanner.
#[derive(Clone, Debug)]
pub struct Deduction {
    /// Non-negated handle of the entailed atom.
    pub atom: AtomId,
    pub polarity: bool,
    /// Asserted atoms whose edges form a path subsuming the entailed one.
    pub reason: Explanation,
}

#[derive(Clone, Debug)]
enum Reason {
    /// Entailing path captured from the shortest-path trees at deduction time.
    Path(Vec<EdgeId>),
    /// Lazy variant: the path is reconstructed on demand and is only known
    /// to run through this activated edge.
    Via(EdgeId),
}

#[derive(Copy, Clone, Debug)]
enum Event<W> {
    Activated(EdgeId),
    Promoted(EdgeId),
    Implied(EdgeId),
    ReasonStored(EdgeId),
    PotentialChanged(Vert, W),
}

#[derive(Default, Clone)]
struct Stats {
    checks: u64,
    conflicts: u64,
    deductions: u64,
    deduction_rounds: u64,
    distance_updates: u64,
    peak_active: usize,
}

/// Incremental difference-logic decision procedure.
///
/// Atoms of the form `x - y <= c` (and the degenerate shapes `x <= y`,
/// `x <= c`, `c <= x`) are declared once and then asserted and retracted by
/// an outer Boolean search. Each activation is checked for feasibility by
/// repairing the vertex potentials; feasible activations may be followed by
/// a deduction round that reports entailed inactive atoms.
///
/// Once an assertion reported a conflict, the only valid operation is to
/// backtrack past it; the behavior of further assertions is unspecified.
///
/// Retractions must mirror assertions in LIFO order, which is guaranteed
/// when the driver backtracks through `push`/`pop` pairs.
///
/// Weights are added along paths without overflow checks; the caller picks a
/// weight type wide enough for its graphs.
#[derive(Clone)]
pub struct DlTheory<W: Weight> {
    pub config: DlConfig,
    graph: GraphStore<W>,
    cycles: CycleFinder<W>,
    sssp: SsspEngine<W>,
    trail: Trail<Event<W>>,
    /// Reasons of the currently implied atoms, keyed by the implied edge.
    reasons: RefMap<EdgeId, Reason>,
    /// Implied atoms not yet handed out by `deduce`.
    pending: VecDeque<EdgeId>,
    rescale_factor: Option<W>,
    interrupt: Interrupter,
    dijkstra: DijkstraState<W>,
    heavy: Vec<EdgeId>,
    stats: Stats,
}

impl<W: Weight> Default for DlTheory<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Weight> DlTheory<W> {
    pub fn new() -> DlTheory<W> {
        Self::with_config(DlConfig::default())
    }

    pub fn with_config(config: DlConfig) -> DlTheory<W> {
        DlTheory {
            config,
            graph: GraphStore::new(),
            cycles: Default::default(),
            sssp: Default::default(),
            trail: Default::default(),
            reasons: Default::default(),
            pending: VecDeque::new(),
            rescale_factor: None,
            interrupt: Interrupter::default(),
            dijkstra: Default::default(),
            heavy: Vec::new(),
            stats: Default::default(),
        }
    }

    /// Sets the factor by which rational weights are multiplied to make them
    /// integral. Provided by the term store; ignored for integer logics.
    pub fn set_rescale_factor(&mut self, factor: W) {
        self.rescale_factor = Some(factor);
    }

    /// A handle through which a long-running check can be cancelled.
    pub fn interrupter(&self) -> Interrupter {
        self.interrupt.clone()
    }

    fn scale(&self) -> Option<W> {
        if self.config.logic == Logic::RationalDl && self.config.rescale {
            self.rescale_factor
        } else {
            None
        }
    }

    /// Registers an atom and returns its signed handle. Idempotent: an atom
    /// matching a previously declared one (or its negation) is unified with
    /// the existing pair.
    pub fn declare(&mut self, atom: &LeqAtom<W>) -> Result<AtomRecording, DlError> {
        let raw = normalize(atom, self.scale())?;
        Ok(self.graph.declare(raw, self.config.theory_propagation))
    }

    /// Asserts the given atom at the given polarity and checks feasibility of
    /// the active constraint graph.
    ///
    /// Returns `Consistent`, `Inconsistent` with the negative cycle as
    /// explanation, or `Err(Interrupted)` with all partial mutations undone.
    pub fn assert_lit(&mut self, atom: AtomId, polarity: bool) -> Result<TheoryStatus, DlError> {
        let lit = if polarity { atom } else { !atom };
        let edge = EdgeId::from(lit);
        match self.graph.state(edge.base_id()) {
            AtomState::Active { negation } => {
                if negation == edge.is_negation() {
                    return Ok(TheoryStatus::Consistent);
                }
                // the complementary edge is active; the two members of a
                // pair close a cycle of length -step, so this is the
                // smallest possible conflict
                self.stats.conflicts += 1;
                return Ok(TheoryStatus::Inconsistent(Explanation::of_edges(&[!edge, edge])));
            }
            AtomState::Implied { negation } if negation == edge.is_negation() => {
                // the driver decided an atom we already deduced: promote it
                // silently, the graph structure is unchanged
                self.graph.promote(edge);
                self.trail.push(Event::Promoted(edge));
                return Ok(TheoryStatus::Consistent);
            }
            AtomState::Implied { .. } => {
                // asserting the opposite of a deduced atom: contradicts the
                // reason that entailed it
                self.stats.conflicts += 1;
                let mut expl = self.explain_edge(!edge);
                expl.lits.push(lit);
                return Ok(TheoryStatus::Inconsistent(expl));
            }
            AtomState::Inactive => {}
        }

        let mark = self.trail.len();
        self.trail.push(Event::Activated(edge));
        self.graph.activate(edge, self.config.theory_propagation);
        self.stats.checks += 1;
        self.stats.peak_active = self.stats.peak_active.max(self.graph.num_active());
        trace!("activated edge {:?}", edge);

        let feasibility = match self.cycles.check(&mut self.graph, edge, &self.interrupt) {
            Ok(f) => f,
            Err(err) => {
                self.undo_to(mark);
                return Err(err);
            }
        };
        self.stats.distance_updates += self.cycles.take_relaxations();

        match feasibility {
            Feasibility::Infeasible(cycle) => {
                self.stats.conflicts += 1;
                debug!("negative cycle through {} edges", cycle.len());
                Ok(TheoryStatus::Inconsistent(Explanation::of_edges(&cycle)))
            }
            Feasibility::Feasible => {
                let trail = &mut self.trail;
                self.cycles
                    .drain_changes()
                    .for_each(|(v, old)| trail.push(Event::PotentialChanged(v, old)));
                if self.config.theory_propagation {
                    if let Err(err) = self.deduction_round(edge) {
                        self.undo_to(mark);
                        return Err(err);
                    }
                }
                Ok(TheoryStatus::Consistent)
            }
        }
    }

    /// Runs the SSSP passes and the heavy-edge scan for a freshly activated
    /// feasible edge, recording every entailed atom as implied.
    fn deduction_round(&mut self, edge: EdgeId) -> Result<(), DlError> {
        let d = self.graph.edge(edge);
        if d.src == d.tgt || self.graph.has_dominating_parallel(edge) {
            // a parallel active edge of smaller weight subsumes this one:
            // nothing new can be entailed
            return Ok(());
        }
        self.stats.deduction_rounds += 1;
        self.sssp
            .run(&self.graph, edge, !self.config.lazy_generation, &self.interrupt)?;
        self.heavy.clear();
        find_heavy_edges(&self.graph, &mut self.sssp, edge, &mut self.heavy);
        let heavy = std::mem::take(&mut self.heavy);
        for &implied in &heavy {
            trace!("implied edge {:?}", implied);
            self.trail.push(Event::Implied(implied));
            self.graph.imply(implied, true);
            let reason = if self.config.lazy_generation {
                Reason::Via(edge)
            } else {
                Reason::Path(self.tree_path(implied, edge))
            };
            self.reasons.insert(implied, reason);
            self.trail.push(Event::ReasonStored(implied));
            self.pending.push_back(implied);
            self.stats.deductions += 1;
        }
        self.heavy = heavy;
        Ok(())
    }

    /// Emits the atoms implied since the previous call, together with their
    /// polarities and reasons. May be empty.
    pub fn deduce(&mut self) -> Vec<Deduction> {
        let mut out = Vec::with_capacity(self.pending.len());
        while let Some(edge) = self.pending.pop_front() {
            out.push(Deduction {
                atom: AtomId::new(edge.base_id(), false),
                polarity: !edge.is_negation(),
                reason: self.explain_edge(edge),
            });
        }
        out
    }

    /// Reconstructs the clause of asserted atoms that entailed the given
    /// implied signed atom.
    ///
    /// Must be called while the implication is still in scope, i.e. before
    /// the decision level that produced it is popped.
    pub fn explain(&mut self, lit: AtomId) -> Explanation {
        self.explain_edge(EdgeId::from(lit))
    }

    fn explain_edge(&mut self, edge: EdgeId) -> Explanation {
        let reason = self.reasons.get(edge).cloned();
        match reason {
            Some(Reason::Path(path)) => Explanation::of_edges(&path),
            Some(Reason::Via(via)) => self.reconstruct_path(edge, via),
            None => {
                debug_assert!(false, "no reason recorded for {:?}", edge);
                Explanation::default()
            }
        }
    }

    /// Extracts the entailing path of `implied: a -> b` from the trees built
    /// when it was deduced: the backward branch `a -> .. -> u` up to and
    /// including the activated edge `via: u -> v`, then the forward branch
    /// `v -> .. -> b`.
    fn tree_path(&self, implied: EdgeId, via: EdgeId) -> Vec<EdgeId> {
        let d = self.graph.edge(implied);
        let vd = self.graph.edge(via);
        let mut path = Vec::with_capacity(8);

        let mut cur = self.sssp.bwd.spt.get(d.src).expect("unreached source of an implied edge");
        path.push(cur);
        while self.graph.edge(cur).src != vd.src {
            cur = self.sssp.bwd.spt.get(self.graph.edge(cur).tgt).unwrap();
            path.push(cur);
        }
        debug_assert_eq!(*path.last().unwrap(), via);

        if d.tgt != vd.tgt {
            let mut cur = self.sssp.fwd.spt.get(d.tgt).expect("unreached target of an implied edge");
            path.push(cur);
            while self.graph.edge(cur).src != vd.tgt {
                cur = self.sssp.fwd.spt.get(self.graph.edge(cur).src).unwrap();
                path.push(cur);
            }
        }
        path
    }

    /// Lazy counterpart of `tree_path`: re-derives an entailing path of
    /// `implied: a -> b` through `via: u -> v` with two reduced-weight
    /// Dijkstra runs over the currently active graph.
    fn reconstruct_path(&mut self, implied: EdgeId, via: EdgeId) -> Explanation {
        let d = self.graph.edge(implied);
        let vd = self.graph.edge(via);
        let mut path = vec![via];
        self.shortest_path(vd.tgt, d.tgt, Direction::Forward, &mut path);
        self.shortest_path(vd.src, d.src, Direction::Backward, &mut path);
        Explanation::of_edges(&path)
    }

    /// Appends to `out` the edges of a shortest path between `from` and `to`
    /// over the active graph: the `from -> to` path when searching forward,
    /// the `to -> from` path when searching backward.
    fn shortest_path(&mut self, from: Vert, to: Vert, dir: Direction, out: &mut Vec<EdgeId>) {
        if from == to {
            return;
        }
        self.dijkstra.clear();
        self.dijkstra.enqueue(from, W::zero(), None);
        while let Some((x, dx)) = self.dijkstra.dequeue() {
            if x == to {
                break;
            }
            let edges = match dir {
                Direction::Forward => self.graph.active_out(x),
                Direction::Backward => self.graph.active_in(x),
            };
            for &edge in edges {
                let de = self.graph.edge(edge);
                let t = match dir {
                    Direction::Forward => de.tgt,
                    Direction::Backward => de.src,
                };
                let rwt = self.graph.pi(de.src) + de.weight - self.graph.pi(de.tgt);
                debug_assert!(rwt >= W::zero());
                self.dijkstra.enqueue(t, dx + rwt, Some(edge));
            }
        }
        let mut cur = to;
        while cur != from {
            let edge = self.dijkstra.predecessor(cur).expect("no path to explain with");
            out.push(edge);
            cur = match dir {
                Direction::Forward => self.graph.edge(edge).src,
                Direction::Backward => self.graph.edge(edge).tgt,
            };
        }
    }

    fn undo_to(&mut self, mark: usize) {
        let graph = &mut self.graph;
        let reasons = &mut self.reasons;
        let deduction = self.config.theory_propagation;
        self.trail.undo_to_len_with(mark, |ev| undo(graph, reasons, deduction, ev));
    }

    pub fn print_stats(&self) {
        println!("# vertices: {}", self.graph.num_vertices());
        println!("# atoms: {}", self.graph.num_atoms());
        println!("# checks: {}", self.stats.checks);
        println!("# conflicts: {}", self.stats.conflicts);
        println!("# deduction rounds: {}", self.stats.deduction_rounds);
        println!("# deductions: {}", self.stats.deductions);
        println!(
            "# distance updates: {}",
            self.stats.distance_updates + self.sssp.relaxations
        );
        println!("# peak active edges: {}", self.stats.peak_active);
        println!("# max adjacency list size: {}", self.sssp.max_adjacency);
        println!("# max tree depth: {}", self.sssp.max_depth);
    }
}

fn undo<W: Weight>(
    graph: &mut GraphStore<W>,
    reasons: &mut RefMap<EdgeId, Reason>,
    deduction: bool,
    ev: Event<W>,
) {
    match ev {
        Event::Activated(e) => graph.deactivate(e, deduction),
        Event::Promoted(e) => graph.demote(e),
        Event::Implied(e) => graph.unimply(e, deduction),
        Event::ReasonStored(e) => reasons.remove(e),
        Event::PotentialChanged(v, old) => graph.set_pi(v, old),
    }
}

impl<W: Weight> Backtrack for DlTheory<W> {
    fn save_state(&mut self) -> u32 {
        self.trail.save_state()
    }

    fn num_saved(&self) -> u32 {
        self.trail.num_saved()
    }

    fn restore_last(&mut self) {
        // deductions that were not drained die with the level
        self.pending.clear();
        let graph = &mut self.graph;
        let reasons = &mut self.reasons;
        let deduction = self.config.theory_propagation;
        self.trail
            .restore_last_with(|ev| undo(graph, reasons, deduction, ev));
    }
}

impl<W: Weight> DlTheory<W> {
    /// Opens a new decision level.
    pub fn push(&mut self) {
        self.save_state();
    }

    /// Undoes every assertion and deduction of the latest decision level.
    pub fn pop(&mut self) {
        self.restore_last();
    }
}
