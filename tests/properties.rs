//! Property-based tests driving the theory like a Boolean search would:
//! random assertions of both polarities interleaved with decision levels,
//! checked against a Bellman-Ford reference on every step.

use dlnet::collections::set::RefSet;
use dlnet::{DlConfig, DlTheory, LeqAtom, Logic, TheoryStatus};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Assert { a: u32, b: u32, c: i64, polarity: bool },
    Push,
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (1u32..6, 1u32..6, -8i64..8, any::<bool>())
            .prop_map(|(a, b, c, polarity)| Op::Assert { a, b, c, polarity }),
        1 => Just(Op::Push),
        1 => Just(Op::Pop),
    ]
}

/// A difference constraint `a - b <= c`.
type Constraint = (u32, u32, i64);

fn negate((a, b, c): Constraint) -> Constraint {
    (b, a, -c - 1)
}

fn effective(positive: Constraint, negation: bool) -> Constraint {
    if negation {
        negate(positive)
    } else {
        positive
    }
}

/// Bellman-Ford feasibility reference.
fn feasible(constraints: &[Constraint]) -> bool {
    let mut labels: RefSet<usize> = RefSet::new();
    for &(a, b, _) in constraints {
        labels.insert(a as usize);
        labels.insert(b as usize);
    }
    let verts: Vec<usize> = labels.iter().collect();
    let index = |v: u32| verts.binary_search(&(v as usize)).unwrap();
    let n = verts.len();
    let mut dist = vec![0i64; n];
    for _ in 0..n {
        let mut changed = false;
        for &(a, b, c) in constraints {
            let candidate = dist[index(b)] + c;
            if dist[index(a)] > candidate {
                dist[index(a)] = candidate;
                changed = true;
            }
        }
        if !changed {
            return true;
        }
    }
    constraints
        .iter()
        .all(|&(a, b, c)| dist[index(a)] <= dist[index(b)] + c)
}

struct Driver {
    theory: DlTheory<i64>,
    /// Asserted constraints per decision level.
    frames: Vec<Vec<Constraint>>,
    /// Base ids assigned (asserted or implied) per decision level.
    assigned_frames: Vec<Vec<u32>>,
    /// Base id -> negation bit of the edge currently holding.
    assigned: HashMap<u32, bool>,
    /// Base id -> constraint encoded by the pair's positive edge.
    positive: HashMap<u32, Constraint>,
}

impl Driver {
    fn new(lazy: bool) -> Driver {
        let mut theory = DlTheory::with_config(DlConfig {
            theory_propagation: true,
            lazy_generation: lazy,
            logic: Logic::IntegerDl,
            rescale: false,
        });
        theory.push();
        Driver {
            theory,
            frames: vec![Vec::new()],
            assigned_frames: vec![Vec::new()],
            assigned: HashMap::new(),
            positive: HashMap::new(),
        }
    }

    fn active(&self) -> Vec<Constraint> {
        self.frames.iter().flatten().copied().collect()
    }

    fn push(&mut self) {
        self.theory.push();
        self.frames.push(Vec::new());
        self.assigned_frames.push(Vec::new());
    }

    fn pop(&mut self) {
        self.theory.pop();
        self.frames.pop();
        for base in self.assigned_frames.pop().unwrap() {
            self.assigned.remove(&base);
        }
        if self.frames.is_empty() {
            self.push();
        }
    }

    fn constraint_of_lit(&self, lit: dlnet::AtomId) -> Constraint {
        effective(self.positive[&lit.base_id()], lit.is_negated())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn theory_agrees_with_bellman_ford(
        ops in proptest::collection::vec(op_strategy(), 1..80),
        lazy in any::<bool>(),
    ) {
        let mut drv = Driver::new(lazy);
        for op in ops {
            match op {
                Op::Push => drv.push(),
                Op::Pop => {
                    if drv.frames.len() > 1 {
                        drv.pop();
                    }
                }
                Op::Assert { a, b, c, polarity } => {
                    let h = drv.theory.declare(&LeqAtom::diff_leq_const(a, b, c)).unwrap().atom();
                    let base = h.base_id();
                    drv.positive.entry(base).or_insert_with(|| {
                        if h.is_negated() {
                            negate((a, b, c))
                        } else {
                            (a, b, c)
                        }
                    });
                    // negation bit of the edge this literal activates
                    let negation = h.is_negated() ^ !polarity;

                    if let Some(&held) = drv.assigned.get(&base) {
                        if held == negation {
                            // re-asserting a held atom is a no-op
                            let res = drv.theory.assert_lit(h, polarity).unwrap();
                            prop_assert!(matches!(res, TheoryStatus::Consistent));
                        } else {
                            // asserting the opposite of a held atom conflicts
                            // without touching the graph
                            match drv.theory.assert_lit(h, polarity).unwrap() {
                                TheoryStatus::Inconsistent(expl) => {
                                    let culprits: Vec<Constraint> = expl
                                        .lits
                                        .iter()
                                        .map(|&l| drv.constraint_of_lit(l))
                                        .collect();
                                    prop_assert!(
                                        !feasible(&culprits),
                                        "non-contradictory explanation"
                                    );
                                }
                                TheoryStatus::Consistent => {
                                    prop_assert!(false, "accepted both polarities of a pair");
                                }
                            }
                        }
                        continue;
                    }

                    let cons = effective(drv.positive[&base], negation);
                    let mut all = drv.active();
                    all.push(cons);
                    let reference = feasible(&all);

                    match drv.theory.assert_lit(h, polarity).unwrap() {
                        TheoryStatus::Consistent => {
                            prop_assert!(reference, "accepted an infeasible set: {:?}", all);
                            drv.frames.last_mut().unwrap().push(cons);
                            drv.assigned.insert(base, negation);
                            drv.assigned_frames.last_mut().unwrap().push(base);

                            for d in drv.theory.deduce() {
                                let dbase = d.atom.base_id();
                                let dcons = effective(drv.positive[&dbase], !d.polarity);
                                // the deduced atom must be entailed by the
                                // asserted constraints alone
                                let mut refuting = drv.active();
                                refuting.push(negate(dcons));
                                prop_assert!(!feasible(&refuting), "unsound deduction {:?}", dcons);
                                // and already by its reported reason
                                let mut reason: Vec<Constraint> = d
                                    .reason
                                    .lits
                                    .iter()
                                    .map(|&l| drv.constraint_of_lit(l))
                                    .collect();
                                reason.push(negate(dcons));
                                prop_assert!(!feasible(&reason), "unsound reason for {:?}", dcons);

                                drv.assigned.insert(dbase, !d.polarity);
                                drv.assigned_frames.last_mut().unwrap().push(dbase);
                            }
                        }
                        TheoryStatus::Inconsistent(expl) => {
                            prop_assert!(!reference, "rejected a feasible set: {:?}", all);
                            // the explanation must be contradictory on its own
                            let culprits: Vec<Constraint> =
                                expl.lits.iter().map(|&l| drv.constraint_of_lit(l)).collect();
                            prop_assert!(!feasible(&culprits), "non-contradictory explanation");
                            // and must only mention asserted constraints
                            // (the failed assertion included)
                            let active = drv.active();
                            for culprit in &culprits {
                                prop_assert!(
                                    active.contains(culprit) || *culprit == cons,
                                    "spurious explanation member {:?}",
                                    culprit
                                );
                            }
                            // the conflicting level must be undone before continuing
                            drv.pop();
                        }
                    }
                }
            }
        }
    }
}
