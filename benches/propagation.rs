use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use dlnet::{AtomId, DlConfig, DlTheory, LeqAtom, Logic};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn theory_with(atoms: &[(u32, u32, i64)]) -> (DlTheory<i64>, Vec<AtomId>) {
    let mut theory = DlTheory::with_config(DlConfig {
        theory_propagation: true,
        lazy_generation: false,
        logic: Logic::IntegerDl,
        rescale: false,
    });
    let handles = atoms
        .iter()
        .map(|&(a, b, c)| {
            theory
                .declare(&LeqAtom::diff_leq_const(a, b, c))
                .unwrap()
                .atom()
        })
        .collect();
    (theory, handles)
}

/// x_{i+1} - x_i <= -1: every activation repairs a potential.
fn long_chain() -> Vec<(u32, u32, i64)> {
    (1..200).map(|i| (i + 1, i, -1)).collect()
}

fn random_graph() -> Vec<(u32, u32, i64)> {
    let mut rng = StdRng::seed_from_u64(9849879857498574);
    (0..400)
        .map(|_| {
            (
                rng.gen_range(1..100),
                rng.gen_range(1..100),
                rng.gen_range(0..10),
            )
        })
        .collect()
}

fn assert_all(c: &mut Criterion) {
    for (name, atoms) in [("LR-LIN", long_chain()), ("RAND", random_graph())] {
        let (theory, handles) = theory_with(&atoms);
        c.bench_function(&format!("assert-{}", name), |b| {
            b.iter_batched(
                || (theory.clone(), handles.clone()),
                |(mut theory, handles)| {
                    for h in handles {
                        black_box(theory.assert_lit(h, true).unwrap());
                        theory.deduce();
                    }
                    theory
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, assert_all);
criterion_main!(benches);
