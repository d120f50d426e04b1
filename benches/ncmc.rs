use criterion::{black_box, criterion_group, criterion_main, Criterion};
use blues::context::langevin::{LangevinContext, LangevinParams};
use blues::forcefield::softcore::SoftCoreForceField;
use blues::io::parse_xyz;
use blues::moves::{ProposalParameters, RigidBodyMove};
use blues::ncmc::{EngineParams, NcmcEngine, SwitchingSchedule, WorkAccumulator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
}

fn bench_ncmc_cycle(c: &mut Criterion) {
    let structure = parse_xyz(test_data_dir().join("argon_cluster.xyz")).unwrap();
    let mut context = LangevinContext::new(
        structure.particles,
        structure.configuration,
        &[0, 1],
        SoftCoreForceField::new(),
        LangevinParams::default(),
        1,
    )
    .unwrap();
    let mover = RigidBodyMove::new(
        vec![0, 1],
        context.masses().to_vec(),
        ProposalParameters {
            max_translation: 0.1,
            ..ProposalParameters::default()
        },
    )
    .unwrap();
    let mut engine = NcmcEngine::new(
        SwitchingSchedule::forward(50),
        Box::new(mover),
        EngineParams::default(),
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("ncmc_cycle_50_steps", |b| {
        b.iter(|| {
            let report = engine.run_cycle(&mut context, &mut rng).unwrap();
            black_box(report.outcome);
        })
    });
}

fn bench_work_accumulation(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let energies: Vec<f64> = (0..1001).map(|_| rng.gen_range(-100.0..100.0)).collect();
    let mut acc = WorkAccumulator::with_capacity(1000);

    c.bench_function("work_accumulation_1000", |b| {
        b.iter(|| {
            acc.begin_cycle();
            for pair in energies.windows(2) {
                acc.accumulate(pair[0], pair[1]).unwrap();
            }
            black_box(acc.total());
        })
    });
}

criterion_group!(ncmc_benches, bench_ncmc_cycle, bench_work_accumulation);
criterion_main!(ncmc_benches);
