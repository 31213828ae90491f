use criterion::{criterion_group, criterion_main, Criterion};
use germline_sim::input::InputConfig;
use germline_sim::mutation::{Dfe, MutationType};
use germline_sim::events::{Event, Schedule};
use germline_sim::Simulation;

fn bench_config(population: usize, length: i64) -> InputConfig {
    let mut events = Schedule::new();
    events.insert(
        1,
        Event::AddSubpopulation {
            subpop: 1,
            size: population,
            source: None,
        },
    );
    InputConfig {
        mutation_rate: 1e-5,
        mutation_types: vec![MutationType::new(1, 0.5, Dfe::Fixed(0.0))],
        element_types: vec![(1, vec![1], vec![1.0])],
        elements: vec![(1, 0, length - 1)],
        recombination: vec![(length - 1, 1e-6)],
        gene_conversion: Some((0.1, 20.0)),
        duration: 1_000_000,
        time_start: 1,
        events,
        seed: Some(42),
        ..Default::default()
    }
}

fn generation_step(c: &mut Criterion) {
    c.bench_function("step_n500_l10k", |b| {
        let mut sim = Simulation::from_config(bench_config(500, 10_000), None, None).unwrap();
        let mut sink = Vec::new();
        sim.step(&mut sink).unwrap();
        b.iter(|| sim.step(&mut sink).unwrap());
    });

    c.bench_function("step_n100_l100k", |b| {
        let mut sim = Simulation::from_config(bench_config(100, 100_000), None, None).unwrap();
        let mut sink = Vec::new();
        sim.step(&mut sink).unwrap();
        b.iter(|| sim.step(&mut sink).unwrap());
    });
}

criterion_group!(benches, generation_step);
criterion_main!(benches);
