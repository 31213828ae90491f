//! End-to-end scenarios: whole parameter files through whole runs.

use germline_script::Script;
use germline_sim::input;
use germline_sim::{SimError, Simulation};
use std::io::Write;

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn build(content: &str, script: Option<&str>, seed: Option<i64>) -> Result<Simulation, SimError> {
    let file = write_temp(content);
    let config = input::parse_file(file.path())?;
    let script = script.map(|source| Script::parse(source).unwrap());
    Simulation::from_config(config, script.as_ref(), seed)
}

fn run_to_string(sim: &mut Simulation) -> String {
    let mut out = Vec::new();
    sim.run(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

const NEUTRAL: &str = "\
#MUTATION TYPES
m1 0.5 f 0.0

#MUTATION RATE
0.0

#GENOMIC ELEMENT TYPES
g1 m1 1.0

#CHROMOSOME ORGANIZATION
g1 1 1000

#RECOMBINATION RATE
1000 0.0

#GENERATIONS
10

#DEMOGRAPHY AND STRUCTURE
1 P p1 100

#OUTPUT
10 A
";

#[test]
fn minimal_neutral_run() {
    let mut sim = build(NEUTRAL, None, Some(7)).unwrap();
    let dump = run_to_string(&mut sim);

    assert!(dump.contains("#OUT: 10 A"));
    assert!(dump.contains("Populations:\np1 100\n"));
    // no mutations and no substitutions anywhere
    assert!(dump.contains("Mutations:\nGenomes:\n"));
    assert_eq!(sim.pool.len(), 0);
    assert!(sim.substitutions.is_empty());
    assert_eq!(sim.generation(), 11);
}

const FIXATION: &str = "\
#MUTATION TYPES
m1 0.5 f 0.5

#MUTATION RATE
1e-3

#GENOMIC ELEMENT TYPES
g1 m1 1.0

#CHROMOSOME ORGANIZATION
g1 1 100

#RECOMBINATION RATE
100 0.0

#GENERATIONS
5000

#DEMOGRAPHY AND STRUCTURE
1 P p1 50
";

#[test]
fn beneficial_mutations_fix_and_convert() {
    let mut sim = build(FIXATION, None, Some(1)).unwrap();
    run_to_string(&mut sim);

    assert!(
        !sim.substitutions.is_empty(),
        "expected at least one substitution after 5000 generations"
    );
    // invariant: after promotion no live mutation of a converting type sits
    // at frequency 1
    let (counts, total) = sim.tally_frequencies();
    for (id, mutation) in sim.pool.iter() {
        let mutation_type = &sim.chromosome.mutation_types[mutation.type_index];
        if mutation_type.convert_to_substitution {
            assert!(
                (counts[id.0 as usize] as usize) < total,
                "live mutation at frequency 1 survived promotion"
            );
        }
    }
}

#[test]
fn genomes_stay_sorted_under_recombination() {
    let content = FIXATION
        .replace("100 0.0", "100 1e-3")
        .replace("#GENERATIONS\n5000", "#GENERATIONS\n200");
    let mut sim = build(&content, None, Some(3)).unwrap();
    run_to_string(&mut sim);

    for subpop in sim.subpops.values() {
        for genome in &subpop.parent_genomes {
            let positions: Vec<i64> = genome
                .mutations()
                .iter()
                .map(|&id| sim.pool.get(id).position)
                .collect();
            assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}

const MIGRATION: &str = "\
#MUTATION TYPES
m1 0.5 f 0.0

#MUTATION RATE
1e-3

#GENOMIC ELEMENT TYPES
g1 m1 1.0

#CHROMOSOME ORGANIZATION
g1 1 100

#RECOMBINATION RATE
100 0.0

#GENERATIONS
500

#DEMOGRAPHY AND STRUCTURE
1 P p1 100
1 P p2 100
1 M p2 p1 0.1
";

#[test]
fn migration_couples_allele_frequencies() {
    let mut sim = build(MIGRATION, None, Some(42)).unwrap();
    run_to_string(&mut sim);

    assert_eq!(sim.subpops.len(), 2);
    assert_eq!(sim.subpops[&1].parent_count(), 100);
    assert_eq!(sim.subpops[&2].parent_count(), 100);

    // per-subpop frequencies of every live mutation
    let mut diffs = Vec::new();
    let mut shared = 0usize;
    for (id, _) in sim.pool.iter() {
        let mut freqs = [0.0f64; 2];
        for (slot, subpop_id) in [(0usize, 1i64), (1, 2)] {
            let subpop = &sim.subpops[&subpop_id];
            let carriers = subpop
                .parent_genomes
                .iter()
                .filter(|g| g.contains(id))
                .count();
            freqs[slot] = carriers as f64 / subpop.parent_genomes.len() as f64;
        }
        if freqs[0] > 0.0 && freqs[1] > 0.0 {
            shared += 1;
        }
        diffs.push((freqs[0] - freqs[1]).abs());
    }
    assert!(shared > 0, "migration produced no shared polymorphism");
    let mean_diff: f64 = diffs.iter().sum::<f64>() / diffs.len().max(1) as f64;
    assert!(mean_diff < 0.2, "frequencies diverged: mean diff {mean_diff}");
}

#[test]
fn fixed_seed_reproduces_dumps_bit_for_bit() {
    let content = FIXATION.replace("#GENERATIONS\n5000", "#GENERATIONS\n300");
    let mut first = build(&content, None, Some(9001)).unwrap();
    let mut second = build(&content, None, Some(9001)).unwrap();

    let mut dump_a = Vec::new();
    let mut dump_b = Vec::new();
    first.run(&mut Vec::new()).unwrap();
    second.run(&mut Vec::new()).unwrap();
    germline_sim::output::write_full(&first.chromosome, &first.subpops, &first.pool, &mut dump_a)
        .unwrap();
    germline_sim::output::write_full(
        &second.chromosome,
        &second.subpops,
        &second.pool,
        &mut dump_b,
    )
    .unwrap();
    assert_eq!(dump_a, dump_b);

    let mut third = build(&content, None, Some(9002)).unwrap();
    third.run(&mut Vec::new()).unwrap();
    let mut dump_c = Vec::new();
    germline_sim::output::write_full(&third.chromosome, &third.subpops, &third.pool, &mut dump_c)
        .unwrap();
    assert_ne!(dump_a, dump_c);
}

#[test]
fn dump_then_load_round_trips() {
    let content = FIXATION.replace("#GENERATIONS\n5000", "#GENERATIONS\n100");
    let mut sim = build(&content, None, Some(5)).unwrap();
    run_to_string(&mut sim);

    let mut dump = Vec::new();
    germline_sim::output::write_full(&sim.chromosome, &sim.subpops, &sim.pool, &mut dump).unwrap();
    let dump_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(dump_file.path(), &dump).unwrap();

    // a config that initializes from the dump and immediately dumps again
    let reload = format!(
        "\
#MUTATION TYPES
m1 0.5 f 0.5

#MUTATION RATE
1e-3

#GENOMIC ELEMENT TYPES
g1 m1 1.0

#CHROMOSOME ORGANIZATION
g1 1 100

#RECOMBINATION RATE
100 0.0

#GENERATIONS
1

#INITIALIZATION
{}
",
        dump_file.path().display()
    );
    let file = write_temp(&reload);
    let config = input::parse_file(file.path()).unwrap();
    let reloaded = Simulation::from_config(config, None, Some(5)).unwrap();

    let mut dump2 = Vec::new();
    germline_sim::output::write_full(
        &reloaded.chromosome,
        &reloaded.subpops,
        &reloaded.pool,
        &mut dump2,
    )
    .unwrap();
    assert_eq!(dump, dump2);
}

const INTRODUCED: &str = "\
#MUTATION TYPES
m1 0.5 f 0.0

#MUTATION RATE
0.0

#GENOMIC ELEMENT TYPES
g1 m1 1.0

#CHROMOSOME ORGANIZATION
g1 1 1000

#RECOMBINATION RATE
1000 0.0

#GENERATIONS
5

#DEMOGRAPHY AND STRUCTURE
1 P p1 50

#PREDETERMINED MUTATIONS
1 m1 500 p1 5 10
";

#[test]
fn introduced_mutations_enter_with_requested_counts() {
    let mut sim = build(INTRODUCED, None, Some(11)).unwrap();

    // one step: the introduction lands in generation 1's children
    let mut out = Vec::new();
    sim.step(&mut out).unwrap();

    let (counts, total) = sim.tally_frequencies();
    assert_eq!(total, 100);
    let live: Vec<u32> = sim
        .pool
        .iter()
        .map(|(id, _)| counts[id.0 as usize])
        .collect();
    // 5 homozygotes and 10 heterozygotes: 20 copies
    assert_eq!(live, vec![20]);

    // with zero mutation and recombination rates, every later genome is a
    // verbatim parental copy: it carries either the introduced allele or
    // nothing
    run_to_string(&mut sim);
    for subpop in sim.subpops.values() {
        for genome in &subpop.parent_genomes {
            assert!(genome.len() <= 1);
        }
    }
}

#[test]
fn partial_sweep_holds_frequency_below_target() {
    let content = format!("{INTRODUCED}\n").replace(
        "1 m1 500 p1 5 10",
        "1 m1 500 p1 40 5 P 0.5",
    );
    let content = content.replace("#GENERATIONS\n5", "#GENERATIONS\n50");
    let mut sim = build(&content, None, Some(13)).unwrap();
    let mut out = Vec::new();
    for _ in 0..50 {
        sim.step(&mut out).unwrap();
        let (counts, total) = sim.tally_frequencies();
        for (id, _) in sim.pool.iter() {
            let frequency = counts[id.0 as usize] as f64 / total as f64;
            assert!(
                frequency <= 0.5 + 1e-9,
                "sweep frequency {frequency} exceeds its target"
            );
        }
    }
}

#[test]
fn migration_rate_sum_must_stay_below_one() {
    let content = MIGRATION.replace("1 M p2 p1 0.1", "1 M p2 p1 1.0");
    let mut sim = build(&content, None, Some(1)).unwrap();
    let err = sim.step(&mut Vec::new()).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));
}

#[test]
fn events_reference_existing_subpops() {
    let content = MIGRATION.replace("1 M p2 p1 0.1", "1 M p2 p9 0.1");
    let mut sim = build(&content, None, Some(1)).unwrap();
    let err = sim.step(&mut Vec::new()).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));
}

#[test]
fn resized_to_zero_subpop_is_removed_at_next_tick() {
    let content = NEUTRAL.replace(
        "1 P p1 100",
        "1 P p1 100\n1 P p2 20\n3 N p2 0",
    );
    let mut sim = build(&content, None, Some(2)).unwrap();
    let mut out = Vec::new();
    // generations 1-3: p2 exists; resize fires at 3
    for _ in 0..3 {
        sim.step(&mut out).unwrap();
    }
    assert!(sim.subpops.contains_key(&2));
    // the next event tick drops it
    sim.step(&mut out).unwrap();
    assert!(!sim.subpops.contains_key(&2));
}

#[test]
fn accepting_modify_child_callback_leaves_dynamics_unchanged() {
    let content = FIXATION.replace("#GENERATIONS\n5000", "#GENERATIONS\n100");
    let mut plain = build(&content, None, Some(77)).unwrap();
    let mut scripted = build(&content, Some("modifyChild() { T; }"), Some(77)).unwrap();

    plain.run(&mut Vec::new()).unwrap();
    scripted.run(&mut Vec::new()).unwrap();

    let mut dump_a = Vec::new();
    let mut dump_b = Vec::new();
    germline_sim::output::write_full(&plain.chromosome, &plain.subpops, &plain.pool, &mut dump_a)
        .unwrap();
    germline_sim::output::write_full(
        &scripted.chromosome,
        &scripted.subpops,
        &scripted.pool,
        &mut dump_b,
    )
    .unwrap();
    assert_eq!(dump_a, dump_b);
}

#[test]
fn rejecting_modify_child_callback_hits_the_retry_cap() {
    let mut sim = build(NEUTRAL, Some("modifyChild() { F; }"), Some(1)).unwrap();
    let err = sim.step(&mut Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        SimError::CallbackLimit {
            callback: "modifyChild"
        }
    ));
}

#[test]
fn fitness_callback_overrides_contributions() {
    // the callback neutralizes the strong benefit of m1, so fixation slows
    // drastically; with the override everything stays effectively neutral
    let content = FIXATION.replace("#GENERATIONS\n5000", "#GENERATIONS\n50");
    let mut scripted = build(
        &content,
        Some("fitness(m1) { 1.0; }"),
        Some(21),
    )
    .unwrap();
    scripted.run(&mut Vec::new()).unwrap();
    for subpop in scripted.subpops.values() {
        for &w in subpop.cached_fitness() {
            assert!((w - 1.0).abs() < 1e-12);
        }
    }
}

#[test]
fn mate_choice_callback_can_force_one_father() {
    // weight everything onto index 0 of the source: every second parent is
    // individual 0
    let script = "mateChoice() { c(1.0, rep(0.0, 49)); }";
    let content = NEUTRAL.replace("1 P p1 100", "1 P p1 50");
    let mut sim = build(&content, Some(script), Some(31)).unwrap();
    // just verify the run completes; the weight-vector path is covered at
    // unit level
    sim.run(&mut Vec::new()).unwrap();
}

#[test]
fn script_can_add_a_subpop_at_initialization() {
    let mut sim = build(NEUTRAL, Some("sim.addSubpop(2, 30);"), Some(4)).unwrap();
    assert!(sim.subpops.contains_key(&2));
    assert_eq!(sim.subpops[&2].parent_count(), 30);
    sim.run(&mut Vec::new()).unwrap();
    assert_eq!(sim.subpops[&2].parent_count(), 30);
}

#[test]
fn a_population_must_be_defined_somewhere() {
    let content = NEUTRAL.replace("#DEMOGRAPHY AND STRUCTURE\n1 P p1 100\n", "");
    let file = write_temp(&content);
    assert!(matches!(
        input::parse_file(file.path()),
        Err(SimError::InvalidInput { .. })
    ));
}
