use germline_sim::Simulation;

pub fn print_parameters(sim: &Simulation) {
    let chromosome = &sim.chromosome;

    println!("📋 Simulation Configuration");
    println!("  • Generations: {} [#GENERATIONS]", sim.duration());
    if sim.time_start() != 1 {
        println!("  • Starting Generation: {}", sim.time_start());
    }
    println!("  • Random Seed: {} [#SEED, --seed]", sim.seed());

    println!("\n🧬 Chromosome");
    println!(
        "  • Length: {} bp in {} genomic element(s)",
        chromosome.last_position() + 1,
        chromosome.elements.len()
    );
    println!(
        "  • Mutation Rate: {:.2e} per base [#MUTATION RATE]",
        chromosome.overall_mutation_rate
    );
    println!(
        "  • Mutation Types: {} [#MUTATION TYPES]",
        chromosome.mutation_types.len()
    );
    for mutation_type in &chromosome.mutation_types {
        println!("    - {mutation_type}");
    }
    println!(
        "  • Recombination: {} interval(s), {:.3e} expected crossovers per gamete",
        chromosome.recombination_rates.len(),
        chromosome.overall_recombination_rate()
    );
    if chromosome.gene_conversion.fraction > 0.0 {
        println!(
            "  • Gene Conversion: fraction {:.2}, mean tract {} bp",
            chromosome.gene_conversion.fraction, chromosome.gene_conversion.mean_length
        );
    } else {
        println!("  • Gene Conversion: Disabled");
    }

    println!("\n👥 Population");
    if sim.subpops.is_empty() {
        println!("  • No subpopulations yet (created by events)");
    } else {
        for (id, subpop) in &sim.subpops {
            println!("  • p{id}: {} individuals", subpop.parent_count());
        }
    }
    println!();
}
