use anyhow::{Context, Result};
use germline_script::Script;
use germline_sim::{input, Simulation};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;

use crate::printing::print_parameters;

pub fn run_simulation(
    parameter_file: &Path,
    script_file: Option<&Path>,
    seed_override: Option<i64>,
    show_progress: bool,
    describe: bool,
) -> Result<()> {
    println!("🧬 Germline - Running Simulation");
    println!("============================================\n");

    let config = input::parse_file(parameter_file)?;

    if describe {
        let summary = serde_json::json!({
            "mutationRate": config.mutation_rate,
            "mutationTypes": config.mutation_types.len(),
            "genomicElementTypes": config.element_types.len(),
            "genomicElements": config.elements.len(),
            "recombinationIntervals": config.recombination.len(),
            "geneConversion": config.gene_conversion.map(|(fraction, length)| {
                serde_json::json!({ "fraction": fraction, "meanLength": length })
            }),
            "generations": config.duration,
            "timeStart": config.time_start,
            "seed": seed_override.or(config.seed),
            "initializationFile": config.initialization_file.as_ref().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let script = match script_file {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            Some(Script::parse(&source).context("failed to parse script")?)
        }
        None => None,
    };

    let mut sim = Simulation::from_config(config, script.as_ref(), seed_override)
        .context("failed to initialize simulation")?;

    print_parameters(&sim);

    let total = sim.duration();
    let pb = if show_progress {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {per_sec}",
                )
                .expect("static template is valid")
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for generation in 0..total {
        sim.step(&mut out)
            .with_context(|| format!("generation {}", sim.time_start() + generation))?;
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    out.flush()?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    println!("\n✓ Completed {total} generations (seed {})", sim.seed());
    println!(
        "  {} subpopulation(s), {} segregating mutation(s), {} substitution(s)",
        sim.subpops.len(),
        sim.pool.len(),
        sim.substitutions.len()
    );
    Ok(())
}
