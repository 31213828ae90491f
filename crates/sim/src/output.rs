//! Output writers and the dump reader.
//!
//! The full-dump format has three sections: `Populations:` (`p<id> <size>`),
//! `Mutations:` (`<id> m<type> <pos> <s> <h> p<origin> <gen>`, positions
//! 1-based), and `Genomes:` (`p<id>:<index> <mut-id>...`). Dump-then-load
//! reproduces identical allele states and subpopulation sizes; the PRNG
//! state is not round-tripped.

use crate::chromosome::Chromosome;
use crate::errors::SimError;
use crate::mutation::{Mutation, MutationId, MutationPool, Substitution};
use crate::rng::EngineRng;
use crate::subpopulation::Subpopulation;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

/// Write the full population state.
pub fn write_full(
    chromosome: &Chromosome,
    subpops: &BTreeMap<i64, Subpopulation>,
    pool: &MutationPool,
    out: &mut dyn Write,
) -> Result<(), SimError> {
    writeln!(out, "Populations:")?;
    for (id, subpop) in subpops {
        writeln!(out, "p{id} {}", subpop.parent_count())?;
    }

    // number every distinct mutation in first-seen order
    let mut ids: HashMap<MutationId, usize> = HashMap::new();
    let mut ordered: Vec<MutationId> = Vec::new();
    for subpop in subpops.values() {
        for genome in &subpop.parent_genomes {
            for &id in genome.mutations() {
                ids.entry(id).or_insert_with(|| {
                    ordered.push(id);
                    ordered.len()
                });
            }
        }
    }

    writeln!(out, "Mutations:")?;
    for (index, &id) in ordered.iter().enumerate() {
        let mutation = pool.get(id);
        let mutation_type = &chromosome.mutation_types[mutation.type_index];
        writeln!(
            out,
            "{} m{} {} {} {} p{} {}",
            index + 1,
            mutation_type.id,
            mutation.position + 1,
            mutation.selection_coeff,
            mutation_type.dominance_coeff,
            mutation.subpop_id,
            mutation.origin_generation
        )?;
    }

    writeln!(out, "Genomes:")?;
    for (subpop_id, subpop) in subpops {
        for (index, genome) in subpop.parent_genomes.iter().enumerate() {
            write!(out, "p{subpop_id}:{}", index + 1)?;
            for id in genome.mutations() {
                write!(out, " {}", ids[id])?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Write a random sample of `size` individuals from one subpopulation, in
/// the dump's Mutations/Genomes layout scoped to the sample.
pub fn write_sample(
    chromosome: &Chromosome,
    subpop: &Subpopulation,
    pool: &MutationPool,
    size: usize,
    rng: &mut EngineRng,
    out: &mut dyn Write,
) -> Result<(), SimError> {
    let genome_indices = sample_genomes(subpop, size, rng)?;

    let mut ids: HashMap<MutationId, usize> = HashMap::new();
    let mut ordered: Vec<MutationId> = Vec::new();
    for &gi in &genome_indices {
        for &id in subpop.parent_genomes[gi].mutations() {
            ids.entry(id).or_insert_with(|| {
                ordered.push(id);
                ordered.len()
            });
        }
    }

    writeln!(out, "Mutations:")?;
    for (index, &id) in ordered.iter().enumerate() {
        let mutation = pool.get(id);
        let mutation_type = &chromosome.mutation_types[mutation.type_index];
        writeln!(
            out,
            "{} m{} {} {} {} p{} {}",
            index + 1,
            mutation_type.id,
            mutation.position + 1,
            mutation.selection_coeff,
            mutation_type.dominance_coeff,
            mutation.subpop_id,
            mutation.origin_generation
        )?;
    }

    writeln!(out, "Genomes:")?;
    for (row, &gi) in genome_indices.iter().enumerate() {
        write!(out, "p{}:{}", subpop.id, row + 1)?;
        for id in subpop.parent_genomes[gi].mutations() {
            write!(out, " {}", ids[id])?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write a sample in MS format: `//`, `segsites:`, `positions:` (relative),
/// and one 0/1 haplotype row per sampled genome.
pub fn write_sample_ms(
    chromosome: &Chromosome,
    subpop: &Subpopulation,
    pool: &MutationPool,
    size: usize,
    rng: &mut EngineRng,
    out: &mut dyn Write,
) -> Result<(), SimError> {
    let genome_indices = sample_genomes(subpop, size, rng)?;

    // polymorphic sites within the sample, ordered by position
    let mut segregating: BTreeMap<(i64, MutationId), ()> = BTreeMap::new();
    for &gi in &genome_indices {
        for &id in subpop.parent_genomes[gi].mutations() {
            segregating.insert((pool.get(id).position, id), ());
        }
    }
    let sites: Vec<(i64, MutationId)> = segregating.keys().copied().collect();

    writeln!(out, "//")?;
    writeln!(out, "segsites: {}", sites.len())?;
    if !sites.is_empty() {
        write!(out, "positions:")?;
        let span = (chromosome.last_position() + 1) as f64;
        for &(position, _) in &sites {
            write!(out, " {:.7}", position as f64 / span)?;
        }
        writeln!(out)?;
        for &gi in &genome_indices {
            let genome = &subpop.parent_genomes[gi];
            let mut row = String::with_capacity(sites.len());
            for &(_, id) in &sites {
                row.push(if genome.contains(id) { '1' } else { '0' });
            }
            writeln!(out, "{row}")?;
        }
    }
    Ok(())
}

fn sample_genomes(
    subpop: &Subpopulation,
    size: usize,
    rng: &mut EngineRng,
) -> Result<Vec<usize>, SimError> {
    if subpop.parent_count() == 0 {
        return Err(SimError::config(format!(
            "cannot sample from empty subpopulation p{}",
            subpop.id
        )));
    }
    // individuals drawn uniformly with replacement; both genomes of each
    Ok((0..size)
        .flat_map(|_| {
            let individual = rng.uniform_index(subpop.parent_count());
            [2 * individual, 2 * individual + 1]
        })
        .collect())
}

/// Write the substitution list.
pub fn write_fixed(
    chromosome: &Chromosome,
    substitutions: &[Substitution],
    out: &mut dyn Write,
) -> Result<(), SimError> {
    writeln!(out, "Mutations:")?;
    for (index, substitution) in substitutions.iter().enumerate() {
        let mutation_type = &chromosome.mutation_types[substitution.type_index];
        writeln!(
            out,
            "{} m{} {} {} {} p{} {} {}",
            index + 1,
            mutation_type.id,
            substitution.position + 1,
            substitution.selection_coeff,
            mutation_type.dominance_coeff,
            substitution.subpop_id,
            substitution.origin_generation,
            substitution.fixation_generation
        )?;
    }
    Ok(())
}

/// Write the live mutations of one tracked type with their frequencies.
pub fn write_tracked(
    chromosome: &Chromosome,
    pool: &MutationPool,
    counts: &[u32],
    total_genomes: usize,
    type_index: usize,
    out: &mut dyn Write,
) -> Result<(), SimError> {
    let mutation_type = &chromosome.mutation_types[type_index];
    let mut rows: Vec<(&Mutation, u32)> = pool
        .iter()
        .filter(|(_, m)| m.type_index == type_index)
        .map(|(id, m)| (m, counts.get(id.0 as usize).copied().unwrap_or(0)))
        .filter(|&(_, count)| count > 0)
        .collect();
    rows.sort_by_key(|(m, _)| m.position);

    for (mutation, count) in rows {
        writeln!(
            out,
            "m{} {} {} {:.6}",
            mutation_type.id,
            mutation.position + 1,
            mutation.selection_coeff,
            count as f64 / total_genomes.max(1) as f64
        )?;
    }
    Ok(())
}

/// Read a previously written full dump, creating subpopulations and
/// allocating their mutations into the pool.
pub fn read_population_file(
    path: &Path,
    chromosome: &Chromosome,
    pool: &mut MutationPool,
) -> Result<BTreeMap<i64, Subpopulation>, SimError> {
    let text = std::fs::read_to_string(path).map_err(|_| {
        SimError::config(format!(
            "could not open initialization file {}",
            path.display()
        ))
    })?;
    let mut lines = text.lines().map(str::trim);

    // skip anything before the Populations section
    for line in lines.by_ref() {
        if line.starts_with("Populations") {
            break;
        }
    }

    let mut subpops: BTreeMap<i64, Subpopulation> = BTreeMap::new();
    let mut line = lines.next();
    while let Some(row) = line {
        if row.starts_with("Mutations") {
            break;
        }
        if !row.is_empty() {
            let mut tokens = row.split_whitespace();
            let id_token = tokens.next().unwrap_or("");
            let id = id_token
                .strip_prefix('p')
                .and_then(|digits| digits.parse::<i64>().ok())
                .ok_or_else(|| {
                    SimError::config(format!("malformed population row: {row}"))
                })?;
            let size: usize = tokens
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| SimError::config(format!("malformed population row: {row}")))?;
            subpops.insert(id, Subpopulation::new(id, size));
        }
        line = lines.next();
    }

    // mutation table: dump id -> pool handle
    let mut handles: HashMap<usize, MutationId> = HashMap::new();
    line = lines.next();
    while let Some(row) = line {
        if row.starts_with("Genomes") {
            break;
        }
        if !row.is_empty() {
            let tokens: Vec<&str> = row.split_whitespace().collect();
            if tokens.len() < 7 {
                return Err(SimError::config(format!("malformed mutation row: {row}")));
            }
            let dump_id: usize = tokens[0]
                .parse()
                .map_err(|_| SimError::config(format!("malformed mutation row: {row}")))?;
            let type_id: i64 = tokens[1]
                .strip_prefix('m')
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| SimError::config(format!("malformed mutation row: {row}")))?;
            let type_index = chromosome.mutation_type_index(type_id).ok_or_else(|| {
                SimError::config(format!("mutation type m{type_id} has not been defined"))
            })?;
            let position: i64 = tokens[2]
                .parse::<f64>()
                .map(|p| p as i64 - 1)
                .map_err(|_| SimError::config(format!("malformed mutation row: {row}")))?;
            let selection_coeff: f64 = tokens[3]
                .parse()
                .map_err(|_| SimError::config(format!("malformed mutation row: {row}")))?;
            // tokens[4] is the dominance coefficient, carried by the type
            let subpop_id: i64 = tokens[5]
                .strip_prefix('p')
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| SimError::config(format!("malformed mutation row: {row}")))?;
            let origin_generation: i64 = tokens[6]
                .parse()
                .map_err(|_| SimError::config(format!("malformed mutation row: {row}")))?;

            let handle = pool.allocate(Mutation {
                type_index,
                position,
                selection_coeff,
                subpop_id,
                origin_generation,
            });
            handles.insert(dump_id, handle);
        }
        line = lines.next();
    }

    // genome rows
    line = lines.next();
    while let Some(row) = line {
        if !row.is_empty() {
            let mut tokens = row.split_whitespace();
            let label = tokens.next().unwrap_or("");
            let (subpop_token, index_token) = label
                .split_once(':')
                .ok_or_else(|| SimError::config(format!("malformed genome row: {row}")))?;
            let subpop_id: i64 = subpop_token
                .strip_prefix('p')
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| SimError::config(format!("malformed genome row: {row}")))?;
            let genome_index: usize = index_token
                .parse::<usize>()
                .ok()
                .filter(|&index| index >= 1)
                .ok_or_else(|| SimError::config(format!("malformed genome row: {row}")))?
                - 1;

            let subpop = subpops.get_mut(&subpop_id).ok_or_else(|| {
                SimError::config(format!("subpopulation p{subpop_id} has not been defined"))
            })?;
            if genome_index >= subpop.parent_genomes.len() {
                return Err(SimError::config(format!(
                    "genome index {} out of range for p{subpop_id}",
                    genome_index + 1
                )));
            }
            for token in tokens {
                let dump_id: usize = token
                    .parse()
                    .map_err(|_| SimError::config(format!("malformed genome row: {row}")))?;
                let handle = *handles.get(&dump_id).ok_or_else(|| {
                    SimError::config(format!("mutation {dump_id} has not been defined"))
                })?;
                subpop.parent_genomes[genome_index].insert(handle, pool);
            }
        }
        line = lines.next();
    }

    Ok(subpops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{GenomicElement, GenomicElementType};
    use crate::mutation::{Dfe, MutationType};
    use std::io::Write as _;

    fn test_chromosome() -> Chromosome {
        let mut chromosome = Chromosome::new();
        let mt = chromosome
            .add_mutation_type(MutationType::new(1, 0.5, Dfe::Fixed(0.0)))
            .unwrap();
        let et = chromosome
            .add_element_type(GenomicElementType::new(1, vec![mt], vec![1.0]).unwrap())
            .unwrap();
        chromosome.add_element(GenomicElement::new(et, 0, 999).unwrap());
        chromosome.overall_mutation_rate = 0.0;
        chromosome.recombination_end_positions = vec![999];
        chromosome.recombination_rates = vec![0.0];
        chromosome.initialize_draws().unwrap();
        chromosome
    }

    fn populate(pool: &mut MutationPool) -> BTreeMap<i64, Subpopulation> {
        let mut subpops = BTreeMap::new();
        let mut subpop = Subpopulation::new(1, 2);
        let a = pool.allocate(Mutation {
            type_index: 0,
            position: 10,
            selection_coeff: 0.1,
            subpop_id: 1,
            origin_generation: 3,
        });
        let b = pool.allocate(Mutation {
            type_index: 0,
            position: 500,
            selection_coeff: 0.0,
            subpop_id: 1,
            origin_generation: 5,
        });
        subpop.parent_genomes[0].insert(a, pool);
        subpop.parent_genomes[0].insert(b, pool);
        subpop.parent_genomes[3].insert(a, pool);
        subpops.insert(1, subpop);
        subpops
    }

    #[test]
    fn test_full_dump_layout() {
        let chromosome = test_chromosome();
        let mut pool = MutationPool::new();
        let subpops = populate(&mut pool);

        let mut buffer = Vec::new();
        write_full(&chromosome, &subpops, &pool, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Populations:\np1 2\n"));
        assert!(text.contains("Mutations:\n1 m1 11 0.1 0.5 p1 3\n2 m1 501 0 0.5 p1 5\n"));
        assert!(text.contains("Genomes:\np1:1 1 2\np1:2\np1:3\np1:4 1\n"));
    }

    #[test]
    fn test_dump_round_trip() {
        let chromosome = test_chromosome();
        let mut pool = MutationPool::new();
        let subpops = populate(&mut pool);

        let mut buffer = Vec::new();
        write_full(&chromosome, &subpops, &pool, &mut buffer).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&buffer).unwrap();

        let mut pool2 = MutationPool::new();
        let loaded = read_population_file(file.path(), &chromosome, &mut pool2).unwrap();

        let mut buffer2 = Vec::new();
        write_full(&chromosome, &loaded, &pool2, &mut buffer2).unwrap();
        assert_eq!(buffer, buffer2);
    }

    #[test]
    fn test_read_rejects_unknown_mutation_type() {
        let chromosome = test_chromosome();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Populations:\np1 1\nMutations:\n1 m9 11 0.1 0.5 p1 3\nGenomes:\np1:1 1"
        )
        .unwrap();
        let mut pool = MutationPool::new();
        assert!(read_population_file(file.path(), &chromosome, &mut pool).is_err());
    }

    #[test]
    fn test_ms_sample_shape() {
        let chromosome = test_chromosome();
        let mut pool = MutationPool::new();
        let subpops = populate(&mut pool);
        let mut rng = EngineRng::from_seed(9);

        let mut buffer = Vec::new();
        write_sample_ms(
            &chromosome,
            subpops.get(&1).unwrap(),
            &pool,
            2,
            &mut rng,
            &mut buffer,
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("//"));
        let segsites = lines.next().unwrap();
        assert!(segsites.starts_with("segsites: "));
        let count: usize = segsites["segsites: ".len()..].parse().unwrap();
        if count > 0 {
            assert!(lines.next().unwrap().starts_with("positions:"));
            // 2 individuals sampled, so 4 haplotype rows of width `count`
            let rows: Vec<&str> = lines.collect();
            assert_eq!(rows.len(), 4);
            for row in rows {
                assert_eq!(row.len(), count);
                assert!(row.chars().all(|c| c == '0' || c == '1'));
            }
        }
    }

    #[test]
    fn test_fixed_output() {
        let chromosome = test_chromosome();
        let substitutions = vec![Substitution {
            type_index: 0,
            position: 42,
            selection_coeff: 0.5,
            subpop_id: 1,
            origin_generation: 7,
            fixation_generation: 19,
        }];
        let mut buffer = Vec::new();
        write_fixed(&chromosome, &substitutions, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "Mutations:\n1 m1 43 0.5 0.5 p1 7 19\n");
    }
}
