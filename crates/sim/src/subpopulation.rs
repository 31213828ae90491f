//! Subpopulations: genome storage, fitness caching, and parent sampling.

use crate::chromosome::Chromosome;
use crate::errors::SimError;
use crate::genome::{Genome, GenomeType};
use crate::mutation::MutationPool;
use crate::rng::{CumulativeTable, EngineRng};
use std::collections::BTreeMap;

/// One subpopulation of diploid individuals.
///
/// Parent and child genomes are flat arrays of length 2N: individual `i`
/// owns genomes `2i` and `2i + 1`. When sex is enabled, females occupy
/// indices below `first_male_index` and males at or above it.
pub struct Subpopulation {
    pub id: i64,
    /// Target size for the next child generation.
    size: usize,
    pub selfing_rate: f64,
    pub cloning_rate: f64,
    pub sex_enabled: bool,
    /// Male fraction of newly formed generations (sex only).
    pub sex_ratio: f64,
    first_male_index: usize,
    /// Immigration fractions into this subpop, keyed by source id.
    pub immigration: BTreeMap<i64, f64>,

    pub parent_genomes: Vec<Genome>,
    pub child_genomes: Vec<Genome>,
    cached_fitness: Vec<f64>,

    fitness_table: Option<CumulativeTable>,
    female_table: Option<CumulativeTable>,
    male_table: Option<CumulativeTable>,
}

impl Subpopulation {
    pub fn new(id: i64, size: usize) -> Self {
        let parent_genomes = (0..2 * size).map(|_| Genome::new(GenomeType::Autosome)).collect();
        let child_genomes = (0..2 * size).map(|_| Genome::new(GenomeType::Autosome)).collect();
        Self {
            id,
            size,
            selfing_rate: 0.0,
            cloning_rate: 0.0,
            sex_enabled: false,
            sex_ratio: 0.5,
            first_male_index: size,
            immigration: BTreeMap::new(),
            parent_genomes,
            child_genomes,
            cached_fitness: vec![1.0; size],
            fitness_table: None,
            female_table: None,
            male_table: None,
        }
    }

    /// Enable separate sexes; existing parents are partitioned by the ratio.
    pub fn enable_sex(&mut self, sex_ratio: f64) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&sex_ratio) {
            return Err(SimError::config(format!(
                "sex ratio {sex_ratio} for p{} must be in [0, 1]",
                self.id
            )));
        }
        self.sex_enabled = true;
        self.sex_ratio = sex_ratio;
        self.first_male_index = Self::female_count(self.parent_count(), sex_ratio);
        Ok(())
    }

    fn female_count(total: usize, sex_ratio: f64) -> usize {
        total - (total as f64 * sex_ratio).round() as usize
    }

    pub fn target_size(&self) -> usize {
        self.size
    }

    pub fn set_target_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Number of parent individuals currently stored.
    pub fn parent_count(&self) -> usize {
        self.parent_genomes.len() / 2
    }

    pub fn first_male_index(&self) -> usize {
        self.first_male_index
    }

    pub fn is_male(&self, individual: usize) -> bool {
        self.sex_enabled && individual >= self.first_male_index
    }

    pub fn cached_fitness(&self) -> &[f64] {
        &self.cached_fitness
    }

    pub fn set_cached_fitness(&mut self, individual: usize, fitness: f64) {
        self.cached_fitness[individual] = fitness;
    }

    /// Recompute the whole fitness cache from the parents' genomes.
    pub fn update_fitness(&mut self, chromosome: &Chromosome, pool: &MutationPool) {
        self.cached_fitness.resize(self.parent_count(), 1.0);
        for individual in 0..self.parent_count() {
            let male = self.is_male(individual);
            let w = individual_fitness(
                &self.parent_genomes[2 * individual],
                &self.parent_genomes[2 * individual + 1],
                male,
                chromosome,
                pool,
            );
            self.cached_fitness[individual] = w;
        }
        self.fitness_table = None;
        self.female_table = None;
        self.male_table = None;
    }

    /// Build the per-generation samplers from the fitness cache.
    pub fn build_samplers(&mut self) -> Result<(), SimError> {
        if self.parent_count() == 0 {
            return Err(SimError::config(format!(
                "subpopulation p{} has no parents to sample",
                self.id
            )));
        }
        let make = |slice: &[f64], label: &str, id: i64| {
            CumulativeTable::from_weights(slice).map_err(|_| {
                SimError::config(format!(
                    "no {label} individual in p{id} has positive fitness"
                ))
            })
        };
        if self.sex_enabled {
            let (females, males) = self.cached_fitness.split_at(self.first_male_index);
            self.female_table = Some(make(females, "female", self.id)?);
            self.male_table = Some(make(males, "male", self.id)?);
        } else {
            self.fitness_table = Some(make(&self.cached_fitness, "", self.id)?);
        }
        Ok(())
    }

    /// Fitness-proportional draw of one parent individual.
    pub fn draw_parent(&self, rng: &mut EngineRng) -> usize {
        match &self.fitness_table {
            Some(table) => rng.weighted(table),
            // sex model: a generic draw spans both sexes by count
            None => rng.uniform_index(self.parent_count()),
        }
    }

    pub fn draw_female(&self, rng: &mut EngineRng) -> usize {
        match &self.female_table {
            Some(table) => rng.weighted(table),
            None => rng.uniform_index(self.first_male_index.max(1)),
        }
    }

    pub fn draw_male(&self, rng: &mut EngineRng) -> usize {
        match &self.male_table {
            Some(table) => self.first_male_index + rng.weighted(table),
            None => {
                self.first_male_index
                    + rng.uniform_index((self.parent_count() - self.first_male_index).max(1))
            }
        }
    }

    /// Weights a mate-choice callback sees: the cached fitness of every
    /// candidate second parent.
    pub fn mate_choice_weights(&self) -> Vec<f64> {
        if self.sex_enabled {
            self.cached_fitness[self.first_male_index..].to_vec()
        } else {
            self.cached_fitness.clone()
        }
    }

    /// Draw the second parent from an override weight vector.
    pub fn draw_parent_from_weights(
        &self,
        weights: &[f64],
        rng: &mut EngineRng,
    ) -> Result<usize, SimError> {
        let offset = if self.sex_enabled { self.first_male_index } else { 0 };
        let candidates = self.parent_count() - offset;
        if weights.len() != candidates {
            return Err(SimError::config(format!(
                "mateChoice() returned {} weights for {candidates} candidates in p{}",
                weights.len(),
                self.id
            )));
        }
        let table = CumulativeTable::from_weights(weights).map_err(|_| {
            SimError::config(format!(
                "mateChoice() weights for p{} must be non-negative with a positive sum",
                self.id
            ))
        })?;
        Ok(offset + rng.weighted(&table))
    }

    /// Grow or shrink the child buffers to the target size for this
    /// generation. Buffers are reused and grow monotonically.
    pub fn prepare_children(&mut self, target: usize) {
        if self.child_genomes.len() < 2 * target {
            self.child_genomes
                .resize_with(2 * target, || Genome::new(GenomeType::Autosome));
        } else {
            self.child_genomes.truncate(2 * target);
        }
        for genome in &mut self.child_genomes {
            genome.clear();
        }
    }

    /// Children become parents; the old parent buffers are recycled as the
    /// next generation's child buffers.
    pub fn swap_generations(&mut self) {
        std::mem::swap(&mut self.parent_genomes, &mut self.child_genomes);
        if self.sex_enabled {
            self.first_male_index = Self::female_count(self.parent_count(), self.sex_ratio);
        } else {
            self.first_male_index = self.parent_count();
        }
        self.cached_fitness.resize(self.parent_count(), 1.0);
    }
}

/// Multiplicative fitness of one individual.
///
/// Each mutation contributes `(1 + s)` when both genomes carry it and
/// `(1 + h s)` otherwise; X-linked mutations in males use the X dominance
/// coefficient when the type declares one. The product is clipped at 0.
pub fn individual_fitness(
    genome1: &Genome,
    genome2: &Genome,
    male: bool,
    chromosome: &Chromosome,
    pool: &MutationPool,
) -> f64 {
    let mut w = 1.0;

    let het = |w: &mut f64, id: crate::mutation::MutationId, genome: &Genome| {
        let mutation = pool.get(id);
        let mutation_type = &chromosome.mutation_types[mutation.type_index];
        let h = match (genome.genome_type(), male, mutation_type.dominance_coeff_x) {
            (GenomeType::X, true, Some(hx)) => hx,
            _ => mutation_type.dominance_coeff,
        };
        *w *= 1.0 + h * mutation.selection_coeff;
    };
    let hom = |w: &mut f64, id: crate::mutation::MutationId| {
        let mutation = pool.get(id);
        *w *= 1.0 + mutation.selection_coeff;
    };

    let a = genome1.mutations();
    let b = genome2.mutations();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        let pa = pool.get(a[i]).position;
        let pb = pool.get(b[j]).position;
        if pa < pb {
            het(&mut w, a[i], genome1);
            i += 1;
        } else if pb < pa {
            het(&mut w, b[j], genome2);
            j += 1;
        } else {
            // equal-position runs: identical handles are homozygous, the
            // rest heterozygous
            let run_a_end = a[i..].iter().take_while(|&&id| pool.get(id).position == pa).count() + i;
            let run_b_end = b[j..].iter().take_while(|&&id| pool.get(id).position == pa).count() + j;
            let run_a = &a[i..run_a_end];
            let run_b = &b[j..run_b_end];
            for &id in run_a {
                if run_b.contains(&id) {
                    hom(&mut w, id);
                } else {
                    het(&mut w, id, genome1);
                }
            }
            for &id in run_b {
                if !run_a.contains(&id) {
                    het(&mut w, id, genome2);
                }
            }
            i = run_a_end;
            j = run_b_end;
        }
        if w <= 0.0 {
            return 0.0;
        }
    }
    while i < a.len() {
        het(&mut w, a[i], genome1);
        i += 1;
    }
    while j < b.len() {
        het(&mut w, b[j], genome2);
        j += 1;
    }

    w.max(0.0)
}

/// Per-mutation fitness factors for one individual, for the callback path:
/// each entry is (mutation, homozygous, default contribution).
pub fn fitness_factors(
    genome1: &Genome,
    genome2: &Genome,
    male: bool,
    chromosome: &Chromosome,
    pool: &MutationPool,
) -> Vec<(crate::mutation::MutationId, bool, f64)> {
    let mut factors = Vec::with_capacity(genome1.len() + genome2.len());

    let het_factor = |id: crate::mutation::MutationId, genome: &Genome| {
        let mutation = pool.get(id);
        let mutation_type = &chromosome.mutation_types[mutation.type_index];
        let h = match (genome.genome_type(), male, mutation_type.dominance_coeff_x) {
            (GenomeType::X, true, Some(hx)) => hx,
            _ => mutation_type.dominance_coeff,
        };
        1.0 + h * mutation.selection_coeff
    };

    let a = genome1.mutations();
    let b = genome2.mutations();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        let pa = pool.get(a[i]).position;
        let pb = pool.get(b[j]).position;
        if pa < pb {
            factors.push((a[i], false, het_factor(a[i], genome1)));
            i += 1;
        } else if pb < pa {
            factors.push((b[j], false, het_factor(b[j], genome2)));
            j += 1;
        } else {
            let run_a_end = a[i..].iter().take_while(|&&id| pool.get(id).position == pa).count() + i;
            let run_b_end = b[j..].iter().take_while(|&&id| pool.get(id).position == pa).count() + j;
            let run_a = &a[i..run_a_end];
            let run_b = &b[j..run_b_end];
            for &id in run_a {
                if run_b.contains(&id) {
                    factors.push((id, true, 1.0 + pool.get(id).selection_coeff));
                } else {
                    factors.push((id, false, het_factor(id, genome1)));
                }
            }
            for &id in run_b {
                if !run_a.contains(&id) {
                    factors.push((id, false, het_factor(id, genome2)));
                }
            }
            i = run_a_end;
            j = run_b_end;
        }
    }
    while i < a.len() {
        factors.push((a[i], false, het_factor(a[i], genome1)));
        i += 1;
    }
    while j < b.len() {
        factors.push((b[j], false, het_factor(b[j], genome2)));
        j += 1;
    }

    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{GenomicElement, GenomicElementType};
    use crate::mutation::{Dfe, Mutation, MutationType};

    fn test_chromosome(dominance: f64) -> Chromosome {
        let mut chromosome = Chromosome::new();
        let mt = chromosome
            .add_mutation_type(MutationType::new(1, dominance, Dfe::Fixed(0.5)))
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

    fn make_mutation(pool: &mut MutationPool, position: i64, s: f64) -> crate::mutation::MutationId {
        pool.allocate(Mutation {
            type_index: 0,
            position,
            selection_coeff: s,
            subpop_id: 1,
            origin_generation: 1,
        })
    }

    #[test]
    fn test_fitness_homozygous_and_heterozygous() {
        let chromosome = test_chromosome(0.2);
        let mut pool = MutationPool::new();
        let shared = make_mutation(&mut pool, 10, 0.5);
        let only_one = make_mutation(&mut pool, 20, 0.5);

        let mut g1 = Genome::new(GenomeType::Autosome);
        let mut g2 = Genome::new(GenomeType::Autosome);
        g1.insert(shared, &pool);
        g1.insert(only_one, &pool);
        g2.insert(shared, &pool);

        let w = individual_fitness(&g1, &g2, false, &chromosome, &pool);
        // homozygous (1 + 0.5) times heterozygous (1 + 0.2 * 0.5)
        assert!((w - 1.5 * 1.1).abs() < 1e-12, "w = {w}");
    }

    #[test]
    fn test_fitness_distinct_mutations_same_position() {
        let chromosome = test_chromosome(0.2);
        let mut pool = MutationPool::new();
        let first = make_mutation(&mut pool, 10, 0.5);
        let second = make_mutation(&mut pool, 10, 0.5);

        let mut g1 = Genome::new(GenomeType::Autosome);
        let mut g2 = Genome::new(GenomeType::Autosome);
        g1.insert(first, &pool);
        g2.insert(second, &pool);

        let w = individual_fitness(&g1, &g2, false, &chromosome, &pool);
        // two distinct alleles at one position are each heterozygous
        assert!((w - 1.1 * 1.1).abs() < 1e-12, "w = {w}");
    }

    #[test]
    fn test_fitness_clipped_at_zero() {
        let chromosome = test_chromosome(1.0);
        let mut pool = MutationPool::new();
        let lethal = make_mutation(&mut pool, 10, -2.0);

        let mut g1 = Genome::new(GenomeType::Autosome);
        let g2 = Genome::new(GenomeType::Autosome);
        g1.insert(lethal, &pool);

        let w = individual_fitness(&g1, &g2, false, &chromosome, &pool);
        assert_eq!(w, 0.0);
    }

    #[test]
    fn test_empty_genomes_fitness_one() {
        let chromosome = test_chromosome(0.5);
        let pool = MutationPool::new();
        let g1 = Genome::new(GenomeType::Autosome);
        let g2 = Genome::new(GenomeType::Autosome);
        assert_eq!(individual_fitness(&g1, &g2, false, &chromosome, &pool), 1.0);
    }

    #[test]
    fn test_sampler_prefers_fit_parents() {
        let chromosome = test_chromosome(0.5);
        let pool = MutationPool::new();
        let mut subpop = Subpopulation::new(1, 3);
        subpop.update_fitness(&chromosome, &pool);
        subpop.set_cached_fitness(0, 0.0);
        subpop.set_cached_fitness(1, 1.0);
        subpop.set_cached_fitness(2, 3.0);
        subpop.build_samplers().unwrap();

        let mut rng = EngineRng::from_seed(17);
        let mut counts = [0usize; 3];
        for _ in 0..20_000 {
            counts[subpop.draw_parent(&mut rng)] += 1;
        }
        assert_eq!(counts[0], 0);
        let ratio = counts[2] as f64 / counts[1] as f64;
        assert!((ratio - 3.0).abs() < 0.3, "observed ratio {ratio}");
    }

    #[test]
    fn test_all_zero_fitness_is_config_error() {
        let chromosome = test_chromosome(0.5);
        let pool = MutationPool::new();
        let mut subpop = Subpopulation::new(1, 2);
        subpop.update_fitness(&chromosome, &pool);
        subpop.set_cached_fitness(0, 0.0);
        subpop.set_cached_fitness(1, 0.0);
        assert!(subpop.build_samplers().is_err());
    }

    #[test]
    fn test_sex_partition() {
        let mut subpop = Subpopulation::new(1, 10);
        subpop.enable_sex(0.5).unwrap();
        assert_eq!(subpop.first_male_index(), 5);
        assert!(!subpop.is_male(4));
        assert!(subpop.is_male(5));

        let chromosome = test_chromosome(0.5);
        let pool = MutationPool::new();
        subpop.update_fitness(&chromosome, &pool);
        subpop.build_samplers().unwrap();
        let mut rng = EngineRng::from_seed(23);
        for _ in 0..100 {
            assert!(subpop.draw_female(&mut rng) < 5);
            assert!(subpop.draw_male(&mut rng) >= 5);
        }
    }

    #[test]
    fn test_generation_swap_reuses_buffers() {
        let mut subpop = Subpopulation::new(1, 4);
        subpop.prepare_children(6);
        assert_eq!(subpop.child_genomes.len(), 12);
        subpop.swap_generations();
        assert_eq!(subpop.parent_count(), 6);
        // old parent buffers are now the child buffers
        assert_eq!(subpop.child_genomes.len(), 8);
    }
}
