//! The chromosome: genomic elements, the recombination map, gene-conversion
//! parameters, and the precomputed draw tables behind mutation and
//! breakpoint sampling.

use crate::element::{GenomicElement, GenomicElementType};
use crate::errors::SimError;
use crate::mutation::{Mutation, MutationType};
use crate::rng::{CumulativeTable, EngineRng};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy)]
pub struct GeneConversion {
    pub fraction: f64,
    pub mean_length: f64,
}

pub struct Chromosome {
    pub mutation_types: Vec<MutationType>,
    type_ids: BTreeMap<i64, usize>,
    pub element_types: Vec<GenomicElementType>,
    element_type_ids: BTreeMap<i64, usize>,
    pub elements: Vec<GenomicElement>,

    pub overall_mutation_rate: f64,
    pub recombination_end_positions: Vec<i64>,
    pub recombination_rates: Vec<f64>,
    pub gene_conversion: GeneConversion,

    // derived by initialize_draws
    last_position: i64,
    total_element_length: i64,
    expected_mutations: f64,
    expected_crossovers: f64,
    element_table: Option<CumulativeTable>,
    recombination_table: Option<CumulativeTable>,
    element_type_tables: Vec<CumulativeTable>,
}

impl Chromosome {
    pub fn new() -> Self {
        Self {
            mutation_types: Vec::new(),
            type_ids: BTreeMap::new(),
            element_types: Vec::new(),
            element_type_ids: BTreeMap::new(),
            elements: Vec::new(),
            overall_mutation_rate: 0.0,
            recombination_end_positions: Vec::new(),
            recombination_rates: Vec::new(),
            gene_conversion: GeneConversion::default(),
            last_position: 0,
            total_element_length: 0,
            expected_mutations: 0.0,
            expected_crossovers: 0.0,
            element_table: None,
            recombination_table: None,
            element_type_tables: Vec::new(),
        }
    }

    pub fn add_mutation_type(&mut self, mutation_type: MutationType) -> Result<usize, SimError> {
        let id = mutation_type.id;
        if self.type_ids.contains_key(&id) {
            return Err(SimError::config(format!(
                "mutation type m{id} already defined"
            )));
        }
        let index = self.mutation_types.len();
        self.type_ids.insert(id, index);
        self.mutation_types.push(mutation_type);
        Ok(index)
    }

    pub fn mutation_type_index(&self, id: i64) -> Option<usize> {
        self.type_ids.get(&id).copied()
    }

    pub fn add_element_type(&mut self, element_type: GenomicElementType) -> Result<usize, SimError> {
        let id = element_type.id;
        if self.element_type_ids.contains_key(&id) {
            return Err(SimError::config(format!(
                "genomic element type g{id} already defined"
            )));
        }
        let index = self.element_types.len();
        self.element_type_ids.insert(id, index);
        self.element_types.push(element_type);
        Ok(index)
    }

    pub fn element_type_index(&self, id: i64) -> Option<usize> {
        self.element_type_ids.get(&id).copied()
    }

    pub fn add_element(&mut self, element: GenomicElement) {
        self.elements.push(element);
    }

    pub fn last_position(&self) -> i64 {
        self.last_position
    }

    /// Expected crossovers per gamete: the recombination map integrated over
    /// its intervals.
    pub fn overall_recombination_rate(&self) -> f64 {
        self.expected_crossovers
    }

    /// Validate invariants and build the draw tables. Must run once before
    /// any draw.
    pub fn initialize_draws(&mut self) -> Result<(), SimError> {
        if self.elements.is_empty() {
            return Err(SimError::config("chromosome has no genomic elements"));
        }
        self.elements.sort_by_key(|e| e.start);
        for pair in self.elements.windows(2) {
            if pair[1].start <= pair[0].end {
                return Err(SimError::config(format!(
                    "genomic elements overlap at positions {}..{} and {}..{}",
                    pair[0].start, pair[0].end, pair[1].start, pair[1].end
                )));
            }
        }
        self.last_position = self.elements.last().expect("non-empty").end;

        if !self.overall_mutation_rate.is_finite() || self.overall_mutation_rate < 0.0 {
            return Err(SimError::config(format!(
                "overall mutation rate {} must be non-negative",
                self.overall_mutation_rate
            )));
        }

        if self.recombination_end_positions.is_empty() {
            return Err(SimError::config("chromosome has no recombination map"));
        }
        for pair in self.recombination_end_positions.windows(2) {
            if pair[1] <= pair[0] {
                return Err(SimError::config(
                    "recombination end positions must be strictly increasing",
                ));
            }
        }
        let map_end = *self
            .recombination_end_positions
            .last()
            .expect("non-empty");
        if map_end < self.last_position {
            return Err(SimError::config(format!(
                "recombination map ends at {} but the chromosome extends to {}",
                map_end, self.last_position
            )));
        }
        for &rate in &self.recombination_rates {
            if !rate.is_finite() || rate < 0.0 {
                return Err(SimError::config(format!(
                    "recombination rate {rate} must be non-negative"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.gene_conversion.fraction) {
            return Err(SimError::config(format!(
                "gene conversion fraction {} must be in [0, 1]",
                self.gene_conversion.fraction
            )));
        }
        if self.gene_conversion.fraction > 0.0 && self.gene_conversion.mean_length <= 0.0 {
            return Err(SimError::config(format!(
                "gene conversion mean tract length {} must be positive",
                self.gene_conversion.mean_length
            )));
        }

        // cumulative element lengths, for uniform-by-base position draws
        self.total_element_length = self.elements.iter().map(|e| e.length()).sum();
        let lengths: Vec<f64> = self.elements.iter().map(|e| e.length() as f64).collect();
        self.element_table = Some(CumulativeTable::from_weights(&lengths)?);
        self.expected_mutations = self.overall_mutation_rate * self.total_element_length as f64;

        // cumulative recombination weights: per-interval rate x length
        let mut weights = Vec::with_capacity(self.recombination_end_positions.len());
        let mut previous_end: i64 = -1;
        for (i, &end) in self.recombination_end_positions.iter().enumerate() {
            let length = (end - previous_end) as f64;
            weights.push(self.recombination_rates[i] * length);
            previous_end = end;
        }
        self.expected_crossovers = weights.iter().sum();
        self.recombination_table = if self.expected_crossovers > 0.0 {
            Some(CumulativeTable::from_weights(&weights)?)
        } else {
            None
        };

        // per-element-type mixture tables
        self.element_type_tables.clear();
        for element_type in &self.element_types {
            self.element_type_tables
                .push(CumulativeTable::from_weights(&element_type.mutation_fractions)?);
        }

        Ok(())
    }

    /// Number of new mutations for one gamete.
    pub fn draw_mutation_count(&self, rng: &mut EngineRng) -> Result<u64, SimError> {
        rng.poisson(self.expected_mutations)
    }

    /// Draw one mutation: a position uniform over the elements, a type from
    /// the element's mixture, and a coefficient from the type's DFE.
    pub fn draw_mutation(
        &self,
        rng: &mut EngineRng,
        generation: i64,
        subpop_id: i64,
    ) -> Result<Mutation, SimError> {
        let table = self
            .element_table
            .as_ref()
            .ok_or_else(|| SimError::config("chromosome draws not initialized"))?;
        let element = &self.elements[rng.weighted(table)];
        let offset = rng.uniform_index(element.length() as usize) as i64;
        let position = element.start + offset;

        let element_type = &self.element_types[element.type_index];
        let mixture = &self.element_type_tables[element.type_index];
        let type_index = element_type.mutation_type_indices[rng.weighted(mixture)];
        let selection_coeff = self.mutation_types[type_index].dfe.draw(rng);

        Ok(Mutation {
            type_index,
            position,
            selection_coeff,
            subpop_id,
            origin_generation: generation,
        })
    }

    /// Crossover count and placement for one gamete, with gene-conversion
    /// promotion. The returned positions are sorted strand-switch points: a
    /// plain crossover contributes one, a conversion tract two (its start
    /// and one past its end).
    pub fn draw_breakpoints(&self, rng: &mut EngineRng) -> Result<Vec<i64>, SimError> {
        let Some(table) = self.recombination_table.as_ref() else {
            return Ok(Vec::new());
        };
        let count = rng.poisson(self.expected_crossovers)?;
        let mut breakpoints = Vec::with_capacity(count as usize * 2);
        for _ in 0..count {
            let interval = rng.weighted(table);
            let start = if interval == 0 {
                0
            } else {
                self.recombination_end_positions[interval - 1] + 1
            };
            let end = self.recombination_end_positions[interval];
            let position = start + rng.uniform_index((end - start + 1) as usize) as i64;

            if self.gene_conversion.fraction > 0.0 && rng.coin(self.gene_conversion.fraction) {
                // a conversion tract: copy the other strand inside
                // [position, position + length) with no flanking crossover
                let length = rng
                    .exponential(self.gene_conversion.mean_length)
                    .round()
                    .max(1.0) as i64;
                breakpoints.push(position);
                breakpoints.push(position + length);
            } else {
                breakpoints.push(position);
            }
        }
        breakpoints.sort_unstable();
        Ok(breakpoints)
    }
}

impl Default for Chromosome {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::Dfe;

    fn neutral_chromosome(length: i64, mutation_rate: f64, recomb_rate: f64) -> Chromosome {
        let mut chromosome = Chromosome::new();
        let mt = chromosome
            .add_mutation_type(MutationType::new(1, 0.5, Dfe::Fixed(0.0)))
            .unwrap();
        let et = chromosome
            .add_element_type(GenomicElementType::new(1, vec![mt], vec![1.0]).unwrap())
            .unwrap();
        chromosome.add_element(GenomicElement::new(et, 0, length - 1).unwrap());
        chromosome.overall_mutation_rate = mutation_rate;
        chromosome.recombination_end_positions = vec![length - 1];
        chromosome.recombination_rates = vec![recomb_rate];
        chromosome.initialize_draws().unwrap();
        chromosome
    }

    #[test]
    fn test_initialize_draws() {
        let chromosome = neutral_chromosome(1000, 1e-4, 1e-5);
        assert_eq!(chromosome.last_position(), 999);
        assert!((chromosome.overall_recombination_rate() - 1e-5 * 1000.0).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut chromosome = Chromosome::new();
        chromosome
            .add_mutation_type(MutationType::new(1, 0.5, Dfe::Fixed(0.0)))
            .unwrap();
        assert!(chromosome
            .add_mutation_type(MutationType::new(1, 0.0, Dfe::Fixed(0.1)))
            .is_err());
    }

    #[test]
    fn test_overlapping_elements_rejected() {
        let mut chromosome = Chromosome::new();
        let mt = chromosome
            .add_mutation_type(MutationType::new(1, 0.5, Dfe::Fixed(0.0)))
            .unwrap();
        let et = chromosome
            .add_element_type(GenomicElementType::new(1, vec![mt], vec![1.0]).unwrap())
            .unwrap();
        chromosome.add_element(GenomicElement::new(et, 0, 499).unwrap());
        chromosome.add_element(GenomicElement::new(et, 400, 999).unwrap());
        chromosome.overall_mutation_rate = 0.0;
        chromosome.recombination_end_positions = vec![999];
        chromosome.recombination_rates = vec![0.0];
        assert!(chromosome.initialize_draws().is_err());
    }

    #[test]
    fn test_recombination_map_must_cover_chromosome() {
        let mut chromosome = Chromosome::new();
        let mt = chromosome
            .add_mutation_type(MutationType::new(1, 0.5, Dfe::Fixed(0.0)))
            .unwrap();
        let et = chromosome
            .add_element_type(GenomicElementType::new(1, vec![mt], vec![1.0]).unwrap())
            .unwrap();
        chromosome.add_element(GenomicElement::new(et, 0, 999).unwrap());
        chromosome.overall_mutation_rate = 0.0;
        chromosome.recombination_end_positions = vec![500];
        chromosome.recombination_rates = vec![1e-8];
        assert!(chromosome.initialize_draws().is_err());
    }

    #[test]
    fn test_zero_rates_draw_nothing() {
        let chromosome = neutral_chromosome(1000, 0.0, 0.0);
        let mut rng = EngineRng::from_seed(1);
        for _ in 0..100 {
            assert_eq!(chromosome.draw_mutation_count(&mut rng).unwrap(), 0);
            assert!(chromosome.draw_breakpoints(&mut rng).unwrap().is_empty());
        }
    }

    #[test]
    fn test_mutation_positions_in_elements() {
        let chromosome = neutral_chromosome(1000, 1e-3, 0.0);
        let mut rng = EngineRng::from_seed(2);
        for _ in 0..1000 {
            let m = chromosome.draw_mutation(&mut rng, 1, 1).unwrap();
            assert!(m.position >= 0 && m.position <= 999);
            assert_eq!(m.selection_coeff, 0.0);
        }
    }

    #[test]
    fn test_mutation_count_mean() {
        let chromosome = neutral_chromosome(1000, 1e-3, 0.0);
        let mut rng = EngineRng::from_seed(3);
        let trials = 10_000;
        let total: u64 = (0..trials)
            .map(|_| chromosome.draw_mutation_count(&mut rng).unwrap())
            .sum();
        let mean = total as f64 / trials as f64;
        // expected 1.0 per gamete
        assert!((mean - 1.0).abs() < 0.05, "observed mean {mean}");
    }

    #[test]
    fn test_breakpoints_sorted_and_in_range() {
        let chromosome = neutral_chromosome(10_000, 0.0, 1e-4);
        let mut rng = EngineRng::from_seed(4);
        for _ in 0..200 {
            let breakpoints = chromosome.draw_breakpoints(&mut rng).unwrap();
            for pair in breakpoints.windows(2) {
                assert!(pair[0] <= pair[1]);
            }
            for &b in &breakpoints {
                assert!((0..=10_000).contains(&b), "breakpoint {b} out of range");
            }
        }
    }

    #[test]
    fn test_gene_conversion_adds_tract_end() {
        let mut chromosome = neutral_chromosome(10_000, 0.0, 1e-3);
        chromosome.gene_conversion = GeneConversion {
            fraction: 1.0,
            mean_length: 20.0,
        };
        chromosome.initialize_draws().unwrap();
        let mut rng = EngineRng::from_seed(5);
        // with fraction 1.0 every crossover becomes a tract, so breakpoint
        // counts are always even
        for _ in 0..100 {
            let breakpoints = chromosome.draw_breakpoints(&mut rng).unwrap();
            assert_eq!(breakpoints.len() % 2, 0);
        }
    }
}
