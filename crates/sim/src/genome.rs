//! Genomes: ordered mutation handles on one linear chromosome.

use crate::mutation::{MutationId, MutationPool};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which chromosome a genome models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenomeType {
    Autosome,
    X,
    Y,
}

impl fmt::Display for GenomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Autosome => "A",
            Self::X => "X",
            Self::Y => "Y",
        };
        write!(f, "{code}")
    }
}

/// An ordered sequence of mutations.
///
/// Invariant: handles are non-decreasing by position; multiple mutations at
/// the same position are legal and keep insertion order. A null genome (the
/// absent strand in sex-chromosome models) carries no mutations.
#[derive(Debug, Clone)]
pub struct Genome {
    genome_type: GenomeType,
    is_null: bool,
    mutations: Vec<MutationId>,
}

impl Genome {
    pub fn new(genome_type: GenomeType) -> Self {
        Self {
            genome_type,
            is_null: false,
            mutations: Vec::new(),
        }
    }

    pub fn new_null(genome_type: GenomeType) -> Self {
        Self {
            genome_type,
            is_null: true,
            mutations: Vec::new(),
        }
    }

    pub fn genome_type(&self) -> GenomeType {
        self.genome_type
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    pub fn mutations(&self) -> &[MutationId] {
        &self.mutations
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn clear(&mut self) {
        self.mutations.clear();
    }

    pub fn contains(&self, id: MutationId) -> bool {
        self.mutations.contains(&id)
    }

    pub fn remove(&mut self, id: MutationId) {
        self.mutations.retain(|&m| m != id);
    }

    /// Insert preserving the position ordering; a new mutation at an already
    /// occupied position goes after its elders.
    pub fn insert(&mut self, id: MutationId, pool: &MutationPool) {
        let position = pool.get(id).position;
        let at = self
            .mutations
            .partition_point(|&m| pool.get(m).position <= position);
        self.mutations.insert(at, id);
    }

    /// Replace this genome's contents with a recombinant of two parental
    /// strands. `breakpoints` are sorted strand-switch points; the walk
    /// starts on `first` and switches strands at every breakpoint, copying
    /// mutations with `position < breakpoint` before each switch.
    pub fn rebuild_recombinant(
        &mut self,
        first: &Genome,
        second: &Genome,
        breakpoints: &[i64],
        pool: &MutationPool,
    ) {
        self.mutations.clear();
        debug_assert!(breakpoints.windows(2).all(|w| w[0] <= w[1]));

        let strands = [first.mutations(), second.mutations()];
        let mut cursors = [0usize, 0usize];
        let mut current = 0usize;

        for &breakpoint in breakpoints {
            // copy the current strand up to the switch point
            while cursors[current] < strands[current].len() {
                let id = strands[current][cursors[current]];
                if pool.get(id).position >= breakpoint {
                    break;
                }
                self.mutations.push(id);
                cursors[current] += 1;
            }
            // advance the other strand past the switch point too
            let other = 1 - current;
            while cursors[other] < strands[other].len() {
                let id = strands[other][cursors[other]];
                if pool.get(id).position >= breakpoint {
                    break;
                }
                cursors[other] += 1;
            }
            current = other;
        }

        // tail of the final strand
        self.mutations
            .extend_from_slice(&strands[current][cursors[current]..]);
    }

    /// Replace this genome's contents with a verbatim copy of `parent`.
    pub fn copy_from(&mut self, parent: &Genome) {
        self.mutations.clear();
        self.mutations.extend_from_slice(parent.mutations());
        self.is_null = parent.is_null;
        self.genome_type = parent.genome_type;
    }

    #[cfg(test)]
    pub fn positions(&self, pool: &MutationPool) -> Vec<i64> {
        self.mutations.iter().map(|&id| pool.get(id).position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::Mutation;

    fn pool_with_positions(positions: &[i64]) -> (MutationPool, Vec<MutationId>) {
        let mut pool = MutationPool::new();
        let ids = positions
            .iter()
            .map(|&position| {
                pool.allocate(Mutation {
                    type_index: 0,
                    position,
                    selection_coeff: 0.0,
                    subpop_id: 1,
                    origin_generation: 1,
                })
            })
            .collect();
        (pool, ids)
    }

    #[test]
    fn test_insert_keeps_order() {
        let (pool, ids) = pool_with_positions(&[50, 10, 30, 10]);
        let mut genome = Genome::new(GenomeType::Autosome);
        for &id in &ids {
            genome.insert(id, &pool);
        }
        assert_eq!(genome.positions(&pool), vec![10, 10, 30, 50]);
        // same-position mutations keep insertion order
        assert_eq!(genome.mutations()[0], ids[1]);
        assert_eq!(genome.mutations()[1], ids[3]);
    }

    #[test]
    fn test_recombinant_no_breakpoints_copies_first() {
        let (pool, ids) = pool_with_positions(&[10, 20, 30, 15, 25]);
        let mut p1 = Genome::new(GenomeType::Autosome);
        let mut p2 = Genome::new(GenomeType::Autosome);
        for &id in &ids[..3] {
            p1.insert(id, &pool);
        }
        for &id in &ids[3..] {
            p2.insert(id, &pool);
        }
        let mut child = Genome::new(GenomeType::Autosome);
        child.rebuild_recombinant(&p1, &p2, &[], &pool);
        assert_eq!(child.positions(&pool), vec![10, 20, 30]);
    }

    #[test]
    fn test_recombinant_single_crossover() {
        let (pool, ids) = pool_with_positions(&[10, 20, 30, 15, 25, 35]);
        let mut p1 = Genome::new(GenomeType::Autosome);
        let mut p2 = Genome::new(GenomeType::Autosome);
        for &id in &ids[..3] {
            p1.insert(id, &pool);
        }
        for &id in &ids[3..] {
            p2.insert(id, &pool);
        }
        let mut child = Genome::new(GenomeType::Autosome);
        // p1 before 22, p2 from 22 on
        child.rebuild_recombinant(&p1, &p2, &[22], &pool);
        assert_eq!(child.positions(&pool), vec![10, 20, 25, 35]);
    }

    #[test]
    fn test_recombinant_conversion_tract() {
        let (pool, ids) = pool_with_positions(&[10, 20, 30, 40, 15, 25, 35, 45]);
        let mut p1 = Genome::new(GenomeType::Autosome);
        let mut p2 = Genome::new(GenomeType::Autosome);
        for &id in &ids[..4] {
            p1.insert(id, &pool);
        }
        for &id in &ids[4..] {
            p2.insert(id, &pool);
        }
        let mut child = Genome::new(GenomeType::Autosome);
        // tract [22, 38): p1 outside, p2 inside
        child.rebuild_recombinant(&p1, &p2, &[22, 38], &pool);
        assert_eq!(child.positions(&pool), vec![10, 20, 25, 35, 40]);
    }

    #[test]
    fn test_recombinant_is_sorted() {
        let (pool, ids) = pool_with_positions(&[5, 12, 40, 77, 3, 14, 41, 90]);
        let mut p1 = Genome::new(GenomeType::Autosome);
        let mut p2 = Genome::new(GenomeType::Autosome);
        for &id in &ids[..4] {
            p1.insert(id, &pool);
        }
        for &id in &ids[4..] {
            p2.insert(id, &pool);
        }
        let mut child = Genome::new(GenomeType::Autosome);
        child.rebuild_recombinant(&p1, &p2, &[10, 40, 80], &pool);
        let positions = child.positions(&pool);
        assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_remove() {
        let (pool, ids) = pool_with_positions(&[10, 20]);
        let mut genome = Genome::new(GenomeType::Autosome);
        genome.insert(ids[0], &pool);
        genome.insert(ids[1], &pool);
        genome.remove(ids[0]);
        assert_eq!(genome.positions(&pool), vec![20]);
    }

    #[test]
    fn test_null_genome() {
        let genome = Genome::new_null(GenomeType::Y);
        assert!(genome.is_null());
        assert_eq!(genome.genome_type(), GenomeType::Y);
    }
}
