//! Mutations, mutation types, the mutation pool, and substitutions.
//!
//! A `Mutation` is immutable after creation and shared by every genome that
//! carries it. Mutations live in a fixed-chunk pool handing out integer
//! handles, so identity comparison is an integer compare and reclaiming a
//! lost allele is a free-list push.

use crate::errors::SimError;
use crate::rng::EngineRng;
use rand_distr::{Distribution, Gamma, Normal, Weibull};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distribution of fitness effects for one mutation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dfe {
    /// `f s` — every draw is exactly `s`.
    Fixed(f64),
    /// `e s` — exponential with mean `s` (sign of `s` carries through).
    Exponential(f64),
    /// `g mean shape` — gamma with the given mean and shape.
    Gamma { mean: f64, shape: f64 },
    /// `n mean sd` — normal.
    Normal { mean: f64, sd: f64 },
    /// `w scale shape` — Weibull.
    Weibull { scale: f64, shape: f64 },
}

impl Dfe {
    /// Parse the `<dfe-type> <params...>` tail of a mutation-type row.
    pub fn from_code(code: &str, params: &[f64]) -> Result<Self, SimError> {
        let expect = |n: usize| -> Result<(), SimError> {
            if params.len() == n {
                Ok(())
            } else {
                Err(SimError::config(format!(
                    "DFE type '{code}' takes {n} parameter(s), got {}",
                    params.len()
                )))
            }
        };
        let dfe = match code {
            "f" => {
                expect(1)?;
                Dfe::Fixed(params[0])
            }
            "e" => {
                expect(1)?;
                Dfe::Exponential(params[0])
            }
            "g" => {
                expect(2)?;
                Dfe::Gamma {
                    mean: params[0],
                    shape: params[1],
                }
            }
            "n" => {
                expect(2)?;
                Dfe::Normal {
                    mean: params[0],
                    sd: params[1],
                }
            }
            "w" => {
                expect(2)?;
                Dfe::Weibull {
                    scale: params[0],
                    shape: params[1],
                }
            }
            other => {
                return Err(SimError::config(format!(
                    "unknown DFE type '{other}' (expected f, g, e, n, or w)"
                )))
            }
        };
        dfe.validate()?;
        Ok(dfe)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Dfe::Fixed(_) => "f",
            Dfe::Exponential(_) => "e",
            Dfe::Gamma { .. } => "g",
            Dfe::Normal { .. } => "n",
            Dfe::Weibull { .. } => "w",
        }
    }

    pub fn params(&self) -> Vec<f64> {
        match *self {
            Dfe::Fixed(s) | Dfe::Exponential(s) => vec![s],
            Dfe::Gamma { mean, shape } => vec![mean, shape],
            Dfe::Normal { mean, sd } => vec![mean, sd],
            Dfe::Weibull { scale, shape } => vec![scale, shape],
        }
    }

    fn validate(&self) -> Result<(), SimError> {
        match *self {
            Dfe::Fixed(s) | Dfe::Exponential(s) => {
                if !s.is_finite() {
                    return Err(SimError::config(format!(
                        "DFE parameter {s} must be finite"
                    )));
                }
            }
            Dfe::Gamma { mean, shape } => {
                if !mean.is_finite() || mean == 0.0 || !shape.is_finite() || shape <= 0.0 {
                    return Err(SimError::config(format!(
                        "gamma DFE requires non-zero mean and positive shape, got ({mean}, {shape})"
                    )));
                }
            }
            Dfe::Normal { mean, sd } => {
                if !mean.is_finite() || !sd.is_finite() || sd < 0.0 {
                    return Err(SimError::config(format!(
                        "normal DFE requires finite mean and non-negative sd, got ({mean}, {sd})"
                    )));
                }
            }
            Dfe::Weibull { scale, shape } => {
                if !(scale.is_finite() && scale > 0.0 && shape.is_finite() && shape > 0.0) {
                    return Err(SimError::config(format!(
                        "Weibull DFE requires positive scale and shape, got ({scale}, {shape})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Draw one selection coefficient.
    pub fn draw(&self, rng: &mut EngineRng) -> f64 {
        match *self {
            Dfe::Fixed(s) => s,
            Dfe::Exponential(s) => {
                if s == 0.0 {
                    0.0
                } else {
                    s.signum() * rng.exponential(s.abs())
                }
            }
            Dfe::Gamma { mean, shape } => {
                // gamma parameterized by (mean, shape): scale = mean / shape
                let scale = mean.abs() / shape;
                let draw = Gamma::new(shape, scale)
                    .expect("parameters validated at construction")
                    .sample(rng.raw());
                mean.signum() * draw
            }
            Dfe::Normal { mean, sd } => {
                if sd == 0.0 {
                    mean
                } else {
                    Normal::new(mean, sd)
                        .expect("parameters validated at construction")
                        .sample(rng.raw())
                }
            }
            Dfe::Weibull { scale, shape } => Weibull::new(scale, shape)
                .expect("parameters validated at construction")
                .sample(rng.raw()),
        }
    }
}

/// A mutation type: dominance plus a distribution of fitness effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationType {
    pub id: i64,
    pub dominance_coeff: f64,
    /// Dominance used for X-linked mutations in males, when modeled.
    pub dominance_coeff_x: Option<f64>,
    pub dfe: Dfe,
    pub convert_to_substitution: bool,
}

impl MutationType {
    pub fn new(id: i64, dominance_coeff: f64, dfe: Dfe) -> Self {
        Self {
            id,
            dominance_coeff,
            dominance_coeff_x: None,
            dfe,
            convert_to_substitution: true,
        }
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{} {} {}", self.id, self.dominance_coeff, self.dfe.code())?;
        for p in self.dfe.params() {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

/// Handle into the mutation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationId(pub u32);

/// One mutation. `type_index` indexes the chromosome's mutation-type table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mutation {
    pub type_index: usize,
    pub position: i64,
    pub selection_coeff: f64,
    pub subpop_id: i64,
    pub origin_generation: i64,
}

const CHUNK_SIZE: usize = 1024;

/// Fixed-chunk pool allocator for mutations.
///
/// Slots are grouped into chunks that are never freed individually; a freed
/// slot goes on the free list and is handed out again by the next allocation.
/// Handles stay valid until explicitly freed.
pub struct MutationPool {
    chunks: Vec<Vec<Option<Mutation>>>,
    free: Vec<MutationId>,
    live: usize,
}

impl Default for MutationPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationPool {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total slot count across all chunks (live or free).
    pub fn capacity(&self) -> usize {
        self.chunks.len() * CHUNK_SIZE
    }

    pub fn allocate(&mut self, mutation: Mutation) -> MutationId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            let (chunk, slot) = Self::split(id);
            self.chunks[chunk][slot] = Some(mutation);
            return id;
        }
        let slot_index = self.capacity() - self.chunk_spare();
        if slot_index == self.capacity() {
            self.chunks.push(Vec::with_capacity(CHUNK_SIZE));
        }
        let chunk_index = self.chunks.len() - 1;
        let chunk = self.chunks.last_mut().expect("chunk pushed above");
        let id = MutationId((chunk_index * CHUNK_SIZE + chunk.len()) as u32);
        chunk.push(Some(mutation));
        id
    }

    fn chunk_spare(&self) -> usize {
        match self.chunks.last() {
            Some(chunk) => CHUNK_SIZE - chunk.len(),
            None => 0,
        }
    }

    fn split(id: MutationId) -> (usize, usize) {
        let raw = id.0 as usize;
        (raw / CHUNK_SIZE, raw % CHUNK_SIZE)
    }

    pub fn get(&self, id: MutationId) -> &Mutation {
        let (chunk, slot) = Self::split(id);
        self.chunks[chunk][slot]
            .as_ref()
            .expect("dangling mutation handle")
    }

    pub fn free(&mut self, id: MutationId) {
        let (chunk, slot) = Self::split(id);
        let freed = self.chunks[chunk][slot].take();
        debug_assert!(freed.is_some(), "double free of mutation handle");
        self.free.push(id);
        self.live -= 1;
    }

    /// Iterate the live handles.
    pub fn iter(&self) -> impl Iterator<Item = (MutationId, &Mutation)> {
        self.chunks.iter().enumerate().flat_map(|(ci, chunk)| {
            chunk.iter().enumerate().filter_map(move |(si, slot)| {
                slot.as_ref()
                    .map(|m| (MutationId((ci * CHUNK_SIZE + si) as u32), m))
            })
        })
    }
}

/// A fixed allele promoted out of per-genome storage.
#[derive(Debug, Clone)]
pub struct Substitution {
    pub type_index: usize,
    pub position: i64,
    pub selection_coeff: f64,
    pub subpop_id: i64,
    pub origin_generation: i64,
    pub fixation_generation: i64,
}

impl Substitution {
    pub fn from_mutation(mutation: &Mutation, fixation_generation: i64) -> Self {
        Self {
            type_index: mutation.type_index,
            position: mutation.position,
            selection_coeff: mutation.selection_coeff,
            subpop_id: mutation.subpop_id,
            origin_generation: mutation.origin_generation,
            fixation_generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(position: i64) -> Mutation {
        Mutation {
            type_index: 0,
            position,
            selection_coeff: 0.0,
            subpop_id: 1,
            origin_generation: 1,
        }
    }

    #[test]
    fn test_dfe_from_code() {
        assert_eq!(Dfe::from_code("f", &[0.5]).unwrap(), Dfe::Fixed(0.5));
        assert_eq!(
            Dfe::from_code("g", &[-0.05, 0.2]).unwrap(),
            Dfe::Gamma {
                mean: -0.05,
                shape: 0.2
            }
        );
        assert!(Dfe::from_code("x", &[0.0]).is_err());
        assert!(Dfe::from_code("f", &[0.0, 1.0]).is_err());
        assert!(Dfe::from_code("g", &[0.1]).is_err());
    }

    #[test]
    fn test_dfe_fixed_draw() {
        let mut rng = EngineRng::from_seed(1);
        let dfe = Dfe::Fixed(0.25);
        for _ in 0..10 {
            assert_eq!(dfe.draw(&mut rng), 0.25);
        }
    }

    #[test]
    fn test_dfe_exponential_sign() {
        let mut rng = EngineRng::from_seed(2);
        let dfe = Dfe::Exponential(-0.1);
        for _ in 0..100 {
            assert!(dfe.draw(&mut rng) <= 0.0);
        }
    }

    #[test]
    fn test_dfe_gamma_negative_mean() {
        let mut rng = EngineRng::from_seed(3);
        let dfe = Dfe::Gamma {
            mean: -0.05,
            shape: 0.2,
        };
        let total: f64 = (0..5000).map(|_| dfe.draw(&mut rng)).sum();
        let mean = total / 5000.0;
        assert!(mean < 0.0);
        assert!((mean - (-0.05)).abs() < 0.01, "observed mean {mean}");
    }

    #[test]
    fn test_pool_allocate_get_free() {
        let mut pool = MutationPool::new();
        let a = pool.allocate(mutation(10));
        let b = pool.allocate(mutation(20));
        assert_ne!(a, b);
        assert_eq!(pool.get(a).position, 10);
        assert_eq!(pool.get(b).position, 20);
        assert_eq!(pool.len(), 2);

        pool.free(a);
        assert_eq!(pool.len(), 1);

        // the freed slot is recycled
        let c = pool.allocate(mutation(30));
        assert_eq!(c, a);
        assert_eq!(pool.get(c).position, 30);
    }

    #[test]
    fn test_pool_spans_chunks() {
        let mut pool = MutationPool::new();
        let ids: Vec<MutationId> = (0..(CHUNK_SIZE as i64 * 2 + 5))
            .map(|i| pool.allocate(mutation(i)))
            .collect();
        assert_eq!(pool.len(), CHUNK_SIZE * 2 + 5);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(pool.get(*id).position, i as i64);
        }
        assert_eq!(pool.iter().count(), pool.len());
    }
}
