//! Scheduled demographic events, output events, and introduced mutations.
//!
//! Each schedule is a time-keyed multimap: entries land in per-generation
//! vectors and fire in insertion order when the clock reaches their key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A demographic event from `#DEMOGRAPHY AND STRUCTURE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// `P p<id> <N> [p<src>]` — create a subpopulation, optionally splitting
    /// founders from a source.
    AddSubpopulation {
        subpop: i64,
        size: usize,
        source: Option<i64>,
    },
    /// `N p<id> <N>` — resize.
    SetSize { subpop: i64, size: usize },
    /// `M p<dst> p<src> <rate>` — set the immigration fraction into `dst`
    /// from `src`.
    SetMigration { target: i64, source: i64, rate: f64 },
    /// `S p<id> <sigma>` — set the selfing rate.
    SetSelfing { subpop: i64, rate: f64 },
}

/// An output event from `#OUTPUT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputEvent {
    /// `A [filename]` — full dump to the file, or standard output.
    Full { filename: Option<String> },
    /// `R p<id> <n> [MS]` — random sample of individuals from a subpop.
    Sample {
        subpop: i64,
        size: usize,
        ms_format: bool,
    },
    /// `F` — the fixed-mutation (substitution) list.
    Fixed,
    /// `T m<id>` — live mutations of the tracked type with frequencies.
    TrackType { mutation_type: i64 },
}

/// A `#PREDETERMINED MUTATIONS` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntroducedMutation {
    pub mutation_type: i64,
    pub position: i64,
    pub subpop: i64,
    pub generation: i64,
    pub num_homozygotes: usize,
    pub num_heterozygotes: usize,
}

/// A targeted-frequency intervention attached to an introduced mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSweep {
    pub mutation_type: i64,
    pub position: i64,
    pub target_prevalence: f64,
}

/// Generation-keyed multimap preserving insertion order within a key.
#[derive(Debug, Clone)]
pub struct Schedule<T> {
    entries: BTreeMap<i64, Vec<T>>,
}

impl<T> Default for Schedule<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Schedule<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, generation: i64, entry: T) {
        self.entries.entry(generation).or_default().push(entry);
    }

    /// Entries keyed exactly to `generation`, in insertion order.
    pub fn at(&self, generation: i64) -> &[T] {
        self.entries
            .get(&generation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &T)> {
        self.entries
            .iter()
            .flat_map(|(&generation, entries)| entries.iter().map(move |e| (generation, e)))
    }
}
