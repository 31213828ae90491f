//! # germline-sim
//!
//! The forward-time, individual-based population-genetics engine: discrete
//! non-overlapping generations under mutation, recombination (with gene
//! conversion), optional sex, and selection, configured by a line-oriented
//! parameter file and scriptable through `germline-script` callbacks.

pub mod callbacks;
pub mod chromosome;
pub mod element;
pub mod errors;
pub mod events;
pub mod genome;
pub mod input;
pub mod mutation;
pub mod output;
pub mod population;
pub mod rng;
pub mod subpopulation;

pub use chromosome::Chromosome;
pub use errors::SimError;
pub use genome::{Genome, GenomeType};
pub use input::InputConfig;
pub use mutation::{Dfe, Mutation, MutationId, MutationPool, MutationType, Substitution};
pub use population::Simulation;
pub use rng::EngineRng;
pub use subpopulation::Subpopulation;
