//! Interned well-known names.
//!
//! Property, method, and callback names used across the engine bridge are
//! mapped to small integer ids at compile time so that per-call dispatch is
//! an integer match. Names outside the table resolve through the receiving
//! object's string fallback.

use phf::phf_map;

pub const POSITION: u16 = 0;
pub const SELECTION_COEFF: u16 = 1;
pub const ORIGIN_GENERATION: u16 = 2;
pub const SUBPOP_ID: u16 = 3;
pub const MUTATION_TYPE: u16 = 4;
pub const DOMINANCE_COEFF: u16 = 5;
pub const DOMINANCE_COEFF_X: u16 = 6;
pub const DISTRIBUTION_TYPE: u16 = 7;
pub const DISTRIBUTION_PARAMS: u16 = 8;
pub const CONVERT_TO_SUBSTITUTION: u16 = 9;
pub const ID: u16 = 10;
pub const MUTATION_TYPES: u16 = 11;
pub const MUTATION_FRACTIONS: u16 = 12;
pub const START: u16 = 13;
pub const END: u16 = 14;
pub const GENOMIC_ELEMENTS: u16 = 15;
pub const LAST_POSITION: u16 = 16;
pub const OVERALL_MUTATION_RATE: u16 = 17;
pub const OVERALL_RECOMBINATION_RATE: u16 = 18;
pub const RECOMBINATION_END_POSITIONS: u16 = 19;
pub const RECOMBINATION_RATES: u16 = 20;
pub const GENE_CONVERSION_FRACTION: u16 = 21;
pub const GENE_CONVERSION_MEAN_LENGTH: u16 = 22;
pub const GENOME_TYPE: u16 = 23;
pub const IS_NULL_GENOME: u16 = 24;
pub const MUTATIONS: u16 = 25;
pub const INDIVIDUAL_COUNT: u16 = 26;
pub const SELFING_RATE: u16 = 27;
pub const CLONING_RATE: u16 = 28;
pub const SEX_RATIO: u16 = 29;
pub const FIRST_MALE_INDEX: u16 = 30;
pub const IMMIGRANT_SUBPOP_IDS: u16 = 31;
pub const IMMIGRANT_SUBPOP_FRACTIONS: u16 = 32;
pub const FIXATION_GENERATION: u16 = 33;
pub const GENERATION: u16 = 34;
pub const CHROMOSOME: u16 = 35;
pub const SUBPOPULATIONS: u16 = 36;
pub const SUBSTITUTIONS: u16 = 37;
pub const CACHED_FITNESS: u16 = 38;
pub const ADD_SUBPOP: u16 = 39;
pub const SET_MIGRATION_RATES: u16 = 40;
pub const ADD_NEW_MUTATION: u16 = 41;
pub const SET_SELFING_RATE: u16 = 42;
pub const SET_SUBPOPULATION_SIZE: u16 = 43;
pub const CONTAINS_MUTATIONS: u16 = 44;
pub const COUNT_OF_MUTATIONS_OF_TYPE: u16 = 45;
pub const GENOMIC_ELEMENT_TYPES: u16 = 46;

static WELL_KNOWN: phf::Map<&'static str, u16> = phf_map! {
    "position" => POSITION,
    "selectionCoeff" => SELECTION_COEFF,
    "originGeneration" => ORIGIN_GENERATION,
    "subpopID" => SUBPOP_ID,
    "mutationType" => MUTATION_TYPE,
    "dominanceCoeff" => DOMINANCE_COEFF,
    "dominanceCoeffX" => DOMINANCE_COEFF_X,
    "distributionType" => DISTRIBUTION_TYPE,
    "distributionParams" => DISTRIBUTION_PARAMS,
    "convertToSubstitution" => CONVERT_TO_SUBSTITUTION,
    "id" => ID,
    "mutationTypes" => MUTATION_TYPES,
    "mutationFractions" => MUTATION_FRACTIONS,
    "start" => START,
    "end" => END,
    "genomicElements" => GENOMIC_ELEMENTS,
    "lastPosition" => LAST_POSITION,
    "overallMutationRate" => OVERALL_MUTATION_RATE,
    "overallRecombinationRate" => OVERALL_RECOMBINATION_RATE,
    "recombinationEndPositions" => RECOMBINATION_END_POSITIONS,
    "recombinationRates" => RECOMBINATION_RATES,
    "geneConversionFraction" => GENE_CONVERSION_FRACTION,
    "geneConversionMeanLength" => GENE_CONVERSION_MEAN_LENGTH,
    "genomeType" => GENOME_TYPE,
    "isNullGenome" => IS_NULL_GENOME,
    "mutations" => MUTATIONS,
    "individualCount" => INDIVIDUAL_COUNT,
    "selfingRate" => SELFING_RATE,
    "cloningRate" => CLONING_RATE,
    "sexRatio" => SEX_RATIO,
    "firstMaleIndex" => FIRST_MALE_INDEX,
    "immigrantSubpopIDs" => IMMIGRANT_SUBPOP_IDS,
    "immigrantSubpopFractions" => IMMIGRANT_SUBPOP_FRACTIONS,
    "fixationGeneration" => FIXATION_GENERATION,
    "generation" => GENERATION,
    "chromosome" => CHROMOSOME,
    "subpopulations" => SUBPOPULATIONS,
    "substitutions" => SUBSTITUTIONS,
    "cachedFitness" => CACHED_FITNESS,
    "addSubpop" => ADD_SUBPOP,
    "setMigrationRates" => SET_MIGRATION_RATES,
    "addNewMutation" => ADD_NEW_MUTATION,
    "setSelfingRate" => SET_SELFING_RATE,
    "setSubpopulationSize" => SET_SUBPOPULATION_SIZE,
    "containsMutations" => CONTAINS_MUTATIONS,
    "countOfMutationsOfType" => COUNT_OF_MUTATIONS_OF_TYPE,
    "genomicElementTypes" => GENOMIC_ELEMENT_TYPES,
};

/// The interned id of a well-known name, if it has one.
pub fn id_of(name: &str) -> Option<u16> {
    WELL_KNOWN.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(id_of("position"), Some(POSITION));
        assert_eq!(id_of("selectionCoeff"), Some(SELECTION_COEFF));
        assert_eq!(id_of("addSubpop"), Some(ADD_SUBPOP));
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(id_of("definitelyNotAProperty"), None);
    }
}
