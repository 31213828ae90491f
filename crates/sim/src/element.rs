//! Genomic element types and elements.

use crate::errors::SimError;
use serde::{Deserialize, Serialize};

/// A weighted mixture of mutation types. Fractions are validated
/// non-negative here and normalized where the draw table is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomicElementType {
    pub id: i64,
    /// Indices into the chromosome's mutation-type table.
    pub mutation_type_indices: Vec<usize>,
    pub mutation_fractions: Vec<f64>,
}

impl GenomicElementType {
    pub fn new(
        id: i64,
        mutation_type_indices: Vec<usize>,
        mutation_fractions: Vec<f64>,
    ) -> Result<Self, SimError> {
        if mutation_type_indices.is_empty() || mutation_type_indices.len() != mutation_fractions.len()
        {
            return Err(SimError::config(format!(
                "genomic element type g{id} requires matching non-empty type and fraction lists"
            )));
        }
        for &fraction in &mutation_fractions {
            if !fraction.is_finite() || fraction < 0.0 {
                return Err(SimError::config(format!(
                    "genomic element type g{id} has an invalid mutation fraction {fraction}"
                )));
            }
        }
        Ok(Self {
            id,
            mutation_type_indices,
            mutation_fractions,
        })
    }
}

/// A typed interval `[start, end]` on the chromosome, 0-based inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenomicElement {
    /// Index into the chromosome's element-type table.
    pub type_index: usize,
    pub start: i64,
    pub end: i64,
}

impl GenomicElement {
    pub fn new(type_index: usize, start: i64, end: i64) -> Result<Self, SimError> {
        if start < 0 || end < start {
            return Err(SimError::config(format!(
                "genomic element has an invalid span {start}..{end}"
            )));
        }
        Ok(Self {
            type_index,
            start,
            end,
        })
    }

    pub fn length(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, position: i64) -> bool {
        position >= self.start && position <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_span() {
        let element = GenomicElement::new(0, 100, 199).unwrap();
        assert_eq!(element.length(), 100);
        assert!(element.contains(100));
        assert!(element.contains(199));
        assert!(!element.contains(200));
        assert!(GenomicElement::new(0, 5, 4).is_err());
        assert!(GenomicElement::new(0, -1, 4).is_err());
    }

    #[test]
    fn test_element_type_validation() {
        assert!(GenomicElementType::new(1, vec![0], vec![1.0]).is_ok());
        assert!(GenomicElementType::new(1, vec![0], vec![-0.5]).is_err());
        assert!(GenomicElementType::new(1, vec![0, 1], vec![1.0]).is_err());
        assert!(GenomicElementType::new(1, vec![], vec![]).is_err());
    }
}
