//! Domain label vocabulary and the model index table.
//!
//! The verdict logic only understands the four bracket/washer classes below.
//! The mapping from numeric model class index to label is a fixed, versioned
//! table validated against the model head at load time; a model trained on a
//! different vocabulary is rejected before any inference runs.

use serde::{Deserialize, Serialize};

use crate::detect::detector::ModelError;

/// The four inspection classes the verdict rule understands.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DomainLabel {
    StraightBracket,
    CrookedBracket,
    WasherFriction,
    NoWasherFriction,
}

impl DomainLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainLabel::StraightBracket => "straight_bracket",
            DomainLabel::CrookedBracket => "crooked_bracket",
            DomainLabel::WasherFriction => "washer_friction",
            DomainLabel::NoWasherFriction => "no_washer_friction",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "straight_bracket" => Some(DomainLabel::StraightBracket),
            "crooked_bracket" => Some(DomainLabel::CrookedBracket),
            "washer_friction" => Some(DomainLabel::WasherFriction),
            "no_washer_friction" => Some(DomainLabel::NoWasherFriction),
            _ => None,
        }
    }
}

impl std::fmt::Display for DomainLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class index order of the v1 inspection model head.
const V1_CLASS_NAMES: [&str; 4] = [
    "straight_bracket",
    "crooked_bracket",
    "washer_friction",
    "no_washer_friction",
];

/// Fixed index-to-label table for the loaded model.
#[derive(Clone, Debug)]
pub struct LabelTable {
    names: Vec<&'static str>,
}

impl LabelTable {
    /// The table matching the v1 inspection model.
    pub fn v1() -> Self {
        Self {
            names: V1_CLASS_NAMES.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Reject a model whose class count does not match this table.
    pub fn validate_class_count(&self, model_classes: usize) -> Result<(), ModelError> {
        if model_classes != self.names.len() {
            return Err(ModelError::LabelMismatch {
                expected: self.names.len(),
                found: model_classes,
            });
        }
        Ok(())
    }

    /// Label name for a model class index.
    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.names.get(index).copied()
    }

    /// Domain interpretation of a model class index, if the label is part of
    /// the inspection vocabulary.
    pub fn domain(&self, index: usize) -> Option<DomainLabel> {
        self.name(index).and_then(DomainLabel::from_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_table_covers_all_domain_labels() {
        let table = LabelTable::v1();
        assert_eq!(table.len(), 4);
        for index in 0..table.len() {
            assert!(table.domain(index).is_some());
        }
    }

    #[test]
    fn class_count_mismatch_is_rejected() {
        let table = LabelTable::v1();
        assert!(table.validate_class_count(4).is_ok());
        let err = table.validate_class_count(80).unwrap_err();
        assert!(matches!(
            err,
            ModelError::LabelMismatch {
                expected: 4,
                found: 80
            }
        ));
    }

    #[test]
    fn unknown_names_have_no_domain_interpretation() {
        assert_eq!(DomainLabel::from_name("person"), None);
        assert_eq!(
            DomainLabel::from_name("straight_bracket"),
            Some(DomainLabel::StraightBracket)
        );
    }
}
