//! Record arities.
//!
//! An arity is a label plus the canonically ordered feature list of a
//! record. A record whose features are exactly `1..n` collapses to a tuple
//! and needs no arity constant, only its label.

use ozboot_parser::OzValue;

/// Canonical feature order: integers ascending, then atoms
/// lexicographically, then booleans, `unit` and the remaining kinds.
pub fn feature_rank(value: &OzValue) -> (u8, i64, String) {
    match value {
        OzValue::Int(i) => (0, *i, String::new()),
        OzValue::Atom(name) => (1, 0, name.clone()),
        OzValue::Bool(b) => (2, *b as i64, String::new()),
        OzValue::Unit => (3, 0, String::new()),
        OzValue::Float(f) => (4, f.to_bits() as i64, String::new()),
        OzValue::Builtin(id) => (5, id.0 as i64, String::new()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordArity {
    pub label: OzValue,
    pub features: Vec<OzValue>,
}

impl RecordArity {
    pub fn new(label: OzValue, mut features: Vec<OzValue>) -> Self {
        features.sort_by_key(feature_rank);
        RecordArity { label, features }
    }

    pub fn width(&self) -> usize {
        self.features.len()
    }

    /// True when the features are exactly `1..n`, so the record is a tuple.
    pub fn is_tuple(&self) -> bool {
        self.features
            .iter()
            .enumerate()
            .all(|(i, feature)| feature.as_int() == Some(i as i64 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let arity = RecordArity::new(
            OzValue::atom("r"),
            vec![
                OzValue::atom("b"),
                OzValue::Int(2),
                OzValue::atom("a"),
                OzValue::Int(1),
            ],
        );
        assert_eq!(
            arity.features,
            vec![
                OzValue::Int(1),
                OzValue::Int(2),
                OzValue::atom("a"),
                OzValue::atom("b"),
            ]
        );
    }

    #[test]
    fn test_tuple_detection() {
        let tuple = RecordArity::new(
            OzValue::atom("t"),
            vec![OzValue::Int(2), OzValue::Int(1), OzValue::Int(3)],
        );
        assert!(tuple.is_tuple());

        let record = RecordArity::new(OzValue::atom("r"), vec![OzValue::Int(1), OzValue::Int(3)]);
        assert!(!record.is_tuple());

        let named = RecordArity::new(OzValue::atom("r"), vec![OzValue::atom("x")]);
        assert!(!named.is_tuple());
    }

    #[test]
    fn test_empty_record_is_a_tuple() {
        // A record with no features is its bare label.
        assert!(RecordArity::new(OzValue::atom("nil"), Vec::new()).is_tuple());
    }
}
