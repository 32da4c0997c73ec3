//! Text normalization applied to expected and actual output before exact
//! comparison.
//!
//! Operators always run in a fixed order (alphabetical by name, `whites`
//! last) no matter how they were listed, and `punctuation` pulls in `whites`.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

/// A single named normalization operator.
///
/// Variant order is application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeOp {
    /// Strip accents (NFKD, then drop non-ASCII).
    Accents,
    /// Lowercase everything.
    Case,
    /// Trim each line and collapse runs of whitespace to one space.
    ExtraWhites,
    /// Join lines with a single space, dropping empty lines.
    Linebreaks,
    /// Replace ASCII punctuation with spaces.
    Punctuation,
    /// Delete all whitespace.
    Whites,
}

serde_plain::derive_display_from_serialize!(NormalizeOp);
serde_plain::derive_fromstr_from_deserialize!(NormalizeOp);

impl NormalizeOp {
    /// Every known operator.
    pub const ALL: [NormalizeOp; 6] = [
        NormalizeOp::Accents,
        NormalizeOp::Case,
        NormalizeOp::ExtraWhites,
        NormalizeOp::Linebreaks,
        NormalizeOp::Punctuation,
        NormalizeOp::Whites,
    ];

    fn apply(self, text: &str) -> String {
        match self {
            NormalizeOp::Accents => text.nfkd().filter(char::is_ascii).collect(),
            NormalizeOp::Case => text.to_lowercase(),
            NormalizeOp::ExtraWhites => text
                .lines()
                .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            NormalizeOp::Linebreaks => text
                .lines()
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            NormalizeOp::Punctuation => text
                .chars()
                .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
                .collect(),
            NormalizeOp::Whites => text.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }
}

/// An ordered, validated set of normalization operators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalizer {
    ops: BTreeSet<NormalizeOp>,
}

impl Normalizer {
    /// Build a normalizer from operator names.
    ///
    /// `all` expands to every operator. Unknown names are an error.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut ops = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if name == "all" {
                ops.extend(NormalizeOp::ALL);
                continue;
            }
            let op = name
                .parse::<NormalizeOp>()
                .map_err(|_| Error::UnknownNormalizer(name.to_string()))?;
            ops.insert(op);
        }
        Ok(Self::from_ops(ops))
    }

    /// Build a normalizer from operators, adding `whites` when
    /// `punctuation` is present.
    pub fn from_ops(ops: impl IntoIterator<Item = NormalizeOp>) -> Self {
        let mut ops: BTreeSet<NormalizeOp> = ops.into_iter().collect();
        if ops.contains(&NormalizeOp::Punctuation) {
            ops.insert(NormalizeOp::Whites);
        }
        Self { ops }
    }

    /// Operators in application order.
    pub fn ops(&self) -> impl Iterator<Item = NormalizeOp> + '_ {
        self.ops.iter().copied()
    }

    pub fn contains(&self, op: NormalizeOp) -> bool {
        self.ops.contains(&op)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operator to `text`.
    pub fn apply(&self, text: &str) -> String {
        self.ops
            .iter()
            .fold(text.to_string(), |acc, op| op.apply(&acc))
    }
}

/// Normalize optional text with the named operators.
///
/// `None` stays `None`.
pub fn normalize<S: AsRef<str>>(text: Option<&str>, names: &[S]) -> Result<Option<String>> {
    let normalizer = Normalizer::from_names(names)?;
    Ok(text.map(|t| normalizer.apply(t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_case_and_accents() {
        let n = Normalizer::from_names(&["case", "accents"]).unwrap();
        assert_eq!(n.apply("Olá, MUNDO Ção"), "ola, mundo cao");
    }

    #[test]
    fn test_extra_whites() {
        let n = Normalizer::from_names(&["extra_whites"]).unwrap();
        assert_eq!(n.apply("  a   b \n\t c  d\n"), "a b\nc d");
    }

    #[test]
    fn test_linebreaks() {
        let n = Normalizer::from_names(&["linebreaks"]).unwrap();
        assert_eq!(n.apply("a\n\nb\nc\n"), "a b c");
    }

    #[test]
    fn test_punctuation_implies_whites() {
        let n = Normalizer::from_names(&["punctuation"]).unwrap();
        assert!(n.contains(NormalizeOp::Whites));
        assert_eq!(n.apply("a, b. c!"), "abc");
    }

    #[test]
    fn test_order_is_fixed() {
        let a = Normalizer::from_names(&["whites", "case", "punctuation"]).unwrap();
        let b = Normalizer::from_names(&["punctuation", "case"]).unwrap();
        assert_eq!(a, b);
        let ops: Vec<_> = a.ops().collect();
        assert_eq!(ops.last(), Some(&NormalizeOp::Whites));
        assert_eq!(a.apply("Hello, World!\n"), "helloworld");
    }

    #[test]
    fn test_all_expands_to_every_operator() {
        let n = Normalizer::from_names(&["all"]).unwrap();
        assert_eq!(n.ops().count(), NormalizeOp::ALL.len());
    }

    #[test]
    fn test_unknown_operator_is_error() {
        let err = Normalizer::from_names(&["case", "bogus"]).unwrap_err();
        assert!(matches!(err, Error::UnknownNormalizer(ref n) if n == "bogus"));
    }

    #[test]
    fn test_none_is_identity() {
        assert_eq!(normalize(None, &["case"]).unwrap(), None);
        assert_eq!(
            normalize(Some("ABC"), &["case"]).unwrap(),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_empty_normalizer_is_identity() {
        let n = Normalizer::default();
        assert!(n.is_empty());
        assert_eq!(n.apply(" X \n"), " X \n");
    }

    #[test]
    fn test_op_display_round_trips_name() {
        assert_eq!(NormalizeOp::ExtraWhites.to_string(), "extra_whites");
        assert_eq!("extra_whites".parse::<NormalizeOp>().unwrap(), NormalizeOp::ExtraWhites);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            text in "[ \\t\\na-zA-Z0-9,.;!?áéíçÃ\u{00a0}]{0,40}",
            mask in 0u8..64,
        ) {
            let ops = NormalizeOp::ALL
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, op)| op);
            let n = Normalizer::from_ops(ops);
            let once = n.apply(&text);
            prop_assert_eq!(n.apply(&once), once);
        }
    }
}
