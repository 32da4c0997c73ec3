//! Raw test specifications as they appear in YAML/JSON test files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A field that may be written as a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    /// Split into items; a single string is split on whitespace.
    pub fn into_items(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => s.split_whitespace().map(String::from).collect(),
            StringOrList::Many(v) => v,
        }
    }
}

/// One test exactly as written in a test file, before validation.
///
/// Every field is optional here; [`compile`](super::compile) decides which
/// combinations are legal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RawTestSpec {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,

    pub input: Option<String>,
    pub output: Option<String>,
    #[serde(rename = "match")]
    pub match_: Option<String>,
    pub tokens: Option<StringOrList>,
    pub tokens_regex: Option<StringOrList>,

    pub session: Option<Vec<String>>,
    pub strict: Option<bool>,
    pub parts: Option<Vec<BTreeMap<String, String>>>,
    pub strict_output: Option<bool>,

    pub script: Option<String>,
    pub command: Option<String>,

    pub fnmatch: Option<StringOrList>,
    pub ignore: Option<StringOrList>,
}

/// Contents of a test file: either `{tests: [...], level: n}` or a bare list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTestFile {
    Document {
        tests: Vec<serde_yaml::Value>,
        #[serde(default)]
        level: i64,
    },
    List(Vec<serde_yaml::Value>),
}

impl RawTestFile {
    pub fn into_parts(self) -> (Vec<serde_yaml::Value>, i64) {
        match self {
            RawTestFile::Document { tests, level } => (tests, level),
            RawTestFile::List(tests) => (tests, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kebab_case_keys() {
        let spec: RawTestSpec = serde_yaml::from_str(
            r#"
            tokens-regex: "a+ b+"
            strict-output: true
            match: ".*"
            "#,
        )
        .unwrap();
        assert_eq!(
            spec.tokens_regex.unwrap().into_items(),
            vec!["a+".to_string(), "b+".to_string()]
        );
        assert_eq!(spec.strict_output, Some(true));
        assert_eq!(spec.match_.as_deref(), Some(".*"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<RawTestSpec, _> = serde_yaml::from_str("outptu: '7'");
        assert!(result.is_err());
    }

    #[test]
    fn test_string_or_list() {
        let spec: RawTestSpec = serde_yaml::from_str("ignore: [case, accents]").unwrap();
        assert_eq!(spec.ignore.unwrap().into_items(), vec!["case", "accents"]);
        let spec: RawTestSpec = serde_yaml::from_str("ignore: case accents").unwrap();
        assert_eq!(spec.ignore.unwrap().into_items(), vec!["case", "accents"]);
    }

    #[test]
    fn test_raw_file_document_and_list() {
        let doc: RawTestFile = serde_yaml::from_str("level: 2\ntests:\n- output: a\n").unwrap();
        let (tests, level) = doc.into_parts();
        assert_eq!((tests.len(), level), (1, 2));

        let list: RawTestFile = serde_yaml::from_str("- output: a\n- output: b\n").unwrap();
        let (tests, level) = list.into_parts();
        assert_eq!((tests.len(), level), (2, 0));
    }
}
