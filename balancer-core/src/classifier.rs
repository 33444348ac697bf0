use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Routing class of an outbound call.
///
/// Variant order is the priority order used when a method matches rules of
/// several classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodClass {
    Write,
    Read,
    Metadata,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[default]
    Contains,
    Regex,
}

/// One row of the classification table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MethodRule {
    pub pattern: String,
    pub class: MethodClass,
    #[serde(default)]
    pub kind: MatchKind,
}

impl MethodRule {
    pub fn contains(pattern: impl Into<String>, class: MethodClass) -> Self {
        Self {
            pattern: pattern.into(),
            class,
            kind: MatchKind::Contains,
        }
    }

    pub fn regex(pattern: impl Into<String>, class: MethodClass) -> Self {
        Self {
            pattern: pattern.into(),
            class,
            kind: MatchKind::Regex,
        }
    }
}

#[derive(Debug)]
enum Matcher {
    Contains(String),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, method: &str) -> bool {
        match self {
            Matcher::Contains(pattern) => method.contains(pattern.as_str()),
            Matcher::Regex(regex) => regex.is_match(method),
        }
    }
}

/// Maps fully qualified method names to a [`MethodClass`] using a table of
/// rules. Methods matching no rule are unclassified.
#[derive(Debug)]
pub struct MethodClassifier {
    rules: Vec<(Matcher, MethodClass)>,
}

impl MethodClassifier {
    pub fn new(rules: &[MethodRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let matcher = match rule.kind {
                MatchKind::Contains => {
                    if rule.pattern.is_empty() {
                        return Err(Error::InvalidPattern { pattern: rule.pattern.clone(), reason: "empty pattern matches every method".to_string() });
                    }
                    Matcher::Contains(rule.pattern.clone())
                }
                MatchKind::Regex => {
                    let regex = Regex::new(&rule.pattern).map_err(|e| Error::InvalidPattern { pattern: rule.pattern.clone(), reason: e.to_string() })?;
                    Matcher::Regex(regex)
                }
            };
            compiled.push((matcher, rule.class));
        }
        Ok(Self { rules: compiled })
    }

    pub fn classify(&self, method: &str) -> Option<MethodClass> {
        self.rules
            .iter()
            .filter(|(matcher, _)| matcher.is_match(method))
            .map(|(_, class)| *class)
            .min()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::classifier::{MethodClass, MethodClassifier, MethodRule};
    use crate::error::Error;

    fn shops_classifier() -> MethodClassifier {
        MethodClassifier::new(&[
            MethodRule::contains("AddShop", MethodClass::Write),
            MethodRule::contains("UpdateShop", MethodClass::Write),
            MethodRule::contains("DeleteShop", MethodClass::Write),
            MethodRule::contains("GetShop", MethodClass::Read),
            MethodRule::contains("SearchShops", MethodClass::Read),
            MethodRule::contains("GetServers", MethodClass::Metadata),
        ]).unwrap()
    }

    #[test]
    fn test_classify_by_substring() {
        let classifier = shops_classifier();
        assert_eq!(classifier.classify("/shops.v1.Shops/AddShop"), Some(MethodClass::Write));
        assert_eq!(classifier.classify("/shops.v1.Shops/DeleteShop"), Some(MethodClass::Write));
        assert_eq!(classifier.classify("/shops.v1.Shops/GetShops"), Some(MethodClass::Read));
        assert_eq!(classifier.classify("/shops.v1.Shops/SearchShops"), Some(MethodClass::Read));
        assert_eq!(classifier.classify("/shops.v1.Shops/GetServers"), Some(MethodClass::Metadata));
        assert_eq!(classifier.classify("/shops.v1.Shops/Ping"), None);
    }

    #[test]
    fn test_write_wins_over_read() {
        let classifier = MethodClassifier::new(&[
            MethodRule::regex(r"/Get\w+$", MethodClass::Read),
            MethodRule::regex(r"/(Add|Update|Delete)\w+$", MethodClass::Write),
            MethodRule::contains("GetOrCreate", MethodClass::Write),
        ]).unwrap();
        assert_eq!(classifier.classify("/kv.v1.Store/GetOrCreateKey"), Some(MethodClass::Write));
        assert_eq!(classifier.classify("/kv.v1.Store/GetKey"), Some(MethodClass::Read));
        assert_eq!(classifier.classify("/kv.v1.Store/UpdateKey"), Some(MethodClass::Write));
    }

    #[test]
    fn test_reject_bad_patterns() {
        assert!(matches!(MethodClassifier::new(&[MethodRule::regex("(", MethodClass::Read)]), Err(Error::InvalidPattern { .. })));
        assert!(matches!(MethodClassifier::new(&[MethodRule::contains("", MethodClass::Read)]), Err(Error::InvalidPattern { .. })));
    }
}
