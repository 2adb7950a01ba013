//! Label matchers and store pruning
//!
//! A [`Matcher`] is a predicate over one label value. [`store_matches`] uses
//! matchers to decide whether a store can hold any series a selection asks
//! for, based on the store's external labels alone.

use super::error::QueryError;
use crate::store::StoreInfo;
use regex::Regex;
use std::fmt;

/// Matcher operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// `name="value"`
    Equal,
    /// `name!="value"`
    NotEqual,
    /// `name=~"regex"`
    Regexp,
    /// `name!~"regex"`
    NotRegexp,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::Regexp => "=~",
            MatchType::NotRegexp => "!~",
        };
        f.write_str(op)
    }
}

/// Predicate over a single label value
///
/// Regular expressions are fully anchored and compiled once, on construction.
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Matcher operator
    pub match_type: MatchType,
    /// Label name
    pub name: String,
    /// Literal value or regex source
    pub value: String,
    regex: Option<Regex>,
}

impl Matcher {
    /// Create a matcher
    ///
    /// # Errors
    /// `Validation` if a regex matcher's pattern does not compile.
    pub fn new(
        match_type: MatchType,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let name = name.into();
        let value = value.into();
        let regex = match match_type {
            MatchType::Regexp | MatchType::NotRegexp => {
                let anchored = format!("^(?:{})$", value);
                let re = Regex::new(&anchored).map_err(|e| {
                    QueryError::validation(format!("invalid regex for label {}: {}", name, value))
                        .with_source(e)
                })?;
                Some(re)
            }
            MatchType::Equal | MatchType::NotEqual => None,
        };
        Ok(Self {
            match_type,
            name,
            value,
            regex,
        })
    }

    /// `name="value"`
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            match_type: MatchType::Equal,
            name: name.into(),
            value: value.into(),
            regex: None,
        }
    }

    /// Evaluate the matcher against a label value
    pub fn matches(&self, candidate: &str) -> bool {
        match self.match_type {
            MatchType::Equal => candidate == self.value,
            MatchType::NotEqual => candidate != self.value,
            MatchType::Regexp => self.regex.as_ref().is_some_and(|re| re.is_match(candidate)),
            MatchType::NotRegexp => !self.regex.as_ref().is_some_and(|re| re.is_match(candidate)),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.match_type == other.match_type && self.name == other.name && self.value == other.value
    }
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.match_type, self.value)
    }
}

/// Check whether a store may hold series selected by `matchers`
///
/// Only matchers on labels the store carries externally are evaluated; a
/// matcher on any other label cannot rule the store out.
pub fn store_matches(store: &dyn StoreInfo, matchers: &[Matcher]) -> bool {
    let labels = store.labels();
    matchers.iter().all(|m| match labels.get(&m.name) {
        Some(value) => m.matches(value),
        None => true,
    })
}
