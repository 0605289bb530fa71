use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

/// Permission codename (`app.action_model` convention).
///
/// The format is a naming convention enforced at construction; the
/// evaluation engine treats codenames as opaque strings with exact-match
/// semantics only. There is no wildcard or hierarchical matching, and the
/// same codename string may exist independently in different tenants.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Codename(String);

impl Codename {
    /// Parses and validates a codename.
    ///
    /// Expects two lowercase `[a-z][a-z0-9_]*` segments joined by a single
    /// dot, for example `orders.view_order`. Surrounding whitespace is
    /// trimmed.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidCodename(
                "codename must not be empty".to_string(),
            ));
        }
        let Some((app, action)) = trimmed.split_once('.') else {
            return Err(Error::InvalidCodename(format!(
                "codename must be in app.action_model format, got '{trimmed}'"
            )));
        };
        if !is_valid_segment(app) || !is_valid_segment(action) {
            return Err(Error::InvalidCodename(format!(
                "codename segments must match [a-z][a-z0-9_]*, got '{trimmed}'"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Creates a codename from a trusted string without validation.
    ///
    /// Intended for codenames already persisted by the store.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|ch| matches!(ch, 'a'..='z' | '0'..='9' | '_'))
}

impl fmt::Display for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Codename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Codename {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Codename {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for Codename {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_should_accept_conventional_codename() {
        let codename = Codename::new(" orders.view_order ").unwrap();
        assert_eq!(codename.as_str(), "orders.view_order");
    }

    #[test]
    fn new_should_reject_missing_dot() {
        let result = Codename::new("vieworder");
        assert!(matches!(result, Err(Error::InvalidCodename(_))));
    }

    #[test]
    fn new_should_reject_empty_segment() {
        let result = Codename::new(".view_order");
        assert!(matches!(result, Err(Error::InvalidCodename(_))));
    }

    #[test]
    fn new_should_reject_uppercase() {
        let result = Codename::new("Orders.view_order");
        assert!(matches!(result, Err(Error::InvalidCodename(_))));
    }

    #[test]
    fn new_should_reject_leading_digit_segment() {
        let result = Codename::new("orders.2view");
        assert!(matches!(result, Err(Error::InvalidCodename(_))));
    }
}
