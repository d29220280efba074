//! Dependency declarations and their tolerant parser.
//!
//! An archive declares its dependencies as one string of whitespace-separated
//! tokens, each of the form `<name><min>;<max>`:
//!
//! ```text
//! "bigdoor0;5 drawbridge2;2"
//! ```
//!
//! declares `bigdoor` in versions 0 through 5 and `drawbridge` in exactly
//! version 2. A token that does not match the grammar is dropped with a warning;
//! it never invalidates the rest of the declaration.

use crate::descriptor::{canonical_name, ExtensionDescriptor};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Literal value meaning "no dependencies".
pub const NO_DEPENDENCIES: &str = "null";

/// A declared dependency with an inclusive version range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    name: String,
    min_version: u32,
    max_version: u32,
}

/// Why a single dependency token was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token does not start with a name")]
    MissingName,
    #[error("no minimum version after the name")]
    MissingMinimum,
    #[error("minimum version is not followed by ';'")]
    MissingSeparator,
    #[error("no maximum version after ';'")]
    MissingMaximum,
    #[error("version '{0}' is out of range")]
    VersionOutOfRange(String),
}

impl Requirement {
    pub fn new(name: &str, min_version: u32, max_version: u32) -> Self {
        Self {
            name: canonical_name(name),
            min_version,
            max_version,
        }
    }

    /// Parses one token such as `foo0;5`.
    ///
    /// The name is the leading run of ASCII letters, the minimum is the run of
    /// digits right after it and must be terminated by `;`, and the maximum is
    /// the run of digits after the `;`. Anything after the maximum is ignored.
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let name_end = token
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(token.len());
        if name_end == 0 {
            return Err(TokenError::MissingName);
        }
        let (name, rest) = token.split_at(name_end);

        let (min_digits, rest) = split_digits(rest);
        if min_digits.is_empty() {
            return Err(TokenError::MissingMinimum);
        }
        let rest = rest.strip_prefix(';').ok_or(TokenError::MissingSeparator)?;

        let (max_digits, _) = split_digits(rest);
        if max_digits.is_empty() {
            return Err(TokenError::MissingMaximum);
        }

        Ok(Self::new(name, parse_version(min_digits)?, parse_version(max_digits)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_version(&self) -> u32 {
        self.min_version
    }

    pub fn max_version(&self) -> u32 {
        self.max_version
    }

    /// True iff `candidate` has this requirement's name and a version within
    /// `[min_version, max_version]`.
    pub fn satisfied_by(&self, candidate: &ExtensionDescriptor) -> bool {
        self.accepts(candidate.name(), candidate.version())
    }

    pub fn accepts(&self, name: &str, version: u32) -> bool {
        self.name == name && (self.min_version..=self.max_version).contains(&version)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{};{}]", self.name, self.min_version, self.max_version)
    }
}

fn split_digits(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(end)
}

fn parse_version(digits: &str) -> Result<u32, TokenError> {
    digits
        .parse()
        .map_err(|_| TokenError::VersionOutOfRange(digits.to_string()))
}

/// Parses a whole dependency declaration for the extension `owner`.
///
/// Malformed tokens and repeated dependency names are skipped with a warning.
/// An empty declaration or the literal `"null"` yields no requirements.
pub fn parse_dependencies(declaration: &str, owner: &str) -> Vec<Requirement> {
    let declaration = declaration.trim();
    if declaration.is_empty() || declaration == NO_DEPENDENCIES {
        return Vec::new();
    }

    let mut requirements: Vec<Requirement> = Vec::new();
    for token in declaration.split_whitespace() {
        match Requirement::parse(token) {
            Ok(requirement) => {
                if requirements.iter().any(|r| r.name == requirement.name) {
                    warn!(
                        "⚠️ Extension '{}' declares dependency '{}' more than once, ignoring '{}'",
                        owner, requirement.name, token
                    );
                    continue;
                }
                requirements.push(requirement);
            }
            Err(e) => {
                warn!(
                    "⚠️ Ignoring malformed dependency '{}' of extension '{}': {}",
                    token, owner, e
                );
            }
        }
    }
    requirements
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn descriptor(name: &str, version: u32) -> ExtensionDescriptor {
        ExtensionDescriptor::new(name, version, "create", PathBuf::from("x.so"), Vec::new())
    }

    #[test]
    fn test_parse_single_token() {
        let requirement = Requirement::parse("foo0;5").unwrap();
        assert_eq!(requirement, Requirement::new("foo", 0, 5));
    }

    #[test]
    fn test_parse_canonicalizes_name() {
        let requirement = Requirement::parse("BigDoor1;3").unwrap();
        assert_eq!(requirement.name(), "bigdoor");
    }

    #[test]
    fn test_parse_ignores_trailing_text() {
        let requirement = Requirement::parse("foo1;12beta").unwrap();
        assert_eq!(requirement.max_version(), 12);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Requirement::parse("??x"), Err(TokenError::MissingName));
        assert_eq!(Requirement::parse("12;4"), Err(TokenError::MissingName));
        assert_eq!(Requirement::parse("foo;4"), Err(TokenError::MissingMinimum));
        assert_eq!(Requirement::parse("foo"), Err(TokenError::MissingMinimum));
        assert_eq!(Requirement::parse("foo3"), Err(TokenError::MissingSeparator));
        assert_eq!(Requirement::parse("foo3-4"), Err(TokenError::MissingSeparator));
        assert_eq!(Requirement::parse("foo3;"), Err(TokenError::MissingMaximum));
        assert!(matches!(
            Requirement::parse("foo0;99999999999"),
            Err(TokenError::VersionOutOfRange(_))
        ));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let exact = Requirement::new("bar", 2, 2);
        assert!(exact.satisfied_by(&descriptor("bar", 2)));
        assert!(!exact.satisfied_by(&descriptor("bar", 1)));
        assert!(!exact.satisfied_by(&descriptor("bar", 3)));

        let range = Requirement::new("bar", 1, 4);
        assert!(range.satisfied_by(&descriptor("bar", 1)));
        assert!(range.satisfied_by(&descriptor("bar", 4)));
        assert!(!range.satisfied_by(&descriptor("baz", 2)));
    }

    #[test]
    fn test_parse_dependencies() {
        assert_eq!(
            parse_dependencies("foo0;5", "owner"),
            vec![Requirement::new("foo", 0, 5)]
        );
        assert_eq!(
            parse_dependencies("foo0;5 bar2;2", "owner"),
            vec![Requirement::new("foo", 0, 5), Requirement::new("bar", 2, 2)]
        );
    }

    #[test]
    fn test_parse_dependencies_drops_malformed_tokens() {
        assert_eq!(
            parse_dependencies("foo0;5 ??x", "owner"),
            vec![Requirement::new("foo", 0, 5)]
        );
    }

    #[test]
    fn test_parse_dependencies_drops_duplicates() {
        assert_eq!(
            parse_dependencies("foo0;5   FOO1;1\tbar0;1", "owner"),
            vec![Requirement::new("foo", 0, 5), Requirement::new("bar", 0, 1)]
        );
    }

    #[test]
    fn test_parse_dependencies_empty_declarations() {
        assert!(parse_dependencies("", "owner").is_empty());
        assert!(parse_dependencies("   ", "owner").is_empty());
        assert!(parse_dependencies("null", "owner").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(Requirement::new("foo", 0, 5).to_string(), "foo[0;5]");
    }
}
