//! Value Objects - Immutable domain primitives with validation
//!
//! Value Objects are:
//! - Immutable
//! - Comparable by value (not identity)
//! - Self-validating
//! - Side-effect free

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature code (Value Object)
///
/// # Invariants
/// - Must be non-empty
/// - Max 64 characters
/// - Lowercase alphanumeric with underscores and hyphens only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureCode(String);

impl FeatureCode {
    /// Create new feature code with validation
    pub fn new(code: impl Into<String>) -> Result<Self, DomainError> {
        let code = code.into();

        if code.is_empty() {
            return Err(DomainError::InvalidFeatureCode("cannot be empty".into()));
        }
        if code.len() > 64 {
            return Err(DomainError::InvalidFeatureCode("max 64 characters".into()));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(DomainError::InvalidFeatureCode(
                "lowercase alphanumeric only".into(),
            ));
        }

        Ok(Self(code))
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URL-safe slug (Value Object), used for plan and organization handles
///
/// # Invariants
/// - Must be non-empty
/// - Max 64 characters
/// - Lowercase alphanumeric with hyphens only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    /// Create new slug with validation
    pub fn new(slug: impl Into<String>) -> Result<Self, DomainError> {
        let slug = slug.into();

        if slug.is_empty() {
            return Err(DomainError::InvalidSlug("cannot be empty".into()));
        }
        if slug.len() > 64 {
            return Err(DomainError::InvalidSlug("max 64 characters".into()));
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DomainError::InvalidSlug(
                "lowercase alphanumeric with hyphens only".into(),
            ));
        }

        Ok(Self(slug))
    }

    /// Derive a slug from a display name ("Pro Plan" becomes "pro-plan")
    pub fn derive(name: &str) -> Result<Self, DomainError> {
        let candidate: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
            .collect();

        Self::new(candidate)
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Domain errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    #[error("invalid feature code: {0}")]
    InvalidFeatureCode(String),

    #[error("invalid slug: {0}")]
    InvalidSlug(String),
}
