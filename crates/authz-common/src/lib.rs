//! OpenAuthz Common - Shared types for the authorization engine
//!
//! This crate provides the pieces every engine crate speaks:
//! - Error taxonomy (`AuthzError`: not-found / conflict / forbidden / bad-request)
//! - Value Objects: immutable, validated primitives (FeatureCode, Slug)
//! - Id aliases shared across the domain crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod value_objects;

pub use error::{AuthzError, AuthzResult, ErrorKind};
pub use value_objects::{DomainError, FeatureCode, Slug};

use uuid::Uuid;

/// Organization identifier
pub type OrganizationId = Uuid;

/// User identifier
pub type UserId = Uuid;

/// Role identifier
pub type RoleId = Uuid;

/// Permission identifier
pub type PermissionId = Uuid;

/// Subscription plan identifier
pub type PlanId = Uuid;

/// Feature identifier
pub type FeatureId = Uuid;

/// Subscription identifier
pub type SubscriptionId = Uuid;
