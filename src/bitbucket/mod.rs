//! Bitbucket REST API integration: the client seam, provider-neutral DTOs,
//! and categorized API errors.

pub mod client;
pub mod error;
pub mod types;

pub use client::{BitbucketApi, HttpBitbucketClient};
pub use error::{ApiError, ApiErrorKind};
pub use types::{Href, PullRequest, Repository, Team};
