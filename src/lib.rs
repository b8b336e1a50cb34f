//! Bitbucket Source - webhook ingestion and repository discovery for a
//! CI host's Bitbucket integration.
//!
//! This library provides the provider-neutral event model, the webhook
//! classification and dispatch pipeline, composable discovery configuration,
//! and the trust model for pull requests from forks. Both the Bitbucket Cloud
//! and Bitbucket Server hosting flavors are supported.

pub mod bitbucket;
pub mod discovery;
pub mod hooks;
pub mod server;
pub mod trust;
pub mod types;

#[cfg(test)]
pub mod test_utils;
