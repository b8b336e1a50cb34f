//! Webhook classification: event type and hosting flavor.
//!
//! Bitbucket Cloud and Bitbucket Server announce the same semantic events with
//! two different `X-Event-Key` vocabularies. Classification collapses both
//! vocabularies onto one [`HookEventType`] and resolves which deployment
//! flavor sent the request.
//!
//! # Flavor resolution
//!
//! 1. An explicit `X-Bitbucket-Type` header wins (`"server"` or `"cloud"`).
//! 2. Otherwise, presence of a `server_url` request parameter implies the
//!    server flavor (native server webhooks always append it).
//! 3. Otherwise, cloud. This default predates server support and is kept for
//!    compatibility; server deployments that strip both signals will be
//!    misclassified as cloud.

use std::fmt;
use thiserror::Error;

/// The deployment variant that produced a webhook payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostingFlavor {
    /// Hosted Bitbucket Cloud (bitbucket.org).
    Cloud,
    /// Self-managed Bitbucket Server.
    Server,
}

impl HostingFlavor {
    /// Parses the `X-Bitbucket-Type` header value.
    ///
    /// Unknown values return `None` so that flavor inference can fall through
    /// to the `server_url` parameter.
    pub fn from_header(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cloud" => Some(HostingFlavor::Cloud),
            "server" => Some(HostingFlavor::Server),
            _ => None,
        }
    }
}

impl fmt::Display for HostingFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostingFlavor::Cloud => write!(f, "cloud"),
            HostingFlavor::Server => write!(f, "server"),
        }
    }
}

/// Semantic webhook event types, independent of hosting flavor.
///
/// Each variant maps to exactly one `X-Event-Key` token per flavor (see
/// [`HookEventType::event_key`]). Tokens outside both vocabularies classify as
/// unsupported via [`ClassifyError::UnsupportedEvent`], never as a parse
/// failure: Bitbucket adds event types over time and the listener must keep
/// accepting the ones it knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEventType {
    /// One or more refs (branches or tags) were pushed.
    Push,
    /// A pull request was created.
    PullRequestCreated,
    /// A pull request's source ref was updated.
    PullRequestUpdated,
    /// A pull request was merged.
    PullRequestMerged,
    /// A pull request was declined.
    PullRequestDeclined,
    /// A comment was added to a pull request.
    PullRequestComment,
}

impl HookEventType {
    const ALL: [HookEventType; 6] = [
        HookEventType::Push,
        HookEventType::PullRequestCreated,
        HookEventType::PullRequestUpdated,
        HookEventType::PullRequestMerged,
        HookEventType::PullRequestDeclined,
        HookEventType::PullRequestComment,
    ];

    /// Returns the `X-Event-Key` token this event type uses on the given flavor.
    pub fn event_key(&self, flavor: HostingFlavor) -> &'static str {
        match (self, flavor) {
            (HookEventType::Push, HostingFlavor::Cloud) => "repo:push",
            (HookEventType::Push, HostingFlavor::Server) => "repo:refs_changed",
            (HookEventType::PullRequestCreated, HostingFlavor::Cloud) => "pullrequest:created",
            (HookEventType::PullRequestCreated, HostingFlavor::Server) => "pr:opened",
            (HookEventType::PullRequestUpdated, HostingFlavor::Cloud) => "pullrequest:updated",
            (HookEventType::PullRequestUpdated, HostingFlavor::Server) => "pr:from_ref_updated",
            (HookEventType::PullRequestMerged, HostingFlavor::Cloud) => "pullrequest:fulfilled",
            (HookEventType::PullRequestMerged, HostingFlavor::Server) => "pr:merged",
            (HookEventType::PullRequestDeclined, HostingFlavor::Cloud) => "pullrequest:rejected",
            (HookEventType::PullRequestDeclined, HostingFlavor::Server) => "pr:declined",
            (HookEventType::PullRequestComment, HostingFlavor::Cloud) => {
                "pullrequest:comment_created"
            }
            (HookEventType::PullRequestComment, HostingFlavor::Server) => "pr:comment:added",
        }
    }

    /// Looks up an `X-Event-Key` token across both flavor vocabularies.
    pub fn from_event_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| {
            t.event_key(HostingFlavor::Cloud) == key || t.event_key(HostingFlavor::Server) == key
        })
    }

    /// Returns true if this event concerns a pull request.
    pub fn is_pull_request(&self) -> bool {
        !matches!(self, HookEventType::Push)
    }
}

impl fmt::Display for HookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookEventType::Push => "push",
            HookEventType::PullRequestCreated => "pull_request_created",
            HookEventType::PullRequestUpdated => "pull_request_updated",
            HookEventType::PullRequestMerged => "pull_request_merged",
            HookEventType::PullRequestDeclined => "pull_request_declined",
            HookEventType::PullRequestComment => "pull_request_comment",
        };
        write!(f, "{s}")
    }
}

/// Errors produced by webhook classification.
///
/// Both variants map to HTTP 400 at the endpoint. Neither is fatal to the
/// listener.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    /// The required event-type header was absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The event-type header carried a token outside both vocabularies.
    #[error("unsupported event key: {0}")]
    UnsupportedEvent(String),
}

/// A successful classification of one inbound webhook request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub event_type: HookEventType,
    pub flavor: HostingFlavor,
}

/// Classifies a webhook request from its HTTP metadata.
///
/// Pure function of its inputs: the `X-Event-Key` header value, the optional
/// `X-Bitbucket-Type` header value, and the optional `server_url` query
/// parameter.
pub fn classify(
    event_key: Option<&str>,
    flavor_header: Option<&str>,
    server_url: Option<&str>,
) -> Result<Classification, ClassifyError> {
    let key = event_key.ok_or(ClassifyError::MissingHeader("X-Event-Key"))?;
    let event_type = HookEventType::from_event_key(key)
        .ok_or_else(|| ClassifyError::UnsupportedEvent(key.to_string()))?;

    let flavor = match flavor_header.and_then(HostingFlavor::from_header) {
        Some(flavor) => flavor,
        None if server_url.is_some() => HostingFlavor::Server,
        None => HostingFlavor::Cloud,
    };

    Ok(Classification { event_type, flavor })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_cloud_tokens_classify() {
        for (key, expected) in [
            ("repo:push", HookEventType::Push),
            ("pullrequest:created", HookEventType::PullRequestCreated),
            ("pullrequest:updated", HookEventType::PullRequestUpdated),
            ("pullrequest:fulfilled", HookEventType::PullRequestMerged),
            ("pullrequest:rejected", HookEventType::PullRequestDeclined),
            (
                "pullrequest:comment_created",
                HookEventType::PullRequestComment,
            ),
        ] {
            let c = classify(Some(key), None, None).unwrap();
            assert_eq!(c.event_type, expected, "key {key}");
            assert_eq!(c.flavor, HostingFlavor::Cloud);
        }
    }

    #[test]
    fn all_server_tokens_classify() {
        for (key, expected) in [
            ("repo:refs_changed", HookEventType::Push),
            ("pr:opened", HookEventType::PullRequestCreated),
            ("pr:from_ref_updated", HookEventType::PullRequestUpdated),
            ("pr:merged", HookEventType::PullRequestMerged),
            ("pr:declined", HookEventType::PullRequestDeclined),
            ("pr:comment:added", HookEventType::PullRequestComment),
        ] {
            let c = classify(Some(key), Some("server"), None).unwrap();
            assert_eq!(c.event_type, expected, "key {key}");
            assert_eq!(c.flavor, HostingFlavor::Server);
        }
    }

    #[test]
    fn event_key_mapping_is_injective_per_flavor() {
        // Two distinct wire vocabularies collapse onto one enumeration; each
        // token must map back to exactly the variant that produced it.
        for flavor in [HostingFlavor::Cloud, HostingFlavor::Server] {
            for t in HookEventType::ALL {
                assert_eq!(HookEventType::from_event_key(t.event_key(flavor)), Some(t));
            }
        }
    }

    #[test]
    fn missing_event_key_is_an_error() {
        assert_eq!(
            classify(None, None, None),
            Err(ClassifyError::MissingHeader("X-Event-Key"))
        );
    }

    #[test]
    fn unknown_event_key_is_unsupported() {
        for key in ["repo:fork", "pr:reviewed", "diagnostics:ping", ""] {
            assert_eq!(
                classify(Some(key), None, None),
                Err(ClassifyError::UnsupportedEvent(key.to_string())),
                "key {key:?}"
            );
        }
    }

    #[test]
    fn flavor_header_wins_over_server_url() {
        let c = classify(
            Some("repo:push"),
            Some("cloud"),
            Some("https://bb.example.com"),
        )
        .unwrap();
        assert_eq!(c.flavor, HostingFlavor::Cloud);
    }

    #[test]
    fn server_url_implies_server_flavor() {
        let c = classify(Some("repo:refs_changed"), None, Some("https://bb.example.com")).unwrap();
        assert_eq!(c.flavor, HostingFlavor::Server);
    }

    #[test]
    fn no_signals_default_to_cloud() {
        let c = classify(Some("repo:push"), None, None).unwrap();
        assert_eq!(c.flavor, HostingFlavor::Cloud);
    }

    #[test]
    fn unknown_flavor_header_falls_through_to_server_url() {
        let c = classify(
            Some("repo:refs_changed"),
            Some("datacenter"),
            Some("https://bb.example.com"),
        )
        .unwrap();
        assert_eq!(c.flavor, HostingFlavor::Server);
    }

    #[test]
    fn flavor_header_is_case_insensitive() {
        assert_eq!(
            HostingFlavor::from_header("Server"),
            Some(HostingFlavor::Server)
        );
        assert_eq!(
            HostingFlavor::from_header("CLOUD"),
            Some(HostingFlavor::Cloud)
        );
    }
}
