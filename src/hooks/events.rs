//! Provider-neutral webhook event model.
//!
//! Both hosting flavors normalize into these types. Instances are immutable
//! once parsed and live for the duration of one HTTP request: the payload
//! normalizer creates them, the dispatcher consumes them, nothing persists
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PrId, RepoId, Sha};

/// A parsed webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookEvent {
    /// One or more refs were pushed to a repository.
    Push(PushEvent),
    /// A pull request changed lifecycle state.
    PullRequest(PullRequestEvent),
}

impl HookEvent {
    /// Returns the repository this event belongs to.
    pub fn repo(&self) -> &RepoId {
        match self {
            HookEvent::Push(e) => &e.repo,
            HookEvent::PullRequest(e) => &e.repo,
        }
    }
}

/// The kind of ref a push change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Branch,
    Tag,
}

/// A single ref update within a push.
///
/// `old` is `None` for ref creation, `new` is `None` for ref deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefChange {
    /// Short ref name ("main", "v1.2.0"), without the `refs/...` prefix.
    pub ref_name: String,
    pub kind: RefKind,
    pub old: Option<Sha>,
    pub new: Option<Sha>,
}

impl RefChange {
    /// Returns true if this change deleted the ref.
    pub fn is_deletion(&self) -> bool {
        self.new.is_none()
    }
}

/// The identity of the user who caused an event.
///
/// Cloud payloads carry a stable `account_id` and never an email (Bitbucket
/// Cloud hides user emails); server payloads carry a username and email but
/// identify accounts by numeric id, which we stringify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
    pub email: Option<String>,
    /// Stable account identifier, when the flavor provides one.
    pub identifier: Option<String>,
}

impl Actor {
    pub fn new(username: impl Into<String>) -> Self {
        Actor {
            username: username.into(),
            email: None,
            identifier: None,
        }
    }
}

/// A push to a repository: the repository plus the list of updated refs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub repo: RepoId,
    pub changes: Vec<RefChange>,
    pub actor: Actor,
    /// Event timestamp, normalized to UTC regardless of the wire format
    /// (cloud sends ISO-8601 strings, server sends epoch milliseconds).
    pub timestamp: Option<DateTime<Utc>>,
}

/// Lifecycle action of a pull request event.
///
/// Derived from the classified event type, not from the payload body: the two
/// flavors encode the action in the `X-Event-Key` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrAction {
    Created,
    Updated,
    Merged,
    Declined,
    Commented,
}

/// One side of a pull request (source or destination).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrRef {
    pub repo: RepoId,
    pub branch: String,
}

/// A pull request lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    /// The destination repository (where the PR is filed).
    pub repo: RepoId,
    pub action: PrAction,
    pub pr_id: PrId,
    pub title: Option<String>,
    pub author: Actor,
    /// The source side, possibly in a fork of `repo`.
    pub source: PrRef,
    pub destination: PrRef,
    pub created_at: Option<DateTime<Utc>>,
}

impl PullRequestEvent {
    /// Returns true if the source branch lives in a different repository than
    /// the destination.
    pub fn from_fork(&self) -> bool {
        self.source.repo != self.destination.repo
    }
}
