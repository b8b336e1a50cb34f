//! Webhook payload normalizer.
//!
//! Parses raw JSON bodies into the provider-neutral event model in
//! [`super::events`]. Each hosting flavor has its own raw structures that
//! mirror its wire shape; both funnel into the same [`HookEvent`].
//!
//! # Parsing strategy
//!
//! 1. The caller has already classified the event type and flavor from HTTP
//!    metadata; the body is parsed according to that classification.
//! 2. Unknown JSON fields are ignored (serde's default), which is a hard
//!    requirement: Bitbucket adds payload fields without notice.
//! 3. Missing required fields or structurally invalid JSON return `Err` with
//!    details. Callers log and acknowledge without dispatching.
//! 4. Timestamps are normalized to UTC. Cloud sends ISO-8601 strings, server
//!    sends epoch milliseconds on PRs and offset timestamps without a colon
//!    (`+1000`) on pushes.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{PrId, RepoId, Sha};

use super::classifier::{HookEventType, HostingFlavor};
use super::events::{
    Actor, HookEvent, PrAction, PrRef, PullRequestEvent, PushEvent, RefChange, RefKind,
};

/// Error type for payload normalization failures.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field was present but carried an unusable value.
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Normalizes a webhook body into a [`HookEvent`].
///
/// The event type and flavor come from [`super::classifier::classify`]; the
/// body shape is selected accordingly. Pull request comment events normalize
/// to a [`PullRequestEvent`] with [`PrAction::Commented`].
pub fn normalize(
    body: &[u8],
    event_type: HookEventType,
    flavor: HostingFlavor,
) -> Result<HookEvent, PayloadError> {
    match event_type {
        HookEventType::Push => match flavor {
            HostingFlavor::Cloud => parse_cloud_push(body).map(HookEvent::Push),
            HostingFlavor::Server => parse_server_push(body).map(HookEvent::Push),
        },
        other => {
            let action = pr_action(other);
            match flavor {
                HostingFlavor::Cloud => {
                    parse_cloud_pull_request(body, action).map(HookEvent::PullRequest)
                }
                HostingFlavor::Server => {
                    parse_server_pull_request(body, action).map(HookEvent::PullRequest)
                }
            }
        }
    }
}

fn pr_action(event_type: HookEventType) -> PrAction {
    match event_type {
        HookEventType::PullRequestCreated => PrAction::Created,
        HookEventType::PullRequestUpdated => PrAction::Updated,
        HookEventType::PullRequestMerged => PrAction::Merged,
        HookEventType::PullRequestDeclined => PrAction::Declined,
        HookEventType::PullRequestComment => PrAction::Commented,
        // normalize() routes Push before reaching here.
        HookEventType::Push => unreachable!("push events have no PR action"),
    }
}

// ============================================================================
// Shared timestamp handling
// ============================================================================

/// Parses the timestamp formats Bitbucket emits.
///
/// Cloud uses strict RFC 3339; server push payloads use an RFC 3339 variant
/// with a colon-less offset (`2017-09-19T09:45:32+1000`).
fn parse_timestamp(value: &str, field: &'static str) -> Result<DateTime<Utc>, PayloadError> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PayloadError::InvalidField {
            field,
            value: value.to_string(),
        })
}

fn epoch_millis_timestamp(millis: i64, field: &'static str) -> Result<DateTime<Utc>, PayloadError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(PayloadError::InvalidField {
            field,
            value: millis.to_string(),
        })
}

// ============================================================================
// Cloud payloads
//
// Raw structures mirror Bitbucket Cloud's webhook JSON. Optional fields are
// used liberally, with required ones validated explicitly afterwards.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawCloudRepository {
    full_name: String,
}

impl RawCloudRepository {
    /// Splits `workspace/slug` into a [`RepoId`].
    fn repo_id(&self) -> Result<RepoId, PayloadError> {
        self.full_name
            .split_once('/')
            .map(|(owner, name)| RepoId::new(owner, name))
            .ok_or_else(|| PayloadError::InvalidField {
                field: "repository.full_name",
                value: self.full_name.clone(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct RawCloudActor {
    username: Option<String>,
    nickname: Option<String>,
    account_id: Option<String>,
}

impl RawCloudActor {
    fn actor(self) -> Actor {
        Actor {
            // Newer cloud payloads replace username with nickname.
            username: self.username.or(self.nickname).unwrap_or_default(),
            // Bitbucket Cloud hides user emails.
            email: None,
            identifier: self.account_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCloudPushPayload {
    push: RawCloudPush,
    repository: RawCloudRepository,
    actor: RawCloudActor,
}

#[derive(Debug, Deserialize)]
struct RawCloudPush {
    changes: Vec<RawCloudChange>,
}

#[derive(Debug, Deserialize)]
struct RawCloudChange {
    old: Option<RawCloudRef>,
    new: Option<RawCloudRef>,
}

#[derive(Debug, Deserialize)]
struct RawCloudRef {
    #[serde(rename = "type")]
    ref_type: String,
    name: String,
    target: Option<RawCloudTarget>,
}

#[derive(Debug, Deserialize)]
struct RawCloudTarget {
    hash: String,
    date: Option<String>,
}

fn cloud_ref_kind(ref_type: &str) -> Result<RefKind, PayloadError> {
    match ref_type {
        "branch" | "named_branch" => Ok(RefKind::Branch),
        "tag" | "annotated_tag" => Ok(RefKind::Tag),
        other => Err(PayloadError::InvalidField {
            field: "push.changes[].type",
            value: other.to_string(),
        }),
    }
}

fn parse_cloud_push(body: &[u8]) -> Result<PushEvent, PayloadError> {
    let raw: RawCloudPushPayload = serde_json::from_slice(body)?;

    let repo = raw.repository.repo_id()?;
    let mut changes = Vec::with_capacity(raw.push.changes.len());
    let mut timestamp = None;

    for change in raw.push.changes {
        // A change with neither side is malformed; one side missing encodes
        // ref creation or deletion.
        let reference = change
            .new
            .as_ref()
            .or(change.old.as_ref())
            .ok_or(PayloadError::InvalidField {
                field: "push.changes[]",
                value: "neither old nor new present".to_string(),
            })?;
        let kind = cloud_ref_kind(&reference.ref_type)?;
        let ref_name = reference.name.clone();

        if let Some(date) = change
            .new
            .as_ref()
            .and_then(|r| r.target.as_ref())
            .and_then(|t| t.date.as_deref())
        {
            timestamp = Some(parse_timestamp(date, "push.changes[].new.target.date")?);
        }

        changes.push(RefChange {
            ref_name,
            kind,
            old: change
                .old
                .and_then(|r| r.target)
                .map(|t| Sha::new(t.hash)),
            new: change
                .new
                .and_then(|r| r.target)
                .map(|t| Sha::new(t.hash)),
        });
    }

    Ok(PushEvent {
        repo,
        changes,
        actor: raw.actor.actor(),
        timestamp,
    })
}

#[derive(Debug, Deserialize)]
struct RawCloudPrPayload {
    #[serde(rename = "pullrequest")]
    pull_request: RawCloudPr,
}

#[derive(Debug, Deserialize)]
struct RawCloudPr {
    id: u64,
    title: Option<String>,
    author: RawCloudActor,
    source: RawCloudPrSide,
    destination: RawCloudPrSide,
    created_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCloudPrSide {
    branch: RawCloudBranch,
    repository: RawCloudRepository,
}

#[derive(Debug, Deserialize)]
struct RawCloudBranch {
    name: String,
}

fn parse_cloud_pull_request(
    body: &[u8],
    action: PrAction,
) -> Result<PullRequestEvent, PayloadError> {
    let raw: RawCloudPrPayload = serde_json::from_slice(body)?;
    let pr = raw.pull_request;

    let destination = PrRef {
        repo: pr.destination.repository.repo_id()?,
        branch: pr.destination.branch.name,
    };
    let created_at = pr
        .created_on
        .as_deref()
        .map(|d| parse_timestamp(d, "pullrequest.created_on"))
        .transpose()?;

    Ok(PullRequestEvent {
        repo: destination.repo.clone(),
        action,
        pr_id: PrId(pr.id),
        title: pr.title,
        author: pr.author.actor(),
        source: PrRef {
            repo: pr.source.repository.repo_id()?,
            branch: pr.source.branch.name,
        },
        destination,
        created_at,
    })
}

// ============================================================================
// Server payloads
// ============================================================================

/// The all-zero hash Bitbucket Server uses for the missing side of a ref
/// creation or deletion.
const NULL_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
struct RawServerRepository {
    slug: String,
    project: RawServerProject,
}

#[derive(Debug, Deserialize)]
struct RawServerProject {
    key: String,
}

impl RawServerRepository {
    fn repo_id(&self) -> RepoId {
        RepoId::new(self.project.key.clone(), self.slug.clone())
    }
}

#[derive(Debug, Deserialize)]
struct RawServerUser {
    name: String,
    #[serde(rename = "emailAddress")]
    email_address: Option<String>,
    id: Option<u64>,
}

impl RawServerUser {
    fn actor(self) -> Actor {
        Actor {
            username: self.name,
            email: self.email_address,
            identifier: self.id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawServerPushPayload {
    repository: RawServerRepository,
    changes: Vec<RawServerChange>,
    actor: RawServerUser,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawServerChange {
    #[serde(rename = "ref")]
    reference: RawServerRef,
    #[serde(rename = "fromHash")]
    from_hash: String,
    #[serde(rename = "toHash")]
    to_hash: String,
}

#[derive(Debug, Deserialize)]
struct RawServerRef {
    #[serde(rename = "displayId")]
    display_id: String,
    #[serde(rename = "type")]
    ref_type: String,
}

fn server_ref_kind(ref_type: &str) -> Result<RefKind, PayloadError> {
    match ref_type {
        "BRANCH" => Ok(RefKind::Branch),
        "TAG" => Ok(RefKind::Tag),
        other => Err(PayloadError::InvalidField {
            field: "changes[].ref.type",
            value: other.to_string(),
        }),
    }
}

/// Maps the server's all-zero sentinel hash to `None`.
fn non_null_sha(hash: String) -> Option<Sha> {
    if hash == NULL_SHA {
        None
    } else {
        Some(Sha::new(hash))
    }
}

fn parse_server_push(body: &[u8]) -> Result<PushEvent, PayloadError> {
    let raw: RawServerPushPayload = serde_json::from_slice(body)?;

    let changes = raw
        .changes
        .into_iter()
        .map(|change| {
            Ok(RefChange {
                ref_name: change.reference.display_id,
                kind: server_ref_kind(&change.reference.ref_type)?,
                old: non_null_sha(change.from_hash),
                new: non_null_sha(change.to_hash),
            })
        })
        .collect::<Result<Vec<_>, PayloadError>>()?;

    let timestamp = raw
        .date
        .as_deref()
        .map(|d| parse_timestamp(d, "date"))
        .transpose()?;

    Ok(PushEvent {
        repo: raw.repository.repo_id(),
        changes,
        actor: raw.actor.actor(),
        timestamp,
    })
}

#[derive(Debug, Deserialize)]
struct RawServerPrPayload {
    #[serde(rename = "pullRequest")]
    pull_request: RawServerPr,
}

#[derive(Debug, Deserialize)]
struct RawServerPr {
    id: u64,
    title: Option<String>,
    author: RawServerParticipant,
    #[serde(rename = "fromRef")]
    from_ref: RawServerPrRef,
    #[serde(rename = "toRef")]
    to_ref: RawServerPrRef,
    #[serde(rename = "createdDate")]
    created_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawServerParticipant {
    user: RawServerUser,
}

#[derive(Debug, Deserialize)]
struct RawServerPrRef {
    #[serde(rename = "displayId")]
    display_id: String,
    repository: RawServerRepository,
}

fn parse_server_pull_request(
    body: &[u8],
    action: PrAction,
) -> Result<PullRequestEvent, PayloadError> {
    let raw: RawServerPrPayload = serde_json::from_slice(body)?;
    let pr = raw.pull_request;

    let destination = PrRef {
        repo: pr.to_ref.repository.repo_id(),
        branch: pr.to_ref.display_id,
    };
    let created_at = pr
        .created_date
        .map(|ms| epoch_millis_timestamp(ms, "pullRequest.createdDate"))
        .transpose()?;

    Ok(PullRequestEvent {
        repo: destination.repo.clone(),
        action,
        pr_id: PrId(pr.id),
        title: pr.title,
        author: pr.author.user.actor(),
        source: PrRef {
            repo: pr.from_ref.repository.repo_id(),
            branch: pr.from_ref.display_id,
        },
        destination,
        created_at,
    })
}
