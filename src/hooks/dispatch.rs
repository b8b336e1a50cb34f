//! Event processor dispatch.
//!
//! Routes a classified, normalized event to the processor responsible for
//! translating it into the host's re-indexing API. Processors are supplied by
//! independently versioned extension code, so two call signatures coexist:
//!
//! - the modern signature carries the hosting flavor, the event origin, and
//!   the server URL;
//! - the legacy signature carries only the event and flavor.
//!
//! [`dispatch`] attempts the modern call first. A processor that predates the
//! modern signature signals [`DispatchError::NotSupported`] and dispatch
//! transparently retries the legacy call rather than failing the request.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::classifier::{HookEventType, HostingFlavor};
use super::events::HookEvent;

/// The host's event-notification API.
///
/// Triggering a re-index schedules asynchronous work inside the host;
/// implementations must not block on its completion. Fire-and-forget.
pub trait ReindexApi: Send + Sync {
    /// Requests re-indexing of the repository identified by owner and name.
    ///
    /// `origin` describes where the triggering event came from (e.g. the
    /// remote address of the webhook sender), for the host's audit trail.
    fn trigger_reindex(&self, owner: &str, repo: &str, origin: &str);
}

/// Signalled by processors to drive the dual-path dispatch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The processor does not implement the flavor-aware call signature.
    /// Dispatch falls back to the legacy signature; this is a capability
    /// probe result, not a failure.
    #[error("processor does not support the flavor-aware call signature")]
    NotSupported,
}

/// Context accompanying the modern processor call signature.
#[derive(Debug, Clone)]
pub struct ProcessContext<'a> {
    pub flavor: HostingFlavor,
    /// Where the event came from, for logging and the host's audit trail.
    pub origin: &'a str,
    /// The `server_url` request parameter, when the server flavor sent it.
    pub server_url: Option<&'a str>,
}

/// A webhook event processor.
///
/// The default [`HookProcessor::process`] implementation reports
/// `NotSupported`, so legacy processors only implement
/// [`HookProcessor::process_legacy`].
pub trait HookProcessor: Send + Sync {
    /// Modern entry point, flavor- and origin-aware.
    fn process(&self, event: &HookEvent, ctx: &ProcessContext<'_>) -> Result<(), DispatchError> {
        let _ = (event, ctx);
        Err(DispatchError::NotSupported)
    }

    /// Legacy entry point, kept for processors written before the modern
    /// signature existed.
    fn process_legacy(&self, event: &HookEvent, flavor: HostingFlavor);
}

/// Dispatches one event to one processor, falling back to the legacy call
/// signature when the processor rejects the modern one.
pub fn dispatch(processor: &dyn HookProcessor, event: &HookEvent, ctx: &ProcessContext<'_>) {
    match processor.process(event, ctx) {
        Ok(()) => {}
        Err(DispatchError::NotSupported) => {
            debug!(
                repo = %event.repo(),
                "processor lacks flavor-aware signature, using legacy call"
            );
            processor.process_legacy(event, ctx.flavor);
        }
    }
}

/// Maps event types to their processors.
///
/// Push events and pull request events have distinct processors; all PR
/// lifecycle actions (including comments) share one.
#[derive(Clone)]
pub struct ProcessorRegistry {
    push: Arc<dyn HookProcessor>,
    pull_request: Arc<dyn HookProcessor>,
}

impl ProcessorRegistry {
    pub fn new(push: Arc<dyn HookProcessor>, pull_request: Arc<dyn HookProcessor>) -> Self {
        ProcessorRegistry { push, pull_request }
    }

    /// Builds the standard registry over the given re-index API.
    pub fn standard(reindex: Arc<dyn ReindexApi>) -> Self {
        ProcessorRegistry::new(
            Arc::new(PushHookProcessor {
                reindex: Arc::clone(&reindex),
            }),
            Arc::new(PullRequestHookProcessor { reindex }),
        )
    }

    /// Returns the processor responsible for the given event type.
    pub fn processor_for(&self, event_type: HookEventType) -> &dyn HookProcessor {
        if event_type.is_pull_request() {
            self.pull_request.as_ref()
        } else {
            self.push.as_ref()
        }
    }
}

/// Processes push events by triggering a re-index of the pushed repository.
struct PushHookProcessor {
    reindex: Arc<dyn ReindexApi>,
}

impl HookProcessor for PushHookProcessor {
    fn process(&self, event: &HookEvent, ctx: &ProcessContext<'_>) -> Result<(), DispatchError> {
        let repo = event.repo();
        info!(
            repo = %repo,
            flavor = %ctx.flavor,
            origin = %ctx.origin,
            "push event, triggering re-index"
        );
        self.reindex.trigger_reindex(&repo.owner, &repo.name, ctx.origin);
        Ok(())
    }

    fn process_legacy(&self, event: &HookEvent, _flavor: HostingFlavor) {
        let repo = event.repo();
        self.reindex.trigger_reindex(&repo.owner, &repo.name, "webhook");
    }
}

/// Processes pull request lifecycle events by triggering a re-index of the
/// destination repository.
struct PullRequestHookProcessor {
    reindex: Arc<dyn ReindexApi>,
}

impl HookProcessor for PullRequestHookProcessor {
    fn process(&self, event: &HookEvent, ctx: &ProcessContext<'_>) -> Result<(), DispatchError> {
        let repo = event.repo();
        if let HookEvent::PullRequest(pr) = event {
            info!(
                repo = %repo,
                pr = %pr.pr_id,
                action = ?pr.action,
                from_fork = pr.from_fork(),
                flavor = %ctx.flavor,
                "pull request event, triggering re-index"
            );
        }
        self.reindex.trigger_reindex(&repo.owner, &repo.name, ctx.origin);
        Ok(())
    }

    fn process_legacy(&self, event: &HookEvent, _flavor: HostingFlavor) {
        let repo = event.repo();
        self.reindex.trigger_reindex(&repo.owner, &repo.name, "webhook");
    }
}
