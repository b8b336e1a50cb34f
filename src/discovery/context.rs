//! The discovery context: a monotonic accumulator of discovery intents.
//!
//! One context is constructed fresh per discovery run, owned by a single
//! source configuration, and never shared across concurrent runs. Traits
//! decorate it by enabling flags and appending to collections; nothing ever
//! resets a field, so the resulting context is the union of all applied
//! traits' effects and is independent of application order.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::trust::TrustAuthority;

use super::heads::{CheckoutStrategy, Head};

/// A cheap predicate evaluated before expensive API calls materialize a head.
///
/// Returning true excludes the head from discovery.
pub trait HeadPrefilter: Send + Sync {
    fn excluded(&self, head: &Head) -> bool;
}

/// A predicate evaluated after heads are materialized, with access to the
/// full discovery request.
pub trait HeadFilter: Send + Sync {
    fn excluded(&self, request: &DiscoveryRequest, head: &Head) -> bool;
}

/// Per-run data filters may consult: state materialized from the hosting API
/// during this discovery run.
#[derive(Debug, Default)]
pub struct DiscoveryRequest {
    /// Source branch names of the repository's open pull requests.
    pub pr_source_branches: BTreeSet<String>,
}

/// Accumulates what a discovery run should enumerate and how.
///
/// All mutators are monotonic: flags only turn on, collections only grow.
/// `decorate_context` implementations rely on this to compose without
/// knowing about each other.
#[derive(Default)]
pub struct DiscoveryContext {
    want_branches: bool,
    want_tags: bool,
    want_prs: bool,
    fork_pr_strategies: BTreeSet<CheckoutStrategy>,
    prefilters: Vec<Arc<dyn HeadPrefilter>>,
    filters: Vec<Arc<dyn HeadFilter>>,
    authorities: Vec<Arc<dyn TrustAuthority>>,
}

impl DiscoveryContext {
    /// Creates a context with all discovery intents disabled and empty
    /// filter/authority sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables branch discovery. `include = false` is a no-op, never a reset.
    pub fn want_branches(&mut self, include: bool) -> &mut Self {
        self.want_branches |= include;
        self
    }

    /// Enables tag discovery. `include = false` is a no-op, never a reset.
    pub fn want_tags(&mut self, include: bool) -> &mut Self {
        self.want_tags |= include;
        self
    }

    /// Enables pull request discovery. `include = false` is a no-op, never a
    /// reset.
    pub fn want_prs(&mut self, include: bool) -> &mut Self {
        self.want_prs |= include;
        self
    }

    /// Adds checkout strategies for fork pull requests.
    pub fn with_fork_pr_strategies(
        &mut self,
        strategies: impl IntoIterator<Item = CheckoutStrategy>,
    ) -> &mut Self {
        self.fork_pr_strategies.extend(strategies);
        self
    }

    /// Appends a prefilter.
    pub fn with_prefilter(&mut self, prefilter: Arc<dyn HeadPrefilter>) -> &mut Self {
        self.prefilters.push(prefilter);
        self
    }

    /// Appends a filter.
    pub fn with_filter(&mut self, filter: Arc<dyn HeadFilter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Appends a trust authority.
    pub fn with_authority(&mut self, authority: Arc<dyn TrustAuthority>) -> &mut Self {
        self.authorities.push(authority);
        self
    }

    pub fn wants_branches(&self) -> bool {
        self.want_branches
    }

    pub fn wants_tags(&self) -> bool {
        self.want_tags
    }

    pub fn wants_prs(&self) -> bool {
        self.want_prs
    }

    pub fn fork_pr_strategies(&self) -> &BTreeSet<CheckoutStrategy> {
        &self.fork_pr_strategies
    }

    pub fn prefilters(&self) -> &[Arc<dyn HeadPrefilter>] {
        &self.prefilters
    }

    pub fn filters(&self) -> &[Arc<dyn HeadFilter>] {
        &self.filters
    }

    pub fn authorities(&self) -> &[Arc<dyn TrustAuthority>] {
        &self.authorities
    }

    /// Evaluates the cheap prefilters for a candidate head.
    pub fn prefiltered_out(&self, head: &Head) -> bool {
        self.prefilters.iter().any(|p| p.excluded(head))
    }

    /// Evaluates the post-materialization filters for a head.
    pub fn filtered_out(&self, request: &DiscoveryRequest, head: &Head) -> bool {
        self.filters.iter().any(|f| f.excluded(request, head))
    }
}

impl std::fmt::Debug for DiscoveryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryContext")
            .field("want_branches", &self.want_branches)
            .field("want_tags", &self.want_tags)
            .field("want_prs", &self.want_prs)
            .field("fork_pr_strategies", &self.fork_pr_strategies)
            .field("prefilters", &self.prefilters.len())
            .field("filters", &self.filters.len())
            .field(
                "authorities",
                &self
                    .authorities
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
