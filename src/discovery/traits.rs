//! Pluggable discovery traits.
//!
//! Each trait is an independently contributed policy object that incrementally
//! configures a [`DiscoveryContext`]. Traits compose without knowing about
//! each other: `decorate_context` only adds capabilities, and the resulting
//! context is the same whatever order the traits are applied in.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::trust::{TrustAuthority, TrustOrigin, TrustOriginTags};

use super::context::{DiscoveryContext, DiscoveryRequest, HeadFilter};
use super::heads::{CheckoutStrategy, Head, HeadCategory};

/// A pluggable discovery policy.
pub trait SourceTrait: Send + Sync {
    /// Adds this trait's capabilities to the context. Must only enable flags
    /// and append to collections; safe to combine with any other traits in
    /// any order.
    fn decorate_context(&self, ctx: &mut DiscoveryContext);

    /// Whether this trait's presence brings heads of the given category into
    /// scope. The host uses this to hide category-level UI and to
    /// short-circuit enumeration when no trait covers a category.
    fn includes_category(&self, category: HeadCategory) -> bool;
}

/// Applies a set of traits to a fresh context.
pub fn build_context(traits: &[Arc<dyn SourceTrait>]) -> DiscoveryContext {
    let mut ctx = DiscoveryContext::new();
    for t in traits {
        t.decorate_context(&mut ctx);
    }
    ctx
}

/// Returns true if any trait brings the category into scope.
pub fn category_in_scope(traits: &[Arc<dyn SourceTrait>], category: HeadCategory) -> bool {
    traits.iter().any(|t| t.includes_category(category))
}

/// Which branches a [`BranchDiscoveryTrait`] discovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchFilterMode {
    /// Every branch.
    All,
    /// Only branches that are not the source of an open pull request
    /// (avoids building the same change twice when PR discovery is on).
    ExcludePullRequestBranches,
    /// Only branches that are the source of an open pull request.
    OnlyPullRequestBranches,
}

/// Discovers branches in the origin repository.
#[derive(Debug, Clone, Copy)]
pub struct BranchDiscoveryTrait {
    pub mode: BranchFilterMode,
}

impl BranchDiscoveryTrait {
    pub fn new(mode: BranchFilterMode) -> Self {
        BranchDiscoveryTrait { mode }
    }
}

/// Filter backing the non-`All` branch modes. Consults the open PRs
/// materialized by the discovery request.
struct PrBranchFilter {
    keep_pr_branches: bool,
}

impl HeadFilter for PrBranchFilter {
    fn excluded(&self, request: &DiscoveryRequest, head: &Head) -> bool {
        let Head::Branch { name } = head else {
            return false;
        };
        let is_pr_branch = request.pr_source_branches.contains(name);
        is_pr_branch != self.keep_pr_branches
    }
}

impl SourceTrait for BranchDiscoveryTrait {
    fn decorate_context(&self, ctx: &mut DiscoveryContext) {
        ctx.want_branches(true).with_authority(Arc::new(TrustOrigin));
        match self.mode {
            BranchFilterMode::All => {}
            BranchFilterMode::ExcludePullRequestBranches => {
                ctx.with_filter(Arc::new(PrBranchFilter {
                    keep_pr_branches: false,
                }));
            }
            BranchFilterMode::OnlyPullRequestBranches => {
                ctx.with_filter(Arc::new(PrBranchFilter {
                    keep_pr_branches: true,
                }));
            }
        }
    }

    fn includes_category(&self, category: HeadCategory) -> bool {
        category == HeadCategory::Branch
    }
}

/// Discovers tags on the origin repository, trusting them via
/// [`TrustOriginTags`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TagDiscoveryTrait;

impl SourceTrait for TagDiscoveryTrait {
    fn decorate_context(&self, ctx: &mut DiscoveryContext) {
        ctx.want_tags(true).with_authority(Arc::new(TrustOriginTags));
    }

    fn includes_category(&self, category: HeadCategory) -> bool {
        category == HeadCategory::Tag
    }
}

/// Discovers pull requests whose source branch lives in the origin
/// repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginPullRequestDiscoveryTrait;

impl SourceTrait for OriginPullRequestDiscoveryTrait {
    fn decorate_context(&self, ctx: &mut DiscoveryContext) {
        ctx.want_prs(true).with_authority(Arc::new(TrustOrigin));
    }

    fn includes_category(&self, category: HeadCategory) -> bool {
        category == HeadCategory::PullRequest
    }
}

/// Discovers pull requests from forks, parameterized by checkout strategies
/// and the trust authority that decides which fork authors are trusted.
pub struct ForkPullRequestDiscoveryTrait {
    strategies: BTreeSet<CheckoutStrategy>,
    trust: Arc<dyn TrustAuthority>,
}

impl ForkPullRequestDiscoveryTrait {
    pub fn new(
        strategies: impl IntoIterator<Item = CheckoutStrategy>,
        trust: Arc<dyn TrustAuthority>,
    ) -> Self {
        ForkPullRequestDiscoveryTrait {
            strategies: strategies.into_iter().collect(),
            trust,
        }
    }
}

impl SourceTrait for ForkPullRequestDiscoveryTrait {
    fn decorate_context(&self, ctx: &mut DiscoveryContext) {
        ctx.want_prs(true)
            .with_fork_pr_strategies(self.strategies.iter().copied())
            .with_authority(Arc::clone(&self.trust));
    }

    fn includes_category(&self, category: HeadCategory) -> bool {
        category == HeadCategory::PullRequest
    }
}
