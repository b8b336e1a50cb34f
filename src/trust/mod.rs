//! Trust authorities and the trust evaluation engine.
//!
//! Trust decides whether a head's code is safe to build with privileged
//! credentials. This is a security boundary: an untrusted head still builds,
//! but the host withholds secrets from it.
//!
//! # Evaluation
//!
//! A head is trusted if ANY configured authority that declares itself
//! applicable to the head's origin kind answers yes. Default deny: no
//! applicable authority, or all answering no, means untrusted. Lookup
//! failures (the team-membership check is a network call) fail closed to
//! untrusted and never abort evaluation of other heads.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::bitbucket::{ApiError, BitbucketApi};
use crate::discovery::heads::{Head, HeadOrigin};
use crate::types::RepoId;

/// Error during a trust evaluation.
#[derive(Debug, Error)]
pub enum TrustError {
    /// The hosting API lookup backing the decision failed.
    #[error("trust lookup failed: {0}")]
    Lookup(#[from] ApiError),
}

/// What an authority needs to evaluate a head.
#[derive(Clone, Copy)]
pub struct TrustContext<'a> {
    pub api: &'a dyn BitbucketApi,
    /// The repository being discovered (its owner is the owning team).
    pub repo: &'a RepoId,
}

/// A policy deciding whether a head's code is safe to build with privileged
/// credentials.
#[async_trait]
pub trait TrustAuthority: Send + Sync {
    /// Stable policy name, for logs and configuration display.
    fn name(&self) -> &'static str;

    /// Whether this authority has an opinion about heads of the given origin.
    /// Inapplicable authorities are skipped entirely.
    fn applicable_to(&self, origin: HeadOrigin) -> bool;

    /// Evaluates one head. May perform network lookups; failures are treated
    /// as untrusted by the engine.
    async fn check_trusted(&self, head: &Head, ctx: TrustContext<'_>) -> Result<bool, TrustError>;
}

/// Evaluates a head against the configured authorities: logical OR across the
/// applicable ones, default deny.
pub async fn check_trusted(
    authorities: &[std::sync::Arc<dyn TrustAuthority>],
    head: &Head,
    ctx: TrustContext<'_>,
) -> bool {
    let origin = head.origin();
    for authority in authorities {
        if !authority.applicable_to(origin) {
            continue;
        }
        match authority.check_trusted(head, ctx).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                // Fail closed: an unreachable API must not grant trust.
                warn!(
                    authority = authority.name(),
                    head = %head.name(),
                    error = %e,
                    "trust lookup failed, treating head as untrusted"
                );
            }
        }
    }
    false
}

/// Trusts content of the repository under discovery and nothing else.
///
/// Applicable to default-origin branch and pull request heads; tags have
/// their own authority so that enabling branch discovery does not silently
/// extend trust to tags.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustOrigin;

#[async_trait]
impl TrustAuthority for TrustOrigin {
    fn name(&self) -> &'static str {
        "trust origin only"
    }

    fn applicable_to(&self, origin: HeadOrigin) -> bool {
        origin == HeadOrigin::Default
    }

    async fn check_trusted(&self, head: &Head, _ctx: TrustContext<'_>) -> Result<bool, TrustError> {
        Ok(!matches!(head, Head::Tag { .. }))
    }
}

/// Trusts tags from the origin repository.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustOriginTags;

#[async_trait]
impl TrustAuthority for TrustOriginTags {
    fn name(&self) -> &'static str {
        "trust origin tags"
    }

    fn applicable_to(&self, origin: HeadOrigin) -> bool {
        origin == HeadOrigin::Default
    }

    async fn check_trusted(&self, head: &Head, _ctx: TrustContext<'_>) -> Result<bool, TrustError> {
        Ok(matches!(head, Head::Tag { .. }))
    }
}

/// Trusts fork pull requests whose author is a member of the team that owns
/// the repository. Requires a membership lookup against the hosting API.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustTeamForks;

#[async_trait]
impl TrustAuthority for TrustTeamForks {
    fn name(&self) -> &'static str {
        "trust team forks"
    }

    fn applicable_to(&self, origin: HeadOrigin) -> bool {
        origin == HeadOrigin::Fork
    }

    async fn check_trusted(&self, head: &Head, ctx: TrustContext<'_>) -> Result<bool, TrustError> {
        let Head::PullRequest { author, .. } = head else {
            return Ok(false);
        };
        let member = ctx.api.is_team_member(&ctx.repo.owner, author).await?;
        Ok(member)
    }
}

/// Trusts everything unconditionally.
///
/// The least safe configuration: intended only for fully private deployments
/// where every account that can open a pull request is already trusted.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustEveryone;

#[async_trait]
impl TrustAuthority for TrustEveryone {
    fn name(&self) -> &'static str {
        "trust everyone"
    }

    fn applicable_to(&self, _origin: HeadOrigin) -> bool {
        true
    }

    async fn check_trusted(&self, _head: &Head, _ctx: TrustContext<'_>) -> Result<bool, TrustError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitbucket::{ApiError, Repository};
    use crate::types::PrId;
    use std::sync::Arc;

    /// Stub API with a fixed membership answer.
    struct StubApi {
        member: Result<bool, ()>,
    }

    #[async_trait]
    impl BitbucketApi for StubApi {
        async fn repository(&self, repo: &RepoId) -> Result<Repository, ApiError> {
            Ok(Repository {
                id: repo.clone(),
                private: true,
                links: Default::default(),
            })
        }

        async fn is_team_member(&self, _team: &str, _username: &str) -> Result<bool, ApiError> {
            self.member
                .map_err(|()| ApiError::from_status(502, "membership lookup"))
        }
    }

    fn tag() -> Head {
        Head::Tag {
            name: "v1.0.0".into(),
        }
    }

    fn branch() -> Head {
        Head::Branch {
            name: "main".into(),
        }
    }

    fn fork_pr(author: &str) -> Head {
        Head::PullRequest {
            id: PrId(7),
            branch: "feature".into(),
            source_repo: RepoId::new("outsider", "widget"),
            author: author.into(),
            from_fork: true,
        }
    }

    async fn eval(auths: Vec<Arc<dyn TrustAuthority>>, head: Head, api: &StubApi) -> bool {
        let repo = RepoId::new("team", "widget");
        check_trusted(&auths, &head, TrustContext { api, repo: &repo }).await
    }

    #[tokio::test]
    async fn origin_tag_trusted_by_tag_authority_only() {
        let api = StubApi { member: Ok(true) };
        assert!(eval(vec![Arc::new(TrustOriginTags)], tag(), &api).await);
        // "trust origin only" covers branches and origin PRs, not tags.
        assert!(!eval(vec![Arc::new(TrustOrigin)], tag(), &api).await);
    }

    #[tokio::test]
    async fn origin_branch_trusted_by_trust_origin() {
        let api = StubApi { member: Ok(false) };
        assert!(eval(vec![Arc::new(TrustOrigin)], branch(), &api).await);
        assert!(!eval(vec![Arc::new(TrustOriginTags)], branch(), &api).await);
    }

    #[tokio::test]
    async fn fork_pr_untrusted_under_origin_only() {
        let api = StubApi { member: Ok(true) };
        assert!(!eval(vec![Arc::new(TrustOrigin)], fork_pr("dev"), &api).await);
    }

    #[tokio::test]
    async fn team_member_fork_pr_is_trusted() {
        let api = StubApi { member: Ok(true) };
        assert!(eval(vec![Arc::new(TrustTeamForks)], fork_pr("dev"), &api).await);
    }

    #[tokio::test]
    async fn non_member_fork_pr_is_untrusted() {
        let api = StubApi { member: Ok(false) };
        assert!(!eval(vec![Arc::new(TrustTeamForks)], fork_pr("stranger"), &api).await);
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let api = StubApi { member: Err(()) };
        assert!(!eval(vec![Arc::new(TrustTeamForks)], fork_pr("dev"), &api).await);
    }

    #[tokio::test]
    async fn trust_everyone_trusts_fork_prs_regardless_of_author() {
        // Even with the membership lookup failing, the unconditional
        // authority wins: it never consults the API.
        let api = StubApi { member: Err(()) };
        assert!(eval(vec![Arc::new(TrustEveryone)], fork_pr("stranger"), &api).await);
        assert!(eval(vec![Arc::new(TrustEveryone)], tag(), &api).await);
    }

    #[tokio::test]
    async fn no_applicable_authority_means_untrusted() {
        let api = StubApi { member: Ok(true) };
        assert!(!eval(vec![], fork_pr("dev"), &api).await);
        // Tag authority is not applicable to fork origins at all.
        assert!(!eval(vec![Arc::new(TrustOriginTags)], fork_pr("dev"), &api).await);
    }

    #[tokio::test]
    async fn or_semantics_across_authorities() {
        let api = StubApi { member: Ok(false) };
        // Membership says no, but a second authority grants trust.
        let auths: Vec<Arc<dyn TrustAuthority>> =
            vec![Arc::new(TrustTeamForks), Arc::new(TrustEveryone)];
        assert!(eval(auths, fork_pr("stranger"), &api).await);
    }
}
