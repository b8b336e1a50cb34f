//! Discoverable heads.
//!
//! A head is a unit of source history the host may turn into a buildable job:
//! a branch, a tag, or a pull request. Branches and tags always live in the
//! repository being discovered; pull request heads may originate from a fork
//! and carry the fork's repository identity.

use serde::{Deserialize, Serialize};

use crate::types::{PrId, RepoId};

/// Coarse classification of heads, used by traits to declare which kinds of
/// head they bring into scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadCategory {
    Branch,
    Tag,
    PullRequest,
}

/// Where a head's code comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadOrigin {
    /// The repository being discovered.
    Default,
    /// A fork of it.
    Fork,
}

/// How a pull request head is checked out for building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStrategy {
    /// Build the PR head commit as-is.
    Head,
    /// Build the result of merging the PR into its destination.
    Merge,
}

/// A discoverable head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    Branch {
        name: String,
    },
    Tag {
        name: String,
    },
    PullRequest {
        id: PrId,
        /// The PR's source branch name.
        branch: String,
        /// The repository the source branch lives in.
        source_repo: RepoId,
        author: String,
        from_fork: bool,
    },
}

impl Head {
    pub fn category(&self) -> HeadCategory {
        match self {
            Head::Branch { .. } => HeadCategory::Branch,
            Head::Tag { .. } => HeadCategory::Tag,
            Head::PullRequest { .. } => HeadCategory::PullRequest,
        }
    }

    /// Branches and tags are always same-repository; a PR head's origin
    /// follows whether its source branch lives in a fork.
    pub fn origin(&self) -> HeadOrigin {
        match self {
            Head::Branch { .. } | Head::Tag { .. } => HeadOrigin::Default,
            Head::PullRequest { from_fork, .. } => {
                if *from_fork {
                    HeadOrigin::Fork
                } else {
                    HeadOrigin::Default
                }
            }
        }
    }

    /// The head's display name.
    pub fn name(&self) -> String {
        match self {
            Head::Branch { name } | Head::Tag { name } => name.clone(),
            Head::PullRequest { id, .. } => format!("PR{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branches_and_tags_have_default_origin() {
        let branch = Head::Branch {
            name: "main".into(),
        };
        let tag = Head::Tag {
            name: "v1.0.0".into(),
        };
        assert_eq!(branch.origin(), HeadOrigin::Default);
        assert_eq!(tag.origin(), HeadOrigin::Default);
        assert_eq!(branch.category(), HeadCategory::Branch);
        assert_eq!(tag.category(), HeadCategory::Tag);
    }

    #[test]
    fn pr_origin_follows_fork_flag() {
        let origin_pr = Head::PullRequest {
            id: PrId(1),
            branch: "feature".into(),
            source_repo: RepoId::new("team", "widget"),
            author: "dev".into(),
            from_fork: false,
        };
        let fork_pr = Head::PullRequest {
            id: PrId(2),
            branch: "feature".into(),
            source_repo: RepoId::new("outsider", "widget"),
            author: "outsider".into(),
            from_fork: true,
        };
        assert_eq!(origin_pr.origin(), HeadOrigin::Default);
        assert_eq!(fork_pr.origin(), HeadOrigin::Fork);
    }
}
