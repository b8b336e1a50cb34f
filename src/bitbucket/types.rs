//! Provider-neutral DTOs for the Bitbucket REST API.
//!
//! Only the slices of the API surface the discovery and trust machinery
//! consume: repository metadata, teams, and pull request summaries. Href link
//! collections are keyed by relation name ("clone", "html", "self"), matching
//! both flavors' link shapes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{PrId, RepoId};

/// A single hyperlink, optionally named within its relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Href {
    pub href: String,
    /// Distinguishes entries within one relation, e.g. "http" vs "ssh" clone
    /// links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    #[serde(default)]
    pub private: bool,
    /// Links keyed by relation name.
    #[serde(default)]
    pub links: BTreeMap<String, Vec<Href>>,
}

impl Repository {
    /// Returns the clone link with the given name ("http" or "ssh"), if any.
    pub fn clone_link(&self, name: &str) -> Option<&str> {
        self.links
            .get("clone")?
            .iter()
            .find(|l| l.name.as_deref() == Some(name))
            .map(|l| l.href.as_str())
    }
}

/// A team (cloud workspace or server project).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A pull request as returned by the REST API (as opposed to a webhook
/// payload): enough to materialize a discoverable head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PrId,
    pub title: Option<String>,
    pub author_username: String,
    pub source_repo: RepoId,
    pub source_branch: String,
    pub destination_branch: String,
}

impl PullRequest {
    /// Returns true if the source branch lives in a fork.
    pub fn from_fork(&self, destination_repo: &RepoId) -> bool {
        &self.source_repo != destination_repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_link_lookup() {
        let repo = Repository {
            id: RepoId::new("team", "widget"),
            private: true,
            links: BTreeMap::from([(
                "clone".to_string(),
                vec![
                    Href {
                        href: "https://bitbucket.org/team/widget.git".into(),
                        name: Some("http".into()),
                    },
                    Href {
                        href: "git@bitbucket.org:team/widget.git".into(),
                        name: Some("ssh".into()),
                    },
                ],
            )]),
        };

        assert_eq!(
            repo.clone_link("ssh"),
            Some("git@bitbucket.org:team/widget.git")
        );
        assert_eq!(repo.clone_link("nope"), None);
    }

    #[test]
    fn pull_request_fork_detection() {
        let pr = PullRequest {
            id: PrId(1),
            title: None,
            author_username: "dev".into(),
            source_repo: RepoId::new("outsider", "widget"),
            source_branch: "feature".into(),
            destination_branch: "main".into(),
        };
        assert!(pr.from_fork(&RepoId::new("team", "widget")));
        assert!(!pr.from_fork(&RepoId::new("outsider", "widget")));
    }
}
