//! Bitbucket REST client.
//!
//! [`BitbucketApi`] is the seam the trust engine and discovery code consume;
//! [`HttpBitbucketClient`] is the reqwest-backed implementation, scoped to one
//! hosting instance (base URL + flavor). Retry/backoff is the host's concern,
//! not ours: errors surface immediately, categorized via
//! [`super::error::ApiError`].

use async_trait::async_trait;
use serde::Deserialize;

use crate::hooks::HostingFlavor;
use crate::types::RepoId;

use super::error::ApiError;
use super::types::{Href, Repository};

/// The slice of the Bitbucket REST API this crate consumes.
#[async_trait]
pub trait BitbucketApi: Send + Sync {
    /// Fetches repository metadata.
    async fn repository(&self, repo: &RepoId) -> Result<Repository, ApiError>;

    /// Checks whether `username` is a member of the team that owns the
    /// repositories being discovered.
    async fn is_team_member(&self, team: &str, username: &str) -> Result<bool, ApiError>;
}

/// A reqwest-backed [`BitbucketApi`] scoped to one hosting instance.
#[derive(Clone)]
pub struct HttpBitbucketClient {
    http: reqwest::Client,
    base_url: String,
    flavor: HostingFlavor,
    credentials: Option<(String, String)>,
}

impl HttpBitbucketClient {
    /// Creates a client for Bitbucket Cloud (`https://api.bitbucket.org`).
    pub fn cloud() -> Self {
        Self::new("https://api.bitbucket.org", HostingFlavor::Cloud)
    }

    /// Creates a client for a self-managed server at `base_url`.
    pub fn server(base_url: impl Into<String>) -> Self {
        Self::new(base_url, HostingFlavor::Server)
    }

    fn new(base_url: impl Into<String>, flavor: HostingFlavor) -> Self {
        HttpBitbucketClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            flavor,
            credentials: None,
        }
    }

    /// Sets basic-auth credentials (username + app password or token).
    pub fn with_credentials(mut self, username: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), secret.into()));
        self
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let mut req = self.http.get(format!("{}{path}", self.base_url));
        if let Some((user, secret)) = &self.credentials {
            req = req.basic_auth(user, Some(secret));
        }
        req.send().await.map_err(ApiError::transport)
    }
}

// Cloud repository response; server uses a different shape below.
#[derive(Debug, Deserialize)]
struct RawCloudRepo {
    full_name: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    links: std::collections::BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawServerRepo {
    slug: String,
    project: RawServerProject,
    #[serde(default, rename = "public")]
    is_public: bool,
    #[serde(default)]
    links: std::collections::BTreeMap<String, Vec<Href>>,
}

#[derive(Debug, Deserialize)]
struct RawServerProject {
    key: String,
}

fn cloud_links(
    raw: std::collections::BTreeMap<String, serde_json::Value>,
) -> std::collections::BTreeMap<String, Vec<Href>> {
    // Cloud link relations are either one object or a list of objects.
    raw.into_iter()
        .filter_map(|(rel, value)| {
            let hrefs = match value {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .filter_map(|v| serde_json::from_value(v).ok())
                    .collect(),
                obj @ serde_json::Value::Object(_) => {
                    serde_json::from_value::<Href>(obj).ok().map(|h| vec![h])?
                }
                _ => return None,
            };
            Some((rel, hrefs))
        })
        .collect()
}

#[async_trait]
impl BitbucketApi for HttpBitbucketClient {
    async fn repository(&self, repo: &RepoId) -> Result<Repository, ApiError> {
        let path = match self.flavor {
            HostingFlavor::Cloud => format!("/2.0/repositories/{}/{}", repo.owner, repo.name),
            HostingFlavor::Server => {
                format!("/rest/api/1.0/projects/{}/repos/{}", repo.owner, repo.name)
            }
        };
        let response = self.get(&path).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(
                status.as_u16(),
                format!("fetching repository {repo}"),
            ));
        }

        match self.flavor {
            HostingFlavor::Cloud => {
                let raw: RawCloudRepo = response.json().await.map_err(ApiError::transport)?;
                let id = raw
                    .full_name
                    .split_once('/')
                    .map(|(owner, name)| RepoId::new(owner, name))
                    .unwrap_or_else(|| repo.clone());
                Ok(Repository {
                    id,
                    private: raw.is_private,
                    links: cloud_links(raw.links),
                })
            }
            HostingFlavor::Server => {
                let raw: RawServerRepo = response.json().await.map_err(ApiError::transport)?;
                Ok(Repository {
                    id: RepoId::new(raw.project.key, raw.slug),
                    private: !raw.is_public,
                    links: raw.links,
                })
            }
        }
    }

    async fn is_team_member(&self, team: &str, username: &str) -> Result<bool, ApiError> {
        let path = match self.flavor {
            HostingFlavor::Cloud => format!("/2.0/workspaces/{team}/members/{username}"),
            HostingFlavor::Server => format!(
                "/rest/api/1.0/projects/{team}/permissions/users?filter={username}"
            ),
        };
        let response = self.get(&path).await?;
        let status = response.status();

        match self.flavor {
            // Cloud answers membership with the member resource or 404.
            HostingFlavor::Cloud => match status.as_u16() {
                200..=299 => Ok(true),
                404 => Ok(false),
                code => Err(ApiError::from_status(
                    code,
                    format!("checking membership of {username} in {team}"),
                )),
            },
            // Server lists matching users with project permissions.
            HostingFlavor::Server => {
                if !status.is_success() {
                    return Err(ApiError::from_status(
                        status.as_u16(),
                        format!("checking membership of {username} in {team}"),
                    ));
                }

                #[derive(Deserialize)]
                struct Page {
                    values: Vec<Entry>,
                }
                #[derive(Deserialize)]
                struct Entry {
                    user: NamedUser,
                }
                #[derive(Deserialize)]
                struct NamedUser {
                    name: String,
                }

                let page: Page = response.json().await.map_err(ApiError::transport)?;
                Ok(page.values.iter().any(|e| e.user.name == username))
            }
        }
    }
}

impl std::fmt::Debug for HttpBitbucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBitbucketClient")
            .field("base_url", &self.base_url)
            .field("flavor", &self.flavor)
            .finish_non_exhaustive()
    }
}
