//! GitHub implementation of the remote object store, over the REST git data
//! API (blobs, trees, commits, refs).

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};

use super::{RemoteRepo, TreeEntry};
use crate::errors::PublishError;
use crate::log_debug;
use crate::types::{RepositoryRef, RepositoryTarget};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("appforge/", env!("CARGO_PKG_VERSION"));

/// Thin client over the GitHub REST API, holding one token
pub struct GithubClient {
    client: Client,
    token: String,
    api_base: String,
}

impl GithubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API root (GitHub Enterprise)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    /// Login of the token's owner; repositories are addressed under it
    async fn authenticated_login(&self) -> Result<String, PublishError> {
        let response = self.request(Method::GET, "/user").send().await?;
        let body = expect_json(response).await?;
        body["login"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| PublishError::Remote {
                status: 200,
                message: "user response had no login".to_string(),
            })
    }

    async fn sha_from(response: Response) -> Result<String, PublishError> {
        let body = expect_json(response).await?;
        body["sha"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| PublishError::Remote {
                status: 200,
                message: "response had no sha".to_string(),
            })
    }
}

#[async_trait]
impl RemoteRepo for GithubClient {
    async fn find_repository(&self, name: &str) -> Result<Option<RepositoryRef>, PublishError> {
        let login = self.authenticated_login().await?;
        let response = self
            .request(Method::GET, &format!("/repos/{login}/{name}"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = expect_json(response).await?;
        let repo: RepositoryRef =
            serde_json::from_value(body).map_err(|e| PublishError::Remote {
                status: 200,
                message: format!("unreadable repository descriptor: {e}"),
            })?;
        Ok(Some(repo))
    }

    async fn create_repository(
        &self,
        target: &RepositoryTarget,
    ) -> Result<RepositoryRef, PublishError> {
        let request_body = json!({
            "name": target.name,
            "description": target.description,
            "auto_init": true,
            "private": target.private,
        });

        let response = self
            .request(Method::POST, "/user/repos")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.json::<Value>().await.unwrap_or_default();
            if is_name_taken(&body) {
                return Err(PublishError::NameTaken);
            }
            return Err(PublishError::Remote {
                status: status.as_u16(),
                message: remote_message(&body),
            });
        }

        let body = expect_json(response).await?;
        serde_json::from_value(body).map_err(|e| PublishError::Remote {
            status: 201,
            message: format!("unreadable repository descriptor: {e}"),
        })
    }

    async fn branch_head(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<Option<String>, PublishError> {
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{}/git/ref/heads/{branch}", repo.full_name),
            )
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = expect_json(response).await?;
        Ok(body["object"]["sha"].as_str().map(ToString::to_string))
    }

    async fn create_blob(
        &self,
        repo: &RepositoryRef,
        content: &str,
    ) -> Result<String, PublishError> {
        let response = self
            .request(
                Method::POST,
                &format!("/repos/{}/git/blobs", repo.full_name),
            )
            .json(&json!({"content": content, "encoding": "utf-8"}))
            .send()
            .await?;
        Self::sha_from(response).await
    }

    async fn create_tree(
        &self,
        repo: &RepositoryRef,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, PublishError> {
        let tree: Vec<Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "path": entry.path,
                    "mode": "100644",
                    "type": "blob",
                    "sha": entry.blob_sha,
                })
            })
            .collect();

        let response = self
            .request(
                Method::POST,
                &format!("/repos/{}/git/trees", repo.full_name),
            )
            .json(&json!({"base_tree": base_tree, "tree": tree}))
            .send()
            .await?;
        Self::sha_from(response).await
    }

    async fn create_commit(
        &self,
        repo: &RepositoryRef,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, PublishError> {
        let response = self
            .request(
                Method::POST,
                &format!("/repos/{}/git/commits", repo.full_name),
            )
            .json(&json!({
                "message": message,
                "tree": tree_sha,
                "parents": [parent_sha],
            }))
            .send()
            .await?;
        Self::sha_from(response).await
    }

    async fn update_ref(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        commit_sha: &str,
    ) -> Result<(), PublishError> {
        log_debug!("github: updating refs/heads/{branch} -> {commit_sha}");
        let response = self
            .request(
                Method::PATCH,
                &format!("/repos/{}/git/refs/heads/{branch}", repo.full_name),
            )
            .json(&json!({"sha": commit_sha, "force": false}))
            .send()
            .await?;

        // Scope problems on the ref update deserve the precise remediation;
        // everything else surfaces the remote's words verbatim.
        expect_json(response).await.map(|_| ())
    }
}

/// Map a non-2xx response to the publish error taxonomy
async fn expect_json(response: Response) -> Result<Value, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<Value>().await?);
    }

    let body = response.json::<Value>().await.unwrap_or_default();
    Err(classify_status(status.as_u16(), remote_message(&body)))
}

fn classify_status(status: u16, message: String) -> PublishError {
    match status {
        401 => PublishError::AuthInvalid { message },
        403 => PublishError::PermissionDenied { message },
        429 => PublishError::RateLimited { message },
        status => PublishError::Remote { status, message },
    }
}

/// GitHub's 422 for a creation race names the name field in its error list
fn is_name_taken(body: &Value) -> bool {
    body["errors"]
        .as_array()
        .is_some_and(|errors| {
            errors.iter().any(|e| {
                e["field"].as_str() == Some("name")
                    && e["message"]
                        .as_str()
                        .is_some_and(|m| m.contains("already exists"))
            })
        })
        || body["message"]
            .as_str()
            .is_some_and(|m| m.contains("name already exists"))
}

fn remote_message(body: &Value) -> String {
    body["message"]
        .as_str()
        .unwrap_or("no error message")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(401, String::new()),
            PublishError::AuthInvalid { .. }
        ));
        assert!(matches!(
            classify_status(403, String::new()),
            PublishError::PermissionDenied { .. }
        ));
        assert!(matches!(
            classify_status(429, String::new()),
            PublishError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(500, String::new()),
            PublishError::Remote { status: 500, .. }
        ));
    }

    #[test]
    fn permission_error_names_the_required_scope() {
        let err = classify_status(403, "Resource not accessible".to_string());
        assert!(err.to_string().contains("public_repo"));
    }

    #[test]
    fn name_collision_detection() {
        let body = json!({
            "message": "Repository creation failed.",
            "errors": [{"resource": "Repository", "field": "name", "message": "name already exists on this account"}]
        });
        assert!(is_name_taken(&body));

        let other = json!({"message": "Validation Failed", "errors": []});
        assert!(!is_name_taken(&other));
    }
}
