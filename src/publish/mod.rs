//! Publish pipeline: a strictly ordered, non-atomic commit sequence against
//! a remote content-addressable store that never exposes a partial result.
//!
//! Blobs and a tree may be created and abandoned; the ref update is the sole
//! externally observable success signal. A fault at any earlier step leaves
//! the repository exactly as it was.

pub mod github;

use async_trait::async_trait;

use crate::errors::PublishError;
use crate::retry::RetryPolicy;
use crate::types::{CommitResult, PublishManifest, RepositoryRef, RepositoryTarget};
use crate::{log_debug, log_warn};

/// One path → blob association handed to tree creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob_sha: String,
}

/// The remote object store the pipeline runs against. `GithubClient` is the
/// production implementation; tests substitute call-counting mocks.
#[async_trait]
pub trait RemoteRepo: Send + Sync {
    /// Whether a repository with this name exists under the account
    async fn find_repository(&self, name: &str) -> Result<Option<RepositoryRef>, PublishError>;

    /// Create the repository. Fails with [`PublishError::NameTaken`] when a
    /// concurrent creator won the race.
    async fn create_repository(
        &self,
        target: &RepositoryTarget,
    ) -> Result<RepositoryRef, PublishError>;

    /// Current head sha of a branch; `None` while the branch is not yet
    /// queryable (fresh repositories initialize asynchronously).
    async fn branch_head(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<Option<String>, PublishError>;

    /// Upload raw file content, returning its content address
    async fn create_blob(&self, repo: &RepositoryRef, content: &str)
    -> Result<String, PublishError>;

    /// Build one tree on top of `base_tree` listing every uploaded blob
    async fn create_tree(
        &self,
        repo: &RepositoryRef,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, PublishError>;

    /// Create a commit pointing at `tree_sha` with `parent_sha` as parent
    async fn create_commit(
        &self,
        repo: &RepositoryRef,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, PublishError>;

    /// Atomically point the branch at the new commit, the only externally
    /// visible mutation in the whole sequence.
    async fn update_ref(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        commit_sha: &str,
    ) -> Result<(), PublishError>;
}

/// Everything a caller needs after a successful publish
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub repository: RepositoryRef,
    pub commit: CommitResult,
}

/// Publish a manifest to the target repository.
///
/// The sequence is fixed: existence check, idempotent create, branch
/// readiness wait, blob uploads, tree, commit, ref update. Only the
/// readiness wait retries, since it is read-only; everything after it raises
/// immediately so no remote state is ever duplicated.
pub async fn publish(
    store: &dyn RemoteRepo,
    manifest: &PublishManifest,
    target: &RepositoryTarget,
    message: &str,
) -> Result<PublishOutcome, PublishError> {
    if manifest.is_empty() {
        return Err(PublishError::EmptyManifest);
    }

    // Step 1-2: find or create, tolerating a creation race
    let repository = match store.find_repository(&target.name).await? {
        Some(existing) => {
            log_debug!("publish: reusing existing repository {}", existing.full_name);
            existing
        }
        None => match store.create_repository(target).await {
            Ok(created) => {
                log_debug!("publish: created repository {}", created.full_name);
                created
            }
            Err(PublishError::NameTaken) => {
                log_warn!("publish: lost creation race for {}, re-checking", target.name);
                store
                    .find_repository(&target.name)
                    .await?
                    .ok_or(PublishError::NameTaken)?
            }
            Err(other) => return Err(other),
        },
    };

    // Step 3: wait for the branch ref to become readable
    let head_sha = wait_for_branch(store, &repository, &target.branch).await?;

    // Step 4: upload every blob; any failure aborts before tree creation
    let mut entries = Vec::with_capacity(manifest.len());
    for file in manifest.entries() {
        let blob_sha = store.create_blob(&repository, &file.content).await?;
        log_debug!("publish: blob {} -> {blob_sha}", file.path);
        entries.push(TreeEntry {
            path: file.path.clone(),
            blob_sha,
        });
    }

    // Steps 5-6: tree and commit on top of the prior head
    let tree_sha = store.create_tree(&repository, &head_sha, &entries).await?;
    let commit_sha = store
        .create_commit(&repository, message, &tree_sha, &head_sha)
        .await?;

    // Step 7: the one observable mutation
    store
        .update_ref(&repository, &target.branch, &commit_sha)
        .await?;

    log_debug!(
        "publish: {} now at {commit_sha} ({} file(s))",
        repository.full_name,
        manifest.len()
    );

    Ok(PublishOutcome {
        repository,
        commit: CommitResult {
            tree_sha,
            commit_sha,
        },
    })
}

/// Bounded readiness poll. A fresh repository's branch ref may 404 for a
/// short window after creation; this is the only pipeline-level retry.
async fn wait_for_branch(
    store: &dyn RemoteRepo,
    repo: &RepositoryRef,
    branch: &str,
) -> Result<String, PublishError> {
    let policy = RetryPolicy::branch_readiness();

    for attempt in 1..=policy.max_attempts {
        if let Some(sha) = store.branch_head(repo, branch).await? {
            return Ok(sha);
        }
        log_debug!(
            "publish: branch {branch} not ready (check {attempt}/{})",
            policy.max_attempts
        );
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay_for(attempt, None)).await;
        }
    }

    Err(PublishError::RepositoryNotReady {
        attempts: policy.max_attempts,
    })
}
