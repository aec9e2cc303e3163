//! Git operations abstraction layer
//!
//! This module provides a trait-based abstraction over the git operations
//! nbpkg needs, allowing for a real implementation backed by `git2` and a mock
//! implementation for testing.
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: A mock implementation for testing
//!
//! Most code should depend on the [Repository] trait rather than concrete
//! implementations.

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use std::path::{Path, PathBuf};

use crate::domain::RemoteInfo;
use crate::error::Result;

/// Where a local branch pulls from (`branch.<name>.remote` and
/// `branch.<name>.merge`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub remote: String,
    /// Branch name on the remote, without `refs/heads/`
    pub merge: String,
}

/// Common git operation trait for abstraction
///
/// ## Error Handling
///
/// All methods return [crate::error::Result<T>]. Implementations map
/// underlying errors (like `git2::Error`) to [crate::error::NbpkgError]
/// variants.
pub trait Repository {
    /// Root of the working tree
    fn workdir(&self) -> Result<PathBuf>;

    /// Name of the checked-out branch
    ///
    /// # Returns
    /// * `Ok(name)` - Short branch name (e.g. "nb5.0")
    /// * `Err` - If HEAD is detached or unborn
    fn active_branch(&self) -> Result<String>;

    /// Tracking configuration of a local branch
    ///
    /// # Returns
    /// * `Ok(Some(Upstream))` - Both `remote` and `merge` are configured
    /// * `Ok(None)` - The branch does not track anything
    fn upstream_of(&self, branch: &str) -> Result<Option<Upstream>>;

    /// Every remote-tracking branch, as `remote/name`
    fn remote_branches(&self) -> Result<Vec<String>>;

    /// Every configured remote with its URL
    fn remotes(&self) -> Result<Vec<RemoteInfo>>;

    /// Look up one remote
    ///
    /// # Returns
    /// * `Ok(Some(RemoteInfo))` - The remote exists
    /// * `Ok(None)` - No remote of that name
    fn find_remote(&self, name: &str) -> Result<Option<RemoteInfo>>;

    /// Add a remote with the default fetch refspec
    fn create_remote(&self, name: &str, url: &str) -> Result<()>;

    fn delete_remote(&self, name: &str) -> Result<()>;

    /// Fetch every branch of `remote`, without tags
    fn fetch_without_tags(&self, remote: &str) -> Result<()>;

    /// Local branches whose tip is reachable from `branch` (including `branch`
    /// itself), like `git branch --merged <branch>`
    fn merged_branches(&self, branch: &str) -> Result<Vec<String>>;

    /// Push local branches to the same names on `remote`
    fn push_branches(&self, remote: &str, branches: &[String]) -> Result<()>;

    /// Delete every tracked file from the working tree and the index, like
    /// `git rm -rf .`
    ///
    /// # Returns
    /// * `Ok(paths)` - Paths removed, relative to the working tree
    fn remove_all_tracked(&self) -> Result<Vec<PathBuf>>;

    /// Stage a file, like `git add <path>`
    fn stage(&self, path: &Path) -> Result<()>;

    /// Commit the index on top of HEAD
    ///
    /// # Returns
    /// * `Ok(hash)` - Full hash of the new commit
    fn commit(&self, message: &str) -> Result<String>;
}
