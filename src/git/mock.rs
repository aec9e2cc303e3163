use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::domain::RemoteInfo;
use crate::error::{NbpkgError, Result};
use crate::git::{Repository, Upstream};

/// Mock repository for testing without actual git operations.
///
/// Mutating operations are recorded so tests can inspect them.
pub struct MockRepository {
    workdir: PathBuf,
    active_branch: Option<String>,
    upstreams: HashMap<String, Upstream>,
    remote_branches: Vec<String>,
    remotes: RefCell<BTreeMap<String, String>>,
    merged: HashMap<String, Vec<String>>,
    tracked: RefCell<Vec<PathBuf>>,
    fetch_error: Option<String>,
    pub pushes: RefCell<Vec<(String, Vec<String>)>>,
    pub fetches: RefCell<Vec<String>>,
    pub commits: RefCell<Vec<String>>,
    pub staged: RefCell<Vec<PathBuf>>,
}

impl MockRepository {
    /// Create a new empty mock repository rooted at `workdir`
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        MockRepository {
            workdir: workdir.into(),
            active_branch: None,
            upstreams: HashMap::new(),
            remote_branches: Vec::new(),
            remotes: RefCell::new(BTreeMap::new()),
            merged: HashMap::new(),
            tracked: RefCell::new(Vec::new()),
            fetch_error: None,
            pushes: RefCell::new(Vec::new()),
            fetches: RefCell::new(Vec::new()),
            commits: RefCell::new(Vec::new()),
            staged: RefCell::new(Vec::new()),
        }
    }

    /// Check out `branch`, tracking `merge` on `remote`
    pub fn checkout(&mut self, branch: &str, remote: &str, merge: &str) {
        self.active_branch = Some(branch.to_string());
        self.upstreams.insert(
            branch.to_string(),
            Upstream {
                remote: remote.to_string(),
                merge: merge.to_string(),
            },
        );
    }

    pub fn add_remote(&mut self, name: &str, url: &str) {
        self.remotes.borrow_mut().insert(name.to_string(), url.to_string());
    }

    pub fn add_remote_branch(&mut self, name: &str) {
        self.remote_branches.push(name.to_string());
    }

    /// Branches `git branch --merged <branch>` would list
    pub fn set_merged(&mut self, branch: &str, merged: &[&str]) {
        self.merged.insert(
            branch.to_string(),
            merged.iter().map(|b| b.to_string()).collect(),
        );
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.tracked.borrow_mut().push(path.into());
    }

    pub fn fail_fetches(&mut self, message: &str) {
        self.fetch_error = Some(message.to_string());
    }

    pub fn remote_url(&self, name: &str) -> Option<String> {
        self.remotes.borrow().get(name).cloned()
    }
}

impl Repository for MockRepository {
    fn workdir(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }

    fn active_branch(&self) -> Result<String> {
        self.active_branch
            .clone()
            .ok_or_else(|| NbpkgError::repository("HEAD is detached"))
    }

    fn upstream_of(&self, branch: &str) -> Result<Option<Upstream>> {
        Ok(self.upstreams.get(branch).cloned())
    }

    fn remote_branches(&self) -> Result<Vec<String>> {
        Ok(self.remote_branches.clone())
    }

    fn remotes(&self) -> Result<Vec<RemoteInfo>> {
        Ok(self
            .remotes
            .borrow()
            .iter()
            .map(|(name, url)| RemoteInfo::new(name.as_str(), url.as_str()))
            .collect())
    }

    fn find_remote(&self, name: &str) -> Result<Option<RemoteInfo>> {
        Ok(self
            .remotes
            .borrow()
            .get(name)
            .map(|url| RemoteInfo::new(name, url.as_str())))
    }

    fn create_remote(&self, name: &str, url: &str) -> Result<()> {
        let mut remotes = self.remotes.borrow_mut();
        if remotes.contains_key(name) {
            return Err(NbpkgError::repository(format!("remote '{}' already exists", name)));
        }
        remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }

    fn delete_remote(&self, name: &str) -> Result<()> {
        self.remotes
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| NbpkgError::repository(format!("remote '{}' does not exist", name)))
    }

    fn fetch_without_tags(&self, remote: &str) -> Result<()> {
        if let Some(message) = &self.fetch_error {
            return Err(NbpkgError::repository(message.clone()));
        }
        self.fetches.borrow_mut().push(remote.to_string());
        Ok(())
    }

    fn merged_branches(&self, branch: &str) -> Result<Vec<String>> {
        Ok(self.merged.get(branch).cloned().unwrap_or_default())
    }

    fn push_branches(&self, remote: &str, branches: &[String]) -> Result<()> {
        self.pushes
            .borrow_mut()
            .push((remote.to_string(), branches.to_vec()));
        Ok(())
    }

    fn remove_all_tracked(&self) -> Result<Vec<PathBuf>> {
        Ok(self.tracked.borrow_mut().drain(..).collect())
    }

    fn stage(&self, path: &Path) -> Result<()> {
        self.staged.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        let mut commits = self.commits.borrow_mut();
        commits.push(message.to_string());
        Ok(format!("{:040x}", commits.len()))
    }
}
