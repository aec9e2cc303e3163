use std::fs;
use std::path::{Path, PathBuf};

use git2::{BranchType, Cred, CredentialType, FetchOptions, PushOptions, RemoteCallbacks};

use crate::domain::RemoteInfo;
use crate::error::{NbpkgError, Result};
use crate::git::Upstream;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: git2::Repository,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = git2::Repository::discover(path)?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: git2::Repository) -> Self {
        Git2Repository { repo }
    }

    /// Clone `url` into `dest` and check out `branch`
    pub fn clone_branch(url: &str, dest: &Path, branch: &str) -> Result<Self> {
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());

        let repo = git2::build::RepoBuilder::new()
            .branch(branch)
            .fetch_options(fetch_options)
            .clone(url, dest)
            .map_err(|e| NbpkgError::repository(format!("Cannot clone {}: {}", url, e)))?;

        Ok(Git2Repository { repo })
    }

    fn branch_tip(&self, branch: &str) -> Result<git2::Oid> {
        let branch_ref = self
            .repo
            .find_branch(branch, BranchType::Local)
            .map_err(|e| NbpkgError::repository(format!("Cannot find branch '{}': {}", branch, e)))?;

        branch_ref
            .get()
            .target()
            .ok_or_else(|| NbpkgError::repository(format!("Branch '{}' has no target", branch)))
    }

    fn config_string(&self, key: &str) -> Result<Option<String>> {
        let config = self.repo.config()?;
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Credentials from the SSH agent or the usual key files
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }

            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }
        }

        Cred::default()
    });
    callbacks
}

impl super::Repository for Git2Repository {
    fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| NbpkgError::repository("Repository has no working tree"))
    }

    fn active_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| NbpkgError::repository(format!("Cannot read HEAD: {}", e)))?;

        if !head.is_branch() {
            return Err(NbpkgError::repository("HEAD is detached"));
        }

        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| NbpkgError::repository("Branch name is not valid UTF-8"))
    }

    fn upstream_of(&self, branch: &str) -> Result<Option<Upstream>> {
        let remote = self.config_string(&format!("branch.{}.remote", branch))?;
        let merge = self.config_string(&format!("branch.{}.merge", branch))?;

        Ok(match (remote, merge) {
            (Some(remote), Some(merge)) => Some(Upstream {
                remote,
                merge: merge.trim_start_matches("refs/heads/").to_string(),
            }),
            _ => None,
        })
    }

    fn remote_branches(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for item in self.repo.branches(Some(BranchType::Remote))? {
            let (branch, _) = item?;
            if let Some(name) = branch.name()? {
                if !name.ends_with("/HEAD") {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    fn remotes(&self) -> Result<Vec<RemoteInfo>> {
        let names = self.repo.remotes()?;
        let mut remotes = Vec::new();

        for name in names.iter().flatten() {
            let remote = self.repo.find_remote(name)?;
            remotes.push(RemoteInfo::new(name, remote.url().unwrap_or_default()));
        }

        Ok(remotes)
    }

    fn find_remote(&self, name: &str) -> Result<Option<RemoteInfo>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(Some(RemoteInfo::new(name, remote.url().unwrap_or_default()))),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create_remote(&self, name: &str, url: &str) -> Result<()> {
        self.repo.remote(name, url)?;
        Ok(())
    }

    fn delete_remote(&self, name: &str) -> Result<()> {
        self.repo.remote_delete(name)?;
        Ok(())
    }

    fn fetch_without_tags(&self, remote: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote)
            .map_err(|e| NbpkgError::repository(format!("Cannot find remote: {}", e)))?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());
        fetch_options.download_tags(git2::AutotagOption::None);

        // No refspecs given: use the ones configured for the remote
        remote
            .fetch::<&str>(&[], Some(&mut fetch_options), None)
            .map_err(|e| NbpkgError::repository(format!("Fetch failed: {}", e)))?;

        Ok(())
    }

    fn merged_branches(&self, branch: &str) -> Result<Vec<String>> {
        let target = self.branch_tip(branch)?;
        let mut merged = Vec::new();

        for item in self.repo.branches(Some(BranchType::Local))? {
            let (local, _) = item?;
            let Some(name) = local.name()?.map(str::to_string) else {
                continue;
            };
            let Some(tip) = local.get().target() else {
                continue;
            };

            if tip == target || self.repo.graph_descendant_of(target, tip)? {
                merged.push(name);
            }
        }

        Ok(merged)
    }

    fn push_branches(&self, remote: &str, branches: &[String]) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote)
            .map_err(|e| NbpkgError::push(format!("Cannot find remote: {}", e)))?;

        let mut callbacks = remote_callbacks();
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => Err(git2::Error::from_str(&format!(
                "Could not update reference {}: {}",
                refname, status
            ))),
            None => {
                tracing::info!("pushed {}", refname);
                Ok(())
            }
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspecs: Vec<String> = branches
            .iter()
            .map(|branch| format!("refs/heads/{}:refs/heads/{}", branch, branch))
            .collect();

        remote.push(&refspecs, Some(&mut push_options)).map_err(|e| {
            if e.class() == git2::ErrorClass::Net {
                NbpkgError::push(format!("network error: {}", e))
            } else {
                NbpkgError::push(e.to_string())
            }
        })
    }

    fn remove_all_tracked(&self) -> Result<Vec<PathBuf>> {
        let workdir = self.workdir()?;
        let mut index = self.repo.index()?;

        let paths: Vec<PathBuf> = index
            .iter()
            .map(|entry| PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()))
            .collect();

        for path in &paths {
            let full = workdir.join(path);
            match fs::remove_file(&full) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            // Drop directories left empty, like git rm does
            let mut parent = full.parent();
            while let Some(dir) = parent {
                if dir == workdir || fs::remove_dir(dir).is_err() {
                    break;
                }
                parent = dir.parent();
            }
        }

        index.clear()?;
        index.write()?;

        Ok(paths)
    }

    fn stage(&self, path: &Path) -> Result<()> {
        let workdir = self.workdir()?;
        let relative = path.strip_prefix(&workdir).unwrap_or(path);

        let mut index = self.repo.index()?;
        index.add_path(relative)?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        let signature = self.repo.signature()?;
        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        Ok(oid.to_string())
    }
}
