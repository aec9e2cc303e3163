//! Command implementations behind the `nbpkg` binary.
//!
//! [`Commands`] works on an existing package checkout. Cloning happens before
//! there is a checkout, so [`clone_module`] stands alone, as does
//! [`detect_freedom`], which picks the configuration file to load.

pub mod commands;

pub use commands::{Commands, Options};

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::domain::{Freedom, RemoteInfo};
use crate::error::{NbpkgError, Result};
use crate::git::{Git2Repository, Repository};

/// Branch checked out by `clone` unless another one is asked for
pub const DEFAULT_CLONE_BRANCH: &str = "nbplayground";

/// Which infrastructure a command talks to.
///
/// An explicit `--nonfree` wins, `clone` always starts from the free
/// infrastructure, and inside a checkout any remote mentioning `nonfree`
/// selects the nonfree one.
pub fn detect_freedom(nonfree: bool, cloning: bool, path: &Path) -> Freedom {
    if nonfree {
        return Freedom::NonFree;
    }
    if cloning {
        return Freedom::Free;
    }

    match Git2Repository::open(path).and_then(|repo| repo.remotes()) {
        Ok(remotes) => freedom_of_remotes(&remotes),
        Err(e) => {
            tracing::debug!("not in a checkout ({}), assuming free", e);
            Freedom::Free
        }
    }
}

pub fn freedom_of_remotes(remotes: &[RemoteInfo]) -> Freedom {
    if remotes
        .iter()
        .any(|remote| Freedom::from_remote(&remote.name, &remote.url) == Freedom::NonFree)
    {
        Freedom::NonFree
    } else {
        Freedom::Free
    }
}

/// URL `module` is cloned from: the authenticated one for `user`, or the
/// anonymous one
pub fn clone_url(config: &Config, module: &str, user: &str, anonymous: bool) -> String {
    let template = if anonymous {
        &config.nbpkg.anongiturl
    } else {
        &config.nbpkg.gitbaseurl
    };
    template.replace("{user}", user).replace("{module}", module)
}

/// Clone `module` into `<parent>/<module>` and check out `branch` (by default
/// [`DEFAULT_CLONE_BRANCH`])
pub fn clone_module(
    config: &Config,
    module: &str,
    branch: Option<&str>,
    user: &str,
    anonymous: bool,
    parent: &Path,
) -> Result<PathBuf> {
    let branch = branch.unwrap_or(DEFAULT_CLONE_BRANCH);
    let dest = parent.join(module);
    if dest.exists() {
        return Err(NbpkgError::repository(format!(
            "Destination {} already exists",
            dest.display()
        )));
    }

    let url = clone_url(config, module, user, anonymous);
    tracing::info!("Cloning {} ({}) into {}", url, branch, dest.display());
    Git2Repository::clone_branch(&url, &dest, branch)?;
    Ok(dest)
}
