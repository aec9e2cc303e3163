/// A configured git remote
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
}

impl RemoteInfo {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        RemoteInfo {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Strip the remote part of a remote-tracking branch name.
///
/// `origin/nb5.0` gives `nb5.0`. Only the first `/` is treated as the
/// separator, so remotes whose name contains a `/` are misread.
pub fn simple_name(remote_branch: &str) -> &str {
    remote_branch
        .split_once('/')
        .map(|(_, name)| name)
        .unwrap_or(remote_branch)
}

/// The module name a remote URL points to (its last path segment)
pub fn module_from_url(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    name.strip_suffix(".git").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("origin/nb5.0"), "nb5.0");
        assert_eq!(simple_name("networkbox-nonfree/nbplayground"), "nbplayground");
        assert_eq!(simple_name("origin/feature/x"), "feature/x");
        assert_eq!(simple_name("nb5.0"), "nb5.0");
    }

    #[test]
    fn test_module_from_url() {
        assert_eq!(module_from_url("git://pkgs.fedoraproject.org/bash"), "bash");
        assert_eq!(module_from_url("git://pkgs.fedoraproject.org/bash/"), "bash");
        assert_eq!(module_from_url("https://src.example.org/rpms/bash.git"), "bash");
    }
}
