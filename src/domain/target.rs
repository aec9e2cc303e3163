use std::fmt;
use std::path::Path;

use crate::domain::BranchFamily;

/// Whether a package is built for the free or the nonfree repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freedom {
    Free,
    NonFree,
}

impl Freedom {
    /// Marker that flips a remote to nonfree
    pub const NONFREE_MARKER: &'static str = "nonfree";

    /// Classify a remote from its name and URL.
    ///
    /// The marker may appear anywhere in either string.
    pub fn from_remote(name: &str, url: &str) -> Self {
        if name.contains(Self::NONFREE_MARKER) || url.contains(Self::NONFREE_MARKER) {
            Freedom::NonFree
        } else {
            Freedom::Free
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Freedom::Free)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Freedom::Free => "free",
            Freedom::NonFree => "nonfree",
        }
    }
}

impl fmt::Display for Freedom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<branch>-<free|nonfree>-candidate`
pub fn compose_build_target(branch: &str, freedom: Freedom) -> String {
    format!("{}-{}-candidate", branch, freedom)
}

/// Everything the build tooling needs to know about the active branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub branch: String,
    pub family: BranchFamily,
    pub dist_var: String,
    pub dist_val: String,
    pub dist_tag: String,
    pub build_root: Option<String>,
    pub build_target: String,
    pub is_free: bool,
}

impl ResolvedTarget {
    /// RPM macro definitions pinning the build to `path`.
    ///
    /// No `<dist_tag> 1` macro is emitted: rpm cannot evaluate a dotted name
    /// such as `nb5.0`.
    pub fn rpm_defines(&self, path: &Path) -> Vec<(String, String)> {
        let path = path.display().to_string();
        let mut defines: Vec<(String, String)> = ["_sourcedir", "_specdir", "_builddir", "_srcrpmdir", "_rpmdir"]
            .iter()
            .map(|name| (name.to_string(), path.clone()))
            .collect();

        defines.push(("dist".to_string(), format!(".{}", self.dist_tag)));
        defines.push((self.dist_var.clone(), self.dist_val.replace('.', "")));
        defines
    }

    /// [`rpm_defines`](Self::rpm_defines) as `--define 'name value'` arguments
    pub fn rpm_define_args(&self, path: &Path) -> Vec<String> {
        self.rpm_defines(path)
            .into_iter()
            .map(|(name, value)| format!("--define '{} {}'", name, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nb50() -> ResolvedTarget {
        ResolvedTarget {
            branch: "nb5.0".to_string(),
            family: BranchFamily::ReleaseLine,
            dist_var: "nbrs".to_string(),
            dist_val: "5.0".to_string(),
            dist_tag: "nb5.0".to_string(),
            build_root: Some("nb5.0-x86_64".to_string()),
            build_target: "nb5.0-free-candidate".to_string(),
            is_free: true,
        }
    }

    #[test]
    fn test_freedom_from_remote_name() {
        assert_eq!(Freedom::from_remote("networkbox-nonfree", ""), Freedom::NonFree);
        assert_eq!(Freedom::from_remote("networkbox", ""), Freedom::Free);
    }

    #[test]
    fn test_freedom_from_remote_url() {
        let freedom = Freedom::from_remote("origin", "ssh://git.example.com/nonfree/foo");
        assert!(!freedom.is_free());
    }

    #[test]
    fn test_compose_build_target() {
        assert_eq!(compose_build_target("nb5.0", Freedom::Free), "nb5.0-free-candidate");
        assert_eq!(
            compose_build_target("nbplayground", Freedom::NonFree),
            "nbplayground-nonfree-candidate"
        );
    }

    #[test]
    fn test_rpm_defines() {
        let defines = nb50().rpm_defines(Path::new("/work/foo"));
        assert_eq!(defines.len(), 7);
        assert_eq!(defines[0], ("_sourcedir".to_string(), "/work/foo".to_string()));
        assert!(defines.contains(&("dist".to_string(), ".nb5.0".to_string())));
        assert!(defines.contains(&("nbrs".to_string(), "50".to_string())));
    }

    #[test]
    fn test_rpm_defines_never_define_dist_tag() {
        let target = nb50();
        let defines = target.rpm_defines(Path::new("/work/foo"));
        assert!(!defines
            .iter()
            .any(|(name, value)| name == &target.dist_tag && value == "1"));
        assert!(!defines.iter().any(|(name, _)| name == "nb5.0"));
    }

    #[test]
    fn test_rpm_define_args() {
        let args = nb50().rpm_define_args(Path::new("/work/foo"));
        assert_eq!(args[5], "--define 'dist .nb5.0'");
        assert_eq!(args[6], "--define 'nbrs 50'");
    }
}
