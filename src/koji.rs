//! Koji collaborators: the build-target query used by release-line inference,
//! and the client certificates configured for the build client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use ini::Ini;

use crate::error::{NbpkgError, Result};

/// Looks up build targets on a build service
pub trait BuildTargetService {
    /// Name of the destination tag of `target` (e.g. `nb5.1-free`)
    fn dest_tag(&self, target: &str) -> Result<String>;
}

/// Queries Koji through its command-line client
#[derive(Debug, Clone)]
pub struct KojiCli {
    config: PathBuf,
    profile: String,
}

impl KojiCli {
    /// `build_client` is the client executable; its basename is the profile
    pub fn new(config: impl Into<PathBuf>, build_client: &str) -> Self {
        KojiCli {
            config: config.into(),
            profile: profile_name(build_client).to_string(),
        }
    }
}

impl BuildTargetService for KojiCli {
    fn dest_tag(&self, target: &str) -> Result<String> {
        tracing::debug!(target, profile = %self.profile, "querying koji build target");

        let output = Command::new("koji")
            .arg("--config")
            .arg(&self.config)
            .args(["--profile", &self.profile, "--noauth"])
            .args(["list-targets", "--name", target, "--quiet"])
            .output()
            .map_err(|e| NbpkgError::koji(format!("Failed to run koji: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NbpkgError::koji(format!(
                "koji exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_list_targets(&stdout, target)
            .ok_or_else(|| NbpkgError::koji(format!("No build target named {}", target)))
    }
}

/// Pick the destination tag of `target` out of `koji list-targets --quiet`
/// output (`name  build-tag  dest-tag` per line).
pub fn parse_list_targets(output: &str, target: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let columns: Vec<&str> = line.split_whitespace().collect();
        match columns.as_slice() {
            [name, _build_tag, dest_tag, ..] if *name == target => Some(dest_tag.to_string()),
            _ => None,
        }
    })
}

/// Fixed answers, for offline use and tests
#[derive(Debug, Clone, Default)]
pub struct StaticTargets {
    targets: HashMap<String, String>,
}

impl StaticTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: impl Into<String>, dest_tag: impl Into<String>) -> Self {
        self.targets.insert(target.into(), dest_tag.into());
        self
    }
}

impl BuildTargetService for StaticTargets {
    fn dest_tag(&self, target: &str) -> Result<String> {
        self.targets
            .get(target)
            .cloned()
            .ok_or_else(|| NbpkgError::koji(format!("No build target named {}", target)))
    }
}

/// The TLS client certificate and CA certificate used to talk to a lookaside
/// cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificates {
    pub cert: PathBuf,
    pub ca_cert: PathBuf,
}

impl ClientCertificates {
    /// Read `cert` and `serverca` from the `[<build client>]` section of a
    /// Koji client configuration.
    pub fn load(kojiconfig: &Path, build_client: &str) -> Result<Self> {
        let conf = Ini::load_from_file(kojiconfig).map_err(|e| {
            NbpkgError::config(format!("Cannot read {}: {}", kojiconfig.display(), e))
        })?;

        let section_name = profile_name(build_client);
        let section = conf.section(Some(section_name)).ok_or_else(|| {
            NbpkgError::config(format!(
                "Can't find the [{}] section in the Koji config {}",
                section_name,
                kojiconfig.display()
            ))
        })?;

        let get = |key: &str| {
            section.get(key).map(expand_tilde).ok_or_else(|| {
                NbpkgError::config(format!(
                    "Missing '{}' in the [{}] section of {}",
                    key,
                    section_name,
                    kojiconfig.display()
                ))
            })
        };

        Ok(ClientCertificates {
            cert: get("cert")?,
            ca_cert: get("serverca")?,
        })
    }
}

fn profile_name(build_client: &str) -> &str {
    Path::new(build_client)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(build_client)
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_list_targets() {
        let output = "nbplayground-free-candidate    nb-build    nb5.1-free\n\
                      nb5.0-free-candidate           nb-build    nb5.0-free\n";
        assert_eq!(
            parse_list_targets(output, "nb5.0-free-candidate"),
            Some("nb5.0-free".to_string())
        );
        assert_eq!(
            parse_list_targets(output, "nbplayground-free-candidate"),
            Some("nb5.1-free".to_string())
        );
        assert_eq!(parse_list_targets(output, "nb4.0-free-candidate"), None);
    }

    #[test]
    fn test_parse_list_targets_ignores_short_lines() {
        assert_eq!(parse_list_targets("nb5.0-free-candidate\n", "nb5.0-free-candidate"), None);
    }

    #[test]
    fn test_static_targets() {
        let targets = StaticTargets::new().with_target("a", "b");
        assert_eq!(targets.dest_tag("a").unwrap(), "b");
        assert!(targets.dest_tag("c").is_err());
    }

    #[test]
    fn test_profile_name() {
        assert_eq!(profile_name("/usr/bin/nbkoji"), "nbkoji");
        assert_eq!(profile_name("koji"), "koji");
    }

    #[test]
    fn test_load_certificates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[nbkoji]\nserver = https://koji.example.com/kojihub\ncert = /etc/pki/nb/client.pem\nserverca = /etc/pki/nb/ca.pem"
        )
        .unwrap();

        let certs = ClientCertificates::load(file.path(), "/usr/bin/nbkoji").unwrap();
        assert_eq!(certs.cert, PathBuf::from("/etc/pki/nb/client.pem"));
        assert_eq!(certs.ca_cert, PathBuf::from("/etc/pki/nb/ca.pem"));
    }

    #[test]
    fn test_load_certificates_missing_section() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[koji]\ncert = a\nserverca = b").unwrap();

        let err = ClientCertificates::load(file.path(), "nbkoji").unwrap_err();
        assert!(err.to_string().contains("[nbkoji]"));
    }

    #[test]
    fn test_load_certificates_missing_key() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[koji]\ncert = a").unwrap();

        let err = ClientCertificates::load(file.path(), "koji").unwrap_err();
        assert!(err.to_string().contains("serverca"));
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/etc/pki/ca.pem"), PathBuf::from("/etc/pki/ca.pem"));
        assert_eq!(expand_tilde("relative/x"), PathBuf::from("relative/x"));
    }
}
