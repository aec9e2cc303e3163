use std::fmt;
use std::path::PathBuf;

/// Non-fatal issues that should be reported to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum NbpkgWarning {
    /// A certificate named in the Koji config does not exist
    MissingCertificate { path: PathBuf },
    /// No spec file, so the module is named after the directory
    ModuleNameFromDirectory { module: String },
    /// The lookaside cache already has this file
    AlreadyUploaded { filename: String },
    /// The upstream remote pointed at another module and was re-created
    UpstreamRemoteReplaced { remote: String, old: String, new: String },
}

impl fmt::Display for NbpkgWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NbpkgWarning::MissingCertificate { path } => {
                write!(f, "Missing certificate: {}", path.display())
            }
            NbpkgWarning::ModuleNameFromDirectory { module } => {
                write!(f, "No spec file found, using module name '{}'", module)
            }
            NbpkgWarning::AlreadyUploaded { filename } => {
                write!(f, "File already uploaded: {}", filename)
            }
            NbpkgWarning::UpstreamRemoteReplaced { remote, old, new } => {
                write!(
                    f,
                    "Remote '{}' tracked module '{}', re-creating it for '{}'",
                    remote, old, new
                )
            }
        }
    }
}
