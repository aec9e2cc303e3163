use thiserror::Error;

/// Failures of branch/target resolution.
///
/// Every variant carries the branch name that was being resolved so the caller
/// can report it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Could not find the dist from branch name {branch}\nPlease specify with --dist")]
    UnrecognizedBranch { branch: String },

    #[error("Can't handle the {distribution} branch {branch} just yet, please specify with --dist")]
    UnsupportedBranchFamily { branch: String, distribution: String },

    #[error("Unable to determine the release line for {branch}: {reason}\nPlease specify with --dist")]
    ReleaseLineUndeterminable { branch: String, reason: String },

    #[error("Invalid branch rule '{pattern}': {reason}")]
    InvalidRule { pattern: String, reason: String },
}

impl ResolutionError {
    /// The branch name the failed resolution was about, if any
    pub fn branch(&self) -> Option<&str> {
        match self {
            ResolutionError::UnrecognizedBranch { branch }
            | ResolutionError::UnsupportedBranchFamily { branch, .. }
            | ResolutionError::ReleaseLineUndeterminable { branch, .. } => Some(branch),
            ResolutionError::InvalidRule { .. } => None,
        }
    }
}

/// Unified error type for nbpkg operations
#[derive(Error, Debug)]
pub enum NbpkgError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Lookaside error: {0}")]
    Lookaside(String),

    #[error("Koji error: {0}")]
    Koji(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Push failed: {0}")]
    Push(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in nbpkg
pub type Result<T> = std::result::Result<T, NbpkgError>;

impl NbpkgError {
    /// Create a repository error with context
    pub fn repository(msg: impl Into<String>) -> Self {
        NbpkgError::Repository(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        NbpkgError::Config(msg.into())
    }

    /// Create a lookaside error with context
    pub fn lookaside(msg: impl Into<String>) -> Self {
        NbpkgError::Lookaside(msg.into())
    }

    /// Create a koji error with context
    pub fn koji(msg: impl Into<String>) -> Self {
        NbpkgError::Koji(msg.into())
    }

    /// Create an external command error with context
    pub fn command(msg: impl Into<String>) -> Self {
        NbpkgError::Command(msg.into())
    }

    /// Create a push error with context
    pub fn push(msg: impl Into<String>) -> Self {
        NbpkgError::Push(msg.into())
    }
}
