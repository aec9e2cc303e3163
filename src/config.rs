use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{BranchRule, Freedom};
use crate::error::{NbpkgError, Result};
use crate::lookaside::HashType;
use crate::resolver::{ReleaseLineOrder, Resolver};

/// System-wide configuration directory
pub const CONF_ROOT: &str = "/etc/rpkg";

/// Overrides [`CONF_ROOT`] when set
pub const CONF_DIR_ENV: &str = "NBPKG_CONFIG_DIR";

/// Represents the complete configuration for nbpkg.
///
/// Contains the Network Box infrastructure settings, the upstream (Fedora)
/// infrastructure settings and the branch rule table.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub nbpkg: SiteConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Settings for the Network Box packaging infrastructure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SiteConfig {
    #[serde(default = "default_lookaside")]
    pub lookaside: String,

    #[serde(default = "default_lookaside_cgi")]
    pub lookaside_cgi: String,

    #[serde(default)]
    pub lookaside_hash: HashType,

    /// Authenticated clone URL; `{user}` and `{module}` are substituted
    #[serde(default = "default_gitbaseurl")]
    pub gitbaseurl: String,

    /// Anonymous clone URL; `{module}` is substituted
    #[serde(default = "default_anongiturl")]
    pub anongiturl: String,

    /// Branches that `push` is allowed to send
    #[serde(default = "default_branchre")]
    pub branchre: String,

    /// The only remote `push` talks to
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_kojiconfig")]
    pub kojiconfig: PathBuf,

    #[serde(default = "default_build_client")]
    pub build_client: String,
}

fn default_lookaside() -> String {
    "https://pkgs.network-box.com/repo/pkgs".to_string()
}

fn default_lookaside_cgi() -> String {
    "https://pkgs.network-box.com/repo/pkgs/upload.cgi".to_string()
}

fn default_gitbaseurl() -> String {
    "ssh://{user}@pkgs.network-box.com/{module}".to_string()
}

fn default_anongiturl() -> String {
    "git://pkgs.network-box.com/{module}".to_string()
}

fn default_branchre() -> String {
    r"nb\d+\.\d+|nbplayground|nb-rhel\d|nb-epel\d|nb-fedora\d\d".to_string()
}

fn default_remote() -> String {
    "networkbox".to_string()
}

fn default_kojiconfig() -> PathBuf {
    PathBuf::from("/etc/nbkoji.conf")
}

fn default_build_client() -> String {
    "nbkoji".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            lookaside: default_lookaside(),
            lookaside_cgi: default_lookaside_cgi(),
            lookaside_hash: HashType::default(),
            gitbaseurl: default_gitbaseurl(),
            anongiturl: default_anongiturl(),
            branchre: default_branchre(),
            remote: default_remote(),
            kojiconfig: default_kojiconfig(),
            build_client: default_build_client(),
        }
    }
}

/// Settings for the secondary upstream (Fedora) infrastructure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_remote")]
    pub remote: String,

    #[serde(default = "default_upstream_lookaside")]
    pub lookaside: String,

    #[serde(default = "default_upstream_lookaside_cgi")]
    pub lookaside_cgi: String,

    #[serde(default = "default_upstream_kojiconfig")]
    pub kojiconfig: PathBuf,

    #[serde(default = "default_upstream_anongiturl")]
    pub anongiturl: String,
}

fn default_upstream_remote() -> String {
    "fedora".to_string()
}

fn default_upstream_lookaside() -> String {
    "https://src.fedoraproject.org/repo/pkgs".to_string()
}

fn default_upstream_lookaside_cgi() -> String {
    "https://src.fedoraproject.org/repo/pkgs/upload.cgi".to_string()
}

fn default_upstream_kojiconfig() -> PathBuf {
    PathBuf::from("/etc/koji.conf")
}

fn default_upstream_anongiturl() -> String {
    "https://src.fedoraproject.org/rpms/{module}.git".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            remote: default_upstream_remote(),
            lookaside: default_upstream_lookaside(),
            lookaside_cgi: default_upstream_lookaside_cgi(),
            kojiconfig: default_upstream_kojiconfig(),
            anongiturl: default_upstream_anongiturl(),
        }
    }
}

/// Branch rule table and release-line inference settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResolverConfig {
    #[serde(default)]
    pub release_line_order: ReleaseLineOrder,

    /// Branch whose Koji target tells the release line when no release-line
    /// branch exists yet
    #[serde(default = "default_experimental_branch")]
    pub experimental_branch: String,

    #[serde(default = "BranchRule::defaults")]
    pub rules: Vec<BranchRule>,
}

fn default_experimental_branch() -> String {
    "nbplayground".to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            release_line_order: ReleaseLineOrder::default(),
            experimental_branch: default_experimental_branch(),
            rules: BranchRule::defaults(),
        }
    }
}

impl ResolverConfig {
    /// Compile the configured rule table
    pub fn build(&self) -> Result<Resolver> {
        Ok(Resolver::new(
            self.rules.clone(),
            self.release_line_order,
            self.experimental_branch.clone(),
        )?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            nbpkg: SiteConfig::default(),
            upstream: UpstreamConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl Config {
    /// Built-in settings for the free or the nonfree infrastructure
    pub fn default_for(freedom: Freedom) -> Self {
        let mut config = Config::default();
        if freedom == Freedom::NonFree {
            config.nbpkg.remote = "networkbox-nonfree".to_string();
            config.nbpkg.lookaside = "https://pkgs.network-box.com/repo/pkgs-nonfree".to_string();
            config.nbpkg.lookaside_cgi =
                "https://pkgs.network-box.com/repo/pkgs-nonfree/upload.cgi".to_string();
            config.nbpkg.gitbaseurl = "ssh://{user}@pkgs.network-box.com/nonfree/{module}".to_string();
            config.nbpkg.anongiturl = "git://pkgs.network-box.com/nonfree/{module}".to_string();
        }
        config
    }
}

/// Name of the configuration file for the free or the nonfree modules
pub fn config_file_name(freedom: Freedom) -> &'static str {
    match freedom {
        Freedom::Free => "nbpkg.toml",
        Freedom::NonFree => "nbpkg-nonfree.toml",
    }
}

/// Finds the configuration file for `freedom`, if one exists.
///
/// Looks in `$NBPKG_CONFIG_DIR`, then [`CONF_ROOT`], then the user's
/// configuration directory.
pub fn find_config_file(freedom: Freedom) -> Option<PathBuf> {
    let file_name = config_file_name(freedom);

    let mut candidates = Vec::new();
    if let Some(dir) = std::env::var_os(CONF_DIR_ENV) {
        candidates.push(PathBuf::from(dir).join(file_name));
    }
    candidates.push(Path::new(CONF_ROOT).join(file_name));
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("nbpkg").join(file_name));
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. The file found by [`find_config_file`]
/// 3. Default configuration for `freedom` if no file found
///
/// A file only overrides the settings it names. Everything else keeps the
/// built-in value for `freedom`, so a nonfree file inherits the nonfree
/// remote and URLs. Tables merge key by key; arrays such as
/// `resolver.rules` are replaced as a whole.
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
/// * `freedom` - Selects between `nbpkg.toml` and `nbpkg-nonfree.toml`
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>, freedom: Freedom) -> Result<Config> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => match find_config_file(freedom) {
            Some(path) => path,
            None => {
                tracing::debug!("no configuration file found, using built-in defaults");
                return Ok(Config::default_for(freedom));
            }
        },
    };

    tracing::debug!("Using config {}", path.display());
    let invalid = |e: &dyn std::fmt::Display| {
        NbpkgError::config(format!("Invalid config file {}: {}", path.display(), e))
    };

    let config_str = fs::read_to_string(&path).map_err(|e| invalid(&e))?;
    let overrides: toml::Table = toml::from_str(&config_str).map_err(|e| invalid(&e))?;
    let mut merged = toml::Value::try_from(Config::default_for(freedom))
        .map_err(|e| NbpkgError::config(format!("Cannot encode built-in defaults: {}", e)))?;
    merge_values(&mut merged, toml::Value::Table(overrides));

    merged.try_into().map_err(|e| invalid(&e))
}

/// Overlay `overlay` on `base`: tables merge recursively, anything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
