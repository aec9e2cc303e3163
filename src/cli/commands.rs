use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::Config;
use crate::domain::branch::module_from_url;
use crate::domain::{Freedom, RemoteInfo, ResolvedTarget};
use crate::error::{NbpkgError, Result};
use crate::git::{Repository, Upstream};
use crate::koji::{BuildTargetService, ClientCertificates, KojiCli};
use crate::lookaside::sources::ignore_files;
use crate::lookaside::{
    CurlTransport, LookasideEndpoint, LookasideEndpoints, LookasideTarget, SourceEntry, SourcesFile,
};
use crate::resolver::{local_arch, RepoContext, Resolver};
use crate::ui;
use crate::warning::NbpkgWarning;

/// Default commit message of `retire`
pub const RETIRE_MESSAGE: &str = "Package is retired";

/// Marker file left behind by `retire`
pub const DEAD_PACKAGE: &str = "dead.package";

/// Invocation-wide settings taken from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Branch name to resolve instead of the tracked one
    pub dist: Option<String>,
    pub quiet: bool,
}

/// Every nbpkg operation on one package checkout.
///
/// All derived state (tracked branch, push remote, freedom, module name,
/// lookaside certificates) is computed once in [`Commands::new`].
pub struct Commands<R: Repository> {
    repo: R,
    path: PathBuf,
    config: Config,
    resolver: Resolver,
    context: RepoContext,
    active_branch: String,
    upstream: Option<Upstream>,
    branch_merge: String,
    module_name: String,
    lookaside: LookasideEndpoints,
    curl: CurlTransport,
    build_targets: Option<Box<dyn BuildTargetService>>,
}

impl<R: Repository> Commands<R> {
    pub fn new(repo: R, config: Config, options: Options) -> Result<Self> {
        let path = repo.workdir()?;
        let resolver = config.resolver.build()?;

        let active_branch = repo.active_branch()?;
        let upstream = repo.upstream_of(&active_branch)?;

        let push_remote_name = upstream
            .as_ref()
            .map(|u| u.remote.clone())
            .unwrap_or_else(|| config.nbpkg.remote.clone());
        let push_remote = repo
            .find_remote(&push_remote_name)?
            .unwrap_or_else(|| RemoteInfo::new(push_remote_name, ""));

        let branch_merge = match (&options.dist, &upstream) {
            (Some(dist), _) => dist.clone(),
            (None, Some(upstream)) => upstream.merge.clone(),
            (None, None) => active_branch.clone(),
        };

        let context = RepoContext::new(repo.remote_branches()?, push_remote, local_arch());

        let module_name = match spec_module_name(&path)? {
            Some(name) => name,
            None => {
                let name = directory_module_name(&path);
                ui::display_warning(&NbpkgWarning::ModuleNameFromDirectory {
                    module: name.clone(),
                });
                name
            }
        };

        let lookaside = LookasideEndpoints {
            primary: LookasideEndpoint {
                url: config.nbpkg.lookaside.clone(),
                cgi: config.nbpkg.lookaside_cgi.clone(),
                hash: config.nbpkg.lookaside_hash,
                certs: load_certificates(&config.nbpkg.kojiconfig, &config.nbpkg.build_client),
            },
            upstream: LookasideEndpoint {
                url: config.upstream.lookaside.clone(),
                cgi: config.upstream.lookaside_cgi.clone(),
                hash: config.nbpkg.lookaside_hash,
                certs: load_certificates(&config.upstream.kojiconfig, &config.nbpkg.build_client),
            },
        };

        let build_targets: Box<dyn BuildTargetService> = Box::new(KojiCli::new(
            config.nbpkg.kojiconfig.clone(),
            &config.nbpkg.build_client,
        ));

        tracing::debug!(
            path = %path.display(),
            branch = %active_branch,
            branch_merge = %branch_merge,
            module = %module_name,
            freedom = %context.freedom(),
            "package checkout"
        );

        Ok(Commands {
            repo,
            path,
            config,
            resolver,
            context,
            active_branch,
            upstream,
            branch_merge,
            module_name,
            lookaside,
            curl: CurlTransport::new(options.quiet),
            build_targets: Some(build_targets),
        })
    }

    /// Replace the build-target service used by release-line inference;
    /// `None` makes it unavailable.
    pub fn with_build_targets(mut self, service: Option<Box<dyn BuildTargetService>>) -> Self {
        self.build_targets = service;
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// The branch name fed to the resolver
    pub fn branch_merge(&self) -> &str {
        &self.branch_merge
    }

    pub fn freedom(&self) -> Freedom {
        self.context.freedom()
    }

    pub fn resolve(&self) -> Result<ResolvedTarget> {
        let target = self.resolver.resolve(
            &self.branch_merge,
            &self.context,
            self.build_targets.as_deref(),
        )?;
        Ok(target)
    }

    /// Push every local branch merged into the active one, active branch
    /// last, to the configured remote.
    ///
    /// # Returns
    /// * `Ok(branches)` - Branches pushed, in push order
    /// * `Err` - If the active branch does not track the configured remote,
    ///   or if no branch qualifies
    pub fn push(&self) -> Result<Vec<String>> {
        let remote = &self.config.nbpkg.remote;
        let tracked_remote = self.upstream.as_ref().map(|u| u.remote.as_str());
        if tracked_remote != Some(remote.as_str()) {
            return Err(NbpkgError::push("Can only push to the Network Box infrastructure"));
        }

        let branchre = Regex::new(&format!("^(?:{})", self.config.nbpkg.branchre)).map_err(|e| {
            NbpkgError::config(format!("Invalid branchre '{}': {}", self.config.nbpkg.branchre, e))
        })?;

        let branches = push_order(
            self.repo.merged_branches(&self.active_branch)?,
            &branchre,
            &self.active_branch,
        );
        if branches.is_empty() {
            return Err(NbpkgError::push("Could not find any local branch to push"));
        }

        tracing::info!("Pushing {} to {}", branches.join(", "), remote);
        self.repo.push_branches(remote, &branches)?;
        Ok(branches)
    }

    /// Replace the package content with a `dead.package` file and commit.
    ///
    /// # Returns
    /// * `Ok(hash)` - The retirement commit
    pub fn retire(&self, message: Option<&str>, push: bool) -> Result<String> {
        let message = message.unwrap_or(RETIRE_MESSAGE);

        let removed = self.repo.remove_all_tracked()?;
        tracing::debug!("removed {} tracked files", removed.len());

        let dead = self.path.join(DEAD_PACKAGE);
        fs::write(&dead, format!("{}\n", message))?;
        self.repo.stage(&dead)?;
        let hash = self.repo.commit(message)?;
        tracing::info!("Retired {} in {}", self.module_name, &hash[..hash.len().min(7)]);

        if push {
            self.push()?;
        }
        Ok(hash)
    }

    /// Make sure the upstream remote points at `name` (or this module) and
    /// fetch it without tags.
    pub fn fetch_upstream(&self, name: Option<&str>) -> Result<()> {
        let remote = &self.config.upstream.remote;
        let module = name.unwrap_or(&self.module_name);
        let url = self.config.upstream.anongiturl.replace("{module}", module);

        match self.repo.find_remote(remote)? {
            Some(existing) => {
                let current = module_from_url(&existing.url);
                if name.is_some() && current != module {
                    ui::display_warning(&NbpkgWarning::UpstreamRemoteReplaced {
                        remote: remote.clone(),
                        old: current.to_string(),
                        new: module.to_string(),
                    });
                    self.repo.delete_remote(remote)?;
                    self.repo.create_remote(remote, &url)?;
                }
            }
            None => {
                tracing::info!("Adding remote {} at {}", remote, url);
                self.repo.create_remote(remote, &url)?;
            }
        }

        self.repo.fetch_without_tags(remote).map_err(|e| {
            NbpkgError::repository(format!("{}\n(did you forget about the --name option?)", e))
        })
    }

    /// Download every file listed in `sources` whose local copy is missing or
    /// stale, then check its hash.
    ///
    /// # Returns
    /// * `Ok(files)` - Files actually downloaded
    pub fn sources(
        &self,
        target: LookasideTarget,
        name: Option<&str>,
        outdir: Option<&Path>,
    ) -> Result<Vec<String>> {
        let sources = SourcesFile::load(&self.path.join("sources"))?;
        let endpoint = self.lookaside.get(target);
        let module = name.unwrap_or(&self.module_name);
        let outdir = outdir.unwrap_or(&self.path);

        let mut downloaded = Vec::new();
        for entry in sources.entries() {
            let dest = outdir.join(&entry.filename);
            if up_to_date(entry, &dest)? {
                tracing::debug!("{} is up to date", entry.filename);
                continue;
            }

            if let Err(e) = self.curl.download(&endpoint.download_url(module, entry), &dest) {
                discard(&dest)?;
                return Err(e);
            }

            verify_download(entry, &dest)?;
            downloaded.push(entry.filename.clone());
        }

        Ok(downloaded)
    }

    /// Upload `files` to a lookaside cache and record them in `sources`.
    ///
    /// With `replace` the `sources` file is rewritten to list only `files`
    /// (`new-sources`); otherwise they are added to it (`upload`).
    pub fn upload(&self, files: &[PathBuf], replace: bool, target: LookasideTarget) -> Result<()> {
        if let Some(missing) = files.iter().find(|file| !file.is_file()) {
            return Err(NbpkgError::lookaside(format!(
                "File does not exist: {}",
                missing.display()
            )));
        }

        let endpoint = self.lookaside.get(target);
        let sources_path = self.path.join("sources");
        let mut sources = if replace {
            SourcesFile::default()
        } else {
            SourcesFile::load(&sources_path)?
        };

        let mut filenames = Vec::new();
        for file in files {
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| NbpkgError::lookaside(format!("Not a file: {}", file.display())))?;
            let digest = endpoint.hash.digest_file(file)?;

            sources.add(SourceEntry::new(endpoint.hash, digest.as_str(), filename.as_str()));
            filenames.push(filename.clone());

            if self
                .curl
                .remote_file_exists(endpoint, &self.module_name, &filename, &digest)?
            {
                ui::display_warning(&NbpkgWarning::AlreadyUploaded { filename });
                continue;
            }

            tracing::info!("Uploading {}", file.display());
            self.curl.upload(endpoint, &self.module_name, file, &digest)?;
        }

        sources.save(&sources_path)?;
        ignore_files(&self.path, &filenames)?;
        self.repo.stage(&sources_path)?;
        self.repo.stage(&self.path.join(".gitignore"))?;

        tracing::info!("Source upload succeeded. Don't forget to commit the sources file");
        Ok(())
    }
}

/// Keep the branches matching `branchre` and move `active` to the end so
/// that branches merged into it are pushed first.
pub fn push_order(merged: Vec<String>, branchre: &Regex, active: &str) -> Vec<String> {
    let mut branches: Vec<String> = merged
        .into_iter()
        .filter(|branch| branchre.is_match(branch))
        .collect();

    if let Some(pos) = branches.iter().position(|branch| branch == active) {
        let active = branches.remove(pos);
        branches.push(active);
    }
    branches
}

fn up_to_date(entry: &SourceEntry, path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    Ok(entry.hash.digest_file(path)? == entry.digest)
}

/// Check a fresh download against its recorded digest, removing it on mismatch
fn verify_download(entry: &SourceEntry, path: &Path) -> Result<()> {
    if up_to_date(entry, path)? {
        return Ok(());
    }

    discard(path)?;
    Err(NbpkgError::lookaside(format!(
        "{} failed {} checksum verification",
        entry.filename, entry.hash
    )))
}

fn discard(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn load_certificates(kojiconfig: &Path, build_client: &str) -> Option<ClientCertificates> {
    match ClientCertificates::load(kojiconfig, build_client) {
        Ok(certs) => Some(certs),
        Err(e) => {
            tracing::debug!("no lookaside certificates: {}", e);
            None
        }
    }
}

/// Stem of the first `*.spec` file in `dir`, if any
pub fn spec_module_name(dir: &Path) -> Result<Option<String>> {
    let mut specs: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_suffix(".spec").map(str::to_string)
        })
        .filter(|stem| !stem.is_empty())
        .collect();
    specs.sort();

    if specs.len() > 1 {
        tracing::debug!("several spec files, using {}", specs[0]);
    }
    Ok(specs.into_iter().next())
}

fn directory_module_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
