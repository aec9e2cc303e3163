use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nbpkg::cli::{self, Commands, Options};
use nbpkg::config::{self, Config};
use nbpkg::git::Git2Repository;
use nbpkg::lookaside::LookasideTarget;
use nbpkg::ui;

#[derive(clap::Parser)]
#[command(
    name = "nbpkg",
    version,
    about = "Utility to interact with the Network Box packaging system"
)]
struct Args {
    #[arg(long, global = true, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Work with the nonfree infrastructure")]
    nonfree: bool,

    #[arg(long, global = true, default_value = ".", help = "Package checkout to work in")]
    path: PathBuf,

    #[arg(long, global = true, help = "Resolve this branch name instead of the tracked one")]
    dist: Option<String>,

    #[arg(short, long, global = true, conflicts_with = "quiet", help = "Show debug output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Only show warnings and errors")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Clone a package module
    Clone {
        module: String,

        #[arg(short, long, help = "Branch to check out (default: nbplayground)")]
        branch: Option<String>,

        #[arg(short, long, help = "Clone anonymously")]
        anonymous: bool,

        #[arg(long, hide = true)]
        branches: bool,

        #[arg(long, help = "User name for the authenticated URL (default: $USER)")]
        user: Option<String>,
    },

    #[command(flatten)]
    Package(PackageCommand),
}

#[derive(clap::Subcommand)]
enum PackageCommand {
    /// Show what the current branch builds as
    Resolve {
        #[arg(long, help = "Print the rpm --define arguments instead")]
        defines: bool,
    },

    /// Print the build target of the current branch
    Target,

    /// Push merged branches to the Network Box infrastructure
    Push,

    /// Retire the package
    Retire {
        #[arg(short, long, help = "Push after committing")]
        push: bool,

        message: Option<String>,
    },

    /// Fetch the upstream (Fedora) dist-git module
    FetchUpstream {
        #[arg(long, help = "Upstream module name, if it differs")]
        name: Option<String>,
    },

    /// Download the files listed in the sources file
    Sources {
        #[arg(long, help = "Use the upstream lookaside cache")]
        upstream: bool,

        #[arg(long, help = "Module name on the lookaside cache")]
        name: Option<String>,

        #[arg(long, help = "Directory to download into")]
        outdir: Option<PathBuf>,
    },

    /// Upload files and replace the sources file with them
    NewSources {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Upload files and add them to the sources file
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Upload files to the upstream lookaside and replace the sources file
    NewSourcesUpstream {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Clone { .. } => "clone",
            Command::Package(command) => match command {
                PackageCommand::Resolve { .. } => "resolve",
                PackageCommand::Target => "target",
                PackageCommand::Push => "push",
                PackageCommand::Retire { .. } => "retire",
                PackageCommand::FetchUpstream { .. } => "fetch-upstream",
                PackageCommand::Sources { .. } => "sources",
                PackageCommand::NewSources { .. } => "new-sources",
                PackageCommand::Upload { .. } => "upload",
                PackageCommand::NewSourcesUpstream { .. } => "new-sources-upstream",
            },
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nbpkg={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let name = args.command.name();
    if let Err(e) = run(args) {
        tracing::error!("Could not execute {}: {:#}", name, e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let cloning = matches!(args.command, Command::Clone { .. });
    let freedom = cli::detect_freedom(args.nonfree, cloning, &args.path);
    let config = config::load_config(args.config.as_deref(), freedom)?;

    match args.command {
        Command::Clone {
            module,
            branch,
            anonymous,
            branches,
            user,
        } => {
            if branches {
                anyhow::bail!("Just no.");
            }
            clone(&config, &module, branch.as_deref(), user, anonymous, &args.path)
        }
        Command::Package(command) => {
            let repo = Git2Repository::open(&args.path)
                .with_context(|| format!("{} is not a package checkout", args.path.display()))?;
            let options = Options {
                dist: args.dist,
                quiet: args.quiet,
            };
            let cmds = Commands::new(repo, config, options)?;
            run_package(&cmds, command)
        }
    }
}

fn clone(
    config: &Config,
    module: &str,
    branch: Option<&str>,
    user: Option<String>,
    anonymous: bool,
    parent: &Path,
) -> Result<()> {
    let user = match user.or_else(|| std::env::var("USER").ok()) {
        Some(user) => user,
        None if anonymous => String::new(),
        None => anyhow::bail!("Cannot tell who you are, please pass --user"),
    };

    let dest = cli::clone_module(config, module, branch, &user, anonymous, parent)?;
    ui::display_success(&format!("Cloned {} into {}", module, dest.display()));
    Ok(())
}

fn run_package(cmds: &Commands<Git2Repository>, command: PackageCommand) -> Result<()> {
    match command {
        PackageCommand::Resolve { defines } => {
            let target = cmds.resolve()?;
            if defines {
                println!("{}", target.rpm_define_args(cmds.path()).join(" "));
            } else {
                ui::display_resolved_target(&target);
            }
        }
        PackageCommand::Target => {
            println!("{}", cmds.resolve()?.build_target);
        }
        PackageCommand::Push => {
            let pushed = cmds.push()?;
            ui::display_success(&format!("Pushed {}", pushed.join(", ")));
        }
        PackageCommand::Retire { push, message } => {
            let hash = cmds.retire(message.as_deref(), push)?;
            ui::display_success(&format!("Retired {} in {}", cmds.module_name(), hash));
        }
        PackageCommand::FetchUpstream { name } => {
            ui::display_status("Fetching the upstream module...");
            cmds.fetch_upstream(name.as_deref())?;
            ui::display_success("Fetched the upstream module");
        }
        PackageCommand::Sources {
            upstream,
            name,
            outdir,
        } => {
            let target = if upstream {
                LookasideTarget::Upstream
            } else {
                LookasideTarget::Primary
            };
            for file in cmds.sources(target, name.as_deref(), outdir.as_deref())? {
                ui::display_success(&format!("Downloaded {}", file));
            }
        }
        PackageCommand::NewSources { files } => {
            cmds.upload(&files, true, LookasideTarget::Primary)?;
        }
        PackageCommand::Upload { files } => {
            cmds.upload(&files, false, LookasideTarget::Primary)?;
        }
        PackageCommand::NewSourcesUpstream { files } => {
            cmds.upload(&files, true, LookasideTarget::Upstream)?;
        }
    }

    Ok(())
}
