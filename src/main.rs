use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use sfpkg::{GitCli, SfpkgError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sfpkg")]
#[command(version, about = "Build Salesforce package.xml manifests")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Where to write the manifest
    #[arg(
        short,
        long,
        global = true,
        env = "SFPKG_OUTPUT",
        default_value = "package.xml"
    )]
    output: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a full package listing every supported type
    Full {
        /// Metadata API version (e.g. 58.0)
        #[arg(long, env = "SFPKG_API_VERSION")]
        api_version: String,
    },
    /// Generate a package from the files changed between two revisions
    Diff {
        /// Metadata API version (e.g. 58.0)
        #[arg(long, env = "SFPKG_API_VERSION")]
        api_version: String,
        /// Revision to compare from
        #[arg(long)]
        source: String,
        /// Revision to compare to
        #[arg(long)]
        target: String,
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Give up on git diff after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print a man page
    #[command(hide = true)]
    Man,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .without_time()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SfpkgError> {
    match cli.command {
        Commands::Full { api_version } => {
            tracing::info!(%api_version, "generating full package");
            emit(&sfpkg::full_package(&api_version), &cli.output)
        }
        Commands::Diff {
            api_version,
            source,
            target,
            repo,
            timeout,
        } => {
            tracing::info!(%api_version, %source, %target, repo = %repo.display(), "generating diff package");
            let mut git = GitCli::new(repo);
            if let Some(secs) = timeout {
                git = git.with_timeout(Duration::from_secs(secs));
            }
            let resolution = sfpkg::diff_package(&git, &source, &target, &api_version)?;
            emit(&resolution.manifest, &cli.output)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "sfpkg", &mut io::stdout());
            Ok(())
        }
        Commands::Man => clap_mangen::Man::new(Cli::command())
            .render(&mut io::stdout())
            .map_err(|e| SfpkgError::WriteFailed {
                path: "<stdout>".to_string(),
                message: e.to_string(),
            }),
    }
}

/// Write the manifest to `output` and echo it to stdout
fn emit(manifest: &sfpkg::Manifest, output: &Path) -> Result<(), SfpkgError> {
    let xml = sfpkg::write_manifest(manifest, output)?;
    print!("{xml}");
    tracing::info!(path = %output.display(), types = manifest.len(), "package XML saved");
    Ok(())
}
