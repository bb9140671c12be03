// Command-line surface: argument parsing, logging setup, and the mapping from
// command results to process exit codes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::api::ApiClient;
use crate::credentials::{default_env_file, CredentialStore};
use crate::model::{PackageType, RepositoryClass, RepositoryType};
use crate::ui::{self, TerminalPrompter};

/// Every requested operation completed as expected.
pub const EXIT_SUCCESS: i32 = 0;
/// The server answered with an unexpected status, an incomplete body, or
/// could not be reached.
pub const EXIT_FAILURE: i32 = 1;
/// Bad configuration or input; nothing was sent.
pub const EXIT_USAGE: i32 = 2;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(
    name = "artifactory",
    version,
    about = "Manage users and repositories on an Artifactory server",
    long_about = "Manage users and repositories on an Artifactory server.\n\n\
                  Run without a subcommand for an interactive menu."
)]
pub struct Cli {
    /// Base URL of the server, e.g. https://example.jfrog.io/artifactory/
    #[arg(long, global = true, env = "HOST")]
    pub host: Option<String>,

    /// Env file holding HOST and the API key [default: nearest .env, else ~/.artifactory.env]
    #[arg(long, global = true, env = "ARTIFACTORY_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(
        long,
        global = true,
        env = "ARTIFACTORY_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Increase log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Exchange username and password for an API key and store it
    Login(LoginArgs),
    /// Get a simple status response about the state of the server
    Ping,
    /// Retrieve the server version
    Version,
    /// Create a new user or replace an existing one
    CreateUser(CreateUserArgs),
    /// Remove a user
    DeleteUser(DeleteUserArgs),
    /// Storage summary for binaries, file store and repositories
    GetStorageInfo,
    /// Create a local, remote or virtual repository
    CreateRepo(RepoArgs),
    /// Update an existing repository's configuration
    UpdateRepo(RepoArgs),
    /// List repositories, optionally filtered
    ListRepos(ListReposArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoginArgs {
    /// Username used to log in
    #[arg(long)]
    pub username: Option<String>,
    /// Password used to log in (prompted when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CreateUserArgs {
    /// Name of the user to create
    #[arg(long)]
    pub username: Option<String>,
    /// Email of the user to create
    #[arg(long)]
    pub email: Option<String>,
    /// Password of the user to create
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteUserArgs {
    /// Name of the user to delete
    #[arg(long)]
    pub username: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RepoArgs {
    /// Repository key
    #[arg(long)]
    pub repo_key: Option<String>,
    /// Repository class
    #[arg(long, value_enum, ignore_case = true)]
    pub rclass: Option<RepositoryClass>,
    /// Package type (virtual repositories); an unknown value is asked again
    #[arg(long)]
    pub package_type: Option<String>,
    /// Resolve external dependencies (remote and virtual repositories)
    #[arg(long, value_name = "BOOL")]
    pub external_dependencies_enabled: Option<bool>,
    /// URL of the remote repository
    #[arg(long)]
    pub remote_url: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListReposArgs {
    /// Repository type to list
    #[arg(long = "type", value_enum, ignore_case = true, default_value_t = RepositoryType::All)]
    pub repository_type: RepositoryType,
    /// Only list repositories of this package type
    #[arg(long, value_enum, ignore_case = true)]
    pub package_type: Option<PackageType>,
}

/// Parse arguments, run the command (or the interactive menu) and return the
/// process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    exit_code(execute(cli))
}

/// `Ok(false)` is an operation the server (or the network) refused; an error
/// means nothing could be attempted.
fn exit_code(result: Result<bool>) -> i32 {
    match result {
        Ok(true) => EXIT_SUCCESS,
        Ok(false) => EXIT_FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            EXIT_USAGE
        }
    }
}

fn execute(cli: Cli) -> Result<bool> {
    let env_file = cli.env_file.unwrap_or_else(default_env_file);
    let store = CredentialStore::open(env_file, cli.host.as_deref())?;
    let mut api = ApiClient::new(store, Duration::from_secs(cli.timeout))?;
    let mut prompter = TerminalPrompter;

    match cli.command {
        Some(command) => ui::dispatch(&mut api, &mut prompter, command),
        None => ui::main_menu(&mut api, &mut prompter).map(|()| true),
    }
}

/// Log to stderr so stdout only carries command output.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
