// UI layer: collects missing arguments interactively, runs one API operation
// per command behind a spinner, and prints a human-readable result.
//
// Prompting goes through the `Prompter` trait so the collect-until-valid loops
// can be driven by scripted answers in tests.

use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{ApiClient, Detail, Outcome, OutcomeKind};
use crate::cli::{Command, CreateUserArgs, DeleteUserArgs, ListReposArgs, LoginArgs, RepoArgs};
use crate::error::ApiError;
use crate::model::{
    build_repo_payload, PackageType, RepositoryClass, RepositoryConfig, RepositoryType,
    UserRecord,
};
use crate::validate::{is_valid_email, is_valid_password, PASSWORD_MIN_LEN, PASSWORD_SPECIALS};

/// Source of interactive answers.
pub trait Prompter {
    fn text(&mut self, prompt: &str) -> io::Result<String>;
    /// Like `text`, without echoing the input.
    fn secret(&mut self, prompt: &str) -> io::Result<String>;
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> io::Result<usize>;
    /// Tell the user why the previous answer was rejected.
    fn warn(&mut self, message: &str);
}

/// `dialoguer`-backed prompter for real terminals.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn text(&mut self, prompt: &str) -> io::Result<String> {
        Input::<String>::new().with_prompt(prompt).interact_text()
    }

    fn secret(&mut self, prompt: &str) -> io::Result<String> {
        Password::new().with_prompt(prompt).interact()
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Confirm::new().with_prompt(prompt).default(false).interact()
    }

    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> io::Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
    }

    fn warn(&mut self, message: &str) {
        if io::stderr().is_terminal() {
            eprintln!("{}", message.yellow());
        } else {
            eprintln!("{message}");
        }
    }
}

/// Run one command and report its outcome. `Ok(false)` means the request
/// was made (or attempted) and did not succeed.
pub fn dispatch(api: &mut ApiClient, prompter: &mut dyn Prompter, command: Command) -> Result<bool> {
    match command {
        Command::Login(args) => login(api, prompter, args),
        Command::Ping => {
            let result = with_spinner("Pinging...", || api.ping());
            conclude(Operation::Ping, "", result)
        }
        Command::Version => {
            let result = with_spinner("Fetching version...", || api.version());
            conclude(Operation::Version, "", result)
        }
        Command::CreateUser(args) => create_user(api, prompter, args),
        Command::DeleteUser(args) => delete_user(api, prompter, args),
        Command::GetStorageInfo => {
            let result = with_spinner("Fetching storage info...", || api.storage_info());
            conclude(Operation::StorageInfo, "", result)
        }
        Command::CreateRepo(args) => {
            let config = collect_repo_config(prompter, &args)?;
            let result = with_spinner("Creating repository...", || api.create_repo(&config));
            conclude(Operation::CreateRepo, config.key(), result)
        }
        Command::UpdateRepo(args) => {
            let config = collect_repo_config(prompter, &args)?;
            let result = with_spinner("Updating repository...", || api.update_repo(&config));
            conclude(Operation::UpdateRepo, config.key(), result)
        }
        Command::ListRepos(args) => {
            let result = with_spinner("Fetching repositories...", || {
                api.list_repos(args.repository_type, args.package_type)
            });
            conclude(Operation::ListRepos, "", result)
        }
    }
}

/// Builds the command for one menu entry, asking for anything it needs up front.
type MenuAction = fn(&mut dyn Prompter) -> io::Result<Command>;

const MENU: &[(&str, MenuAction)] = &[
    ("Login", |_| Ok(Command::Login(LoginArgs::default()))),
    ("Ping", |_| Ok(Command::Ping)),
    ("Version", |_| Ok(Command::Version)),
    ("Create user", |_| Ok(Command::CreateUser(CreateUserArgs::default()))),
    ("Delete user", |_| Ok(Command::DeleteUser(DeleteUserArgs::default()))),
    ("Get storage info", |_| Ok(Command::GetStorageInfo)),
    ("Create repository", |_| Ok(Command::CreateRepo(RepoArgs::default()))),
    ("Update repository", |_| Ok(Command::UpdateRepo(RepoArgs::default()))),
    ("List repositories", |prompter| {
        collect_list_filters(prompter).map(Command::ListRepos)
    }),
];

const EXIT_ITEM: &str = "Exit";

/// Interactive menu used when no subcommand is given. Every argument is
/// collected by prompt; failures are reported and the menu comes back.
pub fn main_menu(api: &mut ApiClient, prompter: &mut dyn Prompter) -> Result<()> {
    let mut items: Vec<String> = MENU.iter().map(|(label, _)| label.to_string()).collect();
    items.push(EXIT_ITEM.to_string());
    loop {
        let selection = prompter.select("What would you like to do?", &items, 0)?;
        let Some((_, action)) = MENU.get(selection) else {
            break;
        };
        let command = action(prompter)?;
        if let Err(err) = dispatch(api, prompter, command) {
            eprintln!("error: {err:#}");
        }
    }
    Ok(())
}

fn login(api: &mut ApiClient, prompter: &mut dyn Prompter, args: LoginArgs) -> Result<bool> {
    let username = required_text(prompter, args.username, "username")?;
    let password = match args.password.filter(|value| !value.is_empty()) {
        Some(password) => password,
        None => prompter.secret("password")?,
    };
    let result = with_spinner("Logging in...", || api.login(&username, &password));
    let stored_in = api.credentials().path().display().to_string();
    conclude(Operation::Login, &stored_in, result)
}

fn create_user(api: &ApiClient, prompter: &mut dyn Prompter, args: CreateUserArgs) -> Result<bool> {
    let user = collect_user(prompter, args)?;
    let result = with_spinner("Creating user...", || api.create_user(&user));
    conclude(Operation::CreateUser, &user.name, result)
}

fn delete_user(api: &ApiClient, prompter: &mut dyn Prompter, args: DeleteUserArgs) -> Result<bool> {
    let username = required_text(prompter, args.username, "username")?;
    let result = with_spinner("Deleting user...", || api.delete_user(&username));
    conclude(Operation::DeleteUser, &username, result)
}

/// Use `value` if it is non-blank, otherwise ask until a non-blank answer.
pub fn required_text(
    prompter: &mut dyn Prompter,
    value: Option<String>,
    prompt: &str,
) -> io::Result<String> {
    let mut candidate = value.unwrap_or_default();
    while candidate.trim().is_empty() {
        candidate = prompter.text(prompt)?;
    }
    Ok(candidate.trim().to_string())
}

pub fn collect_email(prompter: &mut dyn Prompter, initial: Option<String>) -> io::Result<String> {
    let mut email = match initial.filter(|value| !value.is_empty()) {
        Some(email) => email,
        None => prompter.text("email")?,
    };
    while !is_valid_email(&email) {
        prompter.warn(&format!("'{email}' is not a valid email address."));
        email = prompter.text("email")?;
    }
    Ok(email)
}

pub fn collect_password(
    prompter: &mut dyn Prompter,
    initial: Option<String>,
) -> io::Result<String> {
    let mut password = match initial.filter(|value| !value.is_empty()) {
        Some(password) => password,
        None => prompter.secret("password")?,
    };
    while !is_valid_password(&password) {
        prompter.warn(&format!(
            "Password needs at least {PASSWORD_MIN_LEN} characters with an uppercase letter, \
             a lowercase letter, a digit and one of {PASSWORD_SPECIALS}, and nothing else."
        ));
        password = prompter.secret("password")?;
    }
    Ok(password)
}

pub fn collect_user(prompter: &mut dyn Prompter, args: CreateUserArgs) -> io::Result<UserRecord> {
    let name = required_text(prompter, args.username, "username")?;
    let email = collect_email(prompter, args.email)?;
    let password = collect_password(prompter, args.password)?;
    Ok(UserRecord {
        name,
        email,
        password,
    })
}

/// Use `initial` if it names a known package type, otherwise ask until an
/// answer does. An empty answer is not accepted.
pub fn collect_package_type(
    prompter: &mut dyn Prompter,
    initial: Option<String>,
) -> io::Result<PackageType> {
    let mut answer = match initial {
        Some(value) => value,
        None => prompter.text("package type")?,
    };
    loop {
        match answer.parse::<PackageType>() {
            Ok(package_type) => return Ok(package_type),
            Err(err) => prompter.warn(&format!(
                "{err}. Please enter a valid package type. ({})",
                PackageType::choices()
            )),
        }
        answer = prompter.text("package type")?;
    }
}

/// Fill in whatever the chosen repository class still needs and build the
/// payload. The external-dependencies flag is only asked for when it was not
/// given at all; an explicit `false` is kept.
pub fn collect_repo_config(
    prompter: &mut dyn Prompter,
    args: &RepoArgs,
) -> Result<RepositoryConfig> {
    let key = required_text(prompter, args.repo_key.clone(), "repo key")?;
    let class = match args.rclass {
        Some(class) => class,
        None => {
            let items: Vec<String> = RepositoryClass::ALL
                .iter()
                .map(ToString::to_string)
                .collect();
            let idx = prompter.select("rclass", &items, 0)?;
            RepositoryClass::ALL
                .get(idx)
                .copied()
                .unwrap_or(RepositoryClass::Local)
        }
    };

    let mut remote_url = args.remote_url.clone();
    let mut package_type = None;
    match class {
        RepositoryClass::Local => {}
        RepositoryClass::Remote => {
            remote_url = Some(required_text(prompter, remote_url, "url")?);
        }
        RepositoryClass::Virtual => {
            let given = args.package_type.clone();
            package_type = Some(collect_package_type(prompter, given)?);
        }
    }

    let external_dependencies_enabled = match (class, args.external_dependencies_enabled) {
        (RepositoryClass::Local, _) => false,
        (_, Some(enabled)) => enabled,
        (_, None) => prompter.confirm("externalDependenciesEnabled")?,
    };

    Ok(build_repo_payload(
        &key,
        class,
        package_type,
        external_dependencies_enabled,
        remote_url.as_deref(),
    )?)
}

fn collect_list_filters(prompter: &mut dyn Prompter) -> io::Result<ListReposArgs> {
    let types: Vec<String> = RepositoryType::ALL
        .iter()
        .map(|ty| ty.label().to_string())
        .collect();
    let idx = prompter.select("repository type", &types, 0)?;
    let repository_type = RepositoryType::ALL.get(idx).copied().unwrap_or_default();

    let mut packages = vec!["all".to_string()];
    packages.extend(PackageType::ALL.iter().map(ToString::to_string));
    let idx = prompter.select("package type", &packages, 0)?;
    let package_type = idx
        .checked_sub(1)
        .and_then(|i| PackageType::ALL.get(i).copied());

    Ok(ListReposArgs {
        repository_type,
        package_type,
    })
}

fn with_spinner<T>(message: &'static str, work: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = work();
    spinner.finish_and_clear();
    result
}

/// Print the result of one operation. Transport failures are reported and
/// count as a failed operation; other API errors propagate.
fn conclude(op: Operation, subject: &str, result: Result<Outcome, ApiError>) -> Result<bool> {
    match result {
        Ok(outcome) => {
            print_lines(&describe(op, subject, &outcome));
            Ok(outcome.succeeded())
        }
        Err(err @ ApiError::Transport { .. }) => {
            let message = format!("{:#}", anyhow::Error::new(err));
            print_lines(&[Line::failure(message)]);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// The nine server operations, as far as output wording is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Ping,
    Version,
    CreateUser,
    DeleteUser,
    StorageInfo,
    CreateRepo,
    UpdateRepo,
    ListRepos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tone: Tone,
    pub text: String,
}

impl Line {
    fn plain(text: impl Into<String>) -> Self {
        Line {
            tone: Tone::Plain,
            text: text.into(),
        }
    }

    fn success(text: impl Into<String>) -> Self {
        Line {
            tone: Tone::Success,
            text: text.into(),
        }
    }

    fn failure(text: impl Into<String>) -> Self {
        Line {
            tone: Tone::Failure,
            text: text.into(),
        }
    }
}

/// Output lines for `outcome`. `subject` is the user name or repository key
/// the operation acted on; for login it is the credential file.
pub fn describe(op: Operation, subject: &str, outcome: &Outcome) -> Vec<Line> {
    let mut lines = Vec::new();
    match (op, outcome.kind) {
        (Operation::Ping, _) => {
            lines.push(Line::plain(format!("{}: {}", outcome.status, outcome.reason)));
        }
        (_, OutcomeKind::MalformedBody { field }) => {
            lines.push(Line::failure(format!(
                "Could not get {field} from response: {}",
                outcome.detail
            )));
        }
        (Operation::Login, OutcomeKind::Succeeded) => {
            lines.push(Line::success(format!(
                "Login successful; API key saved to {subject}"
            )));
        }
        (Operation::Version | Operation::StorageInfo | Operation::ListRepos, OutcomeKind::Succeeded) => {
            lines.push(Line::plain(outcome.detail.to_string()));
        }
        (Operation::Login | Operation::Version, OutcomeKind::UnexpectedStatus) => {
            lines.push(Line::failure(format!("status code: {}", outcome.status)));
            if outcome.detail != Detail::Empty {
                lines.push(Line::plain(outcome.detail.to_string()));
            }
        }
        (_, OutcomeKind::Succeeded) => {
            let (noun, verb) = op.wording();
            lines.push(Line::success(format!(
                "{noun} {subject} was successfully {verb}"
            )));
        }
        (_, OutcomeKind::UnexpectedStatus) => {
            lines.push(Line::failure(format!(
                "There was an error {}: {}",
                op.failure_activity(),
                outcome.status_line()
            )));
        }
    }
    lines
}

impl Operation {
    fn wording(self) -> (&'static str, &'static str) {
        match self {
            Operation::CreateUser => ("User", "created"),
            Operation::DeleteUser => ("User", "deleted"),
            Operation::CreateRepo => ("Repo", "created"),
            Operation::UpdateRepo => ("Repo", "updated"),
            _ => ("Request", "completed"),
        }
    }

    fn failure_activity(self) -> &'static str {
        match self {
            Operation::Login => "logging in",
            Operation::Ping => "pinging the server",
            Operation::Version => "fetching the version",
            Operation::CreateUser => "creating the user",
            Operation::DeleteUser => "deleting the user",
            Operation::StorageInfo => "fetching the storage info",
            Operation::CreateRepo => "creating the repository",
            Operation::UpdateRepo => "updating the repository",
            Operation::ListRepos => "fetching the repositories",
        }
    }
}

fn print_lines(lines: &[Line]) {
    let color = io::stdout().is_terminal();
    for line in lines {
        match (line.tone, color) {
            (Tone::Success, true) => println!("{}", line.text.as_str().green()),
            (Tone::Failure, true) => println!("{}", line.text.as_str().red()),
            _ => println!("{}", line.text),
        }
    }
}
