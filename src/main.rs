// Entrypoint for the CLI application.
// Parsing, dispatch and error reporting live in `cli::run`, which hands back
// the exit code.

fn main() {
    std::process::exit(artifactory_cli::cli::run());
}
