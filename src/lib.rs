// Library root
// ------------
// A command-line client for the REST API of an Artifactory repository
// manager. The binary (`main.rs`) only calls `cli::run`.
//
// Module responsibilities:
// - `envfile`: reads and rewrites the `KEY=value` credential file.
// - `credentials`: host URL and API key, persisted through `envfile`.
// - `validate`: email and password checks applied before sending anything.
// - `model`: repository classes, package types and request payloads.
// - `api`: one blocking HTTP call per server operation, classified into an
//   `Outcome`.
// - `ui`: interactive collection of missing arguments and result printing.
// - `cli`: argument parsing, logging and exit codes.
pub mod api;
pub mod cli;
pub mod credentials;
pub mod envfile;
pub mod error;
pub mod model;
pub mod ui;
pub mod validate;
