// Credential store: the base host URL and the API key, backed by an
// environment file so the key obtained at login survives across runs.

use std::path::{Path, PathBuf};

use tracing::info;
use url::Url;

use crate::envfile::EnvFile;
use crate::error::StoreError;

/// Env-file key holding the base URL of the repository manager.
pub const HOST_KEY: &str = "HOST";
/// Env-file key (and request header name) holding the API key.
pub const API_KEY_KEY: &str = "X-JFrog-Art-Api";

const ENV_FILE_NAME: &str = ".env";
const FALLBACK_FILE_NAME: &str = ".artifactory.env";

/// Session credentials plus the file they are persisted to.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    file: EnvFile,
    host: Url,
    api_key: String,
}

impl CredentialStore {
    /// Load credentials from `path`. `host_override` (from `--host` or the
    /// process environment) wins over the `HOST` entry of the file.
    pub fn open(path: PathBuf, host_override: Option<&str>) -> Result<Self, StoreError> {
        let file = EnvFile::load(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;

        let host_raw = host_override
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| file.get(HOST_KEY).filter(|value| !value.trim().is_empty()))
            .ok_or_else(|| StoreError::MissingHost(path.clone()))?;
        let host = parse_host(&host_raw)?;
        let api_key = file.get(API_KEY_KEY).unwrap_or_default();

        Ok(CredentialStore {
            path,
            file,
            host,
            api_key,
        })
    }

    /// Base URL every endpoint is joined onto. Always ends with `/`.
    pub fn host(&self) -> &Url {
        &self.host
    }

    /// The stored API key, empty until a successful login.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `key` and then adopt it in memory. If the write fails the
    /// in-memory value is left untouched, so both always agree.
    pub fn set_api_key(&mut self, key: &str) -> Result<(), StoreError> {
        let mut updated = self.file.clone();
        updated.set(API_KEY_KEY, key);
        updated.save(&self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        self.file = updated;
        self.api_key = key.to_string();
        info!(path = %self.path.display(), "stored API key");
        Ok(())
    }
}

/// Parse a host URL, appending a trailing `/` so relative endpoint paths land
/// beneath it (`https://h/artifactory` + `api/...` keeps `artifactory`).
pub fn parse_host(input: &str) -> Result<Url, StoreError> {
    let trimmed = input.trim();
    let mut url = Url::parse(trimmed).map_err(|err| StoreError::InvalidHost {
        input: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(StoreError::InvalidHost {
            input: trimmed.to_string(),
            reason: "URL cannot be used as a base".to_string(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Find the nearest `.env` in `start` or any of its ancestors.
pub fn discover_env_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(ENV_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Env file used when none is given explicitly: the nearest `.env` above the
/// working directory, else `~/.artifactory.env`.
pub fn default_env_file() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    discover_env_file(&cwd).unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(FALLBACK_FILE_NAME)
    })
}
