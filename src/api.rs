// API client module: a small blocking HTTP client for the repository
// manager's REST API. Every operation sends exactly one request and turns the
// response into an `Outcome`; only transport-level problems become errors.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::credentials::{CredentialStore, API_KEY_KEY};
use crate::error::ApiError;
use crate::model::{PackageType, RepositoryConfig, RepositoryType, UserRecord};

/// Applied to every request unless the caller picks another value.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Response payload as received, or the field extracted from it.
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    Empty,
    Text(String),
    Json(Value),
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::Empty => Ok(()),
            Detail::Text(text) => f.write_str(text),
            Detail::Json(value) => match serde_json::to_string_pretty(value) {
                Ok(pretty) => f.write_str(&pretty),
                Err(_) => write!(f, "{value}"),
            },
        }
    }
}

/// How an operation ended once a response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Succeeded,
    /// The status code differs from the one the operation expects.
    UnexpectedStatus,
    /// The status code was right but the body lacks the expected field.
    MalformedBody { field: &'static str },
}

/// Uniform result of every API operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub status: u16,
    /// Canonical reason phrase for `status`, empty for unknown codes.
    pub reason: String,
    pub detail: Detail,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        self.kind == OutcomeKind::Succeeded
    }

    /// `404 Not Found` style label.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }
}

/// Which status code counts as success. Anything else is a failure, even
/// another 2xx code.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Any,
    Exactly(StatusCode),
}

impl Expect {
    fn accepts(self, status: StatusCode) -> bool {
        match self {
            Expect::Any => true,
            Expect::Exactly(expected) => status == expected,
        }
    }
}

/// Blocking client bound to one host and one set of credentials.
pub struct ApiClient {
    client: Client,
    credentials: CredentialStore,
}

impl ApiClient {
    /// Build a client that gives up on any request after `timeout`.
    pub fn new(credentials: CredentialStore, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(ApiClient {
            client,
            credentials,
        })
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Exchange username and password for an API key (`GET
    /// api/security/apiKey` with basic auth). On a 200 carrying `apiKey` the
    /// key is persisted before this returns; otherwise the store is untouched.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Outcome, ApiError> {
        let url = self.endpoint("api/security/apiKey")?;
        let request = self
            .client
            .get(url.clone())
            .basic_auth(username, Some(password));
        let (status, detail) = self.exchange(Method::GET, &url, request)?;

        if status != StatusCode::OK {
            return Ok(outcome(OutcomeKind::UnexpectedStatus, status, detail));
        }
        let Some(api_key) = string_field(&detail, "apiKey") else {
            warn!("login response has no apiKey field");
            return Ok(outcome(
                OutcomeKind::MalformedBody { field: "apiKey" },
                status,
                detail,
            ));
        };

        self.credentials.set_api_key(&api_key)?;
        Ok(outcome(OutcomeKind::Succeeded, status, detail))
    }

    /// `GET api/system/ping`. Any response counts; the status is the answer.
    pub fn ping(&self) -> Result<Outcome, ApiError> {
        let url = self.endpoint("api/system/ping")?;
        self.simple(Method::GET, url, Expect::Any)
    }

    /// `GET api/system/version`, extracting the `version` field.
    pub fn version(&self) -> Result<Outcome, ApiError> {
        let url = self.endpoint("api/system/version")?;
        let request = self.authed(Method::GET, url.clone());
        let (status, detail) = self.exchange(Method::GET, &url, request)?;

        if status != StatusCode::OK {
            return Ok(outcome(OutcomeKind::UnexpectedStatus, status, detail));
        }
        match string_field(&detail, "version") {
            Some(version) => Ok(outcome(
                OutcomeKind::Succeeded,
                status,
                Detail::Text(version),
            )),
            None => {
                warn!("version response has no version field");
                Ok(outcome(
                    OutcomeKind::MalformedBody { field: "version" },
                    status,
                    detail,
                ))
            }
        }
    }

    /// `PUT api/security/users/{name}`; the server answers 201 on success.
    pub fn create_user(&self, user: &UserRecord) -> Result<Outcome, ApiError> {
        let url = self.endpoint_for("api/security/users", &user.name)?;
        let request = self.authed_json(Method::PUT, url.clone()).json(user);
        self.finish(Method::PUT, &url, request, Expect::Exactly(StatusCode::CREATED))
    }

    /// `DELETE api/security/users/{name}`.
    pub fn delete_user(&self, username: &str) -> Result<Outcome, ApiError> {
        let url = self.endpoint_for("api/security/users", username)?;
        self.simple(Method::DELETE, url, Expect::Exactly(StatusCode::OK))
    }

    /// `GET api/storageinfo`, returning the whole body.
    pub fn storage_info(&self) -> Result<Outcome, ApiError> {
        let url = self.endpoint("api/storageinfo")?;
        self.simple(Method::GET, url, Expect::Exactly(StatusCode::OK))
    }

    /// `PUT api/repositories/{key}` with the class-specific configuration.
    pub fn create_repo(&self, config: &RepositoryConfig) -> Result<Outcome, ApiError> {
        self.send_repo(Method::PUT, config)
    }

    /// `POST api/repositories/{key}` with the class-specific configuration.
    pub fn update_repo(&self, config: &RepositoryConfig) -> Result<Outcome, ApiError> {
        self.send_repo(Method::POST, config)
    }

    /// `GET api/repositories`, filtered by repository and package type. A
    /// filter that means "all" is left out of the query.
    pub fn list_repos(
        &self,
        repo_type: RepositoryType,
        package_type: Option<PackageType>,
    ) -> Result<Outcome, ApiError> {
        let mut url = self.endpoint("api/repositories")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(ty) = repo_type.as_query() {
                query.append_pair("type", ty);
            }
            if let Some(ty) = package_type {
                query.append_pair("packageType", ty.as_str());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        self.simple(Method::GET, url, Expect::Exactly(StatusCode::OK))
    }

    fn send_repo(&self, method: Method, config: &RepositoryConfig) -> Result<Outcome, ApiError> {
        let url = self.endpoint_for("api/repositories", config.key())?;
        let request = self.authed_json(method.clone(), url.clone()).json(config);
        self.finish(method, &url, request, Expect::Exactly(StatusCode::OK))
    }

    fn simple(&self, method: Method, url: Url, expect: Expect) -> Result<Outcome, ApiError> {
        let request = self.authed(method.clone(), url.clone());
        self.finish(method, &url, request, expect)
    }

    fn finish(
        &self,
        method: Method,
        url: &Url,
        request: RequestBuilder,
        expect: Expect,
    ) -> Result<Outcome, ApiError> {
        let (status, detail) = self.exchange(method, url, request)?;
        let kind = if expect.accepts(status) {
            OutcomeKind::Succeeded
        } else {
            OutcomeKind::UnexpectedStatus
        };
        Ok(outcome(kind, status, detail))
    }

    /// Send `request` and read the whole body.
    fn exchange(
        &self,
        method: Method,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Detail), ApiError> {
        debug!(%method, %url, "sending request");
        let response = request.send().map_err(|source| transport(url, source))?;
        let status = response.status();
        debug!(%method, %url, status = status.as_u16(), "received response");
        let detail = read_detail(response).map_err(|source| transport(url, source))?;
        Ok((status, detail))
    }

    /// Request carrying the stored API key and the form content type the
    /// server expects on body-less calls.
    fn authed(&self, method: Method, url: Url) -> RequestBuilder {
        self.with_api_key(self.client.request(method, url))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
    }

    /// Request carrying the stored API key; `.json()` sets the content type.
    fn authed_json(&self, method: Method, url: Url) -> RequestBuilder {
        self.with_api_key(self.client.request(method, url))
    }

    fn with_api_key(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.credentials.api_key();
        if key.is_empty() {
            request
        } else {
            request.header(API_KEY_KEY, key)
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.credentials
            .host()
            .join(path)
            .map_err(|_| ApiError::Endpoint(path.to_string()))
    }

    /// `path` plus one percent-encoded trailing segment.
    fn endpoint_for(&self, path: &str, segment: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Endpoint(path.to_string()))?
            .push(segment);
        Ok(url)
    }
}

fn outcome(kind: OutcomeKind, status: StatusCode, detail: Detail) -> Outcome {
    Outcome {
        kind,
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        detail,
    }
}

fn transport(url: &Url, source: reqwest::Error) -> ApiError {
    ApiError::Transport {
        url: url.to_string(),
        source,
    }
}

fn read_detail(response: Response) -> Result<Detail, reqwest::Error> {
    let text = response.text()?;
    if text.trim().is_empty() {
        return Ok(Detail::Empty);
    }
    Ok(match serde_json::from_str::<Value>(&text) {
        Ok(value) => Detail::Json(value),
        Err(_) => Detail::Text(text),
    })
}

/// Top-level field of a JSON body rendered as a string. Non-string scalars are
/// accepted; `null` and absence are not.
fn string_field(detail: &Detail, field: &str) -> Option<String> {
    let Detail::Json(Value::Object(map)) = detail else {
        return None;
    };
    match map.get(field)? {
        Value::String(value) => Some(value.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::parse_host;
    use crate::model::{build_repo_payload, RepositoryClass};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::fs;
    use std::net::TcpListener;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    const KEY_HEADER: &str = "x-jfrog-art-api";

    fn env_file(dir: &TempDir, host: &str, api_key: &str) -> PathBuf {
        let path = dir.path().join(".env");
        fs::write(&path, format!("HOST={host}\nX-JFrog-Art-Api={api_key}\n")).unwrap();
        path
    }

    fn client_with(host: &str, api_key: &str, timeout: Duration) -> (ApiClient, TempDir) {
        let dir = tempdir().unwrap();
        let path = env_file(&dir, host, api_key);
        let store = CredentialStore::open(path, None).unwrap();
        (ApiClient::new(store, timeout).unwrap(), dir)
    }

    fn client_for(server: &MockServer) -> (ApiClient, TempDir) {
        client_with(&server.url("/artifactory/"), "secret-key", DEFAULT_TIMEOUT)
    }

    #[test]
    fn login_stores_api_key_on_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/artifactory/api/security/apiKey")
                .header("authorization", "Basic dXNlcjpwYXNz");
            then.status(200).json_body(json!({"apiKey": "XYZ"}));
        });
        let (mut api, dir) = client_with(&server.url("/artifactory/"), "", DEFAULT_TIMEOUT);

        let result = api.login("user", "pass").unwrap();

        mock.assert();
        assert!(result.succeeded());
        assert_eq!(result.detail, Detail::Json(json!({"apiKey": "XYZ"})));
        assert_eq!(api.credentials().api_key(), "XYZ");
        let on_disk = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(on_disk.contains("X-JFrog-Art-Api=XYZ"));
    }

    #[test]
    fn login_failure_leaves_store_unchanged() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/artifactory/api/security/apiKey");
            then.status(401)
                .json_body(json!({"errors": [{"status": 401, "message": "Bad credentials"}]}));
        });
        let (mut api, dir) = client_for(&server);

        let result = api.login("user", "wrong").unwrap();

        assert_eq!(result.kind, OutcomeKind::UnexpectedStatus);
        assert_eq!(result.status, 401);
        assert_eq!(result.reason, "Unauthorized");
        assert_eq!(api.credentials().api_key(), "secret-key");
        let on_disk = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(on_disk.contains("X-JFrog-Art-Api=secret-key"));
    }

    #[test]
    fn login_without_api_key_field_is_a_soft_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/artifactory/api/security/apiKey");
            then.status(200).json_body(json!({}));
        });
        let (mut api, _dir) = client_for(&server);

        let result = api.login("user", "pass").unwrap();

        assert_eq!(result.kind, OutcomeKind::MalformedBody { field: "apiKey" });
        assert_eq!(api.credentials().api_key(), "secret-key");
    }

    #[test]
    fn ping_reports_any_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/artifactory/api/system/ping")
                .header(KEY_HEADER, "secret-key");
            then.status(503).body("down");
        });
        let (api, _dir) = client_for(&server);

        let result = api.ping().unwrap();

        mock.assert();
        assert!(result.succeeded());
        assert_eq!(result.status_line(), "503 Service Unavailable");
        assert_eq!(result.detail, Detail::Text("down".to_string()));
    }

    #[test]
    fn version_extracts_field_and_is_repeatable() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/artifactory/api/system/version")
                .header(KEY_HEADER, "secret-key");
            then.status(200)
                .json_body(json!({"version": "7.71.3", "revision": "77103900"}));
        });
        let (api, _dir) = client_for(&server);

        let first = api.version().unwrap();
        let second = api.version().unwrap();

        mock.assert_hits(2);
        assert_eq!(first.detail, Detail::Text("7.71.3".to_string()));
        assert_eq!(first, second);
        assert_eq!(api.credentials().api_key(), "secret-key");
    }

    #[test]
    fn version_without_field_is_a_soft_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/artifactory/api/system/version");
            then.status(200).json_body(json!({"revision": "1"}));
        });
        let (api, _dir) = client_for(&server);

        let result = api.version().unwrap();
        assert_eq!(result.kind, OutcomeKind::MalformedBody { field: "version" });
        assert_eq!(result.detail, Detail::Json(json!({"revision": "1"})));
    }

    #[test]
    fn create_user_expects_201_exactly() {
        let server = MockServer::start();
        let user = UserRecord {
            name: "jane.doe".into(),
            email: "jane@example.com".into(),
            password: "Abcdef1@".into(),
        };
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/artifactory/api/security/users/jane.doe")
                .header(KEY_HEADER, "secret-key")
                .header("content-type", "application/json")
                .json_body(json!({
                    "name": "jane.doe",
                    "email": "jane@example.com",
                    "password": "Abcdef1@"
                }));
            then.status(201);
        });
        let (api, _dir) = client_for(&server);

        let result = api.create_user(&user).unwrap();
        mock.assert();
        assert!(result.succeeded());
        assert_eq!(result.detail, Detail::Empty);
    }

    #[test]
    fn create_user_treats_200_as_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/artifactory/api/security/users/jane");
            then.status(200);
        });
        let (api, _dir) = client_for(&server);
        let user = UserRecord {
            name: "jane".into(),
            email: "jane@example.com".into(),
            password: "Abcdef1@".into(),
        };

        let result = api.create_user(&user).unwrap();
        assert_eq!(result.kind, OutcomeKind::UnexpectedStatus);
        assert_eq!(result.status_line(), "200 OK");
    }

    #[test]
    fn delete_user_sends_delete() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/artifactory/api/security/users/jane")
                .header(KEY_HEADER, "secret-key");
            then.status(200).body("The user: 'jane' has been removed successfully.");
        });
        let (api, _dir) = client_for(&server);

        assert!(api.delete_user("jane").unwrap().succeeded());
        mock.assert();
    }

    #[test]
    fn delete_user_reports_missing_user() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/artifactory/api/security/users/ghost");
            then.status(404);
        });
        let (api, _dir) = client_for(&server);

        let result = api.delete_user("ghost").unwrap();
        assert!(!result.succeeded());
        assert_eq!(result.status_line(), "404 Not Found");
    }

    #[test]
    fn storage_info_returns_full_body() {
        let server = MockServer::start();
        let body = json!({"binariesSummary": {"binariesCount": "12"}, "repositoriesSummaryList": []});
        let returned = body.clone();
        server.mock(move |when, then| {
            when.method(GET).path("/artifactory/api/storageinfo");
            then.status(200).json_body(returned);
        });
        let (api, _dir) = client_for(&server);

        let result = api.storage_info().unwrap();
        assert!(result.succeeded());
        assert_eq!(result.detail, Detail::Json(body));
    }

    #[test]
    fn create_repo_puts_class_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/artifactory/api/repositories/npm-remote")
                .header(KEY_HEADER, "secret-key")
                .json_body(json!({
                    "key": "npm-remote",
                    "rclass": "remote",
                    "url": "https://registry.npmjs.org",
                    "externalDependenciesEnabled": true
                }));
            then.status(200).body("Successfully created repository 'npm-remote'");
        });
        let (api, _dir) = client_for(&server);
        let config = build_repo_payload(
            "npm-remote",
            RepositoryClass::Remote,
            None,
            true,
            Some("https://registry.npmjs.org"),
        )
        .unwrap();

        assert!(api.create_repo(&config).unwrap().succeeded());
        mock.assert();
    }

    #[test]
    fn update_repo_posts_class_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/artifactory/api/repositories/libs")
                .json_body(json!({"key": "libs", "rclass": "local"}));
            then.status(400).body("bad");
        });
        let (api, _dir) = client_for(&server);
        let config = build_repo_payload("libs", RepositoryClass::Local, None, false, None).unwrap();

        let result = api.update_repo(&config).unwrap();
        mock.assert();
        assert_eq!(result.kind, OutcomeKind::UnexpectedStatus);
        assert_eq!(result.status_line(), "400 Bad Request");
    }

    #[test]
    fn list_repos_passes_filters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/artifactory/api/repositories")
                .query_param("type", "virtual")
                .query_param("packageType", "npm");
            then.status(200)
                .json_body(json!([{"key": "npm", "type": "VIRTUAL", "packageType": "Npm"}]));
        });
        let (api, _dir) = client_for(&server);

        let result = api
            .list_repos(RepositoryType::Virtual, Some(PackageType::Npm))
            .unwrap();
        mock.assert();
        assert!(result.succeeded());
        assert!(matches!(result.detail, Detail::Json(Value::Array(ref repos)) if repos.len() == 1));
    }

    #[test]
    fn list_repos_without_filters_sends_bare_path() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/artifactory/api/repositories");
            then.status(200).json_body(json!([]));
        });
        let (api, _dir) = client_for(&server);

        let url = api.endpoint("api/repositories").unwrap();
        assert_eq!(url.query(), None);
        assert!(api.list_repos(RepositoryType::All, None).unwrap().succeeded());
        mock.assert();
    }

    #[test]
    fn empty_api_key_is_not_sent() {
        let (api, _dir) = client_with("http://127.0.0.1:1/", "", DEFAULT_TIMEOUT);
        let request = api
            .authed(reqwest::Method::GET, parse_host("http://127.0.0.1:1/").unwrap())
            .build()
            .unwrap();
        assert!(request.headers().get(API_KEY_KEY).is_none());
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            FORM_CONTENT_TYPE
        );
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        let (api, _dir) = client_with("http://h/artifactory", "", DEFAULT_TIMEOUT);
        let url = api.endpoint_for("api/security/users", "jane doe/x").unwrap();
        assert_eq!(
            url.as_str(),
            "http://h/artifactory/api/security/users/jane%20doe%2Fx"
        );
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let (api, _dir) = client_with(&format!("http://{addr}/"), "k", DEFAULT_TIMEOUT);

        let err = api.ping().unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }

    #[test]
    fn slow_server_times_out_as_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/artifactory/api/system/ping");
            then.status(200).delay(Duration::from_millis(1500));
        });
        let (api, _dir) = client_with(
            &server.url("/artifactory/"),
            "k",
            Duration::from_millis(200),
        );

        let err = api.ping().unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
