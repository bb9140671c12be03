// Domain types shared by the API client and the command surface: repository
// classes, package types, listing filters and the request payloads.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{PayloadError, UnknownPackageType};

/// Repository class (`rclass`): how a repository stores or proxies artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryClass {
    Local,
    Remote,
    Virtual,
}

impl RepositoryClass {
    pub const ALL: [RepositoryClass; 3] = [Self::Local, Self::Remote, Self::Virtual];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Virtual => "virtual",
        }
    }
}

impl fmt::Display for RepositoryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact format stored by a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Alpine,
    Bower,
    Cargo,
    Chef,
    Cocoapods,
    Composer,
    Conan,
    Cran,
    Debian,
    Docker,
    Gems,
    Generic,
    Gitlfs,
    Go,
    Gradle,
    Helm,
    Ivy,
    Maven,
    Npm,
    Nuget,
    Opkg,
    Pub,
    Puppet,
    Pypi,
    Rpm,
    Sbt,
    Swift,
    Terraform,
    Vagrant,
    Yum,
}

impl PackageType {
    pub const ALL: [PackageType; 30] = [
        Self::Alpine,
        Self::Bower,
        Self::Cargo,
        Self::Chef,
        Self::Cocoapods,
        Self::Composer,
        Self::Conan,
        Self::Cran,
        Self::Debian,
        Self::Docker,
        Self::Gems,
        Self::Generic,
        Self::Gitlfs,
        Self::Go,
        Self::Gradle,
        Self::Helm,
        Self::Ivy,
        Self::Maven,
        Self::Npm,
        Self::Nuget,
        Self::Opkg,
        Self::Pub,
        Self::Puppet,
        Self::Pypi,
        Self::Rpm,
        Self::Sbt,
        Self::Swift,
        Self::Terraform,
        Self::Vagrant,
        Self::Yum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpine => "alpine",
            Self::Bower => "bower",
            Self::Cargo => "cargo",
            Self::Chef => "chef",
            Self::Cocoapods => "cocoapods",
            Self::Composer => "composer",
            Self::Conan => "conan",
            Self::Cran => "cran",
            Self::Debian => "debian",
            Self::Docker => "docker",
            Self::Gems => "gems",
            Self::Generic => "generic",
            Self::Gitlfs => "gitlfs",
            Self::Go => "go",
            Self::Gradle => "gradle",
            Self::Helm => "helm",
            Self::Ivy => "ivy",
            Self::Maven => "maven",
            Self::Npm => "npm",
            Self::Nuget => "nuget",
            Self::Opkg => "opkg",
            Self::Pub => "pub",
            Self::Puppet => "puppet",
            Self::Pypi => "pypi",
            Self::Rpm => "rpm",
            Self::Sbt => "sbt",
            Self::Swift => "swift",
            Self::Terraform => "terraform",
            Self::Vagrant => "vagrant",
            Self::Yum => "yum",
        }
    }

    /// `alpine|bower|...|yum`, for hints shown after a bad entry.
    pub fn choices() -> String {
        Self::ALL
            .iter()
            .map(|ty| ty.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = UnknownPackageType;

    /// Case-insensitive; surrounding whitespace is ignored. An empty string is
    /// never a package type.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let wanted = input.trim();
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPackageType(input.to_string()))
    }
}

/// Repository type filter used when listing repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RepositoryType {
    #[default]
    All,
    Local,
    Remote,
    Virtual,
    Distribution,
}

impl RepositoryType {
    pub const ALL: [RepositoryType; 5] = [
        Self::All,
        Self::Local,
        Self::Remote,
        Self::Virtual,
        Self::Distribution,
    ];

    pub fn label(self) -> &'static str {
        self.as_query().unwrap_or("all")
    }

    /// Value of the `type` query parameter; `None` means no filter.
    pub fn as_query(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Local => Some("local"),
            Self::Remote => Some("remote"),
            Self::Virtual => Some("virtual"),
            Self::Distribution => Some("distribution"),
        }
    }
}

/// Body of the repository create/update endpoints. Each class carries exactly
/// its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rclass", rename_all = "lowercase")]
pub enum RepositoryConfig {
    Local {
        key: String,
    },
    Remote {
        key: String,
        url: String,
        #[serde(rename = "externalDependenciesEnabled")]
        external_dependencies_enabled: bool,
    },
    Virtual {
        key: String,
        #[serde(rename = "packageType")]
        package_type: PackageType,
        #[serde(rename = "externalDependenciesEnabled")]
        external_dependencies_enabled: bool,
    },
}

impl RepositoryConfig {
    pub fn key(&self) -> &str {
        match self {
            Self::Local { key } | Self::Remote { key, .. } | Self::Virtual { key, .. } => key.as_str(),
        }
    }

    pub fn class(&self) -> RepositoryClass {
        match self {
            Self::Local { .. } => RepositoryClass::Local,
            Self::Remote { .. } => RepositoryClass::Remote,
            Self::Virtual { .. } => RepositoryClass::Virtual,
        }
    }
}

/// Assemble the repository payload for `class`.
///
/// Inputs that do not belong to the class are ignored: a local repository
/// drops everything but the key, a remote one drops the package type and a
/// virtual one drops the URL. A remote repository without a URL or a virtual
/// one without a package type yields an error instead of a payload.
pub fn build_repo_payload(
    key: &str,
    class: RepositoryClass,
    package_type: Option<PackageType>,
    external_dependencies_enabled: bool,
    remote_url: Option<&str>,
) -> Result<RepositoryConfig, PayloadError> {
    let key = key.to_string();
    match class {
        RepositoryClass::Local => Ok(RepositoryConfig::Local { key }),
        RepositoryClass::Remote => {
            let url = remote_url
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .ok_or(PayloadError::MissingRemoteUrl)?;
            Ok(RepositoryConfig::Remote {
                key,
                url: url.to_string(),
                external_dependencies_enabled,
            })
        }
        RepositoryClass::Virtual => {
            let package_type = package_type.ok_or(PayloadError::MissingPackageType)?;
            Ok(RepositoryConfig::Virtual {
                key,
                package_type,
                external_dependencies_enabled,
            })
        }
    }
}

/// User to create on the server. Built, sent once, and dropped.
#[derive(Clone, Serialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn local_payload_has_only_key_and_class() {
        let payload = build_repo_payload(
            "repo1",
            RepositoryClass::Local,
            Some(PackageType::Npm),
            true,
            Some("http://ignored"),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"key": "repo1", "rclass": "local"})
        );
    }

    #[test]
    fn remote_payload_carries_url_and_flag() {
        let payload = build_repo_payload(
            "repo2",
            RepositoryClass::Remote,
            Some(PackageType::Maven),
            true,
            Some("http://x"),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "key": "repo2",
                "rclass": "remote",
                "url": "http://x",
                "externalDependenciesEnabled": true
            })
        );
    }

    #[test]
    fn remote_payload_requires_url() {
        for url in [None, Some(""), Some("   ")] {
            assert_eq!(
                build_repo_payload("r", RepositoryClass::Remote, None, false, url),
                Err(PayloadError::MissingRemoteUrl)
            );
        }
    }

    #[test]
    fn virtual_payload_carries_package_type_and_flag() {
        let payload = build_repo_payload(
            "repo3",
            RepositoryClass::Virtual,
            Some(PackageType::Npm),
            false,
            Some("http://ignored"),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "key": "repo3",
                "rclass": "virtual",
                "packageType": "npm",
                "externalDependenciesEnabled": false
            })
        );
    }

    #[test]
    fn virtual_payload_requires_package_type() {
        assert_eq!(
            build_repo_payload("r", RepositoryClass::Virtual, None, true, None),
            Err(PayloadError::MissingPackageType)
        );
    }

    #[test]
    fn package_type_parsing_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("npm".parse::<PackageType>(), Ok(PackageType::Npm));
        assert_eq!(" Docker ".parse::<PackageType>(), Ok(PackageType::Docker));
        assert!("".parse::<PackageType>().is_err());
        let err = "p2".parse::<PackageType>().unwrap_err();
        assert_eq!(err, UnknownPackageType("p2".to_string()));
        assert_eq!(err.to_string(), "unknown package type 'p2'");
    }

    #[test]
    fn package_type_names_match_wire_format() {
        for ty in PackageType::ALL {
            assert_eq!(serde_json::to_value(ty).unwrap(), json!(ty.as_str()));
            let value = ty.to_possible_value().unwrap();
            assert_eq!(value.get_name(), ty.as_str());
        }
    }

    #[test]
    fn repository_type_all_means_no_filter() {
        assert_eq!(RepositoryType::default().as_query(), None);
        assert_eq!(RepositoryType::Distribution.as_query(), Some("distribution"));
    }

    #[test]
    fn user_record_debug_hides_password() {
        let user = UserRecord {
            name: "jane".into(),
            email: "jane@example.com".into(),
            password: "Secret1@".into(),
        };
        assert!(!format!("{user:?}").contains("Secret1@"));
    }
}
