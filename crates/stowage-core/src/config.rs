//! Backend configuration.
//!
//! Each backend has a typed config struct validated at construction.
//! [`StorageConfig`] selects a backend and an optional public base URL and
//! can be deserialized, built from a legacy string map, or read from the
//! environment:
//!
//! ```json
//! { "backend": { "type": "s3", "bucket": "media", "region": "eu-west-1", "acl": "public-read" },
//!   "base_url": "https://cdn.example.com" }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::storage::{AnyStorage, LocalStorage, MemoryStorage, NoopStorage, PublicStorage};

/// Canned access-control policy applied to uploaded S3 objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CannedAcl {
    /// Owner-only access.
    Private,
    /// Anyone may read.
    PublicRead,
    /// Anyone may read and write.
    PublicReadWrite,
    /// Authenticated AWS users may read.
    AuthenticatedRead,
    /// Bucket owner may read.
    BucketOwnerRead,
    /// Bucket owner has full control.
    BucketOwnerFullControl,
}

const ACLS: &[(&str, CannedAcl)] = &[
    ("private", CannedAcl::Private),
    ("public-read", CannedAcl::PublicRead),
    ("public-read-write", CannedAcl::PublicReadWrite),
    ("authenticated-read", CannedAcl::AuthenticatedRead),
    ("bucket-owner-read", CannedAcl::BucketOwnerRead),
    ("bucket-owner-full-control", CannedAcl::BucketOwnerFullControl),
];

impl CannedAcl {
    /// Look up an ACL by its S3 name (`public-read`, ...).
    pub fn lookup(name: &str) -> Result<Self> {
        ACLS.iter()
            .find(|(n, _)| *n == name)
            .map(|(_, acl)| *acl)
            .ok_or_else(|| StorageError::Config(format!("The ACL {name} does not exist")))
    }

    /// Header value sent as `x-amz-acl`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl FromStr for CannedAcl {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::lookup(s)
    }
}

impl TryFrom<String> for CannedAcl {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self> {
        Self::lookup(&value)
    }
}

impl From<CannedAcl> for String {
    fn from(acl: CannedAcl) -> Self {
        acl.as_str().to_string()
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-south-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ca-central-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "sa-east-1",
];

/// A region from the known AWS region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AwsRegion(&'static str);

impl AwsRegion {
    /// Region name, e.g. `eu-west-1`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(feature = "s3")]
impl TryFrom<AwsRegion> for s3::Region {
    type Error = StorageError;

    fn try_from(region: AwsRegion) -> Result<Self> {
        region
            .as_str()
            .parse()
            .map_err(|e| StorageError::Config(format!("Invalid region {region}: {e}")))
    }
}

/// Look up a known AWS region by name.
pub fn lookup_region(name: &str) -> Result<AwsRegion> {
    REGIONS
        .iter()
        .copied()
        .find(|r| *r == name)
        .map(AwsRegion)
        .ok_or_else(|| StorageError::Config(format!("The Region {name} does not exist")))
}

fn reject_unknown(params: &HashMap<String, String>, known: &[&str], backend: &str) -> Result<()> {
    let mut unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|k| !known.contains(k))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(StorageError::Config(format!(
        "Unknown {backend} parameter(s): {}",
        unknown.join(", ")
    )))
}

fn param<'a>(params: &'a HashMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|n| params.get(*n))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Configuration for [`LocalStorage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsConfig {
    /// Root directory for all objects. Created if missing.
    pub root: PathBuf,
    /// Unix permission bits for newly created files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<u32>,
}

impl FsConfig {
    /// Legacy parameter names accepted by [`FsConfig::from_params`].
    pub const PARAMS: &'static [&'static str] = &["location", "root", "file_mode"];

    /// Create a new filesystem config.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_mode: None,
        }
    }

    /// Set the permission bits for new files.
    #[must_use]
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = Some(mode);
        self
    }

    /// Check the config.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(StorageError::Config("Filesystem root must not be empty".into()));
        }
        if let Some(mode) = self.file_mode {
            if mode > 0o7777 {
                return Err(StorageError::Config(format!("Invalid file mode {mode:o}")));
            }
        }
        Ok(())
    }

    /// Build from a legacy string map (`location`, `file_mode` in octal).
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        reject_unknown(params, Self::PARAMS, "filesystem")?;
        let root = param(params, &["location", "root"])
            .ok_or_else(|| StorageError::Config("Missing filesystem location".into()))?;
        let mut config = Self::new(root);
        if let Some(mode) = param(params, &["file_mode"]) {
            let digits = mode.trim_start_matches("0o");
            let mode = u32::from_str_radix(digits, 8)
                .map_err(|e| StorageError::Config(format!("Invalid file mode {mode}: {e}")))?;
            config = config.with_file_mode(mode);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the S3 backend.
///
/// Empty credentials mean "read them from the environment"
/// (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// Region name. Must be a known AWS region unless `endpoint` is set.
    pub region: String,
    /// Access key id.
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: String,
    /// Custom endpoint for MinIO, LocalStack and other S3-compatible services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Canned ACL applied to uploads. Bucket default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<CannedAcl>,
    /// Key prefix for all operations.
    #[serde(default)]
    pub prefix: String,
}

impl S3Config {
    /// Legacy parameter names accepted by [`S3Config::from_params`].
    pub const PARAMS: &'static [&'static str] = &[
        "access_key_id",
        "secret_access_key",
        "bucket_name",
        "bucket",
        "location",
        "prefix",
        "region",
        "acl",
        "endpoint",
    ];

    /// Create a new S3 config.
    #[must_use]
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            endpoint: None,
            acl: None,
            prefix: String::new(),
        }
    }

    /// Use static credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = access_key_id.into();
        self.secret_access_key = secret_access_key.into();
        self
    }

    /// Use a custom endpoint (path-style addressing).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Apply a canned ACL to uploads.
    #[must_use]
    pub fn with_acl(mut self, acl: CannedAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Check the config.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(StorageError::Config("S3 bucket must not be empty".into()));
        }
        match &self.endpoint {
            Some(endpoint) if !is_http_url(endpoint) => {
                return Err(StorageError::Config(format!(
                    "Invalid S3 endpoint {endpoint}: expected an http(s) URL"
                )));
            }
            Some(_) if self.region.is_empty() => {
                return Err(StorageError::Config("S3 region must not be empty".into()));
            }
            Some(_) => {}
            None => {
                lookup_region(&self.region)?;
            }
        }
        if self.access_key_id.is_empty() != self.secret_access_key.is_empty() {
            return Err(StorageError::Config(
                "S3 access key id and secret access key must be set together".into(),
            ));
        }
        Ok(())
    }

    /// Build from a legacy string map.
    ///
    /// Keys: `access_key_id`, `secret_access_key`, `bucket_name`, `location`,
    /// `region`, `acl`, `endpoint`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        reject_unknown(params, Self::PARAMS, "S3")?;
        let bucket = param(params, &["bucket_name", "bucket"])
            .ok_or_else(|| StorageError::Config("Missing S3 bucket_name".into()))?;
        let region = param(params, &["region"]).unwrap_or_default();

        let mut config = Self::new(bucket, region).with_credentials(
            param(params, &["access_key_id"]).unwrap_or_default(),
            param(params, &["secret_access_key"]).unwrap_or_default(),
        );
        if let Some(prefix) = param(params, &["location", "prefix"]) {
            config = config.with_prefix(prefix);
        }
        if let Some(endpoint) = param(params, &["endpoint"]) {
            config = config.with_endpoint(endpoint);
        }
        if let Some(acl) = param(params, &["acl"]) {
            config = config.with_acl(CannedAcl::lookup(acl)?);
        }
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("acl", &self.acl)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Configuration for the Google Cloud Storage backend.
///
/// Credentials come from `GOOGLE_APPLICATION_CREDENTIALS` or
/// `SERVICE_ACCOUNT`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GcsConfig {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix for all operations.
    #[serde(default)]
    pub prefix: String,
}

impl GcsConfig {
    /// Legacy parameter names accepted by [`GcsConfig::from_params`].
    pub const PARAMS: &'static [&'static str] = &["bucket_name", "bucket", "location", "prefix"];

    /// Create a new GCS config.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
        }
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Check the config.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(StorageError::Config("GCS bucket must not be empty".into()));
        }
        Ok(())
    }

    /// Build from a legacy string map (`bucket_name`, `location`).
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        reject_unknown(params, Self::PARAMS, "GCS")?;
        let bucket = param(params, &["bucket_name", "bucket"])
            .ok_or_else(|| StorageError::Config("Missing GCS bucket_name".into()))?;
        let mut config = Self::new(bucket);
        if let Some(prefix) = param(params, &["location", "prefix"]) {
            config = config.with_prefix(prefix);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for [`MemoryStorage`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Key prefix.
    #[serde(default)]
    pub prefix: String,
}

impl MemoryConfig {
    /// Legacy parameter names accepted by [`MemoryConfig::from_params`].
    pub const PARAMS: &'static [&'static str] = &["location", "prefix"];

    /// Create a config whose keys live below `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Build from a legacy string map (`location`).
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        reject_unknown(params, Self::PARAMS, "memory")?;
        Ok(Self::new(
            param(params, &["location", "prefix"]).unwrap_or_default(),
        ))
    }
}

const NOOP_PARAMS: &[&str] = &[];

/// Backend selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Local filesystem.
    Fs(FsConfig),
    /// S3 or an S3-compatible service.
    S3(S3Config),
    /// Google Cloud Storage.
    Gcs(GcsConfig),
    /// In-memory store.
    Memory(MemoryConfig),
    /// Discards everything.
    Noop,
}

impl BackendConfig {
    /// Backend name as used in config files and `STOWAGE_BACKEND`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fs(_) => "fs",
            Self::S3(_) => "s3",
            Self::Gcs(_) => "gcs",
            Self::Memory(_) => "memory",
            Self::Noop => "noop",
        }
    }

    fn params_for(name: &str) -> Result<&'static [&'static str]> {
        match name {
            "fs" => Ok(FsConfig::PARAMS),
            "s3" => Ok(S3Config::PARAMS),
            "gcs" => Ok(GcsConfig::PARAMS),
            "memory" => Ok(MemoryConfig::PARAMS),
            "noop" => Ok(NOOP_PARAMS),
            other => Err(StorageError::Config(format!("Unknown backend {other}"))),
        }
    }

    /// Build from a backend name and its legacy string map.
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self> {
        let known = Self::params_for(name)?;
        match name {
            "fs" => FsConfig::from_params(params).map(Self::Fs),
            "s3" => S3Config::from_params(params).map(Self::S3),
            "gcs" => GcsConfig::from_params(params).map(Self::Gcs),
            "memory" => MemoryConfig::from_params(params).map(Self::Memory),
            _ => {
                reject_unknown(params, known, "noop")?;
                Ok(Self::Noop)
            }
        }
    }

    /// Check the config.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Fs(config) => config.validate(),
            Self::S3(config) => config.validate(),
            Self::Gcs(config) => config.validate(),
            Self::Memory(_) | Self::Noop => Ok(()),
        }
    }
}

/// Environment variable to legacy parameter mapping used by
/// [`StorageConfig::from_env`].
const ENV_PARAMS: &[(&str, &str)] = &[
    ("STOWAGE_ROOT", "root"),
    ("STOWAGE_PREFIX", "prefix"),
    ("STOWAGE_FILE_MODE", "file_mode"),
    ("STOWAGE_BUCKET", "bucket"),
    ("STOWAGE_ACL", "acl"),
    ("AWS_REGION", "region"),
    ("AWS_ENDPOINT_URL", "endpoint"),
    ("AWS_ACCESS_KEY_ID", "access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "secret_access_key"),
];

/// Complete storage configuration: a backend plus an optional public URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Which backend to build.
    pub backend: BackendConfig,
    /// Base URL objects are published under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl StorageConfig {
    /// Create a config for `backend` without a base URL.
    #[must_use]
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            base_url: None,
        }
    }

    /// Publish objects under `base_url`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Check the config.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.base_url.as_deref(), Some("")) {
            return Err(StorageError::Config("Base URL must not be empty".into()));
        }
        self.backend.validate()
    }

    /// Build from a legacy string map.
    ///
    /// `backend` selects the backend (default `fs`) and `base_url` the
    /// public URL; every other key is passed to the backend's
    /// `from_params`, which rejects unknown keys.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut rest = params.clone();
        let name = rest.remove("backend").unwrap_or_else(|| "fs".to_string());
        let base_url = rest.remove("base_url").filter(|u| !u.is_empty());
        let config = Self {
            backend: BackendConfig::from_params(&name, &rest)?,
            base_url,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Supported variables:
    /// - `STOWAGE_BACKEND`: `fs` (default), `s3`, `gcs`, `memory` or `noop`
    /// - `STOWAGE_BASE_URL`: public base URL
    /// - `STOWAGE_ROOT`, `STOWAGE_FILE_MODE`: filesystem root and file mode
    /// - `STOWAGE_BUCKET`, `STOWAGE_PREFIX`, `STOWAGE_ACL`: bucket settings
    /// - `AWS_REGION`, `AWS_ENDPOINT_URL`, `AWS_ACCESS_KEY_ID`,
    ///   `AWS_SECRET_ACCESS_KEY`: S3 connection
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Same as [`StorageConfig::from_env`] over an explicit variable list.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        let name = vars
            .get("STOWAGE_BACKEND")
            .cloned()
            .unwrap_or_else(|| "fs".to_string());
        let known = BackendConfig::params_for(&name)?;

        let mut params: HashMap<String, String> = ENV_PARAMS
            .iter()
            .filter(|(_, p)| known.contains(p))
            .filter_map(|(env, p)| vars.get(*env).map(|v| (p.to_string(), v.clone())))
            .collect();
        params.insert("backend".to_string(), name);
        if let Some(base_url) = vars.get("STOWAGE_BASE_URL") {
            params.insert("base_url".to_string(), base_url.clone());
        }
        Self::from_params(&params)
    }

    /// Build the configured backend.
    ///
    /// Cloud backends fail with a configuration error when their feature
    /// is not compiled in.
    pub async fn connect(&self) -> Result<PublicStorage<AnyStorage>> {
        self.validate()?;
        let storage = match &self.backend {
            BackendConfig::Fs(config) => AnyStorage::Local(LocalStorage::with_config(config)?),
            BackendConfig::Memory(config) => {
                AnyStorage::Memory(MemoryStorage::with_prefix(&config.prefix))
            }
            BackendConfig::Noop => AnyStorage::Noop(NoopStorage::new()),
            #[cfg(feature = "s3")]
            BackendConfig::S3(config) => {
                AnyStorage::S3(crate::storage::S3Storage::with_config(config).await?)
            }
            #[cfg(feature = "gcs")]
            BackendConfig::Gcs(config) => {
                AnyStorage::Gcs(crate::storage::GcsStorage::with_config(config).await?)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(StorageError::Config(format!(
                    "Backend {} is not compiled in (enable the `{}` feature)",
                    other.name(),
                    other.name()
                )));
            }
        };
        tracing::info!(backend = self.backend.name(), "Storage backend ready");
        Ok(PublicStorage::new(
            storage,
            self.base_url.clone().unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::Storage;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_acl_table_lookup() {
        assert_eq!(CannedAcl::lookup("public-read").unwrap(), CannedAcl::PublicRead);
        for (name, acl) in ACLS {
            assert_eq!(acl.as_str(), *name);
        }
        let err = CannedAcl::lookup("world-writable").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_region_table_lookup() {
        let region = lookup_region("eu-west-1").unwrap();
        assert_eq!(region.as_str(), "eu-west-1");
        assert_eq!(region.to_string(), "eu-west-1");
        let err = lookup_region("moon-base-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_s3_from_params() {
        let config = S3Config::from_params(&params(&[
            ("access_key_id", "AKID"),
            ("secret_access_key", "secret"),
            ("bucket_name", "media"),
            ("location", "uploads/"),
            ("region", "eu-west-1"),
            ("acl", "public-read"),
        ]))
        .unwrap();
        assert_eq!(config.bucket, "media");
        assert_eq!(config.prefix, "uploads/");
        assert_eq!(config.acl, Some(CannedAcl::PublicRead));
        assert!(!format!("{config:?}").contains("secret\""));
    }

    #[test]
    fn test_s3_from_params_rejects_bad_values() {
        let unknown = S3Config::from_params(&params(&[
            ("bucket_name", "media"),
            ("region", "eu-west-1"),
            ("colour", "blue"),
        ]));
        assert!(unknown.unwrap_err().to_string().contains("colour"));

        let bad_acl = S3Config::from_params(&params(&[
            ("bucket_name", "media"),
            ("region", "eu-west-1"),
            ("acl", "everyone"),
        ]));
        assert!(bad_acl.is_err());

        let bad_region =
            S3Config::from_params(&params(&[("bucket_name", "media"), ("region", "nowhere")]));
        assert!(bad_region.is_err());

        let half_credentials = S3Config::from_params(&params(&[
            ("bucket_name", "media"),
            ("region", "eu-west-1"),
            ("access_key_id", "AKID"),
        ]));
        assert!(half_credentials.is_err());
    }

    #[test]
    fn test_custom_endpoint_allows_custom_region() {
        let config = S3Config::new("bucket", "garage")
            .with_endpoint("http://localhost:9000")
            .with_credentials("a", "b");
        config.validate().unwrap();
        assert!(S3Config::new("bucket", "garage")
            .with_endpoint("localhost:9000")
            .validate()
            .is_err());
    }

    #[test]
    fn test_fs_from_params_octal_mode() {
        let config =
            FsConfig::from_params(&params(&[("location", "/srv/blobs"), ("file_mode", "0640")]))
                .unwrap();
        assert_eq!(config.file_mode, Some(0o640));
        assert!(FsConfig::from_params(&params(&[("file_mode", "0640")])).is_err());
        assert!(
            FsConfig::from_params(&params(&[("location", "/x"), ("file_mode", "rw")])).is_err()
        );
    }

    #[test]
    fn test_storage_config_from_params() {
        let config = StorageConfig::from_params(&params(&[
            ("backend", "gcs"),
            ("bucket_name", "assets"),
            ("location", "testfolder"),
            ("base_url", "http://aa"),
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Gcs(GcsConfig::new("assets").with_prefix("testfolder"))
        );
        assert_eq!(config.base_url.as_deref(), Some("http://aa"));

        assert!(StorageConfig::from_params(&params(&[("backend", "ftp")])).is_err());
    }

    #[test]
    fn test_from_vars_only_forwards_relevant_keys() {
        let config = StorageConfig::from_vars([
            ("STOWAGE_ROOT", "/srv/blobs"),
            ("AWS_REGION", "eu-west-1"),
            ("STOWAGE_BASE_URL", "https://cdn.example.com/"),
            ("HOME", "/root"),
        ])
        .unwrap();
        assert_eq!(config.backend, BackendConfig::Fs(FsConfig::new("/srv/blobs")));
        assert_eq!(config.base_url.as_deref(), Some("https://cdn.example.com/"));

        let s3 = StorageConfig::from_vars([
            ("STOWAGE_BACKEND", "s3"),
            ("STOWAGE_BUCKET", "media"),
            ("AWS_REGION", "us-east-1"),
            ("STOWAGE_ROOT", "/ignored"),
        ])
        .unwrap();
        assert_eq!(s3.backend, BackendConfig::S3(S3Config::new("media", "us-east-1")));
    }

    #[test]
    fn test_deserialize_tagged_config() {
        let json = r#"{
            "backend": { "type": "s3", "bucket": "media", "region": "eu-west-1", "acl": "public-read" },
            "base_url": "https://cdn.example.com"
        }"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        match &config.backend {
            BackendConfig::S3(s3) => assert_eq!(s3.acl, Some(CannedAcl::PublicRead)),
            other => panic!("unexpected backend {other:?}"),
        }

        let bad_acl = r#"{ "backend": { "type": "s3", "bucket": "b", "region": "eu-west-1", "acl": "nope" } }"#;
        assert!(serde_json::from_str::<StorageConfig>(bad_acl).is_err());

        let noop: StorageConfig = serde_json::from_str(r#"{ "backend": { "type": "noop" } }"#).unwrap();
        assert_eq!(noop.backend, BackendConfig::Noop);
    }

    #[test]
    fn test_deserialize_rejects_misspelled_fields() {
        for json in [
            r#"{ "backend": { "type": "s3", "bucket": "b", "region": "eu-west-1", "acll": "public-read" } }"#,
            r#"{ "backend": { "type": "fs", "root": "/srv/media", "filemode": 420 } }"#,
            r#"{ "backend": { "type": "gcs", "bucket": "b", "prefx": "media/" } }"#,
            r#"{ "backend": { "type": "memory", "location": "media/" } }"#,
            r#"{ "backend": { "type": "noop" }, "baseurl": "https://cdn.example.com" }"#,
        ] {
            let err = serde_json::from_str::<StorageConfig>(json).unwrap_err();
            assert!(err.to_string().contains("unknown field"), "{json}: {err}");
        }

        let memory: StorageConfig =
            serde_json::from_str(r#"{ "backend": { "type": "memory", "prefix": "media/" } }"#)
                .unwrap();
        assert_eq!(memory.backend, BackendConfig::Memory(MemoryConfig::new("media/")));
    }

    #[tokio::test]
    async fn test_connect_memory_with_base_url() {
        let config = StorageConfig::new(BackendConfig::Memory(MemoryConfig::new("m")))
            .with_base_url("http://aa/");
        let storage = config.connect().await.unwrap();
        assert_eq!(storage.url("k"), "http://aa/m/k");
    }

    #[cfg(not(feature = "s3"))]
    #[tokio::test]
    async fn test_connect_without_feature_is_invalid() {
        let config = StorageConfig::new(BackendConfig::S3(S3Config::new("b", "us-east-1")));
        let err = config.connect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }
}
