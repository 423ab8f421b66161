//! Layered configuration for remime.
//!
//! Sources are merged in increasing order of precedence:
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension),
//! 3. `REMIME_`-prefixed environment variables, with `__` separating nested
//!    keys (`REMIME_RUN__PAGE_SIZE=250`),
//! 4. overrides supplied by the caller, usually from the command line.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use remime_engine::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Most keys a single listing call may return.
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const ENV_PREFIX: &str = "REMIME_";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub key_id: String,
    pub key_secret: String,
}
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bucket: String,
    pub region: String,
    /// Custom S3-compatible endpoint; addressed path-style when set.
    pub endpoint: Option<String>,
    pub credentials: Credentials,
    /// Attempts per request, including the first, before a transient failure
    /// is reported.
    pub max_attempts: u32,
    /// Report what would be rewritten without writing anything.
    pub dry_run: bool,
    pub run: Settings,
    /// Extension to content-type overrides, consulted before the built-in table.
    pub types: BTreeMap<String, String>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            credentials: Credentials::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            dry_run: false,
            run: Settings::default(),
            types: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the platform default location
    /// when no path is given and a file exists there.
    pub fn load(path: Option<&Path>, overrides: impl Serialize) -> Result<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|path| path.is_file()),
        };
        Self::load_from(file.as_deref(), overrides)
    }

    /// Load configuration from exactly the sources given, skipping the
    /// platform default location.
    pub fn load_from(file: Option<&Path>, overrides: impl Serialize) -> Result<Self> {
        let config: Self = figment(file)?
            .merge(Serialized::defaults(overrides))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("a bucket name is required".to_string()));
        }
        if self.credentials.key_id.is_empty() || self.credentials.key_secret.is_empty() {
            exn::bail!(ErrorKind::Invalid("both an access key ID and a secret access key are required".to_string()));
        }
        if self.run.page_size.get() > MAX_PAGE_SIZE {
            exn::bail!(ErrorKind::Invalid(format!("page size may not exceed {MAX_PAGE_SIZE}")));
        }
        if self.max_attempts == 0 {
            exn::bail!(ErrorKind::Invalid("at least one request attempt is required".to_string()));
        }
        if let Some((extension, content_type)) = self.types.iter().find(|(_, content_type)| !content_type.contains('/')) {
            exn::bail!(ErrorKind::Invalid(format!(
                "content-type override {content_type:?} for extension {extension:?} is not a media type"
            )));
        }
        Ok(())
    }
}

/// `<config_dir>/remime/remime.toml` for the current platform.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "remime").map(|dirs| dirs.config_dir().join("remime.toml"))
}

/// Defaults, then `file`, then the environment.
pub fn figment(file: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = file {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        figment = match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        };
        tracing::debug!(path = %path.display(), "Merged configuration file");
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}
