use clap::{ArgAction, Parser};
use remime_engine::FailurePolicy;
use serde::Serialize;
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::path::PathBuf;

/// Repair mismatched Content-Type metadata across an entire bucket.
///
/// Every object is listed, its stored content-type compared with the type its
/// key's extension implies, and mismatches are rewritten in place. Custom
/// metadata is preserved.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Access key ID.
    #[arg(short, long, env = "AWS_ACCESS_KEY_ID")]
    pub access: Option<String>,
    /// Secret access key.
    #[arg(short, long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret: Option<String>,
    #[arg(short, long)]
    pub region: Option<String>,
    #[arg(short, long)]
    pub bucket: Option<String>,
    /// Only repair keys starting with this prefix.
    #[arg(short, long)]
    pub prefix: Option<String>,
    /// Custom S3-compatible endpoint URL.
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Objects requested per listing call (at most 1000).
    #[arg(long)]
    pub page_size: Option<NonZeroU32>,
    /// Stop after inspecting this many objects.
    #[arg(long)]
    pub limit: Option<NonZeroU64>,
    /// Inspections and rewrites in flight at once.
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,
    /// Keep going after an object fails to inspect or rewrite.
    #[arg(long)]
    pub best_effort: bool,
    /// Report what would be rewritten without writing anything.
    #[arg(long)]
    pub dry_run: bool,
    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Everything given on the command line, in the shape of the configuration
    /// file. Omitted flags are omitted here too, so they never mask a value
    /// from another source.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            credentials: CredentialOverrides {
                key_id: self.access.clone(),
                key_secret: self.secret.clone(),
            },
            dry_run: self.dry_run,
            run: RunOverrides {
                prefix: self.prefix.clone(),
                page_size: self.page_size,
                object_cap: self.limit,
                concurrency: self.concurrency,
                failure_policy: self.best_effort.then_some(FailurePolicy::BestEffort),
            },
        }
    }
}

fn is_false(value: &bool) -> bool {
    !value
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub credentials: CredentialOverrides,
    #[serde(skip_serializing_if = "is_false")]
    pub dry_run: bool,
    pub run: RunOverrides,
}

#[derive(Default, PartialEq, Eq, Serialize)]
pub struct CredentialOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_secret: Option<String>,
}
impl std::fmt::Debug for CredentialOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialOverrides")
            .field("key_id", &self.key_id)
            .field("key_secret", &self.key_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<NonZeroU32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_cap: Option<NonZeroU64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<NonZeroUsize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
}
