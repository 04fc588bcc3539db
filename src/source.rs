//! Fetching and decoding the crawler's college listing.
//!
//! The listing is a YAML (or JSON) document whose top level is a sequence of
//! mappings. Each mapping becomes a [`RawRecord`]; no field is required at
//! this stage.

use crate::config::FetchConfig;
use crate::error::{ImporterError, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Where the listing lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(String),
    Path(PathBuf),
}

impl SourceLocation {
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            SourceLocation::Url(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            SourceLocation::Path(PathBuf::from(path))
        } else {
            SourceLocation::Path(PathBuf::from(location))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Url(url) => write!(f, "{url}"),
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reads the whole listing into memory
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, location: &SourceLocation) -> Result<String>;
}

/// Fetches URLs with reqwest and paths from the local filesystem
pub struct ReqwestFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl fmt::Debug for ReqwestFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestFetcher")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl ReqwestFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl SourceFetcher for ReqwestFetcher {
    #[instrument(skip_all, fields(location = %location))]
    async fn fetch(&self, location: &SourceLocation) -> Result<String> {
        match location {
            SourceLocation::Url(url) => {
                info!("📡 Fetching college listing from {}", url);
                let resp = self
                    .client
                    .get(url)
                    .header(USER_AGENT, &self.user_agent)
                    .send()
                    .await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(ImporterError::Fetch {
                        location: url.clone(),
                        status: status.as_u16(),
                    });
                }
                let body = resp.text().await?;
                debug!("Fetched {} bytes", body.len());
                Ok(body)
            }
            SourceLocation::Path(path) => {
                info!("📂 Reading college listing from {}", path.display());
                let body = tokio::fs::read_to_string(path).await?;
                debug!("Read {} bytes", body.len());
                Ok(body)
            }
        }
    }
}

/// One entry of the listing, kept as the untyped mapping it was decoded from
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    fields: Mapping,
}

impl RawRecord {
    pub fn new(fields: Mapping) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The field rendered as text. Scalars use their display form, sequences
    /// of scalars are joined with ", ". Null, missing and nested mappings give `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_text)
    }

    /// The field as text, or `None` when it is missing or only whitespace
    pub fn present(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.trim().is_empty())
    }

    pub fn is_blank(&self, key: &str) -> bool {
        self.present(key).is_none()
    }

    /// Year of establishment, from a number or a numeric string
    pub fn established_year(&self) -> Option<i32> {
        match self.get("established_year")? {
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// YAML rendering of the record, for log output
    pub fn dump(&self) -> String {
        serde_yaml::to_string(&self.fields)
            .unwrap_or_else(|e| format!("<unprintable record: {e}>"))
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Sequence(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Mapping(_) => None,
        Value::Tagged(tagged) => value_to_text(&tagged.value),
    }
}

/// Decodes the listing. The top level must be a sequence and every entry a mapping.
pub fn parse_records(body: &str) -> Result<Vec<RawRecord>> {
    let document: Value = serde_yaml::from_str(body)?;
    let entries = match document {
        Value::Sequence(entries) => entries,
        Value::Null => {
            return Err(ImporterError::Parse(
                "document is empty, expected a sequence of colleges".to_string(),
            ))
        }
        other => {
            return Err(ImporterError::Parse(format!(
                "expected a sequence of colleges at the top level, found {}",
                kind_of(&other)
            )))
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Mapping(fields) => Ok(RawRecord::new(fields)),
            other => Err(ImporterError::Parse(format!(
                "entry {} is a {}, expected a mapping",
                index,
                kind_of(&other)
            ))),
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
