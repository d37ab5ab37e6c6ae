//! Process-wide configuration, read once at start-up and passed around
//! explicitly.

use encoding_rs::Encoding;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::dataset::{lookup_encoding, EncodingPolicy};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_OUTPUT_ROOT: &str = "./output";
const DEFAULT_ENCODING: &str = "gbk";
const DEFAULT_FALLBACK_ENCODING: &str = "utf-8";
const DEFAULT_FAILURE_PREVIEW: usize = 5;
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:8080",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Output directory used when a batch request does not name one.
    pub output_root: PathBuf,
    pub encodings: EncodingPolicy,
    /// How many failures the completion log line lists.
    pub failure_preview: usize,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            encodings: EncodingPolicy::default(),
            failure_preview: DEFAULT_FAILURE_PREVIEW,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Load from the environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("SURVEY_PORT") {
            Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "SURVEY_PORT",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => defaults.port,
        };

        let failure_preview = match lookup("SURVEY_FAILURE_PREVIEW") {
            Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "SURVEY_FAILURE_PREVIEW",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => defaults.failure_preview,
        };

        let encodings = EncodingPolicy {
            default: encoding_var(
                "SURVEY_DEFAULT_ENCODING",
                lookup("SURVEY_DEFAULT_ENCODING"),
                DEFAULT_ENCODING,
            )?,
            fallback: encoding_var(
                "SURVEY_FALLBACK_ENCODING",
                lookup("SURVEY_FALLBACK_ENCODING"),
                DEFAULT_FALLBACK_ENCODING,
            )?,
        };

        let cors_origins = match lookup("SURVEY_CORS_ORIGINS") {
            Some(value) => value
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Self {
            host: lookup("SURVEY_HOST").unwrap_or(defaults.host),
            port,
            output_root: lookup("SURVEY_OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_root),
            encodings,
            failure_preview,
            cors_origins,
        })
    }
}

fn encoding_var(
    var: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<&'static Encoding, ConfigError> {
    let label = value.unwrap_or_else(|| default.to_string());
    lookup_encoding(&label).ok_or_else(|| ConfigError::Invalid {
        var,
        value: label.clone(),
        reason: "unknown text encoding".to_string(),
    })
}
