//! Configuration: a `config.json` file adjacent to the executable,
//! overlaid field-by-field with command-line flags of the same
//! dotted names.
//!
//! The teacher reads individual environment variables ad hoc in
//! `main.rs` and has no config-file story of its own; this loader is
//! the `serde`/`clap` pairing used throughout the wider pack for
//! exactly this "typed config file plus CLI overlay" shape (see
//! `examples/other_examples` manifests for `blastrider-mailcheck_lib`
//! and `Sanyaolu123-check-if-email-exists-cli`, both of which depend on
//! `clap`).

use std::fs;
use std::path::Path;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 8080,
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    pub workers: usize,
    pub buffersize: usize,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            buffersize: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: "verify@example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub gcfrequency: u64,
    pub maxsize: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gcfrequency: 0,
            maxsize: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmailsConfig {
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MxQueryConfig {
    pub timeout: u64,
}

impl Default for MxQueryConfig {
    fn default() -> Self {
        Self { timeout: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DomainsConfig {
    pub mxcache: CacheConfig,
    pub mxquery: MxQueryConfig,
}

/// The full effective configuration, as loaded from `config.json` and
/// overlaid with CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub work: WorkConfig,
    pub email: EmailConfig,
    pub emails: EmailsConfig,
    pub domains: DomainsConfig,
    pub verbose: bool,
    pub vduration: bool,
}

impl Config {
    /// Loads `config.json` at `path` if it exists (a missing file is
    /// not an error; it just means every field keeps its hard-coded
    /// default), then overlays `cli`, field by field, wherever the CLI
    /// flag was actually supplied.
    pub fn load(path: impl AsRef<Path>, cli: CliOverlay) -> Self {
        let mut config = fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        cli.apply(&mut config);
        config
    }
}

/// Command-line overlay: every field is optional, and only fields the
/// caller actually passed are applied on top of the file-loaded
/// [`Config`]. Flag names match the `config.json` keys exactly
/// (e.g. `--work.workers 8`).
#[derive(Parser, Debug, Default)]
pub struct CliOverlay {
    #[arg(long = "server.ip")]
    pub server_ip: Option<String>,
    #[arg(long = "server.port")]
    pub server_port: Option<u16>,
    #[arg(long = "server.password")]
    pub server_password: Option<String>,

    #[arg(long = "work.workers")]
    pub work_workers: Option<usize>,
    #[arg(long = "work.buffersize")]
    pub work_buffersize: Option<usize>,

    #[arg(long = "email.from")]
    pub email_from: Option<String>,

    #[arg(long = "emails.cache.enabled")]
    pub emails_cache_enabled: Option<bool>,
    #[arg(long = "emails.cache.gcfrequency")]
    pub emails_cache_gcfrequency: Option<u64>,
    #[arg(long = "emails.cache.maxsize")]
    pub emails_cache_maxsize: Option<usize>,

    #[arg(long = "domains.mxcache.enabled")]
    pub domains_mxcache_enabled: Option<bool>,
    #[arg(long = "domains.mxcache.gcfrequency")]
    pub domains_mxcache_gcfrequency: Option<u64>,
    #[arg(long = "domains.mxcache.maxsize")]
    pub domains_mxcache_maxsize: Option<usize>,

    #[arg(long = "domains.mxquery.timeout")]
    pub domains_mxquery_timeout: Option<u64>,

    #[arg(long = "verbose")]
    pub verbose: Option<bool>,
    #[arg(long = "vduration")]
    pub vduration: Option<bool>,
}

impl CliOverlay {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.server_ip {
            config.server.ip = v;
        }
        if let Some(v) = self.server_port {
            config.server.port = v;
        }
        if let Some(v) = self.server_password {
            config.server.password = v;
        }
        if let Some(v) = self.work_workers {
            config.work.workers = v;
        }
        if let Some(v) = self.work_buffersize {
            config.work.buffersize = v;
        }
        if let Some(v) = self.email_from {
            config.email.from = v;
        }
        if let Some(v) = self.emails_cache_enabled {
            config.emails.cache.enabled = v;
        }
        if let Some(v) = self.emails_cache_gcfrequency {
            config.emails.cache.gcfrequency = v;
        }
        if let Some(v) = self.emails_cache_maxsize {
            config.emails.cache.maxsize = v;
        }
        if let Some(v) = self.domains_mxcache_enabled {
            config.domains.mxcache.enabled = v;
        }
        if let Some(v) = self.domains_mxcache_gcfrequency {
            config.domains.mxcache.gcfrequency = v;
        }
        if let Some(v) = self.domains_mxcache_maxsize {
            config.domains.mxcache.maxsize = v;
        }
        if let Some(v) = self.domains_mxquery_timeout {
            config.domains.mxquery.timeout = v;
        }
        if let Some(v) = self.verbose {
            config.verbose = v;
        }
        if let Some(v) = self.vduration {
            config.vduration = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_hard_coded_defaults() {
        let config = Config::load("/nonexistent/config.json", CliOverlay::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.work.workers, 4);
        assert!(config.emails.cache.enabled);
    }

    #[test]
    fn cli_overlay_only_touches_supplied_fields() {
        let mut config = Config::default();
        let cli = CliOverlay {
            work_workers: Some(16),
            ..Default::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.work.workers, 16);
        assert_eq!(config.work.buffersize, 4); // untouched default
    }

    #[test]
    fn deserializes_partial_json_with_defaults_for_missing_keys() {
        let json = r#"{ "work": { "workers": 2 }, "verbose": true }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.work.workers, 2);
        assert_eq!(config.work.buffersize, 4);
        assert!(config.verbose);
        assert!(!config.vduration);
    }
}
