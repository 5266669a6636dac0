//! DNS MX resolution.
//!
//! Grounded in `trust-dns-resolver`'s async resolver, already a teacher
//! dependency (`Cargo.toml`), following the `TokioAsyncResolver::tokio` +
//! `mx_lookup` shape used throughout the wider pack (e.g.
//! `examples/other_examples/01de32bd_delfour-co-workspace--gk__mail-rs-src-utils-dns.rs.rs`).
//! The resolver is expressed as a capability trait so the validator can
//! be tested with a deterministic stub instead of real DNS traffic.

use async_trait::async_trait;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};

/// A single MX record: a mail exchanger hostname and its preference
/// value. Lower priority is preferred, but the resolver may return
/// records in any order; callers must not assume they are pre-sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub host: String,
    pub priority: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveMxError {
    #[error("{0}")]
    Resolver(String),
}

/// Resolves a domain to its MX records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveMxError>;
}

/// A [`MxResolver`] backed by a real `trust-dns-resolver` async resolver.
pub struct TrustDnsMxResolver {
    resolver: TokioAsyncResolver,
}

impl TrustDnsMxResolver {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl Default for TrustDnsMxResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MxResolver for TrustDnsMxResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveMxError> {
        let lookup = self
            .resolver
            .mx_lookup(domain)
            .await
            .map_err(|e| ResolveMxError::Resolver(e.to_string()))?;

        Ok(lookup
            .iter()
            .map(|mx| MxRecord {
                host: mx.exchange().to_string().trim_end_matches('.').to_string(),
                priority: mx.preference(),
            })
            .collect())
    }
}
