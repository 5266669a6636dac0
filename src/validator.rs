//! The Address Validator: syntax check, cache short-circuit, MX lookup,
//! and the SMTP probe loop, composed into one verdict string per
//! address.
//!
//! The resolver and prober are held as trait objects
//! (`Arc<dyn MxResolver>`, `Arc<dyn SmtpProber>`) rather than concrete
//! types so tests can substitute `mockall`-generated stubs and assert
//! on call counts without touching a socket. See `crate::dns` and
//! `crate::smtp` for the trait definitions.

use std::sync::Arc;

use crate::cache::BoundedCache;
use crate::dns::{MxRecord, MxResolver};
use crate::smtp::{ProbeOutcome, SmtpProber};
use crate::syntax;

/// Verdict returned when syntax validation fails.
pub const VERDICT_INVALID: &str = "invalid email address";
/// Verdict returned when MX resolution succeeds but yields no records.
pub const VERDICT_NO_MX: &str = "no mx record found";
/// Verdict returned on a successful probe, or when every MX in the
/// list was unreachable (the preserved legacy behavior; see DESIGN.md).
pub const VERDICT_OK: &str = "OK";

/// Orchestrates one address's validation pipeline against the two
/// shared caches and the injected resolver/prober.
pub struct AddressValidator {
    result_cache: Option<BoundedCache<String>>,
    mx_cache: Option<BoundedCache<Vec<MxRecord>>>,
    resolver: Arc<dyn MxResolver>,
    prober: Arc<dyn SmtpProber>,
    mail_from: String,
}

impl AddressValidator {
    pub fn new(
        result_cache: Option<BoundedCache<String>>,
        mx_cache: Option<BoundedCache<Vec<MxRecord>>>,
        resolver: Arc<dyn MxResolver>,
        prober: Arc<dyn SmtpProber>,
        mail_from: impl Into<String>,
    ) -> Self {
        Self {
            result_cache,
            mx_cache,
            resolver,
            prober,
            mail_from: mail_from.into(),
        }
    }

    /// Runs the full pipeline for one address and returns its verdict.
    ///
    /// The Result Cache is keyed by the lowercased address (case is not
    /// significant for the cache key), independent of the casing the
    /// caller used to invoke this method or the casing stored in the
    /// caller's own response map.
    pub async fn validate(&self, address: &str) -> String {
        let cache_key = address.to_lowercase();

        if let Some(cache) = &self.result_cache {
            if let Some(cached) = cache.get(&cache_key) {
                return cached;
            }
        }

        if !syntax::is_valid_email(address) {
            return self.finish(&cache_key, VERDICT_INVALID.to_string());
        }

        let domain = match address.rsplit_once('@') {
            Some((_, domain)) => domain.to_lowercase(),
            None => return self.finish(&cache_key, VERDICT_INVALID.to_string()),
        };

        let records = match self.mx_records(&domain).await {
            Ok(records) => records,
            Err(text) => return text,
        };

        if records.is_empty() {
            return VERDICT_NO_MX.to_string();
        }

        match self.probe_all(&records, &domain, address).await {
            ProbeLoopResult::Accepted => self.finish(&cache_key, VERDICT_OK.to_string()),
            ProbeLoopResult::AllUnreachable => self.finish(&cache_key, VERDICT_OK.to_string()),
            ProbeLoopResult::Rejected(text) => self.finish(&cache_key, text),
        }
    }

    fn finish(&self, cache_key: &str, verdict: String) -> String {
        if let Some(cache) = &self.result_cache {
            cache.put(cache_key.to_string(), verdict.clone());
        }
        verdict
    }

    /// Looks up `domain` in the MX cache, falling back to the resolver
    /// on a miss and populating the cache with a fresh result. DNS
    /// failures are returned as `Err` and are never written to the
    /// Result Cache by the caller.
    async fn mx_records(&self, domain: &str) -> Result<Vec<MxRecord>, String> {
        if let Some(cache) = &self.mx_cache {
            if let Some(cached) = cache.get(domain) {
                return Ok(cached);
            }
        }

        let records = self
            .resolver
            .resolve_mx(domain)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(cache) = &self.mx_cache {
            cache.put(domain.to_string(), records.clone());
        }

        Ok(records)
    }

    async fn probe_all(&self, records: &[MxRecord], domain: &str, address: &str) -> ProbeLoopResult {
        for record in records {
            match self
                .prober
                .probe(record, domain, &self.mail_from, address)
                .await
            {
                ProbeOutcome::Accepted => return ProbeLoopResult::Accepted,
                ProbeOutcome::Rejected(text) => return ProbeLoopResult::Rejected(text),
                ProbeOutcome::Unreachable => continue,
            }
        }
        ProbeLoopResult::AllUnreachable
    }
}

enum ProbeLoopResult {
    Accepted,
    Rejected(String),
    AllUnreachable,
}
