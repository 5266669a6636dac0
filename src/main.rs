use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web::Data};
use clap::Parser;
use email_verifier::config::{CliOverlay, Config};
use email_verifier::dns::TrustDnsMxResolver;
use email_verifier::engine::EngineOptions;
use email_verifier::routes::{AppState, configure_routes};
use email_verifier::smtp::TcpSmtpProber;
use email_verifier::validator::AddressValidator;

/// Batch email-address verification service entry point.
///
/// Loads `config.json` (if present, next to the executable), overlays
/// command-line flags of the same dotted names, builds the two bounded
/// caches, the DNS resolver, and the SMTP prober, then serves the
/// single `POST /` endpoint.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = CliOverlay::parse();
    let config = Config::load("config.json", cli);

    let result_cache = config.emails.cache.enabled.then(|| {
        email_verifier::cache::BoundedCache::new(
            config.emails.cache.maxsize,
            gc_frequency(config.emails.cache.gcfrequency),
        )
    });

    let mx_cache = config.domains.mxcache.enabled.then(|| {
        email_verifier::cache::BoundedCache::new(
            config.domains.mxcache.maxsize,
            gc_frequency(config.domains.mxcache.gcfrequency),
        )
    });

    let resolver = Arc::new(TrustDnsMxResolver::new());
    let prober = Arc::new(TcpSmtpProber::new(Duration::from_secs(
        config.domains.mxquery.timeout,
    )));

    let validator = Arc::new(AddressValidator::new(
        result_cache,
        mx_cache,
        resolver,
        prober,
        config.email.from.clone(),
    ));

    let engine_options = EngineOptions {
        workers: config.work.workers,
        buffer_size: config.work.buffersize,
        verbose: config.verbose,
        vduration: config.vduration,
    };

    let bind_ip = config.server.ip.clone();
    let bind_port = config.server.port;
    let password = config.server.password.clone();

    eprintln!("binding to {bind_ip}:{bind_port}");

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(AppState {
                validator: Arc::clone(&validator),
                engine_options,
                password: password.clone(),
            }))
            .configure(configure_routes)
    })
    .bind((bind_ip.as_str(), bind_port))?
    .run()
    .await
}

fn gc_frequency(seconds: u64) -> Option<Duration> {
    if seconds == 0 {
        None
    } else {
        Some(Duration::from_secs(seconds))
    }
}
