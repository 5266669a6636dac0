//! The HTTP surface: one `POST /` endpoint, built the way the teacher
//! built `routes/email.rs` — a `#[post(...)]` handler function plus a
//! `configure_routes` free function wired into `App::configure` from
//! `main.rs`. Everything the teacher's routes module did beyond that
//! (JWT auth middleware, GraphQL, Swagger) has no counterpart here: the
//! contract is a single shared-secret header check and a JSON array in,
//! JSON verdict map out.

use std::sync::Arc;
use std::time::Instant;

use actix_web::{HttpRequest, HttpResponse, post, web};
use serde_json::json;

use crate::engine::{self, EngineOptions};
use crate::validator::AddressValidator;

/// Shared application state handed to every request.
pub struct AppState {
    pub validator: Arc<AddressValidator>,
    pub engine_options: EngineOptions,
    pub password: String,
}

fn invalid_payload() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "error",
        "message": "Invalid payload",
        "emails": serde_json::Value::Null,
    }))
}

fn invalid_password() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "error",
        "message": "Invalid password",
        "emails": serde_json::Value::Null,
    }))
}

fn authorized(req: &HttpRequest, password: &str) -> bool {
    if password.is_empty() {
        return true;
    }
    req.headers()
        .get("Authorization")
        .is_some_and(|value| value.as_bytes() == password.as_bytes())
}

#[post("/")]
pub async fn verify_batch(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    if !authorized(&req, &state.password) {
        return invalid_password();
    }

    let addresses: Vec<String> = match serde_json::from_slice(&body) {
        Ok(addresses) => addresses,
        Err(_) => return invalid_payload(),
    };

    let started = Instant::now();
    let emails = engine::run_batch(
        Arc::clone(&state.validator),
        addresses,
        state.engine_options,
    )
    .await;
    let elapsed = started.elapsed();

    HttpResponse::Ok().json(json!({
        "status": "success",
        "message": format!(
            "Request completed, verified {} emails in {:?}",
            emails.len(),
            elapsed
        ),
        "emails": emails,
    }))
}

/// Registers the batch verification endpoint on an actix-web service.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(verify_batch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};

    use crate::dns::MockMxResolver;
    use crate::smtp::MockSmtpProber;

    fn test_state(password: &str) -> web::Data<AppState> {
        let mut resolver = MockMxResolver::new();
        resolver.expect_resolve_mx().returning(|_| Ok(vec![]));
        let prober = MockSmtpProber::new();
        let validator = Arc::new(AddressValidator::new(
            None,
            None,
            Arc::new(resolver),
            Arc::new(prober),
            "probe@example.com",
        ));
        web::Data::new(AppState {
            validator,
            engine_options: EngineOptions {
                workers: 4,
                buffer_size: 4,
                verbose: false,
                vduration: false,
            },
            password: password.to_string(),
        })
    }

    #[actix_web::test]
    async fn empty_batch_returns_success_with_empty_map() {
        let state = test_state("");
        let app = test::init_service(
            App::new().app_data(state).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_json(Vec::<String>::new())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["emails"], json!({}));
    }

    #[actix_web::test]
    async fn malformed_json_yields_invalid_payload_envelope() {
        let state = test_state("");
        let app = test::init_service(
            App::new().app_data(state).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .insert_header(("content-type", "application/json"))
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Invalid payload");
        assert!(body["emails"].is_null());
    }

    #[actix_web::test]
    async fn missing_auth_header_yields_invalid_password_envelope() {
        let state = test_state("secret");
        let app = test::init_service(
            App::new().app_data(state).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_json(vec!["a@d.test".to_string()])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Invalid password");
        assert!(body["emails"].is_null());
    }

    #[actix_web::test]
    async fn correct_auth_header_is_accepted() {
        let state = test_state("secret");
        let app = test::init_service(
            App::new().app_data(state).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .insert_header(("Authorization", "secret"))
            .set_json(Vec::<String>::new())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
    }
}
