//! Minimal manila example — enveloped JSON endpoints, tracing, CORS.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/api/users/42
//!   curl -i -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -i -X OPTIONS http://localhost:3000/api/users \
//!        -H 'origin: https://app.example'
//!   curl -i http://localhost:3000/healthz

use manila::{
    Cookie, CorsConfig, Fault, Preflight, Reply, Request, SameSite, Scope, Service, Trace, health,
};
use serde::Deserialize;
use serde_json::json;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let api = Scope::new("/api")
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .post("/login", login);

    Service::builder()
        .bind("0.0.0.0:3000")
        .cors(CorsConfig::for_origins(["https://app.example"]))
        .layer(Trace)
        .layer(Preflight)
        .route(api)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness)
        .build()
        .listen()
        .await
        .expect("server error");
}

// GET /api/users/{id}
async fn get_user(req: Request) -> Result<Reply, Fault> {
    let id: u64 = req
        .param("id")
        .unwrap_or_default()
        .parse()
        .map_err(|e| Fault::bad_request(format!("parse id: {e}")).with_message("invalid user id"))?;

    if id != 42 {
        return Err(Fault::not_found(format!("user {id} not in store")).with_message("no such user"));
    }

    Ok(Reply::ok("found").with_data(json!({"id": 42, "name": "alice"})))
}

#[derive(Deserialize)]
struct CreateUser {
    name: String,
}

// POST /api/users
async fn create_user(req: Request) -> Result<Reply, Fault> {
    let input: CreateUser = req.decode()?;
    Ok(Reply::ok("created").with_data(json!({"id": 99, "name": input.name})))
}

// POST /api/login — demonstrates the cookie directive.
async fn login(_req: Request) -> Reply {
    let session = Cookie::new("session", "demo-token")
        .path("/")
        .max_age(3600)
        .http_only()
        .same_site(SameSite::Lax);

    Reply::ok("welcome back").with_cookie(session)
}
