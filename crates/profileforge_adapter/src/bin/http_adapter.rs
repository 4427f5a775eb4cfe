#![forbid(unsafe_code)]

use std::{env, net::SocketAddr};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use profileforge_adapter::{
    AdapterFailure, AdapterFailureKind, AdapterRuntime, LoginAdapterRequest,
    ProfileAdapterView, RegisterAdapterRequest,
};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("PROFILEFORGE_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = AdapterRuntime::default_from_env();
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/session", get(session))
        .route("/v1/register", post(register))
        .route("/v1/login", post(login))
        .route("/v1/logout", post(logout))
        .route("/v1/profiles/:profile_id", get(profile_view))
        .route("/v1/profile", put(update_profile))
        .with_state(runtime);

    println!("profileforge_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        eprintln!("profileforge_adapter_http failed to listen for shutdown: {err}");
    }
}

/// Runtime calls sleep for simulated latency, so they run off the async workers.
async fn run_blocking<T, F>(runtime: AdapterRuntime, op: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&AdapterRuntime) -> Result<T, AdapterFailure> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || op(&runtime)).await;
    match joined {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(Err(failure)) => failure_response(failure),
        Err(err) => {
            eprintln!("profileforge_adapter_http worker task failed: {err}");
            failure_response(AdapterFailure {
                kind: AdapterFailureKind::Internal,
                outcome: "INTERNAL",
                reason: "adapter worker task failed".to_string(),
            })
        }
    }
}

fn failure_response(failure: AdapterFailure) -> Response {
    let status =
        StatusCode::from_u16(failure.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        eprintln!(
            "profileforge_adapter_http request failed: {} {}",
            failure.outcome, failure.reason
        );
    }
    (status, Json(failure.into_body())).into_response()
}

async fn healthz(State(runtime): State<AdapterRuntime>) -> Response {
    run_blocking(runtime, |rt| rt.health_report()).await
}

async fn session(State(runtime): State<AdapterRuntime>) -> Response {
    match runtime.session() {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(failure) => failure_response(failure),
    }
}

async fn register(
    State(runtime): State<AdapterRuntime>,
    Json(request): Json<RegisterAdapterRequest>,
) -> Response {
    run_blocking(runtime, move |rt| rt.register(request)).await
}

async fn login(
    State(runtime): State<AdapterRuntime>,
    Json(request): Json<LoginAdapterRequest>,
) -> Response {
    run_blocking(runtime, move |rt| rt.login(request)).await
}

async fn logout(State(runtime): State<AdapterRuntime>) -> Response {
    run_blocking(runtime, |rt| rt.logout()).await
}

async fn profile_view(
    State(runtime): State<AdapterRuntime>,
    Path(profile_id): Path<String>,
) -> Response {
    run_blocking(runtime, move |rt| rt.profile_view(&profile_id)).await
}

async fn update_profile(
    State(runtime): State<AdapterRuntime>,
    Json(view): Json<ProfileAdapterView>,
) -> Response {
    run_blocking(runtime, move |rt| rt.update_profile(view)).await
}
