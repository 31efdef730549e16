//! HTTP front end for the build-and-test pipeline

use anchor_harness::{HarnessConfig, HarnessError, RunOptions, TestReport, TestRequest};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use eyre::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

/// Shared between handlers
#[derive(Clone)]
struct AppState {
    config: Arc<HarnessConfig>,
    /// Every run rewrites the same workspace, so runs are serialized
    workspace_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn new(config: HarnessConfig) -> Self {
        Self {
            config: Arc::new(config),
            workspace_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Response bodies, shaped the way existing clients expect them
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiResponse {
    Success {
        message: &'static str,
        #[serde(rename = "testResults")]
        test_results: TestReport,
    },
    BuildFailure {
        error: String,
        output: String,
    },
    TestFailure {
        error: String,
        #[serde(rename = "testResults")]
        test_results: TestReport,
    },
    Error {
        error: String,
    },
}

/// Routes:
/// - `POST /test` builds and tests with a freshly injected program id
/// - `POST /compile` builds and tests the files as submitted
pub fn router(config: HarnessConfig) -> Router {
    Router::new()
        .route("/test", post(test_project))
        .route("/compile", post(compile_project))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(config))
}

/// Serves the router until ctrl-c
pub async fn serve(config: HarnessConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(
        "Listening on {} (workspace: {})",
        listener.local_addr()?,
        config.workspace_root.display()
    );

    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn test_project(
    State(state): State<AppState>,
    body: Result<Json<TestRequest>, JsonRejection>,
) -> Response {
    handle(state, body, RunOptions::default()).await
}

async fn compile_project(
    State(state): State<AppState>,
    body: Result<Json<TestRequest>, JsonRejection>,
) -> Response {
    let options = RunOptions {
        inject_program_id: false,
    };
    handle(state, body, options).await
}

async fn handle(
    state: AppState,
    body: Result<Json<TestRequest>, JsonRejection>,
    options: RunOptions,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return respond(
                StatusCode::BAD_REQUEST,
                ApiResponse::Error {
                    error: rejection.body_text(),
                },
            )
        }
    };

    // Reject bad input before waiting on the workspace
    if let Err(e) = request.validate() {
        return failure(e);
    }

    // The guard moves into the blocking task so the workspace stays locked
    // until the run ends, even if this future is dropped first
    let guard = Arc::clone(&state.workspace_lock).lock_owned().await;
    let config = Arc::clone(&state.config);
    let result = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        anchor_harness::run(&config, &request, options)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => respond(
            StatusCode::OK,
            ApiResponse::Success {
                message: "Project compiled successfully",
                test_results: outcome.report,
            },
        ),
        Ok(Err(e)) => failure(e),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::Error {
                error: format!("Run aborted: {}", e),
            },
        ),
    }
}

fn failure(error: HarnessError) -> Response {
    tracing::warn!("Run failed: {}", error);

    let status = if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = error.to_string();

    let body = match error {
        HarnessError::BuildFailed { output, .. } => ApiResponse::BuildFailure {
            error: message,
            output,
        },
        HarnessError::TestFailed { report, .. } => ApiResponse::TestFailure {
            error: message,
            test_results: *report,
        },
        _ => ApiResponse::Error { error: message },
    };

    respond(status, body)
}

fn respond(status: StatusCode, body: ApiResponse) -> Response {
    (status, Json(body)).into_response()
}
