// SPDX-License-Identifier: MIT

//! Read-only admin analytics API.
//!
//! Exposes aggregate queries over submissions and live sessions. There are
//! deliberately no write endpoints; all mutation goes through the bot.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::error::LeadlineError;
use super::storage::SessionStore;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn SessionStore>,
    stale_after: chrono::Duration,
}

pub async fn serve(
    store: Arc<dyn SessionStore>,
    port: u16,
    stale_after: Duration,
) -> Result<(), LeadlineError> {
    let state = AppState {
        store,
        stale_after: chrono::Duration::from_std(stale_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(30)),
    };

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/submissions", get(recent_submissions))
        .route("/api/submissions/stats", get(submission_stats))
        .route("/api/funnel", get(funnel))
        .route("/api/buyers", get(buyers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("admin API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    limit: Option<u32>,
    /// Attribution bucket filter, e.g. "organic", "referral",
    /// "buyer:buyer_alex_9f3a21".
    attribution: Option<String>,
}

async fn recent_submissions(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Json<Value> {
    let limit = params.limit.unwrap_or(50).min(500);
    match state.store.recent_submissions(limit).await {
        Ok(submissions) => {
            let filtered: Vec<Value> = submissions
                .iter()
                .filter(|s| match &params.attribution {
                    None => true,
                    Some(bucket) => {
                        let actual = s
                            .attribution
                            .as_ref()
                            .map(|a| a.bucket())
                            .unwrap_or_else(|| "organic".to_string());
                        &actual == bucket
                    }
                })
                .map(|s| {
                    json!({
                        "user_id": s.user_id,
                        "username": s.username,
                        "name": s.name,
                        "country": s.country,
                        "phone": s.phone,
                        "contact_time": s.contact_time,
                        "attribution": s.attribution,
                        "completed_at": s.completed_at,
                        "processed": s.processed,
                    })
                })
                .collect();
            Json(json!(filtered))
        }
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

async fn submission_stats(State(state): State<AppState>) -> Json<Value> {
    let total = match state.store.count_submissions().await {
        Ok(total) => total,
        Err(e) => return Json(json!({ "error": e.to_string() })),
    };
    match state.store.submissions_by_attribution().await {
        Ok(by_attribution) => Json(json!({
            "total": total,
            "by_attribution": by_attribution,
        })),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

async fn funnel(State(state): State<AppState>) -> Json<Value> {
    let by_step = match state.store.sessions_by_step().await {
        Ok(counts) => counts,
        Err(e) => return Json(json!({ "error": e.to_string() })),
    };
    let cutoff = Utc::now() - state.stale_after;
    match state.store.count_stale_unreminded(cutoff).await {
        Ok(stale) => {
            let mut sessions = serde_json::Map::new();
            for (step, count) in by_step {
                sessions.insert(step.as_str().to_string(), json!(count));
            }
            Json(json!({
                "sessions_by_step": sessions,
                "stale_unreminded": stale,
            }))
        }
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

async fn buyers(State(state): State<AppState>) -> Json<Value> {
    match state.store.list_buyers().await {
        Ok(buyers) => Json(json!(buyers)),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}
