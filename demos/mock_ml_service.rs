//! A stand-in ML service for running the proxy locally.
//!
//! `cargo run --example mock_ml_service` then start the proxy with
//! `ML_SERVICE_URL=http://127.0.0.1:8000`.

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

fn predict_one(features: &[f64]) -> Value {
    let home_form = features.first().copied().unwrap_or(1.0);
    let away_form = features.get(1).copied().unwrap_or(1.0);
    let total = (home_form + away_form).max(f64::EPSILON);

    let draw = 0.25;
    let home = (1.0 - draw) * home_form / total;
    let away = (1.0 - draw) * away_form / total;
    let (prediction, confidence) = if home >= away { ("home", home) } else { ("away", away) };

    json!({
        "prediction": prediction,
        "confidence": confidence,
        "probabilities": { "home": home, "draw": draw, "away": away },
        "model_version": "mock-1",
    })
}

fn features_of(body: &Value) -> Vec<f64> {
    body["features"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() {
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok", "version": "mock-1" })) }))
        .route(
            "/predict",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "success": true, "data": predict_one(&features_of(&body)) }))
            }),
        )
        .route(
            "/predict/batch",
            post(|Json(body): Json<Value>| async move {
                let items = body["predictions"].as_array().cloned().unwrap_or_default();
                let results: Vec<Value> = items.iter().map(|i| predict_one(&features_of(i))).collect();
                Json(json!({ "success": true, "results": results }))
            }),
        )
        .route(
            "/enhance",
            post(|Json(body): Json<Value>| async move {
                let home = body["context"]["homeTeam"].as_str().unwrap_or("home side").to_string();
                Json(json!({
                    "aiInsights": { "summary": format!("{home} look sharper in recent form") },
                    "strategicAdvice": ["Keep stakes small on close fixtures"],
                }))
            }),
        )
        .route(
            "/train",
            post(|Json(body): Json<Value>| async move {
                let samples = body["data"].as_array().map(Vec::len).unwrap_or(0);
                Json(json!({ "status": "trained", "samples": samples }))
            }),
        );

    let addr = SocketAddr::from(([127, 0, 0, 1], 8000));
    println!("Mock ML service is listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
