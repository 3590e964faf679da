use axum::Json;
use axum::response::IntoResponse;

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "status": "healthy",
    }))
}
