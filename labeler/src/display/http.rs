use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::board::{DisplayBoard, LabelsView, StatusView};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /status — status line of the last applied cycle
async fn status(State(board): State<Arc<DisplayBoard>>) -> Json<StatusView> {
    Json(board.status_view())
}

/// GET /labels — rows currently in the table
async fn labels(State(board): State<Arc<DisplayBoard>>) -> Json<LabelsView> {
    Json(board.labels_view())
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

pub fn router(board: Arc<DisplayBoard>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/labels", get(labels))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(board)
}

/// Bind the display address. Done during setup so a taken port is fatal.
pub async fn bind(addr: &str) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "display HTTP server listening");
    Ok(listener)
}

/// Serve the board until the process exits.
pub async fn serve(listener: TcpListener, board: Arc<DisplayBoard>) -> std::io::Result<()> {
    axum::serve(listener, router(board)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{LabelRow, Status, StatusSink, TableSink};
    use frame_labeler_common::frame::CycleId;

    #[tokio::test]
    async fn status_reflects_board() {
        let board = Arc::new(DisplayBoard::new());
        let Json(view) = status(State(board.clone())).await;
        assert_eq!(view.state, "pending");

        board.set_status(CycleId(2), &Status::Success);
        let Json(view) = status(State(board)).await;
        assert_eq!(view.state, "success");
        assert_eq!(view.cycle, Some(2));
    }

    #[tokio::test]
    async fn labels_as_json() {
        let board = Arc::new(DisplayBoard::new());
        board.replace_rows(
            CycleId(1),
            &[LabelRow {
                name: "Dog".into(),
                confidence: "98.00%".into(),
            }],
        );
        let Json(view) = labels(State(board)).await;
        let body = serde_json::to_value(&view).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "cycle": 1,
                "rows": [{ "name": "Dog", "confidence": "98.00%" }]
            })
        );
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let board = Arc::new(DisplayBoard::new());
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, board));

        let body = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn bind_fails_on_taken_port() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let err = bind(&addr).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
    }
}
