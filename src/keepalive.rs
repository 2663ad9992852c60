use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

pub const ALIVE_TEXT: &str = "Bot activo y funcionando.";

/// Minimal HTTP surface so the hosting platform sees a live process.
pub fn router() -> Router {
    Router::new().route("/", get(|| async { ALIVE_TEXT }))
}

pub async fn serve(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind keep-alive listener on {addr}"))?;
    info!(addr = %listener.local_addr()?, "Keep-alive endpoint listening");
    axum::serve(listener, router())
        .await
        .context("keep-alive server stopped")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_reports_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router()).await.unwrap();
        });

        let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), ALIVE_TEXT);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router()).await.unwrap();
        });

        let resp = reqwest::get(format!("http://{addr}/nope")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }
}
