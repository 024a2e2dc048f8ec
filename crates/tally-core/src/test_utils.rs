//! Test utilities for tally-core
//!
//! Value builders for ledger tests and a mock Ollama server for the insight
//! backend.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{extract::Json, extract::State, routing::post, Router};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::models::{AccountRef, CategoryRef, NewTransaction, TransactionKind};

/// Decimal literal
pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// UTC instant
pub fn utc(y: i32, m: u32, day: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, h, mi, s).unwrap()
}

/// Expense candidate at noon on `date` (`YYYY-MM-DD`)
pub fn expense(
    date: &str,
    description: &str,
    amount: &str,
    account: &str,
    category: &str,
) -> NewTransaction {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc();
    NewTransaction::new(date, description, d(amount), TransactionKind::Expense)
        .with_account(AccountRef::name(account))
        .with_category(CategoryRef::name(category))
}

/// Mock Ollama server answering `/api/generate` with fixed text
pub struct MockOllamaServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start(response: &str) -> Self {
        let app = Router::new()
            .route("/api/generate", post(handle_generate))
            .with_state(Arc::new(response.to_string()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    #[allow(dead_code)]
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

async fn handle_generate(
    State(response): State<Arc<String>>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    Json(GenerateResponse {
        model: request.model,
        response: response.as_str().to_string(),
        done: true,
    })
}
