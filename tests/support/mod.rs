use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use coinbook::clock::{Clock, FixedClock};
use coinbook::error::{FetchError, FetchResult};
use coinbook::models::{Accumulation, BalanceEntry, RawAmount, RawBalanceMap};
use coinbook::providers::BalanceProvider;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// 2024-01-02T03:04:05Z; nonce 1_704_164_645_000_000, millis 1_704_164_645_000.
pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
    ))
}

pub fn write_key_file(dir: &Path, content: &str) -> Result<PathBuf> {
    let path = dir.join("keys");
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Provider returning a fixed raw map.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    pub name: String,
    pub entries: Vec<(String, RawAmount)>,
}

impl StaticProvider {
    pub fn new(name: &str, entries: &[(&str, RawAmount)]) -> Self {
        Self {
            name: name.to_string(),
            entries: entries
                .iter()
                .map(|(symbol, amount)| (symbol.to_string(), amount.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl BalanceProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        let entries = self
            .entries
            .iter()
            .map(|(symbol, amount)| BalanceEntry::new(symbol.clone(), amount.clone()));
        RawBalanceMap::collect(entries, Accumulation::LastWins)
    }
}

/// Provider whose every fetch fails with a network error.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    pub name: String,
}

impl FailingProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl BalanceProvider for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        Err(FetchError::Network(format!("{} is unreachable", self.name)))
    }
}

/// How the fake Bitfinex server behaves after the auth request arrives.
#[derive(Debug, Clone)]
pub enum WsScript {
    /// Accept auth, then push the given frames.
    Frames(Vec<serde_json::Value>),
    /// Accept auth and never send anything else.
    Silent,
    /// Answer auth with a failure.
    RejectAuth,
}

/// Local WebSocket server speaking just enough of the Bitfinex protocol.
///
/// Returns the `ws://` URL and a handle yielding the auth request it saw.
pub async fn spawn_ws_server(
    script: WsScript,
) -> Result<(String, JoinHandle<Option<serde_json::Value>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.ok()?;
        let mut ws = tokio_tungstenite::accept_async(stream).await.ok()?;

        let _ = ws
            .send(Message::Text(
                serde_json::json!({"event": "info", "version": 2}).to_string().into(),
            ))
            .await;

        let auth = loop {
            match ws.next().await? {
                Ok(Message::Text(text)) => {
                    break serde_json::from_str::<serde_json::Value>(&text).ok()?;
                }
                Ok(_) => continue,
                Err(_) => return None,
            }
        };

        let reply = match &script {
            WsScript::RejectAuth => serde_json::json!({
                "event": "auth",
                "status": "FAILED",
                "chanId": 0,
                "code": 10100,
                "msg": "apikey: invalid",
            }),
            _ => serde_json::json!({"event": "auth", "status": "OK", "chanId": 0, "userId": 1}),
        };
        let _ = ws.send(Message::Text(reply.to_string().into())).await;

        if let WsScript::Frames(frames) = &script {
            for frame in frames {
                let _ = ws.send(Message::Text(frame.to_string().into())).await;
            }
        }

        // Hold the connection open until the client hangs up.
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
        Some(auth)
    });

    Ok((format!("ws://{addr}"), handle))
}
