//! Bitfinex balance provider over the authenticated WebSocket API.
//!
//! Bitfinex pushes a wallet snapshot (`[0, "ws", [...]]`) shortly after a
//! successful `auth` event. The provider opens one session per fetch, waits
//! for that snapshot under a deadline and always closes the socket again.
//! No snapshot before the deadline means an empty balance map, not an error.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;
use crate::duration::format_duration;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::models::{Accumulation, BalanceEntry, RawAmount, RawBalanceMap};

use super::session::{
    LiveSession, SessionConnector, WalletRow, WalletSession, DEFAULT_SESSION_TIMEOUT,
};
use super::signing::hmac_sha384_hex;
use super::{require_non_empty, BalanceProvider};

const BITFINEX_WS_URL: &str = "wss://api.bitfinex.com/ws/2";

/// Opens authenticated Bitfinex WebSocket sessions.
#[derive(Clone)]
pub struct BitfinexWsConnector {
    url: String,
    api_key: String,
    api_secret: SecretString,
    clock: Arc<dyn Clock>,
}

impl BitfinexWsConnector {
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        require_non_empty("bitfinex", "api_key", &api_key)?;
        require_non_empty("bitfinex", "api_secret", api_secret.expose_secret())?;

        Ok(Self {
            url: BITFINEX_WS_URL.to_string(),
            api_key,
            api_secret,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn auth_message(&self) -> FetchResult<Value> {
        let nonce = self.clock.nonce();
        let payload = format!("AUTH{nonce}");
        let signature = hmac_sha384_hex(self.api_secret.expose_secret().as_bytes(), &payload)?;
        Ok(json!({
            "event": "auth",
            "apiKey": self.api_key,
            "authSig": signature,
            "authPayload": payload,
            "authNonce": nonce,
            "filter": ["wallet"],
        }))
    }
}

#[async_trait::async_trait]
impl SessionConnector for BitfinexWsConnector {
    async fn connect(&self) -> FetchResult<Box<dyn WalletSession>> {
        debug!(url = %self.url, "connecting to Bitfinex");
        let (stream, _) = connect_async(self.url.as_str()).await?;
        Ok(Box::new(BitfinexWsSession {
            stream,
            auth: self.auth_message()?,
        }))
    }
}

struct BitfinexWsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    auth: Value,
}

impl BitfinexWsSession {
    async fn next_json(&mut self) -> FetchResult<Value> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| FetchError::Parse(format!("invalid frame: {e}")));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(FetchError::Network("connection closed by server".to_string()));
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }
}

#[async_trait::async_trait]
impl WalletSession for BitfinexWsSession {
    async fn authenticate(&mut self) -> FetchResult<()> {
        let auth = self.auth.to_string();
        self.stream.send(Message::Text(auth.into())).await?;

        loop {
            let message = self.next_json().await?;
            if message.get("event").and_then(Value::as_str) != Some("auth") {
                continue;
            }
            return match message.get("status").and_then(Value::as_str) {
                Some("OK") => Ok(()),
                _ => Err(FetchError::Auth(
                    message
                        .get("msg")
                        .and_then(Value::as_str)
                        .unwrap_or("authentication rejected")
                        .to_string(),
                )),
            };
        }
    }

    async fn wallet_snapshot(&mut self) -> FetchResult<Vec<WalletRow>> {
        loop {
            let message = self.next_json().await?;
            if let Some(rows) = parse_wallet_snapshot(&message)? {
                return Ok(rows);
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(error = %err, "closing Bitfinex session");
        }
    }
}

/// Recognize `[chan_id, "ws", [[type, currency, balance, ...], ...]]`.
fn parse_wallet_snapshot(message: &Value) -> FetchResult<Option<Vec<WalletRow>>> {
    let Some(frame) = message.as_array() else {
        return Ok(None);
    };
    if frame.get(1).and_then(Value::as_str) != Some("ws") {
        return Ok(None);
    }
    let rows = frame
        .get(2)
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Parse("wallet snapshot is not a list".to_string()))?;

    Ok(Some(rows.iter().filter_map(parse_wallet_row).collect()))
}

fn parse_wallet_row(row: &Value) -> Option<WalletRow> {
    let fields = row.as_array()?;
    Some(WalletRow {
        wallet_type: fields.first()?.as_str()?.to_string(),
        currency: fields.get(1)?.as_str()?.to_string(),
        balance: RawAmount::from_json(fields.get(2)?),
    })
}

pub struct BitfinexProvider {
    connector: Arc<dyn SessionConnector>,
    session_timeout: Duration,
}

impl BitfinexProvider {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    pub fn from_credential(credential: &Credential) -> Result<Self, ConfigError> {
        let connector =
            BitfinexWsConnector::new(credential.api_key.clone(), credential.api_secret.clone())?;
        Ok(Self::new(Arc::new(connector)))
    }

    /// Deadline for connecting, authenticating and receiving the snapshot.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl BalanceProvider for BitfinexProvider {
    fn name(&self) -> &str {
        "bitfinex"
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        let mut session = LiveSession::new(self.session_timeout);
        let Some(rows) = session.run(self.connector.as_ref()).await? else {
            info!(
                provider = "bitfinex",
                timeout = %format_duration(self.session_timeout),
                "no wallet snapshot before deadline; reporting no balances"
            );
            return Ok(RawBalanceMap::new());
        };

        // Exchange, margin and funding wallets report the same currency separately.
        let entries = rows.into_iter().map(|row| BalanceEntry {
            symbol: row.currency,
            amount: row.balance,
        });
        let balances = RawBalanceMap::collect(entries, Accumulation::Sum)?;
        debug!(provider = "bitfinex", currencies = balances.len(), "fetched balances");
        Ok(balances)
    }
}
