mod support;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use coinbook::credentials::Credential;
use coinbook::error::FetchError;
use coinbook::registry::{Endpoints, ProviderOptions, ProviderRegistry};
use rust_decimal::Decimal;
use serde_json::json;
use support::{fixed_clock, spawn_ws_server, WsScript};

fn registry(url: String, session_timeout: Duration) -> ProviderRegistry {
    ProviderRegistry::new(ProviderOptions {
        session_timeout,
        endpoints: Endpoints {
            bitfinex_ws: Some(url),
            ..Endpoints::default()
        },
        clock: fixed_clock(),
        ..ProviderOptions::default()
    })
}

fn credential() -> Credential {
    Credential::new("bitfinex", "api-key", "api-secret")
}

#[tokio::test]
async fn bitfinex_sums_wallets_from_snapshot() -> Result<()> {
    let snapshot = json!([0, "ws", [
        ["exchange", "IOT", 408.54209381, 0, null],
        ["funding", "IOT", "0.5", 0, null],
        ["exchange", "BTC", 0.25, 0, null]
    ]]);
    let (url, server) = spawn_ws_server(WsScript::Frames(vec![json!([0, "hb"]), snapshot])).await?;

    let provider = registry(url, Duration::from_secs(5)).build(&credential())?;
    let balances = provider.fetch_balances().await?;
    let amount = |symbol: &str| balances.get(symbol).and_then(|a| a.to_decimal());

    assert_eq!(balances.len(), 2);
    assert_eq!(amount("IOT"), Some(Decimal::from_str("409.04209381")?));
    assert_eq!(amount("BTC"), Some(Decimal::from_str("0.25")?));

    let auth = server.await?.expect("server saw an auth request");
    assert_eq!(auth["event"], "auth");
    assert_eq!(auth["apiKey"], "api-key");
    assert_eq!(auth["authPayload"], "AUTH1704164645000000");
    assert_eq!(auth["authNonce"], 1_704_164_645_000_000u64);
    assert_eq!(auth["filter"], json!(["wallet"]));

    Ok(())
}

#[tokio::test]
async fn bitfinex_silence_until_deadline_is_empty_not_error() -> Result<()> {
    let (url, server) = spawn_ws_server(WsScript::Silent).await?;

    let provider = registry(url, Duration::from_millis(200)).build(&credential())?;
    let balances = provider.fetch_balances().await?;
    assert!(balances.is_empty());

    // The socket is closed once the deadline passes, so the server finishes.
    let auth = tokio::time::timeout(Duration::from_secs(5), server).await??;
    assert!(auth.is_some());

    Ok(())
}

#[tokio::test]
async fn bitfinex_rejected_auth_is_auth_error() -> Result<()> {
    let (url, server) = spawn_ws_server(WsScript::RejectAuth).await?;

    let provider = registry(url, Duration::from_secs(5)).build(&credential())?;
    let err = provider.fetch_balances().await.unwrap_err();
    assert!(matches!(err, FetchError::Auth(ref m) if m == "apikey: invalid"), "{err}");

    tokio::time::timeout(Duration::from_secs(5), server).await??;
    Ok(())
}

#[tokio::test]
async fn bitfinex_unreachable_server_is_network_error() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let url = format!("ws://{}", listener.local_addr()?);
    drop(listener);

    let provider = registry(url, Duration::from_secs(5)).build(&credential())?;
    let err = provider.fetch_balances().await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "{err}");

    Ok(())
}
