mod support;

use std::str::FromStr;

use anyhow::Result;
use coinbook::error::FetchError;
use coinbook::providers::{BalanceProvider, BittrexProvider};
use rust_decimal::Decimal;
use secrecy::SecretString;
use support::fixed_clock;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> Result<BittrexProvider> {
    Ok(
        BittrexProvider::new("api-key", SecretString::from("api-secret".to_string()))?
            .with_base_url(server.uri())
            .with_clock(fixed_clock()),
    )
}

#[tokio::test]
async fn bittrex_sums_repeated_currencies() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1.1/account/getbalances"))
        .and(query_param("apikey", "api-key"))
        .and(query_param("nonce", "1704164645000000"))
        .and(header_exists("apisign"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "success": true,
                "message": "",
                "result": [
                    {"Currency": "BTC", "Balance": 0.5, "Available": 0.5},
                    {"Currency": "BTC", "Balance": 0.25, "Available": 0.0},
                    {"Currency": "LTC", "Balance": null},
                    {"Currency": "XMR", "Balance": 12.0}
                ]
            }"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let balances = provider(&server)?.fetch_balances().await?;
    let amount = |symbol: &str| balances.get(symbol).and_then(|a| a.to_decimal());

    assert_eq!(balances.len(), 2);
    assert_eq!(amount("BTC"), Some(Decimal::from_str("0.75")?));
    assert_eq!(amount("XMR"), Some(Decimal::from_str("12")?));
    assert!(balances.get("LTC").is_none());

    Ok(())
}

#[tokio::test]
async fn bittrex_invalid_key_is_auth_error() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1.1/account/getbalances"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"success": false, "message": "APIKEY_INVALID", "result": null}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let err = provider(&server)?.fetch_balances().await.unwrap_err();
    assert!(matches!(err, FetchError::Auth(ref m) if m == "APIKEY_INVALID"), "{err}");

    Ok(())
}

#[tokio::test]
async fn bittrex_other_rejections_are_exchange_errors() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1.1/account/getbalances"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"success": false, "message": "NONCE_USED", "result": null}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let err = provider(&server)?.fetch_balances().await.unwrap_err();
    assert!(matches!(err, FetchError::Exchange(_)), "{err}");

    Ok(())
}
