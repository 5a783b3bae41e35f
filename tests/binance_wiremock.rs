mod support;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use coinbook::credentials::Credential;
use coinbook::error::FetchError;
use coinbook::registry::{Endpoints, ProviderOptions, ProviderRegistry};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use support::fixed_clock;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry(server: &MockServer) -> ProviderRegistry {
    ProviderRegistry::new(ProviderOptions {
        endpoints: Endpoints {
            binance: Some(server.uri()),
            ..Endpoints::default()
        },
        clock: fixed_clock(),
        ..ProviderOptions::default()
    })
}

fn credential() -> Credential {
    Credential::new("binance", "api-key", "api-secret")
}

fn expected_signature() -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(b"api-secret").expect("hmac accepts any key length");
    mac.update(b"timestamp=1704164645000");
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn binance_keeps_only_positive_free_balances() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .and(query_param("timestamp", "1704164645000"))
        .and(query_param("signature", expected_signature()))
        .and(header("X-MBX-APIKEY", "api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "makerCommission": 10,
                "balances": [
                    {"asset": "BTC", "free": "0.50000000", "locked": "0.00000000"},
                    {"asset": "ETH", "free": "0.00000000", "locked": "1.00000000"},
                    {"asset": "BNB", "free": "1.25000000", "locked": "0.00000000"}
                ]
            }"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let provider = registry(&server).build(&credential())?;
    assert_eq!(provider.name(), "binance");

    let balances = provider.fetch_balances().await?;
    let amount = |symbol: &str| balances.get(symbol).and_then(|a| a.to_decimal());
    assert_eq!(balances.len(), 2);
    assert_eq!(amount("BTC"), Some(Decimal::from_str("0.5")?));
    assert_eq!(amount("BNB"), Some(Decimal::from_str("1.25")?));
    assert!(balances.get("ETH").is_none());

    Ok(())
}

#[tokio::test]
async fn binance_rejected_key_is_auth_error() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(
            r#"{"code": -2015, "msg": "Invalid API-key, IP, or permissions for action."}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let provider = registry(&server).build(&credential())?;
    let err = provider.fetch_balances().await.unwrap_err();
    assert!(matches!(err, FetchError::Auth(ref m) if m.starts_with("[-2015]")), "{err}");

    Ok(())
}

#[tokio::test]
async fn binance_other_api_errors_are_exchange_errors() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(ResponseTemplate::new(400).set_body_raw(
            r#"{"code": -1021, "msg": "Timestamp for this request is outside of the recvWindow."}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let provider = registry(&server).build(&credential())?;
    let err = provider.fetch_balances().await.unwrap_err();
    assert!(matches!(err, FetchError::Exchange(_)), "{err}");

    Ok(())
}

#[tokio::test]
async fn binance_slow_response_hits_configured_http_timeout() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"balances": []}"#, "application/json")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let registry = ProviderRegistry::new(ProviderOptions {
        http_timeout: Duration::from_millis(200),
        endpoints: Endpoints {
            binance: Some(server.uri()),
            ..Endpoints::default()
        },
        clock: fixed_clock(),
        ..ProviderOptions::default()
    });
    let provider = registry.build(&credential())?;
    let err = provider.fetch_balances().await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "{err}");

    Ok(())
}
