use ctrader_openapi::{CTraderOpenApi, HostMode, OpenApiConfig};
use std::env;
use std::time::Duration;
use tokio::time::timeout;

/// Check if live API tests should run (requires real application credentials)
fn should_run_live_tests() -> bool {
    env::var("RUN_LIVE_TESTS").unwrap_or_default() == "true"
}

fn live_config() -> Option<OpenApiConfig> {
    if !should_run_live_tests() {
        println!("⚠️ Skipping live test: set RUN_LIVE_TESTS=true to enable");
        return None;
    }
    match OpenApiConfig::from_env("CTRADER") {
        Ok(config) => Some(config.host_mode(HostMode::Demo)),
        Err(e) => {
            println!("⚠️ Skipping live test: {}", e);
            None
        }
    }
}

#[tokio::test]
async fn test_demo_application_auth() {
    let Some(config) = live_config() else {
        return;
    };

    let result = timeout(Duration::from_secs(30), CTraderOpenApi::connect(config)).await;

    match result {
        Ok(Ok((client, app_auth))) => {
            println!("✅ Demo application auth: {}", app_auth);
            let version = client.get_version().await.unwrap();
            assert!(!version.is_empty());
            client.stop_service().await;
        }
        Ok(Err(e)) => panic!("❌ Demo application auth failed: {}", e),
        Err(_) => panic!("❌ Demo application auth timed out"),
    }
}

#[tokio::test]
async fn test_demo_account_auth() {
    let Some(config) = live_config() else {
        return;
    };
    let (Ok(token), Ok(account)) = (
        env::var("CTRADER_ACCESS_TOKEN"),
        env::var("CTRADER_ACCOUNT_ID"),
    ) else {
        println!("⚠️ Skipping account auth: CTRADER_ACCESS_TOKEN / CTRADER_ACCOUNT_ID not set");
        return;
    };

    let (client, _) = CTraderOpenApi::connect(config).await.unwrap();
    let result = client
        .authorize_account(&token, account.parse().unwrap())
        .await;

    match result {
        Ok(value) => println!("✅ Account auth: {}", value),
        Err(e) => println!("⚠️ Account auth failed: {}", e),
    }
    client.stop_service().await;
}
