use anyhow::Context;
use ctrader_openapi::core::config::ConfigError;
use ctrader_openapi::{CTraderOpenApi, HostMode, OpenApiConfig};

#[cfg(feature = "env-file")]
fn load_config() -> Result<OpenApiConfig, ConfigError> {
    OpenApiConfig::from_env_file("CTRADER")
}

#[cfg(not(feature = "env-file"))]
fn load_config() -> Result<OpenApiConfig, ConfigError> {
    OpenApiConfig::from_env("CTRADER")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Reads CTRADER_CLIENT_ID, CTRADER_CLIENT_SECRET, CTRADER_REDIRECT_URL
    let mut config = load_config()
        .context("loading cTrader credentials from the environment")?;

    // Optional first argument overrides the host mode: `demo` or `live`
    if let Some(mode) = std::env::args().nth(1) {
        config = config.host_mode(mode.parse::<HostMode>()?);
    }

    println!("Connecting to {} ({})...", config.host_mode.host(), config.host_mode);
    let (client, app_auth) = CTraderOpenApi::connect(config).await?;
    println!("Application auth: {}", app_auth);

    match client.get_version().await {
        Ok(version) => println!("Server protocol version: {}", version),
        Err(e) => println!("Error fetching version: {}", e),
    }

    println!("Grant access at: {}", client.get_auth_uri()?);

    // Account auth runs only when a token and account are supplied
    if let (Ok(token), Ok(account)) = (
        std::env::var("CTRADER_ACCESS_TOKEN"),
        std::env::var("CTRADER_ACCOUNT_ID"),
    ) {
        let account_id: u64 = account.parse().context("CTRADER_ACCOUNT_ID must be numeric")?;

        match client.get_accounts_by_access_token(&token).await {
            Ok(accounts) => {
                for acc in &accounts {
                    let is_live = acc.is_live.unwrap_or(false);
                    // accounts only authorize on the host matching their environment
                    let marker = if is_live == client.host_mode().is_live() {
                        ""
                    } else {
                        " [other host]"
                    };
                    println!(
                        "Account {} (live: {}){}",
                        acc.ctid_trader_account_id, is_live, marker
                    );
                }
            }
            Err(e) => println!("Error listing accounts: {}", e),
        }

        match client.authorize_account(&token, account_id).await {
            Ok(result) => println!("Account auth: {}", result),
            Err(e) => println!("Account auth failed: {}", e),
        }
    }

    client.stop_service().await;
    Ok(())
}
