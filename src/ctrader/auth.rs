use crate::core::config::OpenApiConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

pub const AUTH_BASE_URI: &str = "https://id.ctrader.com";
pub const TOKEN_BASE_URI: &str = "https://openapi.ctrader.com";
pub const TOKEN_ENDPOINT: &str = "/apps/token";
pub const DEFAULT_SCOPE: &str = "trading";

/// Body returned by the token endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: Option<Secret<String>>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<Secret<String>>,
    pub error_code: Option<String>,
    pub description: Option<String>,
}

impl TokenResponse {
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().as_str())
    }
}

/// OAuth helper for the authorization-code grant
pub struct OAuthClient<R: RestClient> {
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    rest: R,
}

impl OAuthClient<ReqwestRest> {
    /// Create a helper talking to the public token endpoint
    pub fn from_config(config: &OpenApiConfig) -> Result<Self, ExchangeError> {
        let rest_config =
            RestClientConfig::new(TOKEN_BASE_URI.to_string(), "ctrader".to_string())
                .with_timeout(config.request_timeout.as_secs().max(1));
        let rest = RestClientBuilder::new(rest_config).build()?;
        Ok(Self::new(config, rest))
    }
}

impl<R: RestClient> OAuthClient<R> {
    pub fn new(config: &OpenApiConfig, rest: R) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            rest,
        }
    }

    /// URL the account owner visits to grant this application access
    pub fn get_auth_uri(&self, scope: Option<&str>) -> Result<String, ExchangeError> {
        let base = format!("{}/my/settings/openapi/grantingaccess/", AUTH_BASE_URI);
        let url = reqwest::Url::parse_with_params(
            &base,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.unwrap_or(DEFAULT_SCOPE)),
                ("product", "web"),
            ],
        )
        .map_err(|e| ExchangeError::InvalidParameters(format!("Invalid auth URI: {}", e)))?;

        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens
    #[instrument(skip(self, auth_code), fields(exchange = "ctrader"))]
    pub async fn get_token(&self, auth_code: &str) -> Result<TokenResponse, ExchangeError> {
        let body = self.exchange_code(auth_code).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Exchange an authorization code and require an access token in the reply
    #[instrument(skip(self, auth_code), fields(exchange = "ctrader"))]
    pub async fn get_access_token(&self, auth_code: &str) -> Result<TokenResponse, ExchangeError> {
        let body = self.exchange_code(auth_code).await?;

        if body.get("accessToken").map_or(true, Value::is_null) {
            warn!("Token response without access token");
            return Err(ExchangeError::MissingAccessToken(body));
        }
        Ok(serde_json::from_value(body)?)
    }

    /// Obtain a fresh access token from a refresh token
    #[instrument(skip(self, refresh_token), fields(exchange = "ctrader"))]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ExchangeError> {
        self.rest
            .get_json(
                TOKEN_ENDPOINT,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose_secret()),
                ],
            )
            .await
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<Value, ExchangeError> {
        self.rest
            .get(
                TOKEN_ENDPOINT,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", auth_code),
                    ("redirect_uri", self.redirect_uri.as_str()),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose_secret()),
                ],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedRest {
        body: Value,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl CannedRest {
        fn new(body: Value) -> Self {
            Self {
                body,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn last_param(&self, key: &str) -> Option<String> {
            let calls = self.calls.lock().unwrap();
            let (_, params) = calls.last()?;
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[async_trait]
    impl RestClient for CannedRest {
        async fn get(
            &self,
            endpoint: &str,
            query_params: &[(&str, &str)],
        ) -> Result<Value, ExchangeError> {
            self.calls.lock().unwrap().push((
                endpoint.to_string(),
                query_params
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ));
            Ok(self.body.clone())
        }
    }

    fn config() -> OpenApiConfig {
        OpenApiConfig::new(
            "1234_abc".to_string(),
            "shh".to_string(),
            "http://localhost:8080/callback".to_string(),
        )
    }

    #[test]
    fn test_auth_uri() {
        let auth = OAuthClient::new(&config(), CannedRest::new(json!({})));
        let uri = auth.get_auth_uri(None).unwrap();

        assert!(uri.starts_with("https://id.ctrader.com/my/settings/openapi/grantingaccess/?"));
        assert!(uri.contains("client_id=1234_abc"));
        assert!(uri.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback"));
        assert!(uri.contains("scope=trading"));
        assert!(uri.contains("product=web"));
    }

    #[test]
    fn test_auth_uri_custom_scope() {
        let auth = OAuthClient::new(&config(), CannedRest::new(json!({})));
        assert!(auth
            .get_auth_uri(Some("accounts"))
            .unwrap()
            .contains("scope=accounts"));
    }

    #[tokio::test]
    async fn test_get_access_token() {
        let rest = CannedRest::new(json!({
            "accessToken": "at-1",
            "tokenType": "bearer",
            "expiresIn": 2_628_000,
            "refreshToken": "rt-1",
            "errorCode": null,
            "description": null
        }));
        let auth = OAuthClient::new(&config(), rest);

        let token = auth.get_access_token("code-1").await.unwrap();
        assert_eq!(token.access_token(), Some("at-1"));
        assert_eq!(token.refresh_token(), Some("rt-1"));
        assert_eq!(token.expires_in, Some(2_628_000));

        assert_eq!(
            auth.rest.last_param("grant_type").as_deref(),
            Some("authorization_code")
        );
        assert_eq!(auth.rest.last_param("code").as_deref(), Some("code-1"));
    }

    #[tokio::test]
    async fn test_missing_access_token_is_error() {
        let rest = CannedRest::new(json!({
            "errorCode": "ACCESS_DENIED",
            "description": "Invalid authorization code"
        }));
        let auth = OAuthClient::new(&config(), rest);

        match auth.get_access_token("bad").await {
            Err(ExchangeError::MissingAccessToken(body)) => {
                assert_eq!(body["errorCode"], "ACCESS_DENIED");
            }
            other => panic!("Expected missing access token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_token_passes_errors_through() {
        let rest = CannedRest::new(json!({"errorCode": "ACCESS_DENIED"}));
        let auth = OAuthClient::new(&config(), rest);

        let token = auth.get_token("bad").await.unwrap();
        assert!(token.access_token().is_none());
        assert_eq!(token.error_code.as_deref(), Some("ACCESS_DENIED"));
    }

    #[tokio::test]
    async fn test_refresh_token() {
        let rest = CannedRest::new(json!({"accessToken": "at-2", "refreshToken": "rt-2"}));
        let auth = OAuthClient::new(&config(), rest);

        let token = auth.refresh_token("rt-1").await.unwrap();
        assert_eq!(token.access_token(), Some("at-2"));
        assert_eq!(
            auth.rest.last_param("grant_type").as_deref(),
            Some("refresh_token")
        );
        assert_eq!(auth.rest.last_param("refresh_token").as_deref(), Some("rt-1"));
    }
}
