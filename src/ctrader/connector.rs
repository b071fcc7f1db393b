use crate::core::config::OpenApiConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{Dispatcher, ReqwestRest};
use crate::core::transaction_log::{ApiTransaction, TransactionLog};
use crate::core::types::{HostMode, MessageId};
use crate::ctrader::auth::{OAuthClient, TokenResponse};
use crate::ctrader::builder::CTraderBuilder;
use crate::ctrader::messages::{
    action_name, as_api_error, OpenApiRequest, ProtoMessage, ProtoOaAccountAuthReq,
    ProtoOaAccountLogoutReq, ProtoOaApplicationAuthReq, ProtoOaCtidTraderAccount,
    ProtoOaGetAccountListByAccessTokenReq, ProtoOaVersionReq,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Source tag for API transaction records
pub const TRANSACTION_SOURCE: &str = "ctrader";

/// Authenticated session with one cTrader Open API host
pub struct CTraderOpenApi {
    config: OpenApiConfig,
    dispatcher: Dispatcher<ProtoMessage>,
    auth: OAuthClient<ReqwestRest>,
    transactions: Arc<dyn TransactionLog>,
}

impl CTraderOpenApi {
    /// Connect to the host selected by `config.host_mode` and authorize the
    /// application. Returns the session and the application-auth result.
    pub async fn connect(config: OpenApiConfig) -> Result<(Self, Value), ExchangeError> {
        CTraderBuilder::new(config).connect().await
    }

    pub(crate) fn from_parts(
        config: OpenApiConfig,
        dispatcher: Dispatcher<ProtoMessage>,
        auth: OAuthClient<ReqwestRest>,
        transactions: Arc<dyn TransactionLog>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            auth,
            transactions,
        }
    }

    pub fn host_mode(&self) -> HostMode {
        self.config.host_mode
    }

    pub fn config(&self) -> &OpenApiConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.dispatcher.is_connected()
    }

    /// Build a client message id for this session's host mode
    pub fn get_msg_id(&self, action: Option<&str>, client_msg_id: Option<&str>) -> String {
        MessageId::new(self.config.host_mode, action, client_msg_id).to_string()
    }

    /// Submit a request and wait for its response
    pub async fn send<Req: OpenApiRequest>(
        &self,
        request: &Req,
        client_msg_id: Option<&str>,
    ) -> Result<Req::Response, ExchangeError> {
        let msg_id = self.get_msg_id(Some(&action_name::<Req>()), client_msg_id);
        self.send_with_id(request, msg_id).await
    }

    #[instrument(skip(self, request), fields(exchange = "ctrader", host_mode = %self.config.host_mode, action = Req::NAME))]
    async fn send_with_id<Req: OpenApiRequest>(
        &self,
        request: &Req,
        msg_id: String,
    ) -> Result<Req::Response, ExchangeError> {
        let envelope = ProtoMessage::wrap(request, Some(msg_id));

        let reply = self
            .dispatcher
            .request(envelope, self.config.request_timeout)
            .await
            .map_err(|e| {
                error!("Error: {}", e);
                e
            })?;

        if let Some(err) = as_api_error(&reply) {
            error!("Error: {}", err);
            return Err(err);
        }

        reply.extract::<Req::Response>()
    }

    /// Application auth with the configured client id and secret
    pub async fn authorize_app(&self) -> Result<Value, ExchangeError> {
        let request = ProtoOaApplicationAuthReq {
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret().to_string(),
            ..Default::default()
        };

        let response = self.send(&request, None).await?;
        info!(host_mode = %self.config.host_mode, "Application authorized");
        encode_result(&response)
    }

    /// Account auth for one trader account; recorded in the transaction log
    pub async fn authorize_account(
        &self,
        access_token: &str,
        account_id: u64,
    ) -> Result<Value, ExchangeError> {
        let request = ProtoOaAccountAuthReq {
            ctid_trader_account_id: wire_account_id(account_id)?,
            access_token: access_token.to_string(),
            ..Default::default()
        };
        let action = action_name::<ProtoOaAccountAuthReq>();
        let msg_id = self.get_msg_id(Some(&action), None);
        let request_json = encode_result(&request)?;

        match self.send_with_id(&request, msg_id.clone()).await {
            Ok(response) => {
                let encoded = encode_result(&response)?;
                self.transactions.record(
                    ApiTransaction::new(TRANSACTION_SOURCE, &action, request_json, encoded.clone())
                        .with_client_msg_id(msg_id),
                );
                info!(account_id, "Account authorized");
                Ok(encoded)
            }
            Err(e) => {
                self.transactions.record(
                    ApiTransaction::new(
                        TRANSACTION_SOURCE,
                        &action,
                        request_json,
                        serde_json::json!({ "error": e.to_string() }),
                    )
                    .with_client_msg_id(msg_id)
                    .failed(),
                );
                Err(e)
            }
        }
    }

    /// Protocol version reported by the server
    pub async fn get_version(&self) -> Result<String, ExchangeError> {
        let response = self.send(&ProtoOaVersionReq::default(), None).await?;
        Ok(response.version)
    }

    /// Trader accounts an access token grants access to
    pub async fn get_accounts_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Vec<ProtoOaCtidTraderAccount>, ExchangeError> {
        let request = ProtoOaGetAccountListByAccessTokenReq {
            access_token: access_token.to_string(),
            ..Default::default()
        };
        let response = self.send(&request, None).await?;
        Ok(response.ctid_trader_account)
    }

    /// End the account session opened by [`Self::authorize_account`]
    pub async fn logout_account(&self, account_id: u64) -> Result<(), ExchangeError> {
        let request = ProtoOaAccountLogoutReq {
            ctid_trader_account_id: wire_account_id(account_id)?,
            ..Default::default()
        };
        self.send(&request, None).await?;
        Ok(())
    }

    /// Consent page URL for the `trading` scope
    pub fn get_auth_uri(&self) -> Result<String, ExchangeError> {
        self.auth.get_auth_uri(None)
    }

    pub async fn get_access_token(&self, auth_code: &str) -> Result<TokenResponse, ExchangeError> {
        self.auth.get_access_token(auth_code).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ExchangeError> {
        self.auth.refresh_token(refresh_token).await
    }

    /// Stop heartbeats and close the connection
    pub async fn stop_service(&self) {
        self.dispatcher.shutdown().await;
        info!(host_mode = %self.config.host_mode, "Service stopped");
    }
}

/// Account ids are listed as uint64 but sent as int64
fn wire_account_id(account_id: u64) -> Result<i64, ExchangeError> {
    i64::try_from(account_id).map_err(|_| {
        ExchangeError::InvalidParameters(format!("Account id {} out of range", account_id))
    })
}

/// Message-to-JSON conversion used for results and transaction records
pub fn encode_result<M: Serialize>(message: &M) -> Result<Value, ExchangeError> {
    Ok(serde_json::to_value(message)?)
}
