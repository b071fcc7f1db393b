//! Synchronous facade over [`CTraderOpenApi`].
//!
//! The session runs on a private multi-thread runtime: reading frames and
//! heartbeats continue on its worker threads between calls, while each method
//! here blocks the calling thread until the response arrives or the request
//! timeout elapses. Do not construct or drop this type from inside an async
//! context.

use crate::core::config::OpenApiConfig;
use crate::core::errors::ExchangeError;
use crate::core::types::HostMode;
use crate::ctrader::auth::TokenResponse;
use crate::ctrader::builder::CTraderBuilder;
use crate::ctrader::connector::CTraderOpenApi;
use crate::ctrader::messages::{OpenApiRequest, ProtoOaCtidTraderAccount};
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

pub struct BlockingCTraderOpenApi {
    inner: CTraderOpenApi,
    runtime: Runtime,
}

impl BlockingCTraderOpenApi {
    /// Connect and authorize the application, blocking until done
    pub fn connect(config: OpenApiConfig) -> Result<(Self, Value), ExchangeError> {
        Self::connect_with(CTraderBuilder::new(config))
    }

    pub fn connect_with(builder: CTraderBuilder) -> Result<(Self, Value), ExchangeError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ctrader-reactor")
            .enable_all()
            .build()?;

        let (inner, result) = runtime.block_on(builder.connect())?;
        Ok((Self { inner, runtime }, result))
    }

    pub fn host_mode(&self) -> HostMode {
        self.inner.host_mode()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn get_msg_id(&self, action: Option<&str>, client_msg_id: Option<&str>) -> String {
        self.inner.get_msg_id(action, client_msg_id)
    }

    pub fn send<Req: OpenApiRequest>(
        &self,
        request: &Req,
        client_msg_id: Option<&str>,
    ) -> Result<Req::Response, ExchangeError> {
        self.runtime.block_on(self.inner.send(request, client_msg_id))
    }

    pub fn authorize_app(&self) -> Result<Value, ExchangeError> {
        self.runtime.block_on(self.inner.authorize_app())
    }

    pub fn authorize_account(&self, access_token: &str, account_id: u64) -> Result<Value, ExchangeError> {
        self.runtime
            .block_on(self.inner.authorize_account(access_token, account_id))
    }

    pub fn get_version(&self) -> Result<String, ExchangeError> {
        self.runtime.block_on(self.inner.get_version())
    }

    pub fn get_accounts_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Vec<ProtoOaCtidTraderAccount>, ExchangeError> {
        self.runtime
            .block_on(self.inner.get_accounts_by_access_token(access_token))
    }

    pub fn logout_account(&self, account_id: u64) -> Result<(), ExchangeError> {
        self.runtime.block_on(self.inner.logout_account(account_id))
    }

    pub fn get_auth_uri(&self) -> Result<String, ExchangeError> {
        self.inner.get_auth_uri()
    }

    pub fn get_access_token(&self, auth_code: &str) -> Result<TokenResponse, ExchangeError> {
        self.runtime.block_on(self.inner.get_access_token(auth_code))
    }

    pub fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ExchangeError> {
        self.runtime.block_on(self.inner.refresh_token(refresh_token))
    }

    pub fn stop_service(&self) {
        self.runtime.block_on(self.inner.stop_service());
    }
}
