use crate::core::config::OpenApiConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    Dispatcher, DispatcherConfig, ProtoTransport, SessionEvent, TcpTransport,
};
use crate::core::transaction_log::{TracingTransactionLog, TransactionLog};
use crate::core::types::PROTOBUF_PORT;
use crate::ctrader::auth::OAuthClient;
use crate::ctrader::connector::CTraderOpenApi;
use crate::ctrader::messages::ProtoMessage;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument};

/// Builder for [`CTraderOpenApi`] sessions
pub struct CTraderBuilder {
    config: OpenApiConfig,
    transport: Option<Arc<dyn ProtoTransport>>,
    dispatcher_config: DispatcherConfig,
    transactions: Arc<dyn TransactionLog>,
    events: Option<mpsc::Sender<SessionEvent<ProtoMessage>>>,
}

impl CTraderBuilder {
    pub fn new(config: OpenApiConfig) -> Self {
        Self {
            config,
            transport: None,
            dispatcher_config: DispatcherConfig::default(),
            transactions: Arc::new(TracingTransactionLog),
            events: None,
        }
    }

    /// Replace the TLS connection to the venue host, e.g. with a local proxy
    pub fn with_transport(mut self, transport: Arc<dyn ProtoTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher_config = config;
        self
    }

    pub fn with_transaction_log(mut self, log: Arc<dyn TransactionLog>) -> Self {
        self.transactions = log;
        self
    }

    /// Receive messages that are not replies (spot events, execution events)
    /// and the disconnect notification
    pub fn with_event_sender(mut self, sender: mpsc::Sender<SessionEvent<ProtoMessage>>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Open the connection without authorizing the application
    #[instrument(skip(self), fields(exchange = "ctrader", host_mode = %self.config.host_mode))]
    pub async fn build(self) -> Result<CTraderOpenApi, ExchangeError> {
        if !self.config.has_credentials() {
            return Err(ExchangeError::AuthError(
                "client id and client secret are required".to_string(),
            ));
        }

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(TcpTransport::new(
                self.config.host_mode.host(),
                PROTOBUF_PORT,
            ))
        });

        let auth = OAuthClient::from_config(&self.config)?;
        let stream = transport.connect().await?;
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "Connected");

        let dispatcher = Dispatcher::start(stream, endpoint, self.dispatcher_config, self.events);

        Ok(CTraderOpenApi::from_parts(
            self.config,
            dispatcher,
            auth,
            self.transactions,
        ))
    }

    /// Open the connection and authorize the application
    pub async fn connect(self) -> Result<(CTraderOpenApi, Value), ExchangeError> {
        let client = self.build().await?;
        match client.authorize_app().await {
            Ok(result) => Ok((client, result)),
            Err(e) => {
                client.stop_service().await;
                Err(e)
            }
        }
    }
}
