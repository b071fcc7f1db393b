use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use tracing::info;

/// One request/response exchange with a venue
#[derive(Debug, Clone, Serialize)]
pub struct ApiTransaction {
    pub source: String,
    pub action: String,
    pub client_msg_id: Option<String>,
    pub request: Value,
    pub response: Value,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl ApiTransaction {
    pub fn new(source: &str, action: &str, request: Value, response: Value) -> Self {
        Self {
            source: source.to_string(),
            action: action.to_string(),
            client_msg_id: None,
            request,
            response,
            success: true,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_client_msg_id(mut self, client_msg_id: impl Into<String>) -> Self {
        self.client_msg_id = Some(client_msg_id.into());
        self
    }

    #[must_use]
    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Sink for API transaction records
pub trait TransactionLog: Send + Sync {
    fn record(&self, transaction: ApiTransaction);
}

/// Emits each transaction as a structured tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransactionLog;

impl TransactionLog for TracingTransactionLog {
    fn record(&self, transaction: ApiTransaction) {
        info!(
            target: "api_transaction",
            source = %transaction.source,
            action = %transaction.action,
            client_msg_id = transaction.client_msg_id.as_deref().unwrap_or(""),
            success = transaction.success,
            request = %transaction.request,
            response = %transaction.response,
            timestamp = %transaction.timestamp.to_rfc3339(),
            "api transaction"
        );
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryTransactionLog {
    records: Mutex<Vec<ApiTransaction>>,
}

impl MemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ApiTransaction> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl TransactionLog for MemoryTransactionLog {
    fn record(&self, transaction: ApiTransaction) {
        if let Ok(mut records) = self.records.lock() {
            records.push(transaction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_log_keeps_records() {
        let log = MemoryTransactionLog::new();
        log.record(
            ApiTransaction::new(
                "ctrader",
                "ProtoOAAccountAuthReq",
                json!({"ctidTraderAccountId": 1}),
                json!({}),
            )
            .with_client_msg_id("demo#1")
            .failed(),
        );

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "ProtoOAAccountAuthReq");
        assert_eq!(records[0].client_msg_id.as_deref(), Some("demo#1"));
        assert!(!records[0].success);
    }

    #[test]
    fn test_transaction_serializes() {
        let tx = ApiTransaction::new("ctrader", "ProtoOAVersionReq", json!({}), json!({"version": "1"}));
        let value = serde_json::to_value(&tx).unwrap();

        assert_eq!(value["source"], "ctrader");
        assert_eq!(value["response"]["version"], "1");
        assert!(value["timestamp"].is_string());
    }
}
