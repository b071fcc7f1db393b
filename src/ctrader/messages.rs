//! Protocol messages used by the connector.
//!
//! Field numbers and payload types follow `OpenApiCommonMessages.proto` and
//! `OpenApiMessages.proto`. Only the messages the connector sends or expects
//! back are declared here.

use crate::core::kernel::Envelope;
use serde::Serialize;

/// Payload type identifiers carried in [`ProtoMessage::payload_type`]
pub mod payload_type {
    pub const ERROR_RES: u32 = 50;
    pub const HEARTBEAT_EVENT: u32 = 51;

    pub const OA_APPLICATION_AUTH_REQ: u32 = 2100;
    pub const OA_APPLICATION_AUTH_RES: u32 = 2101;
    pub const OA_ACCOUNT_AUTH_REQ: u32 = 2102;
    pub const OA_ACCOUNT_AUTH_RES: u32 = 2103;
    pub const OA_VERSION_REQ: u32 = 2104;
    pub const OA_VERSION_RES: u32 = 2105;
    pub const OA_ERROR_RES: u32 = 2142;
    pub const OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_REQ: u32 = 2149;
    pub const OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_RES: u32 = 2150;
    pub const OA_ACCOUNT_LOGOUT_REQ: u32 = 2162;
    pub const OA_ACCOUNT_LOGOUT_RES: u32 = 2163;
    pub const OA_ACCOUNT_DISCONNECT_EVENT: u32 = 2164;
}

/// Outer wrapper of every frame on the wire
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoMessage {
    #[prost(uint32, required, tag = "1")]
    pub payload_type: u32,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub payload: Option<Vec<u8>>,
    #[prost(string, optional, tag = "3")]
    pub client_msg_id: Option<String>,
}

impl ProtoMessage {
    /// Wrap an inner message
    pub fn wrap<M: Payload>(message: &M, client_msg_id: Option<String>) -> Self {
        Self {
            payload_type: M::PAYLOAD_TYPE,
            payload: Some(prost::Message::encode_to_vec(message)),
            client_msg_id,
        }
    }

    /// Decode the inner message, checking the payload type first
    pub fn extract<M: Payload>(&self) -> Result<M, crate::core::errors::ExchangeError> {
        if self.payload_type != M::PAYLOAD_TYPE {
            return Err(crate::core::errors::ExchangeError::UnexpectedPayload {
                expected: M::PAYLOAD_TYPE,
                actual: self.payload_type,
            });
        }
        let bytes = self.payload.as_deref().unwrap_or_default();
        Ok(<M as prost::Message>::decode(bytes)?)
    }
}

impl Envelope for ProtoMessage {
    fn correlation_id(&self) -> Option<&str> {
        self.client_msg_id.as_deref()
    }

    fn is_heartbeat(&self) -> bool {
        self.payload_type == payload_type::HEARTBEAT_EVENT
    }

    fn heartbeat() -> Self {
        Self::wrap(&ProtoHeartbeatEvent::default(), None)
    }
}

/// A message that travels inside [`ProtoMessage::payload`]
pub trait Payload: prost::Message + Default + Serialize {
    const PAYLOAD_TYPE: u32;
    const NAME: &'static str;
}

/// A request that the venue answers with a single response message
pub trait OpenApiRequest: Payload {
    type Response: Payload;
}

macro_rules! payload {
    ($ty:ident, $code:expr) => {
        impl Payload for $ty {
            const PAYLOAD_TYPE: u32 = $code;
            const NAME: &'static str = stringify!($ty);
        }
    };
}

macro_rules! request {
    ($req:ident => $res:ident) => {
        impl OpenApiRequest for $req {
            type Response = $res;
        }
    };
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoHeartbeatEvent {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoErrorRes {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(string, required, tag = "2")]
    pub error_code: String,
    #[prost(string, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[prost(uint64, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_end_timestamp: Option<u64>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaErrorRes {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(int64, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(string, required, tag = "3")]
    pub error_code: String,
    #[prost(string, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[prost(int64, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_end_timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaApplicationAuthReq {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(string, required, tag = "2")]
    pub client_id: String,
    #[prost(string, required, tag = "3")]
    #[serde(skip_serializing)]
    pub client_secret: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaApplicationAuthRes {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaAccountAuthReq {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(string, required, tag = "3")]
    #[serde(skip_serializing)]
    pub access_token: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaAccountAuthRes {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaVersionReq {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaVersionRes {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(string, required, tag = "2")]
    pub version: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaGetAccountListByAccessTokenReq {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(string, required, tag = "2")]
    #[serde(skip_serializing)]
    pub access_token: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaCtidTraderAccount {
    #[prost(uint64, required, tag = "1")]
    pub ctid_trader_account_id: u64,
    #[prost(bool, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[prost(int64, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trader_login: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_closing_deal_timestamp: Option<i64>,
    #[prost(int64, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_balance_update_timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaGetAccountListByAccessTokenRes {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(string, required, tag = "2")]
    #[serde(skip_serializing)]
    pub access_token: String,
    #[prost(int32, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_scope: Option<i32>,
    #[prost(message, repeated, tag = "4")]
    pub ctid_trader_account: Vec<ProtoOaCtidTraderAccount>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaAccountLogoutReq {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoOaAccountLogoutRes {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<i32>,
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
}

payload!(ProtoHeartbeatEvent, payload_type::HEARTBEAT_EVENT);
payload!(ProtoErrorRes, payload_type::ERROR_RES);
payload!(ProtoOaErrorRes, payload_type::OA_ERROR_RES);
payload!(ProtoOaApplicationAuthReq, payload_type::OA_APPLICATION_AUTH_REQ);
payload!(ProtoOaApplicationAuthRes, payload_type::OA_APPLICATION_AUTH_RES);
payload!(ProtoOaAccountAuthReq, payload_type::OA_ACCOUNT_AUTH_REQ);
payload!(ProtoOaAccountAuthRes, payload_type::OA_ACCOUNT_AUTH_RES);
payload!(ProtoOaVersionReq, payload_type::OA_VERSION_REQ);
payload!(ProtoOaVersionRes, payload_type::OA_VERSION_RES);
payload!(
    ProtoOaGetAccountListByAccessTokenReq,
    payload_type::OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_REQ
);
payload!(
    ProtoOaGetAccountListByAccessTokenRes,
    payload_type::OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_RES
);
payload!(ProtoOaAccountLogoutReq, payload_type::OA_ACCOUNT_LOGOUT_REQ);
payload!(ProtoOaAccountLogoutRes, payload_type::OA_ACCOUNT_LOGOUT_RES);

request!(ProtoOaApplicationAuthReq => ProtoOaApplicationAuthRes);
request!(ProtoOaAccountAuthReq => ProtoOaAccountAuthRes);
request!(ProtoOaVersionReq => ProtoOaVersionRes);
request!(ProtoOaGetAccountListByAccessTokenReq => ProtoOaGetAccountListByAccessTokenRes);
request!(ProtoOaAccountLogoutReq => ProtoOaAccountLogoutRes);

/// Action name used in client message ids, e.g. `ProtoOAAccountAuthReq`
pub fn action_name<M: Payload>() -> String {
    M::NAME.replacen("ProtoOa", "ProtoOA", 1)
}

/// Interpret an error response, if the envelope carries one
pub fn as_api_error(message: &ProtoMessage) -> Option<crate::core::errors::ExchangeError> {
    use crate::core::errors::ExchangeError;

    match message.payload_type {
        payload_type::OA_ERROR_RES => {
            let err = message.extract::<ProtoOaErrorRes>().ok()?;
            Some(ExchangeError::ApiError {
                code: err.error_code,
                description: err.description.unwrap_or_default(),
            })
        }
        payload_type::ERROR_RES => {
            let err = message.extract::<ProtoErrorRes>().ok()?;
            Some(ExchangeError::ApiError {
                code: err.error_code,
                description: err.description.unwrap_or_default(),
            })
        }
        _ => None,
    }
}
