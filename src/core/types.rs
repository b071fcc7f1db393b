use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Port serving the protobuf-over-TLS protocol on both hosts
pub const PROTOBUF_PORT: u16 = 5035;

pub const DEMO_HOST: &str = "demo.ctraderapi.com";
pub const LIVE_HOST: &str = "live.ctraderapi.com";

const ACTION_PREFIX: &str = "Proto";

/// Trading environment selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    #[default]
    Demo,
    Live,
}

impl HostMode {
    /// Network host for this environment
    pub const fn host(self) -> &'static str {
        match self {
            Self::Demo => DEMO_HOST,
            Self::Live => LIVE_HOST,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Live => "live",
        }
    }

    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for HostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown host mode '{0}', expected 'demo' or 'live'")]
pub struct ParseHostModeError(pub String);

impl FromStr for HostMode {
    type Err = ParseHostModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(Self::Demo),
            "live" => Ok(Self::Live),
            _ => Err(ParseHostModeError(s.to_string())),
        }
    }
}

/// Client message id attached to every outbound request.
///
/// Rendered as `{host_mode}#{uuid}#{action}#{client_msg_id}`, where the
/// `action` and `client_msg_id` segments are left out when absent. The venue
/// echoes this id on the matching response, which is how responses are
/// routed back to the waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId {
    pub host_mode: HostMode,
    pub id: Uuid,
    pub action: Option<String>,
    pub client_msg_id: Option<String>,
}

impl MessageId {
    pub fn new(host_mode: HostMode, action: Option<&str>, client_msg_id: Option<&str>) -> Self {
        Self {
            host_mode,
            id: Uuid::new_v4(),
            action: non_empty(action),
            client_msg_id: non_empty(client_msg_id),
        }
    }

    /// Split a rendered id back into its parts.
    ///
    /// Action segments are protocol message names, so a segment after the
    /// uuid is read as the action only when it starts with `Proto`.
    /// Anything else, `#` included, is the caller's client message id.
    /// Returns `None` when the id was not produced by [`MessageId`].
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '#');
        let host_mode = parts.next()?.parse().ok()?;
        let id = Uuid::parse_str(parts.next()?).ok()?;

        let (action, client_msg_id) = match parts.next() {
            Some(rest) if rest.starts_with(ACTION_PREFIX) => match rest.split_once('#') {
                Some((action, client)) => (non_empty(Some(action)), non_empty(Some(client))),
                None => (non_empty(Some(rest)), None),
            },
            rest => (None, non_empty(rest)),
        };

        Some(Self {
            host_mode,
            id,
            action,
            client_msg_id,
        })
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.host_mode, self.id)?;
        if let Some(action) = &self.action {
            write!(f, "#{}", action)?;
        }
        if let Some(client_msg_id) = &self.client_msg_id {
            write!(f, "#{}", client_msg_id)?;
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
