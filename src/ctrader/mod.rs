pub mod auth;
pub mod blocking;
pub mod builder;
pub mod connector;
pub mod messages;

// Re-export main types for easier importing
pub use auth::{OAuthClient, TokenResponse};
pub use blocking::BlockingCTraderOpenApi;
pub use builder::CTraderBuilder;
pub use connector::{encode_result, CTraderOpenApi, TRANSACTION_SOURCE};
pub use messages::{OpenApiRequest, Payload, ProtoMessage};
