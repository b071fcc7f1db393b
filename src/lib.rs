pub mod core;
pub mod ctrader;

pub use self::core::{
    config::OpenApiConfig,
    errors::ExchangeError,
    types::{HostMode, MessageId},
};
pub use ctrader::{BlockingCTraderOpenApi, CTraderBuilder, CTraderOpenApi};
