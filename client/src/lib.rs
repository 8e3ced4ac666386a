extern crate self as batchwire_client;

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
mod dispatcher;
pub mod encoder;
pub mod error;
pub mod events;
mod queue;
pub mod record;
pub mod response;
pub mod result;
pub mod transport;
pub mod value;

#[cfg(test)]
mod tests;

pub use cache::CachePolicy;
pub use client::Client;
pub use config::Config;
pub use error::{EncodeError, Error, TransportError};
pub use record::{CallHandle, CallRecord};
pub use response::{CallResult, STAT_OK};
pub use result::Result;
pub use transport::{DynTransport, ExchangeRequest, Transport};
pub use value::{ParamMap, ParamValue};
