//! HTTP plumbing for talking to the audiobook server

mod client;
mod error;
mod retry;

pub use client::{Client, ClientConfig};
pub use error::{NetworkError, NetworkResult};
pub use retry::RetryPolicy;
