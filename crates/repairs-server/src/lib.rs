//! repairs-server library: the HTTP surface of the repair ticket service.
//!
//! The `repairs` binary wraps this with a CLI; integration tests build the
//! router directly via [`http::router`].

#![forbid(unsafe_code)]

pub mod auth;
pub mod http;
pub mod relay;
pub mod validate;
