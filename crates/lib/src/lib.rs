//! Restobot library: LINE webhook parsing, restaurant search, event dispatch, and the HTTP server
//! used by the `restobot` binary.

pub mod config;
pub mod dispatch;
pub mod line;
pub mod search;
pub mod server;
