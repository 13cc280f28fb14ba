//! JSON-RPC 2.0 front end for tankobon.
//!
//! The binary in `main.rs` is a thin wrapper; the router is exposed here so
//! it can be mounted over a test library.

pub mod handlers;
pub mod server;

pub use server::{build_router, start_server, AppState};
