//! API implementation submodules.
//!
//! Each submodule contains `impl TankobonApi` blocks that extend the public
//! API with domain-specific methods. The struct definition remains in
//! `lib.rs`.

mod builder;
mod downloads;
mod series;
mod state;
mod system;

pub use builder::TankobonApiBuilder;
pub(crate) use state::ApiState;
