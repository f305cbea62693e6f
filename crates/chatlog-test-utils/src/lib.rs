//! Test helpers shared across chatlog crates.

pub mod adapter;
pub mod messages;

pub use adapter::{AdapterCall, ScriptedAdapter};
pub use messages::{at, sample_message};
