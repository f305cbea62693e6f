//! Avatar configuration options and the HTTP client for the avatar service.

mod catalog;
mod client;

pub use catalog::{AvatarCatalog, AvatarKind, AvatarOption, AvatarSelection};
pub use client::{AvatarClient, AvatarResponse};
