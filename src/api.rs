//! HTTP admin surface: router, DTOs, error mapping, CSV answer export.

mod bots;
mod csv;
mod dto;
mod error;
mod server;

pub use server::{cors_layer, router, serve};

use crate::handlers::App;
use std::sync::Arc;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<App>,
}
