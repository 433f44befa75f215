//! CrickBid Backend Library
//!
//! Exposes the auction core, auth, and API modules for the server binary and
//! the integration tests.

pub mod api;
pub mod auction;
pub mod auth;
pub mod models;

use auction::{AuctionEngine, NotificationBus};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: AuctionEngine,
    pub bus: NotificationBus,
}
