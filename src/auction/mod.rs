//! Auction Core
//! Mission: The bidding state machine and settlement logic. Everything with
//! a correctness requirement lives here: monotonic bid progression, budget
//! conservation, single active auction per tournament, atomic settlement.

pub mod engine;
pub mod error;
pub mod notify;
pub mod store;
pub mod validator;

pub use engine::{AuctionEngine, Operator};
pub use error::AuctionError;
pub use notify::{topics, Envelope, NotificationBus};
pub use store::AuctionStore;
