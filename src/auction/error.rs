//! Auction Error Taxonomy
//! Mission: One typed error per rejection path so callers and tests can match
//! on the exact reason instead of parsing message strings.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Every way an auction operation can be rejected. No variant implies any
/// state mutation occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionError {
    /// Malformed id or missing field.
    InvalidAuctionId(String),
    /// Caller's role or bound tournament does not cover the target.
    TournamentMismatch,
    /// Caller's role may not perform this operation at all.
    RoleNotPermitted,
    /// Participation is sold or absent; cannot be put on the table.
    PlayerNotEligible,
    /// Bid or complete targeted an auction that is not active.
    AuctionNotActive,
    /// Complete called on an already-terminal auction.
    AuctionAlreadyComplete,
    /// Another auction is already active for this tournament.
    AuctionInProgress,
    TeamNotFound,
    PlayerNotFound,
    AuctionNotFound,
    /// First bid must be at least the participation's base price.
    BelowBasePrice { base_price: i64 },
    /// Subsequent bids must strictly exceed the current highest bid.
    BidTooLow { current: i64 },
    InsufficientBudget { remaining: i64 },
    /// Settlement amounts, budgets, and base prices must be positive rupees.
    InvalidAmount { amount: i64 },
    /// Storage failure mid-operation; the transaction was rolled back.
    Persistence(String),
}

impl AuctionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuctionError::InvalidAuctionId(_) => StatusCode::BAD_REQUEST,
            AuctionError::TournamentMismatch | AuctionError::RoleNotPermitted => {
                StatusCode::FORBIDDEN
            }
            AuctionError::TeamNotFound
            | AuctionError::PlayerNotFound
            | AuctionError::AuctionNotFound => StatusCode::NOT_FOUND,
            AuctionError::PlayerNotEligible
            | AuctionError::AuctionNotActive
            | AuctionError::AuctionAlreadyComplete
            | AuctionError::AuctionInProgress => StatusCode::CONFLICT,
            AuctionError::BelowBasePrice { .. }
            | AuctionError::BidTooLow { .. }
            | AuctionError::InsufficientBudget { .. }
            | AuctionError::InvalidAmount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuctionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind for client-side toast routing.
    pub fn kind(&self) -> &'static str {
        match self {
            AuctionError::InvalidAuctionId(_) => "invalid_auction_id",
            AuctionError::TournamentMismatch => "tournament_mismatch",
            AuctionError::RoleNotPermitted => "role_not_permitted",
            AuctionError::PlayerNotEligible => "player_not_eligible",
            AuctionError::AuctionNotActive => "auction_not_active",
            AuctionError::AuctionAlreadyComplete => "auction_already_complete",
            AuctionError::AuctionInProgress => "auction_in_progress",
            AuctionError::TeamNotFound => "team_not_found",
            AuctionError::PlayerNotFound => "player_not_found",
            AuctionError::AuctionNotFound => "auction_not_found",
            AuctionError::BelowBasePrice { .. } => "below_base_price",
            AuctionError::BidTooLow { .. } => "bid_too_low",
            AuctionError::InsufficientBudget { .. } => "insufficient_budget",
            AuctionError::InvalidAmount { .. } => "invalid_amount",
            AuctionError::Persistence(_) => "persistence",
        }
    }
}

impl std::fmt::Display for AuctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionError::InvalidAuctionId(raw) => write!(f, "Invalid auction id: {}", raw),
            AuctionError::TournamentMismatch => {
                write!(f, "Caller is not authorized for this tournament")
            }
            AuctionError::RoleNotPermitted => {
                write!(f, "Caller's role may not perform this operation")
            }
            AuctionError::PlayerNotEligible => {
                write!(f, "Player is not eligible for auction (already sold or not registered)")
            }
            AuctionError::AuctionNotActive => write!(f, "Auction is not active"),
            AuctionError::AuctionAlreadyComplete => write!(f, "Auction is already complete"),
            AuctionError::AuctionInProgress => {
                write!(f, "Another auction is already in progress for this tournament")
            }
            AuctionError::TeamNotFound => write!(f, "Team not found"),
            AuctionError::PlayerNotFound => write!(f, "Player not found"),
            AuctionError::AuctionNotFound => write!(f, "Auction not found"),
            AuctionError::BelowBasePrice { base_price } => {
                write!(f, "Bid is below the base price of {}", base_price)
            }
            AuctionError::BidTooLow { current } => {
                write!(f, "Bid must exceed the current highest bid of {}", current)
            }
            AuctionError::InsufficientBudget { remaining } => {
                write!(f, "Insufficient budget: {} remaining", remaining)
            }
            AuctionError::InvalidAmount { amount } => {
                write!(f, "Amount must be a positive number of rupees, got {}", amount)
            }
            AuctionError::Persistence(msg) => write!(f, "Storage failure: {}", msg),
        }
    }
}

impl std::error::Error for AuctionError {}

impl From<rusqlite::Error> for AuctionError {
    fn from(e: rusqlite::Error) -> Self {
        AuctionError::Persistence(e.to_string())
    }
}

impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}
