//! Domain Models
//! Mission: Well-typed auction, team, and participation structures shared
//! across the store, engine, and API layers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A player's global identity. Created once, referenced by every tournament
/// the player participates in; owned by no single tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
    pub batting_style: Option<String>,
    pub bowling_style: Option<String>,
}

/// Sale status of one player within one tournament.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParticipationStatus {
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "unsold")]
    Unsold, // one failed sale attempt
    #[serde(rename = "unsold1")]
    Unsold1, // failed twice; distinct shelf for re-offer decisions
    #[serde(rename = "sold")]
    Sold,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Available => "available",
            ParticipationStatus::Unsold => "unsold",
            ParticipationStatus::Unsold1 => "unsold1",
            ParticipationStatus::Sold => "sold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(ParticipationStatus::Available),
            "unsold" => Some(ParticipationStatus::Unsold),
            "unsold1" => Some(ParticipationStatus::Unsold1),
            "sold" => Some(ParticipationStatus::Sold),
            _ => None,
        }
    }

    /// A player may be put on the table unless already sold.
    pub fn is_auctionable(&self) -> bool {
        !matches!(self, ParticipationStatus::Sold)
    }
}

/// The auctionable unit: one player's record within one tournament.
/// Exactly one exists per (player, tournament) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub id: Uuid,
    pub player_id: Uuid,
    pub tournament_id: String,
    pub status: ParticipationStatus,
    /// Minimum legal opening bid, in rupees.
    pub base_price: i64,
    /// Sale price; set only when sold.
    pub price: Option<i64>,
    /// Owning team; set only when sold.
    pub team_id: Option<Uuid>,
    /// Draft bucket, e.g. "A+".
    pub category: String,
}

/// A team within one tournament. `remaining_budget` is decremented only by
/// settlement and incremented only by the mark-unsold refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub tournament_id: String,
    pub name: String,
    pub color: Option<String>,
    pub owner: Option<String>,
    pub budget: i64,
    pub remaining_budget: i64,
    /// Player ids currently owned.
    pub players: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuctionStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "sold")]
    Sold,
    #[serde(rename = "unsold")]
    Unsold,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Open => "open",
            AuctionStatus::Active => "active",
            AuctionStatus::Sold => "sold",
            AuctionStatus::Unsold => "unsold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(AuctionStatus::Open),
            "active" => Some(AuctionStatus::Active),
            "sold" => Some(AuctionStatus::Sold),
            "unsold" => Some(AuctionStatus::Unsold),
            _ => None,
        }
    }

    /// Terminal auctions are never mutated again; history is read-only.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionStatus::Sold | AuctionStatus::Unsold)
    }
}

/// One accepted bid. The sequence on an auction is append-only and strictly
/// increasing in amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub team_id: Uuid,
    pub amount: i64,
    pub timestamp: String,
}

impl Bid {
    pub fn new(team_id: Uuid, amount: i64) -> Self {
        Self {
            team_id,
            amount,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// One attempt to sell a Participation. Terminal on sold/unsold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: Uuid,
    pub player_id: Uuid,
    pub tournament_id: String,
    pub status: AuctionStatus,
    /// Current highest bid; seeded with the participation's base price.
    pub bid_amount: i64,
    pub current_bidder: Option<Uuid>,
    pub bids: Vec<Bid>,
    pub winner: Option<Uuid>,
    pub final_amount: Option<i64>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// Lightweight settlement summary published once per completed auction so
/// viewer clients can run deterministic result animations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionResult {
    pub player_id: Uuid,
    pub status: AuctionStatus,
    pub winner_name: Option<String>,
    pub final_amount: Option<i64>,
}

/// Outcome of the mark-unsold compensating transaction: the reverted
/// participation and the refunded team, returned together.
#[derive(Debug, Clone, Serialize)]
pub struct MarkUnsoldOutcome {
    pub participation: Participation,
    pub team: Team,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participation_status_round_trip() {
        for s in ["available", "unsold", "unsold1", "sold"] {
            let status = ParticipationStatus::from_str(s).unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!(ParticipationStatus::from_str("pending").is_none());
    }

    #[test]
    fn test_sold_is_not_auctionable() {
        assert!(ParticipationStatus::Available.is_auctionable());
        assert!(ParticipationStatus::Unsold.is_auctionable());
        assert!(ParticipationStatus::Unsold1.is_auctionable());
        assert!(!ParticipationStatus::Sold.is_auctionable());
    }

    #[test]
    fn test_auction_status_terminality() {
        assert!(!AuctionStatus::Open.is_terminal());
        assert!(!AuctionStatus::Active.is_terminal());
        assert!(AuctionStatus::Sold.is_terminal());
        assert!(AuctionStatus::Unsold.is_terminal());
    }

    #[test]
    fn test_status_json_uses_lowercase_names() {
        let json = serde_json::to_string(&ParticipationStatus::Unsold1).unwrap();
        assert_eq!(json, r#""unsold1""#);
        let status: AuctionStatus = serde_json::from_str(r#""active""#).unwrap();
        assert_eq!(status, AuctionStatus::Active);
    }
}
