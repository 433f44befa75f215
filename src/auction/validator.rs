//! Bid Validator
//! Mission: Pure bid-legality decisions with no side effects. The engine
//! serializes concurrent submissions; this module only judges one proposal
//! against one consistent snapshot.

use crate::auction::error::AuctionError;
use crate::models::{Auction, AuctionStatus, Team};

/// Decide whether `amount` is a legal bid by `team` on `auction`.
///
/// `base_price` is the participation's base price for this tournament; it
/// governs the first bid only. Later bids must strictly exceed the current
/// highest bid, so equal-raise bids are rejected and the accepted sequence is
/// strictly increasing by construction.
pub fn validate_bid(
    auction: &Auction,
    team: &Team,
    amount: i64,
    base_price: i64,
) -> Result<(), AuctionError> {
    if auction.status != AuctionStatus::Active {
        return Err(AuctionError::AuctionNotActive);
    }

    if team.tournament_id != auction.tournament_id {
        return Err(AuctionError::TeamNotFound);
    }

    if team.remaining_budget < amount {
        return Err(AuctionError::InsufficientBudget {
            remaining: team.remaining_budget,
        });
    }

    if auction.bids.is_empty() {
        // Opening bid may equal the base price exactly.
        if amount < base_price {
            return Err(AuctionError::BelowBasePrice { base_price });
        }
    } else if amount <= auction.bid_amount {
        return Err(AuctionError::BidTooLow {
            current: auction.bid_amount,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bid;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_team(remaining: i64) -> Team {
        Team {
            id: Uuid::new_v4(),
            tournament_id: "t1".to_string(),
            name: "Strikers".to_string(),
            color: None,
            owner: None,
            budget: 1_000_000,
            remaining_budget: remaining,
            players: vec![],
        }
    }

    fn test_auction(status: AuctionStatus, bid_amount: i64, bids: Vec<Bid>) -> Auction {
        Auction {
            id: Uuid::new_v4(),
            player_id: Uuid::new_v4(),
            tournament_id: "t1".to_string(),
            status,
            bid_amount,
            current_bidder: bids.last().map(|b| b.team_id),
            bids,
            winner: None,
            final_amount: None,
            created_at: Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }

    #[test]
    fn test_first_bid_must_meet_base_price() {
        let auction = test_auction(AuctionStatus::Active, 100_000, vec![]);
        let team = test_team(500_000);

        // Below base price rejected.
        assert_eq!(
            validate_bid(&auction, &team, 50_000, 100_000),
            Err(AuctionError::BelowBasePrice { base_price: 100_000 })
        );

        // Exactly the base price is a legal opening bid.
        assert_eq!(validate_bid(&auction, &team, 100_000, 100_000), Ok(()));
    }

    #[test]
    fn test_later_bids_strictly_increase() {
        let team = test_team(500_000);
        let auction = test_auction(
            AuctionStatus::Active,
            100_000,
            vec![Bid::new(Uuid::new_v4(), 100_000)],
        );

        // Equal raise is rejected.
        assert_eq!(
            validate_bid(&auction, &team, 100_000, 100_000),
            Err(AuctionError::BidTooLow { current: 100_000 })
        );

        assert_eq!(validate_bid(&auction, &team, 100_001, 100_000), Ok(()));
    }

    #[test]
    fn test_insufficient_budget_rejected() {
        let auction = test_auction(AuctionStatus::Active, 100_000, vec![]);
        let team = test_team(200_000);

        assert_eq!(
            validate_bid(&auction, &team, 250_000, 100_000),
            Err(AuctionError::InsufficientBudget { remaining: 200_000 })
        );

        // A team can spend its entire remaining budget.
        assert_eq!(validate_bid(&auction, &team, 200_000, 100_000), Ok(()));
    }

    #[test]
    fn test_inactive_auction_rejected() {
        let team = test_team(500_000);
        for status in [AuctionStatus::Open, AuctionStatus::Sold, AuctionStatus::Unsold] {
            let auction = test_auction(status, 100_000, vec![]);
            assert_eq!(
                validate_bid(&auction, &team, 150_000, 100_000),
                Err(AuctionError::AuctionNotActive)
            );
        }
    }

    #[test]
    fn test_team_from_other_tournament_rejected() {
        let auction = test_auction(AuctionStatus::Active, 100_000, vec![]);
        let mut team = test_team(500_000);
        team.tournament_id = "t2".to_string();

        assert_eq!(
            validate_bid(&auction, &team, 150_000, 100_000),
            Err(AuctionError::TeamNotFound)
        );
    }
}
