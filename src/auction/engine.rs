//! Auction State Machine
//! Mission: Own the live-auction lifecycle. Every operation validates against
//! a consistent snapshot, applies all ledger effects in one transaction, and
//! notifies observers only after the commit.

use crate::auction::error::AuctionError;
use crate::auction::notify::{topics, NotificationBus};
use crate::auction::store::{auctions, participations, players, teams, AuctionStore};
use crate::auction::validator::validate_bid;
use crate::models::{
    Auction, AuctionResult, AuctionStatus, Bid, MarkUnsoldOutcome, Participation,
    ParticipationStatus,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// Caller identity as resolved by the auth layer. Auctioneers are bound to
/// exactly one tournament; masters may operate on any.
#[derive(Debug, Clone)]
pub struct Operator {
    pub username: String,
    pub is_master: bool,
    pub is_auctioneer: bool,
    pub bound_tournament: Option<String>,
}

impl Operator {
    /// Mutating auction calls require the master role or an auctioneer bound
    /// to the target tournament.
    fn authorize(&self, tournament_id: &str) -> Result<(), AuctionError> {
        if self.is_master {
            return Ok(());
        }
        if !self.is_auctioneer {
            return Err(AuctionError::RoleNotPermitted);
        }
        match self.bound_tournament.as_deref() {
            Some(bound) if bound == tournament_id => Ok(()),
            _ => Err(AuctionError::TournamentMismatch),
        }
    }
}

#[derive(Clone)]
pub struct AuctionEngine {
    store: AuctionStore,
    bus: NotificationBus,
}

impl AuctionEngine {
    pub fn new(store: AuctionStore, bus: NotificationBus) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &AuctionStore {
        &self.store
    }

    /// Put a player on the table. The auction opens active, seeded with the
    /// participation's base price and an empty bid log.
    pub async fn start(
        &self,
        operator: &Operator,
        player_id: Uuid,
        tournament_id: &str,
    ) -> Result<Auction, AuctionError> {
        operator.authorize(tournament_id)?;

        let tournament = tournament_id.to_string();
        let auction = self
            .store
            .with_write(move |tx| {
                if auctions::current_for_tournament(tx, &tournament)?.is_some() {
                    return Err(AuctionError::AuctionInProgress);
                }

                let participation = participations::get(tx, player_id, &tournament)?
                    .ok_or(AuctionError::PlayerNotEligible)?;
                if !participation.status.is_auctionable() {
                    return Err(AuctionError::PlayerNotEligible);
                }

                let auction = Auction {
                    id: Uuid::new_v4(),
                    player_id,
                    tournament_id: tournament.clone(),
                    status: AuctionStatus::Active,
                    bid_amount: participation.base_price,
                    current_bidder: None,
                    bids: vec![],
                    winner: None,
                    final_amount: None,
                    created_at: Utc::now().to_rfc3339(),
                    completed_at: None,
                };
                auctions::insert(tx, &auction)?;
                Ok(auction)
            })
            .await?;

        info!(
            auction_id = %auction.id,
            player_id = %player_id,
            tournament = tournament_id,
            base_price = auction.bid_amount,
            "🏏 Auction started"
        );
        self.publish_update(&auction);
        Ok(auction)
    }

    /// Accept or reject a bid. Validation and the bid append happen inside
    /// one transaction against the same snapshot, so two near-simultaneous
    /// bids can never both pass against a stale highest bid.
    pub async fn bid(
        &self,
        operator: &Operator,
        auction_id: Uuid,
        team_id: Uuid,
        amount: i64,
    ) -> Result<Auction, AuctionError> {
        let op = operator.clone();
        let auction = self
            .store
            .with_write(move |tx| {
                let mut auction =
                    auctions::get(tx, auction_id)?.ok_or(AuctionError::AuctionNotFound)?;
                op.authorize(&auction.tournament_id)?;

                let team = teams::get(tx, team_id)?.ok_or(AuctionError::TeamNotFound)?;
                let participation =
                    participations::get(tx, auction.player_id, &auction.tournament_id)?
                        .ok_or(AuctionError::PlayerNotEligible)?;

                validate_bid(&auction, &team, amount, participation.base_price)?;

                let bid = Bid::new(team_id, amount);
                auctions::record_bid(tx, auction_id, &bid)?;

                auction.bid_amount = amount;
                auction.current_bidder = Some(team_id);
                auction.bids.push(bid);
                Ok(auction)
            })
            .await?;

        info!(
            auction_id = %auction_id,
            team_id = %team_id,
            amount,
            "💰 Bid accepted"
        );
        self.publish_update(&auction);
        Ok(auction)
    }

    /// Settle the auction. With a winner: debit the team, grow its roster,
    /// mark the participation sold. Without: advance the participation down
    /// the unsold ladder. Either way the auction becomes terminal and all
    /// three records commit together or not at all.
    pub async fn complete(
        &self,
        operator: &Operator,
        auction_id: Uuid,
        winner_id: Option<Uuid>,
        final_amount: Option<i64>,
    ) -> Result<Auction, AuctionError> {
        let op = operator.clone();
        let (auction, winner_name) = self
            .store
            .with_write(move |tx| {
                let auction =
                    auctions::get(tx, auction_id)?.ok_or(AuctionError::AuctionNotFound)?;
                op.authorize(&auction.tournament_id)?;

                if auction.status.is_terminal() {
                    return Err(AuctionError::AuctionAlreadyComplete);
                }
                if auction.status != AuctionStatus::Active {
                    return Err(AuctionError::AuctionNotActive);
                }

                let participation =
                    participations::get(tx, auction.player_id, &auction.tournament_id)?
                        .ok_or(AuctionError::PlayerNotEligible)?;

                let completed_at = Utc::now().to_rfc3339();

                if let Some(winner) = winner_id {
                    let amount = final_amount.unwrap_or(auction.bid_amount);
                    // A non-positive amount would flow through debit as a
                    // refund and push remaining_budget past the ceiling.
                    if amount <= 0 {
                        return Err(AuctionError::InvalidAmount { amount });
                    }

                    let team = teams::get(tx, winner)?.ok_or(AuctionError::TeamNotFound)?;
                    if team.tournament_id != auction.tournament_id {
                        return Err(AuctionError::TeamNotFound);
                    }

                    teams::debit(tx, winner, amount)?;
                    teams::add_player(tx, winner, auction.player_id)?;
                    participations::mark_sold(tx, participation.id, winner, amount)?;
                    auctions::mark_sold(tx, auction_id, winner, amount, &completed_at)?;

                    let settled = auctions::get(tx, auction_id)?
                        .ok_or(AuctionError::AuctionNotFound)?;
                    Ok((settled, Some(team.name)))
                } else {
                    let next = match participation.status {
                        ParticipationStatus::Available => ParticipationStatus::Unsold,
                        // Second consecutive failed attempt; unsold1 is sticky.
                        ParticipationStatus::Unsold | ParticipationStatus::Unsold1 => {
                            ParticipationStatus::Unsold1
                        }
                        ParticipationStatus::Sold => {
                            return Err(AuctionError::PlayerNotEligible)
                        }
                    };
                    participations::set_status(tx, participation.id, next)?;
                    auctions::mark_unsold(tx, auction_id, &completed_at)?;

                    let settled = auctions::get(tx, auction_id)?
                        .ok_or(AuctionError::AuctionNotFound)?;
                    Ok((settled, None))
                }
            })
            .await?;

        info!(
            auction_id = %auction.id,
            status = auction.status.as_str(),
            final_amount = auction.final_amount,
            "🔨 Auction settled"
        );
        self.publish_update(&auction);
        self.publish_result(&auction, winner_name);
        Ok(auction)
    }

    /// Compensating transaction for a mistaken sale: refund the recorded
    /// price, shrink the roster, and revert the participation to available.
    pub async fn mark_unsold(
        &self,
        operator: &Operator,
        player_id: Uuid,
        tournament_id: &str,
    ) -> Result<MarkUnsoldOutcome, AuctionError> {
        operator.authorize(tournament_id)?;

        let tournament = tournament_id.to_string();
        let outcome = self
            .store
            .with_write(move |tx| {
                let participation = participations::get(tx, player_id, &tournament)?
                    .ok_or(AuctionError::PlayerNotFound)?;

                let (team_id, price) = match (participation.team_id, participation.price) {
                    (Some(team), Some(price)) if participation.status == ParticipationStatus::Sold => {
                        (team, price)
                    }
                    _ => return Err(AuctionError::PlayerNotEligible),
                };

                teams::credit(tx, team_id, price)?;
                teams::remove_player(tx, team_id, player_id)?;
                participations::revert_sale(tx, participation.id)?;

                let participation = participations::get(tx, player_id, &tournament)?
                    .ok_or(AuctionError::PlayerNotFound)?;
                let team = teams::get(tx, team_id)?.ok_or(AuctionError::TeamNotFound)?;
                Ok(MarkUnsoldOutcome {
                    participation,
                    team,
                })
            })
            .await?;

        warn!(
            player_id = %player_id,
            tournament = tournament_id,
            team = %outcome.team.name,
            "↩️  Sale reverted via mark-unsold"
        );
        Ok(outcome)
    }

    /// Operator bulk revert of unsold/unsold1 participations back to
    /// available, optionally limited to one category.
    pub async fn revert_unsold(
        &self,
        operator: &Operator,
        tournament_id: &str,
        category: Option<String>,
    ) -> Result<usize, AuctionError> {
        operator.authorize(tournament_id)?;

        let tournament = tournament_id.to_string();
        let moved = self
            .store
            .with_write(move |tx| {
                participations::bulk_revert_unsold(tx, &tournament, category.as_deref())
            })
            .await?;

        info!(
            tournament = tournament_id,
            moved, "♻️  Unsold participations reverted to available"
        );
        Ok(moved)
    }

    /// Restart a tournament's draft from scratch: no auctions, everyone
    /// available, full budgets, empty rosters. Idempotent.
    pub async fn reset(
        &self,
        operator: &Operator,
        tournament_id: &str,
    ) -> Result<(), AuctionError> {
        operator.authorize(tournament_id)?;

        let tournament = tournament_id.to_string();
        self.store
            .with_write(move |tx| {
                auctions::delete_for_tournament(tx, &tournament)?;
                participations::reset_for_tournament(tx, &tournament)?;
                teams::reset_for_tournament(tx, &tournament)?;
                Ok(())
            })
            .await?;

        info!(tournament = tournament_id, "🧹 Tournament draft reset");
        Ok(())
    }

    /// Read layer: the live auction for a tournament, if any. Polled by
    /// viewer clients; takes no long-lived lock.
    pub async fn current_auction(
        &self,
        tournament_id: &str,
    ) -> Result<Option<Auction>, AuctionError> {
        let tournament = tournament_id.to_string();
        self.store
            .with_read(move |conn| auctions::current_for_tournament(conn, &tournament))
            .await
    }

    /// Read layer: completed auctions, newest first.
    pub async fn history(&self, tournament_id: &str) -> Result<Vec<Auction>, AuctionError> {
        let tournament = tournament_id.to_string();
        self.store
            .with_read(move |conn| auctions::history(conn, &tournament))
            .await
    }

    pub async fn list_teams(&self, tournament_id: &str) -> Result<Vec<crate::models::Team>, AuctionError> {
        let tournament = tournament_id.to_string();
        self.store
            .with_read(move |conn| teams::list(conn, &tournament))
            .await
    }

    pub async fn list_participations(
        &self,
        tournament_id: &str,
    ) -> Result<Vec<Participation>, AuctionError> {
        let tournament = tournament_id.to_string();
        self.store
            .with_read(move |conn| participations::list(conn, &tournament))
            .await
    }

    pub async fn get_player(&self, player_id: Uuid) -> Result<Option<crate::models::Player>, AuctionError> {
        self.store
            .with_read(move |conn| players::get(conn, player_id))
            .await
    }

    fn publish_update(&self, auction: &Auction) {
        self.bus.publish_json(
            topics::auction_update(&auction.tournament_id),
            auction,
        );
    }

    fn publish_result(&self, auction: &Auction, winner_name: Option<String>) {
        let result = AuctionResult {
            player_id: auction.player_id,
            status: auction.status,
            winner_name,
            final_amount: auction.final_amount,
        };
        self.bus.publish_json(
            topics::auction_result(&auction.tournament_id),
            &result,
        );
    }
}
