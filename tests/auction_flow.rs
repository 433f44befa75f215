//! Integration tests for the auction engine
//!
//! Drives full start → bid → complete flows against a real SQLite file and
//! checks the ledger-level properties: budget conservation, settlement
//! atomicity, the unsold ladder, and serialization of concurrent bids.

use crickbid_backend::auction::store::{participations, players, teams};
use crickbid_backend::auction::{AuctionEngine, AuctionError, AuctionStore, NotificationBus, Operator};
use crickbid_backend::models::{Participation, ParticipationStatus, Player, Team};
use tempfile::NamedTempFile;
use uuid::Uuid;

const TOURNAMENT: &str = "ipl-2024";

fn master() -> Operator {
    Operator {
        username: "master".to_string(),
        is_master: true,
        is_auctioneer: false,
        bound_tournament: None,
    }
}

struct Rig {
    engine: AuctionEngine,
    store: AuctionStore,
    players: Vec<Uuid>,
    teams: Vec<Uuid>,
    // Keeps the on-disk database alive for the test's duration.
    _db: NamedTempFile,
}

/// Seed a tournament with `n_players` (base price 100k, category "A+") and
/// `n_teams` (budget 1M each).
async fn rig(n_players: usize, n_teams: usize) -> Rig {
    let db = NamedTempFile::new().unwrap();
    let store = AuctionStore::new(db.path().to_str().unwrap()).unwrap();
    let engine = AuctionEngine::new(store.clone(), NotificationBus::new(256));

    let (player_ids, team_ids) = store
        .with_write(|tx| {
            let mut player_ids = vec![];
            for i in 0..n_players {
                let player = Player {
                    id: Uuid::new_v4(),
                    name: format!("Player {i}"),
                    photo: None,
                    batting_style: None,
                    bowling_style: None,
                };
                players::insert(tx, &player)?;
                participations::insert(
                    tx,
                    &Participation {
                        id: Uuid::new_v4(),
                        player_id: player.id,
                        tournament_id: TOURNAMENT.to_string(),
                        status: ParticipationStatus::Available,
                        base_price: 100_000,
                        price: None,
                        team_id: None,
                        category: "A+".to_string(),
                    },
                )?;
                player_ids.push(player.id);
            }

            let mut team_ids = vec![];
            for i in 0..n_teams {
                let team = Team {
                    id: Uuid::new_v4(),
                    tournament_id: TOURNAMENT.to_string(),
                    name: format!("Team {i}"),
                    color: None,
                    owner: None,
                    budget: 1_000_000,
                    remaining_budget: 1_000_000,
                    players: vec![],
                };
                teams::insert(tx, &team)?;
                team_ids.push(team.id);
            }
            Ok((player_ids, team_ids))
        })
        .await
        .unwrap();

    Rig {
        engine,
        store,
        players: player_ids,
        teams: team_ids,
        _db: db,
    }
}

/// remaining_budget must equal budget minus the recorded prices of owned
/// players, for every team, at every settlement boundary.
async fn assert_budget_conservation(engine: &AuctionEngine) {
    let teams = engine.list_teams(TOURNAMENT).await.unwrap();
    let parts = engine.list_participations(TOURNAMENT).await.unwrap();

    for team in teams {
        let spent: i64 = parts
            .iter()
            .filter(|p| p.team_id == Some(team.id))
            .map(|p| p.price.unwrap_or(0))
            .sum();
        assert_eq!(
            team.remaining_budget,
            team.budget - spent,
            "budget conservation violated for {}",
            team.name
        );
        for p in parts.iter().filter(|p| p.team_id == Some(team.id)) {
            assert!(team.players.contains(&p.player_id));
        }
    }
}

#[tokio::test]
async fn full_draft_conserves_budgets() {
    let r = rig(3, 2).await;
    let op = master();

    // Sell player 0 to team 0.
    let a = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[0], 100_000).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[1], 150_000).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[0], 200_000).await.unwrap();
    r.engine.complete(&op, a.id, Some(r.teams[0]), None).await.unwrap();
    assert_budget_conservation(&r.engine).await;

    // Player 1 goes unsold.
    let a = r.engine.start(&op, r.players[1], TOURNAMENT).await.unwrap();
    r.engine.complete(&op, a.id, None, None).await.unwrap();
    assert_budget_conservation(&r.engine).await;

    // Sell player 2 to team 1 at an operator-overridden amount.
    let a = r.engine.start(&op, r.players[2], TOURNAMENT).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[1], 300_000).await.unwrap();
    r.engine
        .complete(&op, a.id, Some(r.teams[1]), Some(300_000))
        .await
        .unwrap();
    assert_budget_conservation(&r.engine).await;

    let history = r.engine.history(TOURNAMENT).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|h| h.status.is_terminal()));
}

#[tokio::test]
async fn concurrent_bids_serialize_into_one_increasing_sequence() {
    let r = rig(1, 4).await;
    let op = master();
    let auction = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();

    // Four teams fire bursts of bids concurrently at fixed price points.
    // Many lose the race; the survivors must form a strictly increasing
    // sequence starting at or above base price.
    let mut handles = vec![];
    for (i, team) in r.teams.iter().copied().enumerate() {
        let engine = r.engine.clone();
        let op = op.clone();
        let auction_id = auction.id;
        handles.push(tokio::spawn(async move {
            for step in 0..10i64 {
                let amount = 100_000 + step * 10_000 + i as i64 * 1_000;
                let _ = engine.bid(&op, auction_id, team, amount).await;
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let current = r.engine.current_auction(TOURNAMENT).await.unwrap().unwrap();
    let amounts: Vec<i64> = current.bids.iter().map(|b| b.amount).collect();
    assert!(!amounts.is_empty());
    assert!(amounts[0] >= 100_000);
    assert!(
        amounts.windows(2).all(|w| w[1] > w[0]),
        "accepted bids not strictly increasing: {amounts:?}"
    );
    assert_eq!(current.bid_amount, *amounts.last().unwrap());
}

#[tokio::test]
async fn concurrent_complete_and_bids_never_partially_apply() {
    let r = rig(1, 2).await;
    let op = master();
    let auction = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    r.engine
        .bid(&op, auction.id, r.teams[0], 150_000)
        .await
        .unwrap();

    // Bids race a complete; once complete wins, every later bid must fail
    // with AuctionNotActive and the settlement totals must be exact.
    let completer = {
        let engine = r.engine.clone();
        let op = op.clone();
        let winner = r.teams[0];
        let auction_id = auction.id;
        tokio::spawn(async move { engine.complete(&op, auction_id, Some(winner), None).await })
    };
    let bidder = {
        let engine = r.engine.clone();
        let op = op.clone();
        let team = r.teams[1];
        let auction_id = auction.id;
        tokio::spawn(async move {
            let mut rejected_not_active = 0;
            for step in 0..20i64 {
                match engine.bid(&op, auction_id, team, 200_000 + step).await {
                    Err(AuctionError::AuctionNotActive) => rejected_not_active += 1,
                    _ => {}
                }
            }
            rejected_not_active
        })
    };

    let settled = completer.await.unwrap().unwrap();
    bidder.await.unwrap();

    assert_eq!(settled.winner, Some(r.teams[0]));
    assert_budget_conservation(&r.engine).await;

    // The recorded final amount is whatever the highest accepted bid was at
    // the moment complete ran.
    let teams = r.engine.list_teams(TOURNAMENT).await.unwrap();
    let winner = teams.iter().find(|t| t.id == r.teams[0]).unwrap();
    assert_eq!(
        winner.remaining_budget,
        winner.budget - settled.final_amount.unwrap()
    );
}

#[tokio::test]
async fn negative_settlement_override_rejected_without_mutation() {
    let r = rig(1, 1).await;
    let op = master();

    let a = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[0], 150_000).await.unwrap();

    let err = r
        .engine
        .complete(&op, a.id, Some(r.teams[0]), Some(-50_000))
        .await
        .unwrap_err();
    assert_eq!(err, AuctionError::InvalidAmount { amount: -50_000 });

    // The rejected override must not have credited the team or sold the
    // player; remaining_budget stays within the ceiling.
    let team = &r.engine.list_teams(TOURNAMENT).await.unwrap()[0];
    assert_eq!(team.remaining_budget, 1_000_000);
    assert!(team.remaining_budget <= team.budget);
    assert_budget_conservation(&r.engine).await;

    // The auction is still live and settles normally afterwards.
    let settled = r
        .engine
        .complete(&op, a.id, Some(r.teams[0]), None)
        .await
        .unwrap();
    assert_eq!(settled.final_amount, Some(150_000));
    assert_budget_conservation(&r.engine).await;
}

#[tokio::test]
async fn mark_unsold_round_trip_restores_everything() {
    let r = rig(1, 1).await;
    let op = master();

    let a = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[0], 400_000).await.unwrap();
    r.engine.complete(&op, a.id, Some(r.teams[0]), None).await.unwrap();

    let outcome = r
        .engine
        .mark_unsold(&op, r.players[0], TOURNAMENT)
        .await
        .unwrap();
    assert_eq!(outcome.team.remaining_budget, 1_000_000);
    assert!(outcome.team.players.is_empty());
    assert_eq!(outcome.participation.status, ParticipationStatus::Available);
    assert_budget_conservation(&r.engine).await;

    // Player can immediately be re-auctioned.
    let a = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    assert_eq!(a.bid_amount, 100_000);
}

#[tokio::test]
async fn refund_after_manual_price_edit_can_exceed_budget() {
    // Documents the unclamped-credit edge case from the original system: a
    // price edited upward between sale and refund pushes remaining_budget
    // past the ceiling. Intentionally preserved, not "fixed".
    let r = rig(1, 1).await;
    let op = master();

    let a = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[0], 400_000).await.unwrap();
    r.engine.complete(&op, a.id, Some(r.teams[0]), None).await.unwrap();

    // Simulate a manual edit of the recorded sale price.
    let part = r.engine.list_participations(TOURNAMENT).await.unwrap()[0].clone();
    r.store
        .with_write(move |tx| participations::mark_sold(tx, part.id, part.team_id.unwrap(), 900_000))
        .await
        .unwrap();

    r.engine.mark_unsold(&op, r.players[0], TOURNAMENT).await.unwrap();

    let team = &r.engine.list_teams(TOURNAMENT).await.unwrap()[0];
    assert_eq!(team.remaining_budget, 1_000_000 - 400_000 + 900_000);
    assert!(team.remaining_budget > team.budget);
}

#[tokio::test]
async fn reset_after_partial_draft_is_idempotent() {
    let r = rig(2, 2).await;
    let op = master();

    let a = r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    r.engine.bid(&op, a.id, r.teams[0], 250_000).await.unwrap();
    r.engine.complete(&op, a.id, Some(r.teams[0]), None).await.unwrap();

    // Leave an auction live at reset time too.
    r.engine.start(&op, r.players[1], TOURNAMENT).await.unwrap();

    r.engine.reset(&op, TOURNAMENT).await.unwrap();
    r.engine.reset(&op, TOURNAMENT).await.unwrap();

    assert!(r.engine.current_auction(TOURNAMENT).await.unwrap().is_none());
    assert!(r.engine.history(TOURNAMENT).await.unwrap().is_empty());
    for team in r.engine.list_teams(TOURNAMENT).await.unwrap() {
        assert_eq!(team.remaining_budget, team.budget);
        assert!(team.players.is_empty());
    }
    for p in r.engine.list_participations(TOURNAMENT).await.unwrap() {
        assert_eq!(p.status, ParticipationStatus::Available);
        assert!(p.team_id.is_none());
        assert!(p.price.is_none());
    }
    assert_budget_conservation(&r.engine).await;
}

#[tokio::test]
async fn reset_does_not_touch_other_tournaments() {
    let r = rig(1, 1).await;
    let op = master();

    // Second tournament with its own team and sold player.
    let (other_player, other_team) = r
        .store
        .with_write(|tx| {
            let player = Player {
                id: Uuid::new_v4(),
                name: "Other".to_string(),
                photo: None,
                batting_style: None,
                bowling_style: None,
            };
            players::insert(tx, &player)?;
            participations::insert(
                tx,
                &Participation {
                    id: Uuid::new_v4(),
                    player_id: player.id,
                    tournament_id: "t2".to_string(),
                    status: ParticipationStatus::Available,
                    base_price: 50_000,
                    price: None,
                    team_id: None,
                    category: "B".to_string(),
                },
            )?;
            let team = Team {
                id: Uuid::new_v4(),
                tournament_id: "t2".to_string(),
                name: "Outsiders".to_string(),
                color: None,
                owner: None,
                budget: 500_000,
                remaining_budget: 500_000,
                players: vec![],
            };
            teams::insert(tx, &team)?;
            Ok((player.id, team.id))
        })
        .await
        .unwrap();

    let a = r.engine.start(&op, other_player, "t2").await.unwrap();
    r.engine.bid(&op, a.id, other_team, 60_000).await.unwrap();
    r.engine.complete(&op, a.id, Some(other_team), None).await.unwrap();

    r.engine.reset(&op, TOURNAMENT).await.unwrap();

    // t2 state untouched.
    let t2_teams = r.engine.list_teams("t2").await.unwrap();
    assert_eq!(t2_teams[0].remaining_budget, 440_000);
    let t2_parts = r.engine.list_participations("t2").await.unwrap();
    assert_eq!(t2_parts[0].status, ParticipationStatus::Sold);
    assert_eq!(r.engine.history("t2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn two_tournaments_can_run_auctions_simultaneously() {
    let r = rig(1, 1).await;
    let op = master();

    let (other_player, _other_team) = r
        .store
        .with_write(|tx| {
            let player = Player {
                id: Uuid::new_v4(),
                name: "Other".to_string(),
                photo: None,
                batting_style: None,
                bowling_style: None,
            };
            players::insert(tx, &player)?;
            participations::insert(
                tx,
                &Participation {
                    id: Uuid::new_v4(),
                    player_id: player.id,
                    tournament_id: "t2".to_string(),
                    status: ParticipationStatus::Available,
                    base_price: 50_000,
                    price: None,
                    team_id: None,
                    category: "B".to_string(),
                },
            )?;
            let team = Team {
                id: Uuid::new_v4(),
                tournament_id: "t2".to_string(),
                name: "Outsiders".to_string(),
                color: None,
                owner: None,
                budget: 500_000,
                remaining_budget: 500_000,
                players: vec![],
            };
            teams::insert(tx, &team)?;
            Ok((player.id, team.id))
        })
        .await
        .unwrap();

    // One live auction per tournament, in parallel.
    r.engine.start(&op, r.players[0], TOURNAMENT).await.unwrap();
    r.engine.start(&op, other_player, "t2").await.unwrap();

    assert!(r.engine.current_auction(TOURNAMENT).await.unwrap().is_some());
    assert!(r.engine.current_auction("t2").await.unwrap().is_some());

    // But still only one per tournament.
    let err = r
        .engine
        .start(&op, r.players[0], TOURNAMENT)
        .await
        .unwrap_err();
    assert_eq!(err, AuctionError::AuctionInProgress);
}
