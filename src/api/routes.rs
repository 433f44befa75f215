//! Auction API Routes
//! Mission: REST façade over the auction engine. Handlers translate JSON
//! requests into engine calls and engine errors into status codes; no auction
//! rules live here.

use crate::auction::store::{participations, players, teams};
use crate::auction::AuctionError;
use crate::auth::models::{Claims, UserRole};
use crate::models::{
    Auction, MarkUnsoldOutcome, Participation, ParticipationStatus, Player, Team,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

fn parse_auction_id(raw: &str) -> Result<Uuid, AuctionError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AuctionError::InvalidAuctionId(raw.to_string()))
}

fn require_master(claims: &Claims) -> Result<(), AuctionError> {
    if claims.role == UserRole::Master {
        Ok(())
    } else {
        Err(AuctionError::RoleNotPermitted)
    }
}

/// Budgets and base prices seed every later bid and settlement check, so
/// non-positive values are rejected at the door.
fn require_positive_amount(amount: i64) -> Result<(), AuctionError> {
    if amount > 0 {
        Ok(())
    } else {
        Err(AuctionError::InvalidAmount { amount })
    }
}

// ---------------------------------------------------------------------------
// Read layer
// ---------------------------------------------------------------------------

/// GET /api/tournaments/:tid/auction/current
/// Polled by viewer clients; returns the live auction or null.
pub async fn get_current_auction(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<Option<Auction>>, AuctionError> {
    let auction = state.engine.current_auction(&tournament_id).await?;
    Ok(Json(auction))
}

/// GET /api/tournaments/:tid/auction/history
pub async fn get_auction_history(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<Vec<Auction>>, AuctionError> {
    let history = state.engine.history(&tournament_id).await?;
    Ok(Json(history))
}

/// GET /api/tournaments/:tid/teams
pub async fn get_teams(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<Vec<Team>>, AuctionError> {
    Ok(Json(state.engine.list_teams(&tournament_id).await?))
}

/// GET /api/tournaments/:tid/participations
pub async fn get_participations(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<Vec<Participation>>, AuctionError> {
    Ok(Json(state.engine.list_participations(&tournament_id).await?))
}

// ---------------------------------------------------------------------------
// Auction lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartAuctionRequest {
    pub player_id: Uuid,
    pub tournament_id: String,
}

/// POST /api/auction/start
pub async fn post_start_auction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartAuctionRequest>,
) -> Result<Json<Auction>, AuctionError> {
    let auction = state
        .engine
        .start(&claims.as_operator(), req.player_id, &req.tournament_id)
        .await?;
    Ok(Json(auction))
}

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub auction_id: String,
    pub team_id: Uuid,
    pub amount: i64,
}

/// POST /api/auction/bid
pub async fn post_place_bid(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PlaceBidRequest>,
) -> Result<Json<Auction>, AuctionError> {
    let auction_id = parse_auction_id(&req.auction_id)?;
    let auction = state
        .engine
        .bid(&claims.as_operator(), auction_id, req.team_id, req.amount)
        .await?;
    Ok(Json(auction))
}

#[derive(Debug, Deserialize)]
pub struct CompleteAuctionRequest {
    pub auction_id: String,
    pub winner_id: Option<Uuid>,
    pub final_amount: Option<i64>,
}

/// POST /api/auction/complete
pub async fn post_complete_auction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CompleteAuctionRequest>,
) -> Result<Json<Auction>, AuctionError> {
    let auction_id = parse_auction_id(&req.auction_id)?;
    let auction = state
        .engine
        .complete(
            &claims.as_operator(),
            auction_id,
            req.winner_id,
            req.final_amount,
        )
        .await?;
    Ok(Json(auction))
}

#[derive(Debug, Deserialize)]
pub struct MarkUnsoldRequest {
    pub player_id: Uuid,
    pub tournament_id: String,
}

/// POST /api/auction/mark-unsold — compensating transaction for a bad sale.
pub async fn post_mark_unsold(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkUnsoldRequest>,
) -> Result<Json<MarkUnsoldOutcome>, AuctionError> {
    let outcome = state
        .engine
        .mark_unsold(&claims.as_operator(), req.player_id, &req.tournament_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/tournaments/:tid/reset
pub async fn post_reset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<String>,
) -> Result<Json<Value>, AuctionError> {
    state
        .engine
        .reset(&claims.as_operator(), &tournament_id)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize, Default)]
pub struct RevertUnsoldRequest {
    pub category: Option<String>,
}

/// POST /api/tournaments/:tid/revert-unsold
pub async fn post_revert_unsold(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<String>,
    Json(req): Json<RevertUnsoldRequest>,
) -> Result<Json<Value>, AuctionError> {
    let moved = state
        .engine
        .revert_unsold(&claims.as_operator(), &tournament_id, req.category)
        .await?;
    Ok(Json(json!({ "reverted": moved })))
}

// ---------------------------------------------------------------------------
// Registration surface (master only)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub tournament_id: String,
    pub name: String,
    pub color: Option<String>,
    pub owner: Option<String>,
    pub budget: i64,
}

/// POST /api/teams
pub async fn post_create_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), AuctionError> {
    require_master(&claims)?;
    require_positive_amount(req.budget)?;

    let team = Team {
        id: Uuid::new_v4(),
        tournament_id: req.tournament_id,
        name: req.name,
        color: req.color,
        owner: req.owner,
        budget: req.budget,
        remaining_budget: req.budget,
        players: vec![],
    };

    let inserted = team.clone();
    state
        .engine
        .store()
        .with_write(move |tx| teams::insert(tx, &inserted))
        .await?;

    Ok((StatusCode::CREATED, Json(team)))
}

#[derive(Debug, Deserialize)]
pub struct RegisterPlayerRequest {
    pub name: String,
    pub photo: Option<String>,
    pub batting_style: Option<String>,
    pub bowling_style: Option<String>,
    pub tournament_id: String,
    pub base_price: i64,
    pub category: String,
    /// Register an existing player into another tournament instead of
    /// creating a new identity.
    pub player_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RegisterPlayerResponse {
    pub player: Player,
    pub participation: Participation,
}

/// POST /api/players/register — creates (or reuses) the Player and its
/// Participation for this tournament in one transaction.
pub async fn post_register_player(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RegisterPlayerRequest>,
) -> Result<(StatusCode, Json<RegisterPlayerResponse>), AuctionError> {
    require_master(&claims)?;
    require_positive_amount(req.base_price)?;

    let response = state
        .engine
        .store()
        .with_write(move |tx| {
            let player = match req.player_id {
                Some(existing) => {
                    players::get(tx, existing)?.ok_or(AuctionError::PlayerNotFound)?
                }
                None => {
                    let player = Player {
                        id: Uuid::new_v4(),
                        name: req.name.clone(),
                        photo: req.photo.clone(),
                        batting_style: req.batting_style.clone(),
                        bowling_style: req.bowling_style.clone(),
                    };
                    players::insert(tx, &player)?;
                    player
                }
            };

            let participation = Participation {
                id: Uuid::new_v4(),
                player_id: player.id,
                tournament_id: req.tournament_id.clone(),
                status: ParticipationStatus::Available,
                base_price: req.base_price,
                price: None,
                team_id: None,
                category: req.category.clone(),
            };
            participations::insert(tx, &participation)?;

            Ok(RegisterPlayerResponse {
                player,
                participation,
            })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /api/tournaments/:tid/players/:pid — removes the participation and
/// the player identity if no other tournament still references it.
pub async fn delete_participation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((tournament_id, player_id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, AuctionError> {
    require_master(&claims)?;

    let removed = state
        .engine
        .store()
        .with_write(move |tx| participations::remove(tx, player_id, &tournament_id))
        .await?;
    if !removed {
        return Err(AuctionError::PlayerNotFound);
    }
    Ok(Json(json!({ "ok": true })))
}
