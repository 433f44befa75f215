//! Authentication Models
//! Mission: User accounts and JWT claims with per-tournament role binding

use crate::auction::Operator;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: UserRole,
    /// For auctioneers: the single tournament they may operate on.
    pub tournament_id: Option<String>,
    pub created_at: String,
}

/// Roles for auction access control
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    #[serde(rename = "master")]
    Master, // full control over every tournament
    #[serde(rename = "auctioneer")]
    Auctioneer, // start/bid/complete for one bound tournament
    #[serde(rename = "viewer")]
    Viewer, // read-only access
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Master => "master",
            UserRole::Auctioneer => "auctioneer",
            UserRole::Viewer => "viewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "master" => Some(UserRole::Master),
            "auctioneer" => Some(UserRole::Auctioneer),
            "viewer" => Some(UserRole::Viewer),
            _ => None,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    pub username: String,
    pub role: UserRole,
    /// Bound tournament for auctioneers; absent for master/viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<String>,
    pub exp: usize, // expiration timestamp
}

impl Claims {
    /// Project claims into the identity shape the auction engine checks.
    pub fn as_operator(&self) -> Operator {
        Operator {
            username: self.username.clone(),
            is_master: self.role == UserRole::Master,
            is_auctioneer: self.role == UserRole::Auctioneer,
            bound_tournament: self.tournament_id.clone(),
        }
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: usize, // seconds until expiration
    pub role: UserRole,
    pub user: UserResponse,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub tournament_id: Option<String>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            tournament_id: user.tournament_id.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// Account creation request (master only)
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    /// Required when role is auctioneer.
    pub tournament_id: Option<String>,
}
