//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is one JSON object tagged by `type`.

use serde::{Serialize, Deserialize};

use crate::engine::{DailyClaim, EngineError, GameResult, HealthReport, TapResult};
use crate::game::action::{CoinSide, GameKind, GameRequest, TapRequest};
use crate::game::player::{PlayerId, PlayerProfile, PlayerView, ProfilePatch};
use crate::game::record::GameActionRecord;
use crate::game::validate::Resource;
use crate::ledger::{AggregateStats, LeaderboardEntry};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate the connection.
    Auth(AuthRequest),

    /// First contact: create the player or refresh its profile.
    Register(RegisterRequest),

    /// Fetch the caller's balances.
    GetPlayer,

    /// Batch of taps.
    Tap { taps: i64 },

    /// Stake coins on a mini-game.
    PlayGame {
        game: GameKind,
        stake: i64,
        #[serde(default)]
        choice: Option<CoinSide>,
    },

    /// Take today's attendance reward.
    ClaimDaily,

    /// Change display fields.
    UpdateProfile(ProfilePatch),

    /// Top players by lifetime earnings.
    Leaderboard {
        #[serde(default)]
        limit: Option<usize>,
    },

    /// The caller's recent audit rows.
    RecentActions {
        #[serde(default)]
        limit: Option<usize>,
    },

    /// Aggregate counters (admin only).
    AdminStats,

    /// Ban or unban a player (admin only).
    SetBanned { player_id: PlayerId, banned: bool },

    /// Store reachability.
    Health,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Signed session token.
    #[serde(default)]
    pub token: Option<String>,
    /// Self-declared id, honoured only when the server has no auth key.
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    /// Client version for logging.
    #[serde(default)]
    pub client_version: Option<String>,
}

/// Registration request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Platform handle.
    #[serde(default)]
    pub username: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Inviter's referral code.
    #[serde(default)]
    pub referral_code: Option<String>,
}

impl RegisterRequest {
    /// Profile part of the request.
    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

impl ClientMessage {
    /// Tap request carried by a `tap` message.
    pub fn tap_request(taps: i64) -> TapRequest {
        TapRequest { taps }
    }

    /// Game request carried by a `play_game` message.
    pub fn game_request(game: GameKind, stake: i64, choice: Option<CoinSide>) -> GameRequest {
        GameRequest { kind: game, stake, choice }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Registration result.
    Registered { created: bool, player: PlayerView },

    /// Current balances.
    Player(PlayerView),

    /// Accepted tap.
    TapResult(TapResult),

    /// Accepted game.
    GameResult(GameResult),

    /// Accepted daily claim.
    DailyClaimed(DailyClaim),

    /// Profile after an update.
    ProfileUpdated { profile: PlayerProfile },

    /// Ranked players.
    Leaderboard { entries: Vec<LeaderboardEntry> },

    /// Audit rows, newest first.
    RecentActions { actions: Vec<GameActionRecord> },

    /// Aggregate counters.
    AdminStats(AggregateStats),

    /// Ban flag after an update.
    BanUpdated { player_id: PlayerId, banned: bool },

    /// Store reachability.
    Health(HealthReport),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Authenticated player.
    pub player_id: Option<PlayerId>,
    /// Operator privileges.
    pub admin: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Error with an explicit code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Admin role required.
    Forbidden,
    /// Invalid input.
    InvalidInput,
    /// Unknown player.
    NotFound,
    /// Unknown or banned player.
    NotFoundOrBanned,
    /// Not enough energy.
    InsufficientEnergy,
    /// Not enough coins.
    InsufficientCoins,
    /// Rate limited.
    RateLimited,
    /// Player already exists.
    AlreadyExists,
    /// Daily reward already taken today.
    AlreadyClaimed,
    /// Store unreachable or timed out.
    StorageUnavailable,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::InvalidInput(_) => ErrorCode::InvalidInput,
            EngineError::NotFound(_) => ErrorCode::NotFound,
            EngineError::NotFoundOrBanned => ErrorCode::NotFoundOrBanned,
            EngineError::InsufficientResource(Resource::Energy) => ErrorCode::InsufficientEnergy,
            EngineError::InsufficientResource(Resource::Coins) => ErrorCode::InsufficientCoins,
            EngineError::RateLimited => ErrorCode::RateLimited,
            EngineError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            EngineError::AlreadyClaimed => ErrorCode::AlreadyClaimed,
            EngineError::StorageUnavailable => ErrorCode::StorageUnavailable,
            EngineError::Internal => ErrorCode::InternalError,
        }
    }
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        Self { code: ErrorCode::from(&err), message: err.to_string() }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
