//! Message Dispatch
//!
//! Maps one decoded [`ClientMessage`] to one [`ServerMessage`] reply.
//! Socket handling lives in `server`; everything here is plain async code
//! over the engine so it can be driven directly in tests.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::engine::{EngineError, GameEngine};
use crate::game::player::PlayerId;
use crate::network::auth::{validate_token, AuthConfig, AuthError, Identity};
use crate::network::protocol::{
    AuthRequest, AuthResult, ClientMessage, ErrorCode, RegisterRequest, ServerError, ServerMessage,
};

/// Per-connection state.
#[derive(Debug, Default, Clone)]
pub struct ClientSession {
    identity: Option<Identity>,
}

impl ClientSession {
    /// Unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Who the connection acts as, if authenticated.
    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    /// Authenticated player.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.identity.map(|i| i.player_id)
    }
}

/// Routes client messages to engine operations.
#[derive(Clone)]
pub struct MessageHandler {
    engine: Arc<GameEngine>,
    auth: AuthConfig,
    version: String,
}

impl MessageHandler {
    /// Handler over a shared engine.
    pub fn new(engine: Arc<GameEngine>, auth: AuthConfig, version: impl Into<String>) -> Self {
        Self { engine, auth, version: version.into() }
    }

    /// The engine messages are routed to.
    pub fn engine(&self) -> &Arc<GameEngine> {
        &self.engine
    }

    /// Handle one message and produce the reply.
    pub async fn handle(&self, session: &mut ClientSession, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::Auth(req) => self.handle_auth(session, req),
            ClientMessage::Ping { timestamp } => ServerMessage::Pong {
                timestamp,
                server_time: Utc::now().timestamp_millis().max(0) as u64,
            },
            ClientMessage::Health => ServerMessage::Health(self.engine.health().await),
            ClientMessage::Leaderboard { limit } => match self.engine.leaderboard(limit).await {
                Ok(entries) => ServerMessage::Leaderboard { entries },
                Err(err) => engine_error(err),
            },
            ClientMessage::AdminStats => match require_admin(session) {
                Ok(_) => match self.engine.admin_stats().await {
                    Ok(stats) => ServerMessage::AdminStats(stats),
                    Err(err) => engine_error(err),
                },
                Err(reply) => reply,
            },
            ClientMessage::SetBanned { player_id, banned } => match require_admin(session) {
                Ok(operator) => match self.engine.set_banned(player_id, banned).await {
                    Ok(player) => {
                        info!(operator = %operator.player_id, player = %player_id, banned, "ban flag updated");
                        ServerMessage::BanUpdated { player_id, banned: player.banned }
                    }
                    Err(err) => engine_error(err),
                },
                Err(reply) => reply,
            },
            other => match session.player_id() {
                Some(id) => self.handle_player(id, other).await,
                None => ServerMessage::Error(ServerError::new(
                    ErrorCode::NotAuthenticated,
                    "must authenticate first",
                )),
            },
        }
    }

    /// Messages that act on the caller's own player.
    async fn handle_player(&self, id: PlayerId, msg: ClientMessage) -> ServerMessage {
        let reply = match msg {
            ClientMessage::Register(req) => self.handle_register(id, req).await,
            ClientMessage::GetPlayer => self.engine.get_player_view(id).await.map(ServerMessage::Player),
            ClientMessage::Tap { taps } => self
                .engine
                .tap(id, ClientMessage::tap_request(taps))
                .await
                .map(ServerMessage::TapResult),
            ClientMessage::PlayGame { game, stake, choice } => self
                .engine
                .play_game(id, ClientMessage::game_request(game, stake, choice))
                .await
                .map(ServerMessage::GameResult),
            ClientMessage::ClaimDaily => self.engine.claim_daily(id).await.map(ServerMessage::DailyClaimed),
            ClientMessage::UpdateProfile(patch) => self
                .engine
                .update_profile(id, patch)
                .await
                .map(|player| ServerMessage::ProfileUpdated { profile: player.profile }),
            ClientMessage::RecentActions { limit } => self
                .engine
                .recent_actions(id, limit)
                .await
                .map(|actions| ServerMessage::RecentActions { actions }),
            other => {
                warn!(player = %id, message = ?other, "unroutable message");
                Err(EngineError::Internal)
            }
        };

        reply.unwrap_or_else(engine_error)
    }

    async fn handle_register(&self, id: PlayerId, req: RegisterRequest) -> Result<ServerMessage, EngineError> {
        let registration = self
            .engine
            .register(id, req.profile(), req.referral_code.as_deref())
            .await?;
        let player = self.engine.get_player_view(id).await?;
        Ok(ServerMessage::Registered { created: registration.created, player })
    }

    fn handle_auth(&self, session: &mut ClientSession, req: AuthRequest) -> ServerMessage {
        let outcome = if self.auth.is_configured() {
            match req.token.as_deref() {
                Some(token) => validate_token(token, &self.auth).and_then(|claims| Identity::from_claims(&claims)),
                None => Err(AuthError::MissingClaim("token".into())),
            }
        } else {
            // Development mode: trust the declared id, never grant admin
            match req.player_id {
                Some(player_id) => Ok(Identity { player_id, admin: false }),
                None => Err(AuthError::MissingClaim("player_id".into())),
            }
        };

        match outcome {
            Ok(identity) => {
                session.identity = Some(identity);
                debug!(
                    player = %identity.player_id,
                    admin = identity.admin,
                    client_version = ?req.client_version,
                    "client authenticated"
                );
                ServerMessage::AuthResult(AuthResult {
                    success: true,
                    player_id: Some(identity.player_id),
                    admin: identity.admin,
                    error: None,
                    server_version: self.version.clone(),
                })
            }
            Err(err) => {
                session.identity = None;
                debug!(error = %err, "authentication rejected");
                let code = match err {
                    AuthError::Expired => ErrorCode::TokenExpired,
                    _ => ErrorCode::AuthFailed,
                };
                ServerMessage::AuthResult(AuthResult {
                    success: false,
                    player_id: None,
                    admin: false,
                    error: Some(format!("{:?}: {}", code, err)),
                    server_version: self.version.clone(),
                })
            }
        }
    }
}

fn require_admin(session: &ClientSession) -> Result<Identity, ServerMessage> {
    match session.identity() {
        Some(identity) if identity.admin => Ok(identity),
        Some(_) => Err(ServerMessage::Error(ServerError::new(ErrorCode::Forbidden, "admin role required"))),
        None => Err(ServerMessage::Error(ServerError::new(
            ErrorCode::NotAuthenticated,
            "must authenticate first",
        ))),
    }
}

fn engine_error(err: EngineError) -> ServerMessage {
    ServerMessage::Error(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::rng::DeterministicRng;
    use crate::game::action::GameKind;
    use crate::game::rules::EconomyRules;
    use crate::ledger::InMemoryStore;
    use crate::network::auth::TokenClaims;
    use chrono::TimeZone;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    const SECRET: &str = "keze-test-secret-at-least-32-bytes";

    struct Fixture {
        handler: MessageHandler,
        clock: Arc<ManualClock>,
    }

    fn fixture(auth: AuthConfig) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
        let engine = GameEngine::new(Arc::new(InMemoryStore::new()), EconomyRules::default())
            .with_clock(clock.clone())
            .with_rng(DeterministicRng::new(11));
        Fixture { handler: MessageHandler::new(Arc::new(engine), auth, "test"), clock }
    }

    fn secured() -> AuthConfig {
        AuthConfig { secret: Some(SECRET.into()), ..Default::default() }
    }

    fn token(sub: &str, role: Option<&str>) -> String {
        let now = Utc::now().timestamp() as u64;
        let claims = TokenClaims {
            sub: sub.into(),
            exp: now + 3600,
            iat: now,
            iss: None,
            aud: None,
            role: role.map(String::from),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn auth_with_id(id: i64) -> ClientMessage {
        ClientMessage::Auth(AuthRequest { token: None, player_id: Some(PlayerId(id)), client_version: None })
    }

    fn auth_with_token(token: String) -> ClientMessage {
        ClientMessage::Auth(AuthRequest { token: Some(token), player_id: None, client_version: None })
    }

    fn error_code(reply: &ServerMessage) -> Option<ErrorCode> {
        match reply {
            ServerMessage::Error(err) => Some(err.code),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_player_messages_need_auth() {
        let f = fixture(AuthConfig::default());
        let mut session = ClientSession::new();

        let reply = f.handler.handle(&mut session, ClientMessage::Tap { taps: 1 }).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::NotAuthenticated));

        // Public messages work anonymously
        let reply = f.handler.handle(&mut session, ClientMessage::Leaderboard { limit: None }).await;
        assert!(matches!(reply, ServerMessage::Leaderboard { .. }));
        let reply = f.handler.handle(&mut session, ClientMessage::Ping { timestamp: 5 }).await;
        assert!(matches!(reply, ServerMessage::Pong { timestamp: 5, .. }));
        let reply = f.handler.handle(&mut session, ClientMessage::Health).await;
        assert!(matches!(reply, ServerMessage::Health(h) if h.store_reachable));
    }

    #[tokio::test]
    async fn test_dev_auth_register_and_tap() {
        let f = fixture(AuthConfig::default());
        let mut session = ClientSession::new();

        match f.handler.handle(&mut session, auth_with_id(42)).await {
            ServerMessage::AuthResult(result) => {
                assert!(result.success);
                assert_eq!(result.player_id, Some(PlayerId(42)));
                assert!(!result.admin);
            }
            other => panic!("Wrong reply: {:?}", other),
        }

        let register = ClientMessage::Register(RegisterRequest {
            first_name: Some("Ana".into()),
            ..Default::default()
        });
        match f.handler.handle(&mut session, register.clone()).await {
            ServerMessage::Registered { created, player } => {
                assert!(created);
                assert_eq!(player.coins, 0);
            }
            other => panic!("Wrong reply: {:?}", other),
        }

        // Second registration only refreshes the profile
        let reply = f.handler.handle(&mut session, register).await;
        assert!(matches!(reply, ServerMessage::Registered { created: false, .. }));

        f.clock.advance(chrono::Duration::seconds(1));
        match f.handler.handle(&mut session, ClientMessage::Tap { taps: 5 }).await {
            ServerMessage::TapResult(result) => {
                assert_eq!(result.coins_earned, 5);
                assert_eq!(result.coins, 5);
            }
            other => panic!("Wrong reply: {:?}", other),
        }

        // Immediately again: too fast
        let reply = f.handler.handle(&mut session, ClientMessage::Tap { taps: 5 }).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::RateLimited));

        match f.handler.handle(&mut session, ClientMessage::RecentActions { limit: None }).await {
            ServerMessage::RecentActions { actions } => assert_eq!(actions.len(), 1),
            other => panic!("Wrong reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_claim_daily_once_per_day() {
        let f = fixture(AuthConfig::default());
        let mut session = ClientSession::new();
        f.handler.handle(&mut session, auth_with_id(9)).await;
        f.handler.handle(&mut session, ClientMessage::Register(RegisterRequest::default())).await;

        match f.handler.handle(&mut session, ClientMessage::ClaimDaily).await {
            ServerMessage::DailyClaimed(claim) => {
                assert_eq!(claim.streak, 1);
                assert_eq!(claim.coins, 1_000);
            }
            other => panic!("Wrong reply: {:?}", other),
        }
        let reply = f.handler.handle(&mut session, ClientMessage::ClaimDaily).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::AlreadyClaimed));

        f.clock.advance(chrono::Duration::days(1));
        match f.handler.handle(&mut session, ClientMessage::GetPlayer).await {
            ServerMessage::Player(view) => assert_eq!(view.daily_streak, 1),
            other => panic!("Wrong reply: {:?}", other),
        }
        let reply = f.handler.handle(&mut session, ClientMessage::ClaimDaily).await;
        assert!(matches!(reply, ServerMessage::DailyClaimed(claim) if claim.streak == 2));
    }

    #[tokio::test]
    async fn test_engine_errors_become_error_replies() {
        let f = fixture(AuthConfig::default());
        let mut session = ClientSession::new();
        f.handler.handle(&mut session, auth_with_id(7)).await;

        let reply = f.handler.handle(&mut session, ClientMessage::GetPlayer).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::NotFound));

        f.handler
            .handle(&mut session, ClientMessage::Register(RegisterRequest::default()))
            .await;
        let reply = f
            .handler
            .handle(&mut session, ClientMessage::PlayGame { game: GameKind::Spin, stake: 100, choice: None })
            .await;
        assert_eq!(error_code(&reply), Some(ErrorCode::InsufficientCoins));

        let reply = f.handler.handle(&mut session, ClientMessage::Tap { taps: 0 }).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::InvalidInput));
    }

    #[tokio::test]
    async fn test_dev_auth_requires_player_id() {
        let f = fixture(AuthConfig::default());
        let mut session = ClientSession::new();
        let reply = f
            .handler
            .handle(&mut session, ClientMessage::Auth(AuthRequest { token: None, player_id: None, client_version: None }))
            .await;
        assert!(matches!(reply, ServerMessage::AuthResult(AuthResult { success: false, .. })));
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_configured_auth_ignores_declared_id() {
        let f = fixture(secured());
        let mut session = ClientSession::new();

        let reply = f.handler.handle(&mut session, auth_with_id(42)).await;
        assert!(matches!(reply, ServerMessage::AuthResult(AuthResult { success: false, .. })));
        assert!(session.identity().is_none());

        let reply = f.handler.handle(&mut session, auth_with_token(token("42", None))).await;
        assert!(matches!(reply, ServerMessage::AuthResult(AuthResult { success: true, .. })));
        assert_eq!(session.player_id(), Some(PlayerId(42)));
    }

    #[tokio::test]
    async fn test_bad_token_clears_identity() {
        let f = fixture(secured());
        let mut session = ClientSession::new();
        f.handler.handle(&mut session, auth_with_token(token("42", None))).await;
        assert!(session.identity().is_some());

        let reply = f.handler.handle(&mut session, auth_with_token("not.a.token".into())).await;
        assert!(matches!(reply, ServerMessage::AuthResult(AuthResult { success: false, .. })));
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_admin_messages_need_admin_role() {
        let f = fixture(secured());

        let mut player = ClientSession::new();
        f.handler.handle(&mut player, auth_with_token(token("1", None))).await;
        f.handler
            .handle(&mut player, ClientMessage::Register(RegisterRequest::default()))
            .await;
        let reply = f.handler.handle(&mut player, ClientMessage::AdminStats).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::Forbidden));

        let mut anonymous = ClientSession::new();
        let reply = f.handler.handle(&mut anonymous, ClientMessage::AdminStats).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::NotAuthenticated));

        let mut admin = ClientSession::new();
        f.handler.handle(&mut admin, auth_with_token(token("99", Some("admin")))).await;
        match f.handler.handle(&mut admin, ClientMessage::AdminStats).await {
            ServerMessage::AdminStats(stats) => assert_eq!(stats.total_users, 1),
            other => panic!("Wrong reply: {:?}", other),
        }

        let reply = f
            .handler
            .handle(&mut admin, ClientMessage::SetBanned { player_id: PlayerId(1), banned: true })
            .await;
        assert!(matches!(reply, ServerMessage::BanUpdated { banned: true, .. }));

        // The banned player can look but not act
        let reply = f.handler.handle(&mut player, ClientMessage::GetPlayer).await;
        assert!(matches!(reply, ServerMessage::Player(view) if view.banned));
        f.clock.advance(chrono::Duration::seconds(1));
        let reply = f.handler.handle(&mut player, ClientMessage::Tap { taps: 1 }).await;
        assert_eq!(error_code(&reply), Some(ErrorCode::NotFoundOrBanned));
    }
}
