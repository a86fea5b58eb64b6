//! # Keze Tap Server
//!
//! Server-authoritative economy for the Keze tap-to-earn game: coins,
//! energy, levels, mini-games, referrals and the audit trail. Clients only
//! ever send intents; every balance is computed here.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      KEZE TAP SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Injected primitives                       │
//! │  ├── rng.rs      - Seedable Xorshift128+ random source       │
//! │  └── clock.rs    - System and manual clocks                  │
//! │                                                              │
//! │  game/           - Economy rules (pure)                      │
//! │  ├── rules.rs    - Tunable constants                         │
//! │  ├── player.rs   - Player state and read model               │
//! │  ├── energy.rs   - Regeneration                              │
//! │  ├── validate.rs - Anti-cheat checks                         │
//! │  ├── reward.rs   - Tap and mini-game payouts                 │
//! │  ├── progression.rs - Experience and levels                  │
//! │  ├── daily.rs    - Daily attendance streak                   │
//! │  └── record.rs   - Audit entries                             │
//! │                                                              │
//! │  ledger/         - Storage contract                          │
//! │  ├── memory.rs   - In-memory store                           │
//! │  └── snapshot.rs - Checksummed on-disk snapshot              │
//! │                                                              │
//! │  engine/         - Operations (locks, timeouts, audit)       │
//! │                                                              │
//! │  network/        - WebSocket gateway                         │
//! │  ├── server.rs   - Accept loop and connections               │
//! │  ├── handler.rs  - Message dispatch                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── auth.rs     - JWT verification                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! Every mutating operation for a player runs under that player's lock and
//! commits through a revision-guarded [`ledger::PlayerDelta`], so
//! concurrent requests can never spend the same energy or coins twice.
//! Time and randomness are injected, which makes every rule reproducible
//! in tests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod engine;
pub mod game;
pub mod ledger;
pub mod network;

// Re-export commonly used types
pub use config::ServerConfig;
pub use core::rng::DeterministicRng;
pub use engine::{EngineError, GameEngine};
pub use game::player::{Player, PlayerId, PlayerView};
pub use game::rules::EconomyRules;
pub use ledger::{InMemoryStore, Store};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
