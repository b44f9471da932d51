pub mod arena;
pub mod clock;
pub mod config;
pub mod encounter;
pub mod error;
pub mod loot;
pub mod reward;
pub mod rng;
pub mod scores;
pub mod service;
pub mod timeline;
pub mod wave;
pub mod web;

pub use config::{ConfigLoader, EncounterConfig, LoadReport};
pub use encounter::{EncounterController, EncounterSnapshot, KillDrop, KillOutcome};
pub use error::{ArenaError, ConfigError, LootError, ScoreError, WaveError};
pub use service::EncounterService;
pub use wave::{WaveEvent, WavePhase, WaveScheduler};
