use thiserror::Error;

/// Failures of the weighted resolver and the tier catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LootError {
    #[error("cannot pick from an empty pool")]
    EmptyPool,
    #[error("weight {weight} is not positive")]
    InvalidWeight { weight: i64 },
    #[error("no tiers configured")]
    NoTiersConfigured,
    #[error("tier '{0}' is not defined")]
    UnknownTier(String),
    #[error("unknown item '{0}'")]
    UnknownItem(String),
    #[error("unknown enchantment '{0}'")]
    UnknownEnchantment(String),
}

/// Refusals from the wave scheduler. None of them change the run state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaveError {
    #[error("no waves configured")]
    NoWavesConfigured,
    #[error("waves are already running")]
    AlreadyRunning,
}

/// A single problem found while loading configuration. Issues are per entry;
/// the rest of the document still loads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("document is not valid YAML: {0}")]
    Document(String),
    #[error("section '{section}' is malformed: {message}")]
    Section { section: String, message: String },
    #[error("wave #{index} skipped: {reason}")]
    InvalidWave { index: usize, reason: String },
    #[error("mob '{kind}' in wave '{wave}' skipped: {reason}")]
    InvalidMobCount {
        wave: String,
        kind: String,
        reason: String,
    },
    #[error("loot entry #{index} of {context} skipped: {reason}")]
    InvalidLootEntry {
        context: String,
        index: usize,
        reason: String,
    },
    #[error("tier '{name}' skipped: {reason}")]
    InvalidTier { name: String, reason: String },
    #[error("tier weight for '{name}' skipped: {reason}")]
    InvalidTierWeight { name: String, reason: String },
    #[error("tier weight '{0}' has no matching tier")]
    DanglingTierWeight(String),
    #[error("point value for '{kind}' skipped: {reason}")]
    InvalidPoints { kind: String, reason: String },
}

/// Refusals from the scoreboard's session bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("session name must not be empty")]
    EmptySessionName,
}

/// Refusals reported by the world collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("unknown mob kind '{0}'")]
    UnknownMobKind(String),
    #[error("world '{0}' is not loaded")]
    WorldUnavailable(String),
}
