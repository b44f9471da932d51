//! The game-world collaborator: the narrow set of requests the encounter
//! makes of the world, plus an in-memory implementation.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ArenaError;

/// Adversary kind, normalized to uppercase (`zombie` and `ZOMBIE` match).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MobKind(String);

impl MobKind {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MobKind {
    fn from(value: String) -> Self {
        MobKind::new(&value)
    }
}

impl From<MobKind> for String {
    fn from(value: MobKind) -> Self {
        value.0
    }
}

impl fmt::Display for MobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn offset(&self, dx: f64, dz: f64) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x + dx,
            y: self.y,
            z: self.z + dz,
        }
    }

    pub fn horizontal_distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

/// Requests the encounter makes of the world. Every call is fire-and-forget:
/// implementations must not block on world I/O.
pub trait Arena {
    /// Spawns one adversary and tags it as wave-spawned.
    fn spawn_entity(&mut self, kind: &MobKind, at: &Position) -> Result<EntityHandle, ArenaError>;
    /// Removes every wave-spawned hostile in `world`. Returns how many were removed.
    fn despawn_all_hostiles(&mut self, world: &str) -> usize;
    fn broadcast(&mut self, message: &str);
    fn notify_player(&mut self, player: &PlayerId, message: &str);
    /// Empties every loot container in `world` ahead of a new loot epoch.
    fn clear_loot_containers(&mut self, world: &str) -> usize;
}

/// One recorded request, in call order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ArenaCall {
    Spawn { kind: MobKind, at: Position },
    Despawn { world: String, removed: usize },
    Broadcast { message: String },
    Notify { player: PlayerId, message: String },
    ClearLoot { world: String },
}

/// In-memory world used by the runner, the HTTP service and tests.
#[derive(Debug, Default)]
pub struct SimulatedArena {
    next_handle: u64,
    alive: HashMap<EntityHandle, (MobKind, Position)>,
    known_kinds: Option<HashSet<MobKind>>,
    calls: Vec<ArenaCall>,
    record: bool,
    loot_clears: usize,
}

impl SimulatedArena {
    pub fn new() -> Self {
        Self {
            record: true,
            ..Self::default()
        }
    }

    /// Rejects spawns of kinds outside `kinds`.
    pub fn with_known_kinds<'a>(mut self, kinds: impl IntoIterator<Item = &'a str>) -> Self {
        self.known_kinds = Some(kinds.into_iter().map(MobKind::new).collect());
        self
    }

    /// Stops keeping the call log; long-running servers would grow it forever.
    pub fn without_call_log(mut self) -> Self {
        self.record = false;
        self
    }

    pub fn calls(&self) -> &[ArenaCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<ArenaCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    pub fn alive(&self) -> impl Iterator<Item = (&EntityHandle, &MobKind, &Position)> {
        self.alive.iter().map(|(h, (k, p))| (h, k, p))
    }

    pub fn spawn_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ArenaCall::Spawn { .. }))
            .count()
    }

    /// Loot-container clears requested so far, counted even without a call log.
    pub fn loot_clears(&self) -> usize {
        self.loot_clears
    }

    pub fn broadcasts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ArenaCall::Broadcast { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    fn log(&mut self, call: ArenaCall) {
        if self.record {
            self.calls.push(call);
        }
    }
}

impl Arena for SimulatedArena {
    fn spawn_entity(&mut self, kind: &MobKind, at: &Position) -> Result<EntityHandle, ArenaError> {
        if let Some(known) = &self.known_kinds {
            if !known.contains(kind) {
                return Err(ArenaError::UnknownMobKind(kind.to_string()));
            }
        }
        self.next_handle += 1;
        let handle = EntityHandle(self.next_handle);
        self.alive.insert(handle, (kind.clone(), at.clone()));
        self.log(ArenaCall::Spawn {
            kind: kind.clone(),
            at: at.clone(),
        });
        Ok(handle)
    }

    fn despawn_all_hostiles(&mut self, world: &str) -> usize {
        let before = self.alive.len();
        self.alive.retain(|_, (_, pos)| pos.world != world);
        let removed = before - self.alive.len();
        debug!(world, removed, "despawned wave hostiles");
        self.log(ArenaCall::Despawn {
            world: world.to_string(),
            removed,
        });
        removed
    }

    fn broadcast(&mut self, message: &str) {
        info!(target: "waveforge::broadcast", "{message}");
        self.log(ArenaCall::Broadcast {
            message: message.to_string(),
        });
    }

    fn notify_player(&mut self, player: &PlayerId, message: &str) {
        debug!(%player, "{message}");
        self.log(ArenaCall::Notify {
            player: player.clone(),
            message: message.to_string(),
        });
    }

    fn clear_loot_containers(&mut self, world: &str) -> usize {
        self.loot_clears += 1;
        self.log(ArenaCall::ClearLoot {
            world: world.to_string(),
        });
        0
    }
}
