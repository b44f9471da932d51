use std::{
    collections::HashSet,
    fmt,
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ItemRegistry, ItemStack, TierCatalog};
use crate::{error::LootError, rng::RandomSource};

/// Block position of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{},{},{}", self.world, self.x, self.y, self.z)
    }
}

/// Containers already rolled during the current loot epoch.
///
/// Container-open handlers and loot reloads may run on different threads;
/// every operation goes through one lock so claim is a single atomic
/// check-then-add.
#[derive(Debug, Default)]
pub struct RolledContainerSet {
    rolled: Mutex<HashSet<BlockPos>>,
}

impl RolledContainerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `pos` as rolled. Returns `false` when it already was.
    pub fn try_claim(&self, pos: &BlockPos) -> bool {
        self.rolled
            .lock()
            .expect("rolled container lock poisoned")
            .insert(pos.clone())
    }

    /// Gives a claim back after a fill that produced nothing.
    pub fn release(&self, pos: &BlockPos) {
        self.rolled
            .lock()
            .expect("rolled container lock poisoned")
            .remove(pos);
    }

    pub fn contains(&self, pos: &BlockPos) -> bool {
        self.rolled
            .lock()
            .expect("rolled container lock poisoned")
            .contains(pos)
    }

    /// Starts a new loot epoch. Returns how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut guard = self.rolled.lock().expect("rolled container lock poisoned");
        let cleared = guard.len();
        guard.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.rolled
            .lock()
            .expect("rolled container lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A container was opened by a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerOpen {
    pub location: BlockPos,
    /// The container is marked as a loot container in the world.
    pub loot_container: bool,
    pub empty: bool,
    pub slots: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotPlacement {
    pub slot: usize,
    pub stack: ItemStack,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerFill {
    pub tier: String,
    pub requested: u32,
    pub placements: Vec<SlotPlacement>,
    /// Entries dropped because their item or an enchantment is unknown.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContainerOutcome {
    NotLootContainer,
    AlreadyRolled,
    NotEmpty,
    Filled(ContainerFill),
}

/// Rolls the contents for one container with `slots` slots.
///
/// A tier is drawn, then `fill_count` entries are rolled into distinct slots
/// taken from a shuffled slot order. Entries that fail to materialize are
/// logged and skipped; their slot stays empty.
pub fn roll_container(
    catalog: &TierCatalog,
    registry: &ItemRegistry,
    slots: usize,
    rng: &mut (impl RandomSource + ?Sized),
) -> Result<ContainerFill, LootError> {
    let tier = catalog.choose_tier(rng)?;
    let requested = catalog.fill_count(tier, rng);
    debug!(tier = %tier.name, requested, "filling container");

    let order = shuffled_slots(slots, rng);
    let mut placements = Vec::new();
    let mut skipped = 0;
    for slot in order.into_iter().take(requested as usize) {
        let entry = catalog.roll_loot(tier, rng)?;
        match entry.materialize(registry) {
            Ok(stack) => placements.push(SlotPlacement { slot, stack }),
            Err(err) => {
                warn!(tier = %tier.name, item = %entry.item, "skipping loot entry: {err}");
                skipped += 1;
            }
        }
    }
    Ok(ContainerFill {
        tier: tier.name.clone(),
        requested,
        placements,
        skipped,
    })
}

/// Fisher–Yates over `RandomSource`, so slot order comes from the same seeded
/// stream as the tier and item draws; `SliceRandom::shuffle` needs an `Rng`.
fn shuffled_slots(slots: usize, rng: &mut (impl RandomSource + ?Sized)) -> Vec<usize> {
    let mut order: Vec<usize> = (0..slots).collect();
    for i in (1..order.len()).rev() {
        let j = rng.uniform_int(0, i as i64) as usize;
        order.swap(i, j.min(i));
    }
    order
}
