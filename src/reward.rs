//! Points and replacement drops for kills of wave-spawned adversaries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    arena::{MobKind, PlayerId},
    error::LootError,
    loot::{LootEntry, WeightedTable},
    rng::RandomSource,
};

pub const DEFAULT_POINTS: u32 = 1;

/// Points per mob kind; unmapped kinds are worth [`DEFAULT_POINTS`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointTable {
    points: HashMap<MobKind, u32>,
}

impl PointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: MobKind, points: u32) {
        self.points.insert(kind, points);
    }

    pub fn points_for(&self, kind: &MobKind) -> u32 {
        self.points.get(kind).copied().unwrap_or(DEFAULT_POINTS)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<(MobKind, u32)> for PointTable {
    fn from_iter<I: IntoIterator<Item = (MobKind, u32)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Replacement drop lists per mob kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MobLootTable {
    drops: HashMap<MobKind, WeightedTable<LootEntry>>,
}

impl MobLootTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: MobKind, table: WeightedTable<LootEntry>) {
        self.drops.insert(kind, table);
    }

    pub fn get(&self, kind: &MobKind) -> Option<&WeightedTable<LootEntry>> {
        self.drops.get(kind)
    }

    pub fn len(&self) -> usize {
        self.drops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillReward {
    pub points: u32,
    /// When present, replaces every default drop of the victim.
    pub override_drop: Option<LootEntry>,
}

pub fn resolve_kill_reward(
    kind: &MobKind,
    points: &PointTable,
    loot: &MobLootTable,
    rng: &mut (impl RandomSource + ?Sized),
) -> Result<KillReward, LootError> {
    let override_drop = match loot.get(kind) {
        Some(table) => Some(table.pick(rng)?.clone()),
        None => None,
    };
    Ok(KillReward {
        points: points.points_for(kind),
        override_drop,
    })
}

/// A kill reported by the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillEvent {
    pub killer: Option<PlayerId>,
    pub victim: MobKind,
    /// The victim carries the wave-spawned tag.
    pub wave_spawned: bool,
    pub world: String,
}

impl KillEvent {
    /// A kill counts when a participant killed a wave-spawned mob inside the
    /// tracked world (world names compare case-insensitively).
    pub fn qualifying_killer(&self, tracked_world: &str) -> Option<&PlayerId> {
        if !self.wave_spawned || !self.world.eq_ignore_ascii_case(tracked_world) {
            return None;
        }
        self.killer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loot::ItemSpec;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_unmapped_kind_gets_default_points_and_no_drop() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let reward = resolve_kill_reward(
            &MobKind::new("slime"),
            &PointTable::new(),
            &MobLootTable::new(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            reward,
            KillReward {
                points: DEFAULT_POINTS,
                override_drop: None
            }
        );
    }

    #[test]
    fn test_mapped_kind_gets_points_and_drop() {
        let zombie = MobKind::new("zombie");
        let points: PointTable = [(zombie.clone(), 2)].into_iter().collect();
        let mut loot = MobLootTable::new();
        let flesh = LootEntry::new(ItemSpec::simple("rotten_flesh").unwrap(), 3);
        loot.insert(
            zombie.clone(),
            WeightedTable::try_from_entries([(1, flesh.clone())]).unwrap(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let reward = resolve_kill_reward(&zombie, &points, &loot, &mut rng).unwrap();
        assert_eq!(reward.points, 2);
        assert_eq!(reward.override_drop, Some(flesh));
    }

    #[test]
    fn test_qualification() {
        let mut kill = KillEvent {
            killer: Some(PlayerId("alex".into())),
            victim: MobKind::new("zombie"),
            wave_spawned: true,
            world: "World".into(),
        };
        assert!(kill.qualifying_killer("world").is_some());
        kill.wave_spawned = false;
        assert!(kill.qualifying_killer("world").is_none());
        kill.wave_spawned = true;
        kill.world = "nether".into();
        assert!(kill.qualifying_killer("world").is_none());
        kill.world = "world".into();
        kill.killer = None;
        assert!(kill.qualifying_killer("world").is_none());
    }
}
