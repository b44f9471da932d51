use std::collections::HashMap;

use tracing::warn;

use super::{LootEntry, WeightedTable};
use crate::{error::LootError, rng::RandomSource};

#[derive(Debug, Clone, PartialEq)]
pub struct Tier {
    pub name: String,
    pub min_items: u32,
    pub max_items: u32,
    pub loot: WeightedTable<LootEntry>,
}

impl Tier {
    /// Tier names are case-insensitive and stored lowercase. A `max_items`
    /// below `min_items` is raised to it; the config loader rejects such tiers.
    pub fn new(name: &str, min_items: u32, max_items: u32, loot: WeightedTable<LootEntry>) -> Self {
        Self {
            name: name.trim().to_ascii_lowercase(),
            min_items,
            max_items: max_items.max(min_items),
            loot,
        }
    }
}

/// Named loot tiers plus the weighted draw that chooses between them.
#[derive(Debug, Clone, Default)]
pub struct TierCatalog {
    tiers: HashMap<String, Tier>,
    weights: WeightedTable<String>,
}

impl TierCatalog {
    /// Builds a catalog from tiers and `(tier name, weight)` pairs.
    ///
    /// Weight keys that name no tier are logged and pruned here, so a draw
    /// always resolves. Tiers without a weight stay unreachable.
    pub fn new(tiers: impl IntoIterator<Item = Tier>, weights: WeightedTable<String>) -> Self {
        let mut by_name: HashMap<String, Tier> = HashMap::new();
        for tier in tiers {
            if by_name.contains_key(&tier.name) {
                warn!(tier = %tier.name, "duplicate tier; keeping the first definition");
                continue;
            }
            by_name.insert(tier.name.clone(), tier);
        }
        let tiers = by_name;
        let mut weights = weights;
        weights.retain(|name| {
            let known = tiers.contains_key(name);
            if !known {
                warn!(tier = %name, "tier weight has no matching tier; ignoring it");
            }
            known
        });
        Self { tiers, weights }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.get(name)
    }

    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.weights.payloads().map(String::as_str)
    }

    pub fn choose_tier(&self, rng: &mut (impl RandomSource + ?Sized)) -> Result<&Tier, LootError> {
        let name = match self.weights.pick(rng) {
            Ok(name) => name,
            Err(LootError::EmptyPool) => return Err(LootError::NoTiersConfigured),
            Err(other) => return Err(other),
        };
        self.tiers
            .get(name)
            .ok_or_else(|| LootError::UnknownTier(name.clone()))
    }

    /// Number of items to place for one fill of `tier`.
    pub fn fill_count(&self, tier: &Tier, rng: &mut (impl RandomSource + ?Sized)) -> u32 {
        fill_count(tier, rng)
    }

    pub fn roll_loot<'t>(
        &self,
        tier: &'t Tier,
        rng: &mut (impl RandomSource + ?Sized),
    ) -> Result<&'t LootEntry, LootError> {
        tier.loot.pick(rng)
    }
}

pub fn fill_count(tier: &Tier, rng: &mut (impl RandomSource + ?Sized)) -> u32 {
    if tier.max_items <= tier.min_items {
        return tier.min_items;
    }
    let drawn = rng.uniform_int(i64::from(tier.min_items), i64::from(tier.max_items));
    drawn.clamp(i64::from(tier.min_items), i64::from(tier.max_items)) as u32
}
