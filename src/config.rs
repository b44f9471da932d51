//! Encounter configuration.
//!
//! One YAML document, read section by section: a malformed section falls back
//! to its defaults and a malformed entry is dropped on its own, each recorded
//! as a [`ConfigError`] in the [`LoadReport`].

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize};
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use crate::{
    arena::{MobKind, Position},
    error::ConfigError,
    loot::{ItemRegistry, ItemSpec, LootEntry, Tier, TierCatalog, WeightedTable},
    reward::{MobLootTable, PointTable},
    wave::{SpawnArea, WaveDefinition, WavePlan, WaveTiming},
};

fn default_world() -> String {
    "world".to_string()
}

fn default_initial_countdown() -> u32 {
    15
}

fn default_between_waves_countdown() -> u32 {
    10
}

fn default_remaining_notice_interval() -> u32 {
    15
}

fn default_spawn_y() -> f64 {
    64.0
}

fn default_radius() -> f64 {
    10.0
}

fn default_amount() -> u32 {
    1
}

fn default_min_items() -> u32 {
    1
}

fn default_max_items() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
struct RawTiming {
    #[serde(default = "default_initial_countdown", alias = "initial-countdown")]
    initial_countdown: u32,
    #[serde(
        default = "default_between_waves_countdown",
        alias = "between-waves-countdown"
    )]
    between_waves_countdown: u32,
    #[serde(
        default = "default_remaining_notice_interval",
        alias = "remaining-notice-interval"
    )]
    remaining_notice_interval: u32,
}

impl Default for RawTiming {
    fn default() -> Self {
        Self {
            initial_countdown: default_initial_countdown(),
            between_waves_countdown: default_between_waves_countdown(),
            remaining_notice_interval: default_remaining_notice_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSpawnPoint {
    #[serde(default = "default_world")]
    world: String,
    #[serde(default)]
    x: f64,
    #[serde(default = "default_spawn_y")]
    y: f64,
    #[serde(default)]
    z: f64,
}

impl Default for RawSpawnPoint {
    fn default() -> Self {
        Self {
            world: default_world(),
            x: 0.0,
            y: default_spawn_y(),
            z: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSpawner {
    #[serde(default, alias = "spawnPoint")]
    spawn_point: RawSpawnPoint,
    #[serde(default = "default_radius")]
    radius: f64,
    #[serde(default)]
    waves: Vec<Value>,
    #[serde(default)]
    points: Mapping,
    #[serde(default)]
    loot: Mapping,
}

impl Default for RawSpawner {
    fn default() -> Self {
        Self {
            spawn_point: RawSpawnPoint::default(),
            radius: default_radius(),
            waves: Vec::new(),
            points: Mapping::new(),
            loot: Mapping::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawWave {
    name: String,
    duration: i64,
    #[serde(alias = "spawnInterval")]
    spawn_interval: i64,
    #[serde(default)]
    mobs: Mapping,
}

#[derive(Debug, Deserialize)]
struct RawLootEntry {
    item: String,
    weight: i64,
    #[serde(default = "default_amount")]
    amount: u32,
    #[serde(default)]
    enchantments: BTreeMap<String, u32>,
}

#[derive(Debug, Deserialize)]
struct RawChest {
    #[serde(default = "default_world")]
    world: String,
    #[serde(default, alias = "tier-chances")]
    tier_chances: Mapping,
    #[serde(default)]
    tiers: Mapping,
}

impl Default for RawChest {
    fn default() -> Self {
        Self {
            world: default_world(),
            tier_chances: Mapping::new(),
            tiers: Mapping::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTier {
    #[serde(default = "default_min_items", alias = "min-items")]
    min_items: u32,
    #[serde(default = "default_max_items", alias = "max-items")]
    max_items: u32,
    #[serde(default)]
    loot: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawItems {
    #[serde(default)]
    materials: Option<Vec<String>>,
    #[serde(default)]
    enchantments: Option<Vec<String>>,
}

/// Everything an encounter needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct EncounterConfig {
    /// World whose kills earn points.
    pub tracked_world: String,
    pub timing: WaveTiming,
    pub spawn_area: SpawnArea,
    pub plan: WavePlan,
    pub points: PointTable,
    pub mob_loot: MobLootTable,
    /// World whose loot containers are emptied on a loot reload.
    pub chest_world: String,
    pub catalog: TierCatalog,
    pub registry: ItemRegistry,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            tracked_world: default_world(),
            timing: WaveTiming::default(),
            spawn_area: SpawnArea::default(),
            plan: WavePlan::default(),
            points: PointTable::new(),
            mob_loot: MobLootTable::new(),
            chest_world: default_world(),
            catalog: TierCatalog::default(),
            registry: ItemRegistry::open(),
        }
    }
}

/// Result of a load: the usable configuration plus every entry that was
/// dropped on the way.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub config: EncounterConfig,
    pub issues: Vec<ConfigError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Reads and resolves `file` relative to the base directory. Only I/O
    /// failures are errors; content problems end up in the report.
    pub fn load(&self, file: impl AsRef<Path>) -> Result<LoadReport> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read encounter config {}", path.display()))?;
        let report = from_yaml_str(&data);
        for issue in &report.issues {
            warn!(file = %path.display(), "{issue}");
        }
        info!(
            file = %path.display(),
            waves = report.config.plan.len(),
            tiers = report.config.catalog.tier_names().count(),
            issues = report.issues.len(),
            "encounter config loaded"
        );
        Ok(report)
    }
}

/// Resolves a YAML document. Never fails: an unreadable document yields the
/// defaults plus a [`ConfigError::Document`] issue.
pub fn from_yaml_str(text: &str) -> LoadReport {
    let mut issues = Vec::new();
    let doc = match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Mapping(doc)) => doc,
        Ok(Value::Null) => Mapping::new(),
        Ok(_) => {
            issues.push(ConfigError::Document(
                "top level must be a mapping".to_string(),
            ));
            Mapping::new()
        }
        Err(err) => {
            issues.push(ConfigError::Document(err.to_string()));
            Mapping::new()
        }
    };

    let tracked_world: String =
        section(&doc, &["tracked_world", "tracked-world"], &mut issues).unwrap_or_else(default_world);
    let timing: RawTiming = section(&doc, &["timing"], &mut issues).unwrap_or_default();
    let spawner: RawSpawner = section(&doc, &["spawner"], &mut issues).unwrap_or_default();
    let chest: RawChest = section(&doc, &["chest"], &mut issues).unwrap_or_default();
    let items: RawItems = section(&doc, &["items"], &mut issues).unwrap_or_default();

    let mut registry = ItemRegistry::open();
    if let Some(materials) = &items.materials {
        registry = registry.with_materials(materials.iter().map(String::as_str));
    }
    if let Some(enchantments) = &items.enchantments {
        registry = registry.with_enchantments(enchantments.iter().map(String::as_str));
    }

    let config = EncounterConfig {
        tracked_world,
        timing: WaveTiming {
            initial_countdown_secs: timing.initial_countdown,
            between_waves_countdown_secs: timing.between_waves_countdown,
            remaining_notice_secs: timing.remaining_notice_interval.max(1),
        },
        spawn_area: SpawnArea {
            center: Position {
                world: spawner.spawn_point.world.clone(),
                x: spawner.spawn_point.x,
                y: spawner.spawn_point.y,
                z: spawner.spawn_point.z,
            },
            radius: spawner.radius.max(0.0),
        },
        plan: parse_waves(&spawner.waves, &mut issues),
        points: parse_points(&spawner.points, &mut issues),
        mob_loot: parse_mob_loot(&spawner.loot, &mut issues),
        chest_world: chest.world.clone(),
        catalog: parse_catalog(&chest, &mut issues),
        registry,
    };
    LoadReport { config, issues }
}

/// Deserializes the first present key of `keys`. Absent sections are `None`
/// without an issue.
fn section<T: DeserializeOwned>(
    doc: &Mapping,
    keys: &[&str],
    issues: &mut Vec<ConfigError>,
) -> Option<T> {
    let (key, value) = keys
        .iter()
        .find_map(|key| doc.get(*key).map(|value| (*key, value)))?;
    if value.is_null() {
        return None;
    }
    match serde_yaml::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            issues.push(ConfigError::Section {
                section: key.to_string(),
                message: err.to_string(),
            });
            None
        }
    }
}

fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integers may also be written as strings.
fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn parse_waves(raw: &[Value], issues: &mut Vec<ConfigError>) -> WavePlan {
    let mut waves = Vec::new();
    for (index, value) in raw.iter().enumerate() {
        let wave: RawWave = match serde_yaml::from_value(value.clone()) {
            Ok(wave) => wave,
            Err(err) => {
                issues.push(ConfigError::InvalidWave {
                    index,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let mut mobs = Vec::new();
        for (key, count) in &wave.mobs {
            let kind = key_string(key).unwrap_or_default();
            match as_integer(count).map(u32::try_from) {
                Some(Ok(count)) if !kind.is_empty() => mobs.push((MobKind::new(&kind), count)),
                _ => issues.push(ConfigError::InvalidMobCount {
                    wave: wave.name.clone(),
                    kind,
                    reason: "count must be a non-negative integer".to_string(),
                }),
            }
        }
        let duration = u32::try_from(wave.duration).unwrap_or(0);
        let interval = u32::try_from(wave.spawn_interval).unwrap_or(0);
        match WaveDefinition::new(&wave.name, duration, interval, mobs) {
            Ok(definition) => waves.push(definition),
            Err(reason) => issues.push(ConfigError::InvalidWave {
                index,
                reason: reason.to_string(),
            }),
        }
    }
    WavePlan::new(waves)
}

fn parse_points(raw: &Mapping, issues: &mut Vec<ConfigError>) -> PointTable {
    let mut points = PointTable::new();
    for (key, value) in raw {
        let kind = key_string(key).unwrap_or_default();
        match as_integer(value).map(u32::try_from) {
            Some(Ok(value)) if !kind.is_empty() => points.insert(MobKind::new(&kind), value),
            _ => issues.push(ConfigError::InvalidPoints {
                kind,
                reason: "points must be a non-negative integer".to_string(),
            }),
        }
    }
    points
}

fn parse_mob_loot(raw: &Mapping, issues: &mut Vec<ConfigError>) -> MobLootTable {
    let mut table = MobLootTable::new();
    for (key, value) in raw {
        let Some(kind) = key_string(key) else {
            continue;
        };
        let context = format!("mob '{kind}'");
        let entries: Vec<Value> = match serde_yaml::from_value(value.clone()) {
            Ok(entries) => entries,
            Err(err) => {
                issues.push(ConfigError::Section {
                    section: format!("spawner.loot.{kind}"),
                    message: err.to_string(),
                });
                continue;
            }
        };
        let loot = parse_loot_list(&context, &entries, issues);
        if loot.is_empty() {
            warn!(%kind, "no usable loot entries; default drops are kept");
            continue;
        }
        table.insert(MobKind::new(&kind), loot);
    }
    table
}

fn parse_loot_list(
    context: &str,
    entries: &[Value],
    issues: &mut Vec<ConfigError>,
) -> WeightedTable<LootEntry> {
    let mut table = WeightedTable::new();
    for (index, value) in entries.iter().enumerate() {
        let mut skip = |reason: String| {
            issues.push(ConfigError::InvalidLootEntry {
                context: context.to_string(),
                index,
                reason,
            })
        };
        let raw: RawLootEntry = match serde_yaml::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(err) => {
                skip(err.to_string());
                continue;
            }
        };
        let item: ItemSpec = match raw.item.parse() {
            Ok(item) => item,
            Err(err) => {
                skip(format!("{err}"));
                continue;
            }
        };
        let entry = raw
            .enchantments
            .iter()
            .fold(LootEntry::new(item, raw.amount), |entry, (name, level)| {
                entry.with_enchantment(name, *level)
            });
        if let Err(err) = table.push(raw.weight, entry) {
            skip(err.to_string());
        }
    }
    table
}

fn parse_catalog(chest: &RawChest, issues: &mut Vec<ConfigError>) -> TierCatalog {
    let mut tiers = Vec::new();
    for (key, value) in &chest.tiers {
        let Some(name) = key_string(key) else {
            continue;
        };
        let raw: RawTier = match serde_yaml::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(err) => {
                issues.push(ConfigError::InvalidTier {
                    name,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let lowered = name.trim().to_ascii_lowercase();
        if tiers.iter().any(|tier: &Tier| tier.name == lowered) {
            issues.push(ConfigError::InvalidTier {
                name,
                reason: "duplicate tier name".to_string(),
            });
            continue;
        }
        if raw.max_items < raw.min_items {
            issues.push(ConfigError::InvalidTier {
                name,
                reason: "max-items below min-items".to_string(),
            });
            continue;
        }
        let loot = parse_loot_list(&format!("tier '{name}'"), &raw.loot, issues);
        if loot.is_empty() {
            issues.push(ConfigError::InvalidTier {
                name,
                reason: "no usable loot entries".to_string(),
            });
            continue;
        }
        tiers.push(Tier::new(&name, raw.min_items, raw.max_items, loot));
    }

    let mut weights = WeightedTable::new();
    for (key, value) in &chest.tier_chances {
        let name = key_string(key).unwrap_or_default().to_ascii_lowercase();
        if !tiers.iter().any(|tier| tier.name == name) {
            issues.push(ConfigError::DanglingTierWeight(name));
            continue;
        }
        let pushed = match as_integer(value) {
            Some(weight) => weights.push(weight, name.clone()).map_err(|err| err.to_string()),
            None => Err("weight must be an integer".to_string()),
        };
        if let Err(reason) = pushed {
            issues.push(ConfigError::InvalidTierWeight { name, reason });
        }
    }
    TierCatalog::new(tiers, weights)
}
