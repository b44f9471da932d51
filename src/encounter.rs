//! The encounter controller: one owner for the wave scheduler, the loot
//! catalog, kill rewards and the scoreboard, driven by a [`Clock`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    arena::{Arena, PlayerId},
    clock::Clock,
    config::EncounterConfig,
    error::{LootError, ScoreError, WaveError},
    loot::{
        roll_container, ContainerOpen, ContainerOutcome, ItemRegistry, ItemStack,
        RolledContainerSet, TierCatalog,
    },
    reward::{resolve_kill_reward, KillEvent, MobLootTable, PointTable},
    rng::RngManager,
    scores::{Scoreboard, Standing},
    wave::{WaveDefinition, WaveEvent, WavePhase, WavePlan, WaveRunState, WaveScheduler},
};

const WAVE_STREAM: &str = "waves";
const CHEST_STREAM: &str = "chests";
const KILL_STREAM: &str = "kills";

/// What a qualifying kill earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillOutcome {
    pub player: PlayerId,
    pub points: u32,
    pub total: u32,
    pub drop: KillDrop,
}

/// What happens to the victim's drops.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "item", rename_all = "snake_case")]
pub enum KillDrop {
    /// No mapping for the kind; the world keeps its default drops.
    Default,
    /// The kind has a drop mapping: default drops are discarded and replaced
    /// by the item, or by nothing when the picked entry could not be made.
    Replaced(Option<ItemStack>),
}

impl KillDrop {
    pub fn replaces_defaults(&self) -> bool {
        matches!(self, KillDrop::Replaced(_))
    }

    pub fn item(&self) -> Option<&ItemStack> {
        match self {
            KillDrop::Replaced(item) => item.as_ref(),
            KillDrop::Default => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EncounterSnapshot {
    pub now_ms: u64,
    pub run: WaveRunState,
    pub running_wave: Option<WaveDefinition>,
    pub waves_configured: usize,
    pub tiers: Vec<String>,
    pub rolled_containers: usize,
    pub tracked_world: String,
    pub leaderboard: Vec<Standing>,
}

pub struct EncounterController<A: Arena> {
    arena: A,
    clock: Arc<dyn Clock>,
    rng: RngManager,
    scheduler: WaveScheduler,
    catalog: TierCatalog,
    points: PointTable,
    mob_loot: MobLootTable,
    registry: ItemRegistry,
    rolled: Arc<RolledContainerSet>,
    scores: Scoreboard,
    tracked_world: String,
    chest_world: String,
    pending: Vec<WaveEvent>,
}

impl<A: Arena> EncounterController<A> {
    pub fn new(config: EncounterConfig, arena: A, clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            arena,
            clock,
            rng: RngManager::new(seed),
            scheduler: WaveScheduler::new(config.plan, config.spawn_area, config.timing),
            catalog: config.catalog,
            points: config.points,
            mob_loot: config.mob_loot,
            registry: config.registry,
            rolled: Arc::new(RolledContainerSet::new()),
            scores: Scoreboard::new(),
            tracked_world: config.tracked_world,
            chest_world: config.chest_world,
            pending: Vec::new(),
        }
    }

    pub fn arena(&self) -> &A {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut A {
        &mut self.arena
    }

    pub fn phase(&self) -> WavePhase {
        self.scheduler.phase()
    }

    pub fn run_state(&self) -> WaveRunState {
        self.scheduler.run_state()
    }

    /// Shared handle on the rolled-container set, for handlers running off
    /// the controller's thread.
    pub fn rolled_containers(&self) -> Arc<RolledContainerSet> {
        Arc::clone(&self.rolled)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    pub fn start_waves(&mut self) -> Result<(), WaveError> {
        let now = self.clock.now_millis();
        let started = self.scheduler.start_waves(now, &mut self.arena);
        self.pending.extend(self.scheduler.drain_events());
        started
    }

    pub fn stop_waves(&mut self) -> bool {
        let now = self.clock.now_millis();
        let stopped = self.scheduler.stop_waves(now, &mut self.arena);
        self.pending.extend(self.scheduler.drain_events());
        stopped
    }

    /// Runs every timer due by the clock's current time and returns the
    /// events produced since the last tick or drain.
    pub fn tick(&mut self) -> Vec<WaveEvent> {
        let now = self.clock.now_millis();
        let fired = {
            let rng = self.rng.stream(WAVE_STREAM);
            self.scheduler.advance(now, &mut self.arena, rng)
        };
        let reloads = fired
            .iter()
            .filter(|e| matches!(e, WaveEvent::LootReloadRequested))
            .count();
        for _ in 0..reloads {
            self.reload_loot();
        }
        self.pending.extend(fired);
        std::mem::take(&mut self.pending)
    }

    pub fn drain_events(&mut self) -> Vec<WaveEvent> {
        self.pending.extend(self.scheduler.drain_events());
        std::mem::take(&mut self.pending)
    }

    /// Swaps in a freshly loaded configuration. The run phase, the running
    /// wave, scores and the rolled-container set are left as they are.
    pub fn apply_config(&mut self, config: EncounterConfig) {
        self.scheduler.reload_plan(config.plan);
        self.scheduler.reload_spawn_area(config.spawn_area);
        self.scheduler.reload_timing(config.timing);
        self.reload_tier_catalog(config.catalog);
        self.points = config.points;
        self.mob_loot = config.mob_loot;
        self.registry = config.registry;
        self.tracked_world = config.tracked_world;
        self.chest_world = config.chest_world;
    }

    /// Takes only the chest settings of `config`: tier catalog, item
    /// registry and chest world.
    pub fn apply_chest_config(&mut self, config: EncounterConfig) {
        self.reload_tier_catalog(config.catalog);
        self.registry = config.registry;
        self.chest_world = config.chest_world;
    }

    pub fn reload_plan(&mut self, plan: WavePlan) {
        self.scheduler.reload_plan(plan);
    }

    pub fn reload_tier_catalog(&mut self, catalog: TierCatalog) {
        info!(tiers = catalog.tier_names().count(), "tier catalog reloaded");
        self.catalog = catalog;
    }

    /// Starts a new loot epoch: forgets rolled containers and empties the
    /// loot containers of the chest world.
    pub fn reload_loot(&mut self) {
        let forgotten = self.rolled.clear();
        let emptied = self.arena.clear_loot_containers(&self.chest_world);
        info!(forgotten, emptied, world = %self.chest_world, "loot reloaded");
    }

    /// Scores a kill. Returns `None` when the kill does not qualify.
    pub fn on_mob_killed(&mut self, kill: &KillEvent) -> Option<KillOutcome> {
        let player = kill.qualifying_killer(&self.tracked_world)?.clone();
        let reward = {
            let rng = self.rng.stream(KILL_STREAM);
            resolve_kill_reward(&kill.victim, &self.points, &self.mob_loot, rng)
        };
        let mapped = self.mob_loot.get(&kill.victim).is_some();
        let (points, override_drop) = match reward {
            Ok(reward) => (reward.points, reward.override_drop),
            Err(err) => {
                warn!(victim = %kill.victim, "kill drop table unusable: {err}");
                (self.points.points_for(&kill.victim), None)
            }
        };
        let total = self.scores.add_points(&player, points);
        self.arena.notify_player(
            &player,
            &format!("You earned {points} points! Total: {total}"),
        );
        debug!(%player, victim = %kill.victim, points, total, "kill scored");

        let drop = if mapped {
            KillDrop::Replaced(override_drop.and_then(|entry| {
                match entry.materialize(&self.registry) {
                    Ok(stack) => Some(stack),
                    Err(err) => {
                        warn!(victim = %kill.victim, item = %entry.item, "override drop skipped: {err}");
                        None
                    }
                }
            }))
        } else {
            KillDrop::Default
        };
        Some(KillOutcome {
            player,
            points,
            total,
            drop,
        })
    }

    /// Counts a death and tells the player. Returns the new death count.
    pub fn on_player_death(&mut self, player: &PlayerId) -> u32 {
        let deaths = self.scores.record_death(player);
        self.arena
            .notify_player(player, &format!("You died! Total deaths: {deaths}"));
        deaths
    }

    /// Fills an opened loot container once per loot epoch.
    ///
    /// Only empty, unrolled loot containers are rolled. The claim happens
    /// before the roll, so two concurrent opens of the same container fill it
    /// at most once; a roll that fails gives the claim back.
    pub fn on_container_open(&mut self, open: &ContainerOpen) -> Result<ContainerOutcome, LootError> {
        if !open.loot_container {
            return Ok(ContainerOutcome::NotLootContainer);
        }
        if self.rolled.contains(&open.location) {
            debug!(location = %open.location, "container already rolled; skipping");
            return Ok(ContainerOutcome::AlreadyRolled);
        }
        if !open.empty {
            debug!(location = %open.location, "container is not empty");
            return Ok(ContainerOutcome::NotEmpty);
        }
        if !self.rolled.try_claim(&open.location) {
            return Ok(ContainerOutcome::AlreadyRolled);
        }
        let rng = self.rng.stream(CHEST_STREAM);
        match roll_container(&self.catalog, &self.registry, open.slots, rng) {
            Ok(fill) => {
                info!(
                    location = %open.location,
                    tier = %fill.tier,
                    placed = fill.placements.len(),
                    "container filled"
                );
                Ok(ContainerOutcome::Filled(fill))
            }
            Err(err) => {
                self.rolled.release(&open.location);
                warn!(location = %open.location, "container roll failed: {err}");
                Err(err)
            }
        }
    }

    pub fn points(&self, player: &PlayerId) -> u32 {
        self.scores.points(player)
    }

    pub fn leaderboard(&self) -> Vec<Standing> {
        self.scores.leaderboard()
    }

    pub fn reset_leaderboard(&mut self) {
        self.scores.reset();
        info!("leaderboard reset");
    }

    /// Archives the current scores as `name` and resets points.
    pub fn start_session(&mut self, name: &str) -> Result<usize, ScoreError> {
        let archived = self.scores.start_session(name)?;
        info!(session = name.trim(), archived, "scoring session started");
        Ok(archived)
    }

    pub fn session(&self, name: &str) -> Option<Vec<Standing>> {
        self.scores.session(name).map(<[Standing]>::to_vec)
    }

    pub fn sessions(&self) -> Vec<String> {
        self.scores.sessions().map(str::to_string).collect()
    }

    pub fn snapshot(&self) -> EncounterSnapshot {
        EncounterSnapshot {
            now_ms: self.clock.now_millis(),
            run: self.scheduler.run_state(),
            running_wave: self.scheduler.running_wave().cloned(),
            waves_configured: self.scheduler.plan().len(),
            tiers: self.catalog.tier_names().map(str::to_string).collect(),
            rolled_containers: self.rolled.len(),
            tracked_world: self.tracked_world.clone(),
            leaderboard: self.scores.leaderboard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        arena::{ArenaCall, MobKind, SimulatedArena},
        clock::ManualClock,
        config::from_yaml_str,
        loot::BlockPos,
    };

    const CONFIG: &str = r#"
tracked_world: arena
spawner:
  spawnPoint: { world: arena }
  waves:
    - { name: One, duration: 5, spawnInterval: 2, mobs: { zombie: 1 } }
  points: { zombie: 2, wither: 500 }
  loot:
    wither:
      - { item: nether_star, weight: 1 }
    husk:
      - { item: not_in_registry, weight: 1 }
chest:
  world: arena
  tier-chances: { common: 1 }
  tiers:
    common:
      min-items: 2
      max-items: 2
      loot:
        - { item: bread, weight: 1, amount: 3 }
items:
  materials: [bread, nether_star]
"#;

    fn controller() -> (EncounterController<SimulatedArena>, ManualClock) {
        let clock = ManualClock::new();
        let report = from_yaml_str(CONFIG);
        assert!(report.is_clean(), "{:?}", report.issues);
        let controller = EncounterController::new(
            report.config,
            SimulatedArena::new(),
            Arc::new(clock.clone()),
            11,
        );
        (controller, clock)
    }

    fn kill(killer: &str, victim: &str, world: &str) -> KillEvent {
        KillEvent {
            killer: Some(PlayerId(killer.to_string())),
            victim: MobKind::new(victim),
            wave_spawned: true,
            world: world.to_string(),
        }
    }

    fn chest(x: i64, empty: bool) -> ContainerOpen {
        ContainerOpen {
            location: BlockPos {
                world: "arena".to_string(),
                x,
                y: 64,
                z: 0,
            },
            loot_container: true,
            empty,
            slots: 27,
        }
    }

    #[test]
    fn test_kill_scoring_and_notification() {
        let (mut c, _) = controller();
        let first = c.on_mob_killed(&kill("alice", "zombie", "ARENA")).unwrap();
        assert_eq!(
            (first.points, first.total, first.drop),
            (2, 2, KillDrop::Default)
        );
        let second = c.on_mob_killed(&kill("alice", "creeper", "arena")).unwrap();
        assert_eq!((second.points, second.total), (1, 3));
        assert!(c.arena().calls().contains(&ArenaCall::Notify {
            player: PlayerId("alice".to_string()),
            message: "You earned 1 points! Total: 3".to_string(),
        }));
    }

    #[test]
    fn test_non_qualifying_kills_are_ignored() {
        let (mut c, _) = controller();
        assert!(c.on_mob_killed(&kill("bob", "zombie", "lobby")).is_none());
        let mut untagged = kill("bob", "zombie", "arena");
        untagged.wave_spawned = false;
        assert!(c.on_mob_killed(&untagged).is_none());
        let mut environmental = kill("bob", "zombie", "arena");
        environmental.killer = None;
        assert!(c.on_mob_killed(&environmental).is_none());
        assert!(c.leaderboard().is_empty());
    }

    #[test]
    fn test_override_drop_materializes() {
        let (mut c, _) = controller();
        let outcome = c.on_mob_killed(&kill("carol", "wither", "arena")).unwrap();
        assert_eq!(outcome.points, 500);
        assert!(outcome.drop.replaces_defaults());
        let drop = outcome.drop.item().unwrap();
        assert_eq!(drop.item.material(), "NETHER_STAR");
    }

    #[test]
    fn test_unknown_override_item_still_discards_default_drops() {
        let (mut c, _) = controller();
        let husk = c.on_mob_killed(&kill("carol", "husk", "arena")).unwrap();
        assert_eq!(husk.drop, KillDrop::Replaced(None));
        assert!(husk.drop.replaces_defaults());
        assert_eq!(husk.total, 1);

        let creeper = c.on_mob_killed(&kill("carol", "creeper", "arena")).unwrap();
        assert_eq!(creeper.drop, KillDrop::Default);
        assert!(!creeper.drop.replaces_defaults());
    }

    #[test]
    fn test_container_rolled_once_per_epoch() {
        let (mut c, _) = controller();
        let open = chest(1, true);
        let filled = match c.on_container_open(&open).unwrap() {
            ContainerOutcome::Filled(fill) => fill,
            other => panic!("expected fill, got {other:?}"),
        };
        assert_eq!(filled.tier, "common");
        assert_eq!(filled.placements.len(), 2);
        assert_eq!(
            c.on_container_open(&open).unwrap(),
            ContainerOutcome::AlreadyRolled
        );

        c.reload_loot();
        assert!(c.rolled_containers().is_empty());
        assert!(matches!(
            c.on_container_open(&open).unwrap(),
            ContainerOutcome::Filled(_)
        ));
        assert!(c.arena().calls().contains(&ArenaCall::ClearLoot {
            world: "arena".to_string()
        }));
    }

    #[test]
    fn test_container_policy() {
        let (mut c, _) = controller();
        assert_eq!(
            c.on_container_open(&chest(2, false)).unwrap(),
            ContainerOutcome::NotEmpty
        );
        assert!(!c.rolled_containers().contains(&chest(2, false).location));
        let mut plain = chest(3, true);
        plain.loot_container = false;
        assert_eq!(
            c.on_container_open(&plain).unwrap(),
            ContainerOutcome::NotLootContainer
        );
    }

    #[test]
    fn test_failed_roll_releases_claim() {
        let (mut c, _) = controller();
        c.reload_tier_catalog(TierCatalog::default());
        let open = chest(4, true);
        assert_eq!(
            c.on_container_open(&open),
            Err(LootError::NoTiersConfigured)
        );
        assert!(!c.rolled_containers().contains(&open.location));
    }

    #[test]
    fn test_wave_end_reloads_loot() {
        let (mut c, clock) = controller();
        c.on_container_open(&chest(5, true)).unwrap();
        c.start_waves().unwrap();
        let mut events = c.drain_events();
        for _ in 0..30 {
            clock.advance(Duration::from_secs(1));
            events.extend(c.tick());
        }
        assert!(events.contains(&WaveEvent::LootReloadRequested));
        assert!(c.rolled_containers().is_empty());
        assert_eq!(c.phase(), WavePhase::Idle);
    }

    #[test]
    fn test_deaths_survive_leaderboard_reset() {
        let (mut c, _) = controller();
        let dave = PlayerId("dave".to_string());
        c.on_mob_killed(&kill("dave", "zombie", "arena"));
        assert_eq!(c.on_player_death(&dave), 1);
        assert_eq!(c.on_player_death(&dave), 2);
        c.reset_leaderboard();
        assert_eq!(c.points(&dave), 0);
        c.on_mob_killed(&kill("dave", "zombie", "arena"));
        assert_eq!(c.leaderboard()[0].deaths, 2);
    }

    #[test]
    fn test_session_archives_scores() {
        let (mut c, _) = controller();
        c.on_mob_killed(&kill("erin", "wither", "arena"));
        assert_eq!(c.start_session("finals"), Ok(1));
        assert_eq!(c.points(&PlayerId("erin".to_string())), 0);
        assert_eq!(c.sessions(), vec!["finals".to_string()]);
        assert_eq!(c.session("finals").unwrap()[0].points, 500);
        assert_eq!(c.start_session(""), Err(ScoreError::EmptySessionName));
    }

    #[test]
    fn test_apply_config_keeps_phase() {
        let (mut c, _) = controller();
        c.start_waves().unwrap();
        let mut replacement = from_yaml_str(CONFIG).config;
        replacement.tracked_world = "nether".to_string();
        c.apply_config(replacement);
        assert_eq!(c.phase(), WavePhase::Countdown { next_wave: 0 });
        assert!(c.on_mob_killed(&kill("erin", "zombie", "arena")).is_none());
        assert!(c.on_mob_killed(&kill("erin", "zombie", "nether")).is_some());
    }

    #[test]
    fn test_snapshot_reports_state() {
        let (mut c, _) = controller();
        c.start_waves().unwrap();
        let snapshot = c.snapshot();
        assert_eq!(snapshot.run.phase, WavePhase::Countdown { next_wave: 0 });
        assert_eq!(snapshot.waves_configured, 1);
        assert_eq!(snapshot.tiers, vec!["common".to_string()]);
        assert!(snapshot.running_wave.is_none());
    }
}
