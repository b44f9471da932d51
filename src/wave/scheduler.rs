use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{SpawnArea, WaveDefinition, WaveEvent, WavePlan, WaveTiming};
use crate::{
    arena::Arena,
    error::WaveError,
    rng::RandomSource,
    timeline::{Priority, TaskHandle, Timeline},
};

// A wave end due at the same instant as a periodic action wins, so periodic
// actions only ever fire strictly inside the wave.
const WAVE_END: Priority = 0;
const COUNTDOWN: Priority = 1;
const REMAINING_NOTICE: Priority = 2;
const SPAWN_PULSE: Priority = 3;

const SECOND_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaveTask {
    CountdownTick,
    RemainingNotice,
    SpawnPulse,
    WaveEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WavePhase {
    Idle,
    Countdown { next_wave: usize },
    Running { wave: usize },
    EndingCleanup { wave: usize },
}

/// Seconds left on a pre-wave countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountdownState {
    pub remaining: u32,
}

/// Read-only view of the scheduler's run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaveRunState {
    pub current_wave_index: usize,
    pub phase: WavePhase,
    pub countdown: Option<CountdownState>,
    pub active_timers: usize,
}

#[derive(Debug)]
struct Countdown {
    next_wave: usize,
    state: CountdownState,
    handle: TaskHandle,
}

#[derive(Debug)]
struct RunningWave {
    index: usize,
    definition: Arc<WaveDefinition>,
    area: SpawnArea,
    started_at: u64,
    spawn: TaskHandle,
    notice: TaskHandle,
    end: TaskHandle,
}

/// Drives countdown → wave → cleanup → countdown over a [`WavePlan`].
///
/// All timers live on one [`Timeline`] owned by the scheduler and only fire
/// from [`WaveScheduler::advance`], so cancelling from any operation is final:
/// nothing cancelled can fire afterwards.
#[derive(Debug)]
pub struct WaveScheduler {
    plan: Arc<WavePlan>,
    area: SpawnArea,
    timing: WaveTiming,
    timeline: Timeline<WaveTask>,
    phase: WavePhase,
    current_wave_index: usize,
    countdown: Option<Countdown>,
    running: Option<RunningWave>,
    outbox: Vec<WaveEvent>,
}

impl WaveScheduler {
    pub fn new(plan: WavePlan, area: SpawnArea, timing: WaveTiming) -> Self {
        Self {
            plan: Arc::new(plan),
            area,
            timing,
            timeline: Timeline::new(),
            phase: WavePhase::Idle,
            current_wave_index: 0,
            countdown: None,
            running: None,
            outbox: Vec::new(),
        }
    }

    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    pub fn current_wave_index(&self) -> usize {
        self.current_wave_index
    }

    pub fn plan(&self) -> &WavePlan {
        &self.plan
    }

    pub fn spawn_area(&self) -> &SpawnArea {
        &self.area
    }

    pub fn timing(&self) -> WaveTiming {
        self.timing
    }

    /// Definition of the wave currently running, as captured when it began.
    pub fn running_wave(&self) -> Option<&WaveDefinition> {
        self.running.as_ref().map(|w| w.definition.as_ref())
    }

    pub fn run_state(&self) -> WaveRunState {
        WaveRunState {
            current_wave_index: self.current_wave_index,
            phase: self.phase,
            countdown: self.countdown.as_ref().map(|c| c.state),
            active_timers: self.timeline.live_count(),
        }
    }

    /// Replaces the plan. A running wave keeps its captured definition; the
    /// new plan is consulted from the next wave start on.
    pub fn reload_plan(&mut self, plan: WavePlan) {
        info!(waves = plan.len(), phase = ?self.phase, "wave plan reloaded");
        self.plan = Arc::new(plan);
    }

    pub fn reload_spawn_area(&mut self, area: SpawnArea) {
        self.area = area;
    }

    pub fn reload_timing(&mut self, timing: WaveTiming) {
        self.timing = timing;
    }

    pub fn start_waves(&mut self, now: u64, arena: &mut dyn Arena) -> Result<(), WaveError> {
        if self.phase != WavePhase::Idle {
            return Err(WaveError::AlreadyRunning);
        }
        if self.plan.is_empty() {
            warn!("refusing to start: no waves configured");
            return Err(WaveError::NoWavesConfigured);
        }
        self.timeline.advance_to(now);
        self.current_wave_index = 0;
        info!(waves = self.plan.len(), "starting wave sequence");
        self.emit(arena, WaveEvent::GameStarted);
        self.begin_countdown(0, self.timing.initial_countdown_secs);
        Ok(())
    }

    /// Cancels every timer, despawns wave hostiles and returns to idle.
    /// Returns `false` (and does nothing) when already idle.
    pub fn stop_waves(&mut self, now: u64, arena: &mut dyn Arena) -> bool {
        if self.phase == WavePhase::Idle {
            return false;
        }
        self.timeline.advance_to(now);
        let cancelled_timers = self.timeline.cancel_all();
        self.countdown = None;
        let world = self
            .running
            .take()
            .map(|w| w.area.center.world)
            .unwrap_or_else(|| self.area.center.world.clone());
        arena.despawn_all_hostiles(&world);
        self.phase = WavePhase::Idle;
        info!(cancelled_timers, "wave spawning stopped");
        self.emit(arena, WaveEvent::Stopped { cancelled_timers });
        true
    }

    /// Fires every task due up to `now`, in time order.
    pub fn advance(
        &mut self,
        now: u64,
        arena: &mut dyn Arena,
        rng: &mut dyn RandomSource,
    ) -> Vec<WaveEvent> {
        while let Some((handle, task)) = self.timeline.pop_due(now) {
            match task {
                WaveTask::CountdownTick => self.on_countdown_tick(handle, arena),
                WaveTask::RemainingNotice => self.on_remaining_notice(handle, arena),
                WaveTask::SpawnPulse => self.on_spawn_pulse(handle, arena, rng),
                WaveTask::WaveEnd => self.on_wave_end(handle, arena),
            }
        }
        self.timeline.advance_to(now);
        self.drain_events()
    }

    pub fn drain_events(&mut self) -> Vec<WaveEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// When the next timer is due, if any.
    pub fn next_due(&self) -> Option<u64> {
        self.timeline.next_due()
    }

    fn begin_countdown(&mut self, next_wave: usize, lead_secs: u32) {
        let handle =
            self.timeline
                .schedule_repeating(0, SECOND_MS, COUNTDOWN, WaveTask::CountdownTick);
        self.countdown = Some(Countdown {
            next_wave,
            state: CountdownState {
                remaining: lead_secs,
            },
            handle,
        });
        self.phase = WavePhase::Countdown { next_wave };
    }

    fn on_countdown_tick(&mut self, handle: TaskHandle, arena: &mut dyn Arena) {
        let Some(countdown) = self.countdown.as_mut().filter(|c| c.handle == handle) else {
            self.timeline.cancel(handle);
            return;
        };
        let next_wave = countdown.next_wave;
        if countdown.state.remaining > 0 {
            let remaining = countdown.state.remaining;
            countdown.state.remaining -= 1;
            self.emit(
                arena,
                WaveEvent::CountdownTick {
                    next_wave,
                    remaining,
                },
            );
            return;
        }
        self.timeline.cancel(handle);
        self.countdown = None;
        self.emit(arena, WaveEvent::CountdownFinished { next_wave });
        self.begin_wave(next_wave, arena);
    }

    fn begin_wave(&mut self, index: usize, arena: &mut dyn Arena) {
        let Some(definition) = self.plan.get(index) else {
            // The plan shrank under a pending countdown.
            warn!(index, "wave no longer exists in the plan");
            self.finish(arena);
            return;
        };
        let started_at = self.timeline.now();
        let end = self
            .timeline
            .schedule_once(definition.duration_millis(), WAVE_END, WaveTask::WaveEnd);
        let notice = self.timeline.schedule_repeating(
            0,
            u64::from(self.timing.remaining_notice_secs.max(1)) * SECOND_MS,
            REMAINING_NOTICE,
            WaveTask::RemainingNotice,
        );
        let spawn = self.timeline.schedule_repeating(
            0,
            definition.spawn_interval_millis(),
            SPAWN_PULSE,
            WaveTask::SpawnPulse,
        );
        info!(
            wave = index,
            name = %definition.name,
            duration_secs = definition.duration_secs,
            "wave started"
        );
        self.phase = WavePhase::Running { wave: index };
        self.emit(
            arena,
            WaveEvent::WaveStarted {
                index,
                name: definition.name.clone(),
                duration_secs: definition.duration_secs,
                started_at_ms: started_at,
            },
        );
        self.running = Some(RunningWave {
            index,
            definition,
            area: self.area.clone(),
            started_at,
            spawn,
            notice,
            end,
        });
    }

    fn on_remaining_notice(&mut self, handle: TaskHandle, arena: &mut dyn Arena) {
        let Some(wave) = self.running.as_ref().filter(|w| w.notice == handle) else {
            self.timeline.cancel(handle);
            return;
        };
        let elapsed = self.timeline.now().saturating_sub(wave.started_at);
        let remaining_secs = wave.definition.duration_millis().saturating_sub(elapsed) / SECOND_MS;
        let event = WaveEvent::WaveRemaining {
            index: wave.index,
            name: wave.definition.name.clone(),
            remaining_secs,
        };
        self.emit(arena, event);
    }

    fn on_spawn_pulse(
        &mut self,
        handle: TaskHandle,
        arena: &mut dyn Arena,
        rng: &mut dyn RandomSource,
    ) {
        let Some(wave) = self.running.as_ref().filter(|w| w.spawn == handle) else {
            self.timeline.cancel(handle);
            return;
        };
        debug!(wave = wave.index, name = %wave.definition.name, "spawning mobs");
        let mut spawned = 0;
        let mut rejected = 0;
        for (kind, count) in &wave.definition.mobs {
            for placed in 0..*count {
                let at = wave.area.sample(rng);
                match arena.spawn_entity(kind, &at) {
                    Ok(_) => spawned += 1,
                    Err(err) => {
                        warn!(wave = wave.index, %kind, "spawn refused: {err}");
                        rejected += count - placed;
                        break;
                    }
                }
            }
        }
        let index = wave.index;
        self.emit(
            arena,
            WaveEvent::SpawnPulse {
                index,
                spawned,
                rejected,
            },
        );
    }

    fn on_wave_end(&mut self, handle: TaskHandle, arena: &mut dyn Arena) {
        if self.running.as_ref().map(|w| w.end) != Some(handle) {
            self.timeline.cancel(handle);
            return;
        }
        let Some(wave) = self.running.take() else {
            return;
        };
        self.timeline.cancel(wave.spawn);
        self.timeline.cancel(wave.notice);
        self.phase = WavePhase::EndingCleanup { wave: wave.index };
        let despawned = arena.despawn_all_hostiles(wave.area.world());
        info!(wave = wave.index, name = %wave.definition.name, despawned, "wave ended");
        self.emit(
            arena,
            WaveEvent::WaveEnded {
                index: wave.index,
                name: wave.definition.name.clone(),
                despawned,
            },
        );
        self.emit(arena, WaveEvent::LootReloadRequested);

        self.current_wave_index += 1;
        if self.current_wave_index < self.plan.len() {
            let lead_secs = self.timing.between_waves_countdown_secs;
            self.emit(
                arena,
                WaveEvent::NextWaveScheduled {
                    next_wave: self.current_wave_index,
                    lead_secs,
                },
            );
            self.begin_countdown(self.current_wave_index, lead_secs);
        } else {
            self.finish(arena);
        }
    }

    fn finish(&mut self, arena: &mut dyn Arena) {
        self.timeline.cancel_all();
        self.countdown = None;
        self.running = None;
        arena.despawn_all_hostiles(self.area.world());
        self.phase = WavePhase::Idle;
        info!(waves_run = self.current_wave_index, "all waves completed");
        self.emit(
            arena,
            WaveEvent::Completed {
                waves_run: self.current_wave_index,
            },
        );
    }

    fn emit(&mut self, arena: &mut dyn Arena, event: WaveEvent) {
        if let Some(text) = event.announcement() {
            arena.broadcast(&text);
        }
        self.outbox.push(event);
    }
}
