use serde::Serialize;

/// Everything the scheduler reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WaveEvent {
    GameStarted,
    CountdownTick {
        next_wave: usize,
        remaining: u32,
    },
    CountdownFinished {
        next_wave: usize,
    },
    WaveStarted {
        index: usize,
        name: String,
        duration_secs: u32,
        started_at_ms: u64,
    },
    WaveRemaining {
        index: usize,
        name: String,
        remaining_secs: u64,
    },
    SpawnPulse {
        index: usize,
        spawned: u32,
        rejected: u32,
    },
    WaveEnded {
        index: usize,
        name: String,
        despawned: usize,
    },
    LootReloadRequested,
    NextWaveScheduled {
        next_wave: usize,
        lead_secs: u32,
    },
    Completed {
        waves_run: usize,
    },
    Stopped {
        cancelled_timers: usize,
    },
}

impl WaveEvent {
    /// Text broadcast to participants, if the event is announced at all.
    pub fn announcement(&self) -> Option<String> {
        let text = match self {
            WaveEvent::GameStarted => "The game has started, go!".to_string(),
            WaveEvent::CountdownTick {
                next_wave,
                remaining,
            } => format!("{} {remaining}...", countdown_prefix(*next_wave)),
            WaveEvent::CountdownFinished { next_wave } => {
                format!("{} Go!", countdown_prefix(*next_wave))
            }
            WaveEvent::WaveStarted {
                name,
                duration_secs,
                ..
            } => format!("Wave {name} is starting now! Duration: {duration_secs} seconds."),
            WaveEvent::WaveRemaining {
                name,
                remaining_secs,
                ..
            } => format!("{name} - {remaining_secs} seconds remaining."),
            WaveEvent::WaveEnded { name, .. } => format!("{name} ended."),
            WaveEvent::LootReloadRequested => "Reloading chest loot...".to_string(),
            WaveEvent::NextWaveScheduled { lead_secs, .. } => {
                format!("Next wave will start in {lead_secs} seconds.")
            }
            WaveEvent::Completed { .. } => "All waves completed. Game finished!".to_string(),
            WaveEvent::SpawnPulse { .. } | WaveEvent::Stopped { .. } => return None,
        };
        Some(text)
    }
}

fn countdown_prefix(next_wave: usize) -> &'static str {
    if next_wave == 0 {
        "First wave starting in"
    } else {
        "Next wave starting in"
    }
}
