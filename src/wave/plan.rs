use std::{f64::consts::TAU, sync::Arc};

use serde::Serialize;

use crate::{
    arena::{MobKind, Position},
    rng::RandomSource,
};

/// One timed wave. Mob kinds spawn in the order they were configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveDefinition {
    pub name: String,
    pub duration_secs: u32,
    pub spawn_interval_secs: u32,
    pub mobs: Vec<(MobKind, u32)>,
}

impl WaveDefinition {
    pub fn new(
        name: &str,
        duration_secs: u32,
        spawn_interval_secs: u32,
        mobs: Vec<(MobKind, u32)>,
    ) -> Result<Self, &'static str> {
        if duration_secs == 0 {
            return Err("duration must be positive");
        }
        if spawn_interval_secs == 0 {
            return Err("spawn interval must be positive");
        }
        Ok(Self {
            name: name.to_string(),
            duration_secs,
            spawn_interval_secs,
            mobs,
        })
    }

    pub fn duration_millis(&self) -> u64 {
        u64::from(self.duration_secs) * 1_000
    }

    pub fn spawn_interval_millis(&self) -> u64 {
        u64::from(self.spawn_interval_secs) * 1_000
    }

    /// Mobs requested by a single spawn pulse.
    pub fn mobs_per_pulse(&self) -> u32 {
        self.mobs.iter().map(|(_, count)| *count).sum()
    }
}

/// Ordered waves. Replaced wholesale on reload; definitions are shared so a
/// running wave keeps its own snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WavePlan {
    waves: Vec<Arc<WaveDefinition>>,
}

impl WavePlan {
    pub fn new(waves: Vec<WaveDefinition>) -> Self {
        waves.into_iter().collect()
    }

    pub fn get(&self, index: usize) -> Option<Arc<WaveDefinition>> {
        self.waves.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaveDefinition> {
        self.waves.iter().map(Arc::as_ref)
    }
}

impl FromIterator<WaveDefinition> for WavePlan {
    fn from_iter<I: IntoIterator<Item = WaveDefinition>>(iter: I) -> Self {
        Self {
            waves: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Disc around a center point where wave mobs appear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnArea {
    pub center: Position,
    pub radius: f64,
}

impl SpawnArea {
    /// Polar sample: angle uniform in `[0, 2π)`, distance uniform in
    /// `[0, radius]`. Height is kept from the center.
    pub fn sample(&self, rng: &mut (impl RandomSource + ?Sized)) -> Position {
        let angle = rng.uniform_float01() * TAU;
        let distance = rng.uniform_float01() * self.radius.max(0.0);
        self.center
            .offset(angle.cos() * distance, angle.sin() * distance)
    }

    pub fn world(&self) -> &str {
        &self.center.world
    }
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            center: Position {
                world: "world".to_string(),
                x: 0.0,
                y: 64.0,
                z: 0.0,
            },
            radius: 10.0,
        }
    }
}

/// Lead times and notice cadence, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaveTiming {
    pub initial_countdown_secs: u32,
    pub between_waves_countdown_secs: u32,
    pub remaining_notice_secs: u32,
}

impl Default for WaveTiming {
    fn default() -> Self {
        Self {
            initial_countdown_secs: 15,
            between_waves_countdown_secs: 10,
            remaining_notice_secs: 15,
        }
    }
}
