//! Wave plan and the countdown/wave/cleanup state machine.

mod event;
mod plan;
mod scheduler;

pub use event::WaveEvent;
pub use plan::{SpawnArea, WaveDefinition, WavePlan, WaveTiming};
pub use scheduler::{CountdownState, WavePhase, WaveRunState, WaveScheduler};
