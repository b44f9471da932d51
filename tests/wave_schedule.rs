use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use waveforge::{
    arena::{MobKind, SimulatedArena},
    wave::{SpawnArea, WaveDefinition, WaveEvent, WavePhase, WavePlan, WaveScheduler, WaveTiming},
};

fn wave(name: &str, duration: u32, interval: u32) -> WaveDefinition {
    WaveDefinition::new(name, duration, interval, vec![(MobKind::new("zombie"), 1)]).unwrap()
}

fn two_wave_scheduler() -> WaveScheduler {
    WaveScheduler::new(
        WavePlan::new(vec![wave("A", 5, 2), wave("B", 3, 5)]),
        SpawnArea::default(),
        WaveTiming::default(),
    )
}

/// Advances one second at a time over `[from, to]`.
fn run(
    scheduler: &mut WaveScheduler,
    arena: &mut SimulatedArena,
    rng: &mut ChaCha8Rng,
    from: u64,
    to: u64,
) -> Vec<WaveEvent> {
    (from..=to)
        .flat_map(|second| scheduler.advance(second * 1_000, arena, rng))
        .collect()
}

fn countdown(next_wave: usize, from: u32) -> impl Iterator<Item = WaveEvent> {
    (1..=from).rev().map(move |remaining| WaveEvent::CountdownTick {
        next_wave,
        remaining,
    })
}

#[test]
fn two_wave_plan_runs_in_exact_order() {
    let mut scheduler = two_wave_scheduler();
    let mut arena = SimulatedArena::new();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    scheduler.start_waves(0, &mut arena).unwrap();
    let mut events = scheduler.drain_events();
    events.extend(run(&mut scheduler, &mut arena, &mut rng, 0, 60));

    let mut expected = vec![WaveEvent::GameStarted];
    expected.extend(countdown(0, 15));
    expected.extend([
        WaveEvent::CountdownFinished { next_wave: 0 },
        WaveEvent::WaveStarted {
            index: 0,
            name: "A".into(),
            duration_secs: 5,
            started_at_ms: 15_000,
        },
        WaveEvent::WaveRemaining {
            index: 0,
            name: "A".into(),
            remaining_secs: 5,
        },
    ]);
    // Pulses at 15, 17 and 19 seconds; none at the 20 second end.
    for _ in 0..3 {
        expected.push(WaveEvent::SpawnPulse {
            index: 0,
            spawned: 1,
            rejected: 0,
        });
    }
    expected.extend([
        WaveEvent::WaveEnded {
            index: 0,
            name: "A".into(),
            despawned: 3,
        },
        WaveEvent::LootReloadRequested,
        WaveEvent::NextWaveScheduled {
            next_wave: 1,
            lead_secs: 10,
        },
    ]);
    expected.extend(countdown(1, 10));
    expected.extend([
        WaveEvent::CountdownFinished { next_wave: 1 },
        WaveEvent::WaveStarted {
            index: 1,
            name: "B".into(),
            duration_secs: 3,
            started_at_ms: 30_000,
        },
        WaveEvent::WaveRemaining {
            index: 1,
            name: "B".into(),
            remaining_secs: 3,
        },
        WaveEvent::SpawnPulse {
            index: 1,
            spawned: 1,
            rejected: 0,
        },
        WaveEvent::WaveEnded {
            index: 1,
            name: "B".into(),
            despawned: 1,
        },
        WaveEvent::LootReloadRequested,
        WaveEvent::Completed { waves_run: 2 },
    ]);

    assert_eq!(events, expected);
    assert_eq!(scheduler.current_wave_index(), 2);
    assert_eq!(scheduler.phase(), WavePhase::Idle);
    assert_eq!(arena.alive_count(), 0);
    assert_eq!(scheduler.run_state().active_timers, 0);
}

#[test]
fn announcements_follow_the_schedule() {
    let mut scheduler = two_wave_scheduler();
    let mut arena = SimulatedArena::new();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    scheduler.start_waves(0, &mut arena).unwrap();
    run(&mut scheduler, &mut arena, &mut rng, 0, 60);

    let broadcasts = arena.broadcasts();
    assert_eq!(broadcasts[1], "First wave starting in 15...");
    assert!(broadcasts.contains(&"First wave starting in Go!"));
    assert!(broadcasts.contains(&"Wave A is starting now! Duration: 5 seconds."));
    assert!(broadcasts.contains(&"A - 5 seconds remaining."));
    assert!(broadcasts.contains(&"Next wave will start in 10 seconds."));
    assert!(broadcasts.contains(&"Next wave starting in 10..."));
    assert_eq!(
        broadcasts.last().copied(),
        Some("All waves completed. Game finished!")
    );
}

#[test]
fn stop_right_after_start_has_no_side_effects() {
    let mut scheduler = two_wave_scheduler();
    let mut arena = SimulatedArena::new();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    scheduler.start_waves(0, &mut arena).unwrap();
    assert!(scheduler.stop_waves(0, &mut arena));

    let mut events = scheduler.drain_events();
    events.extend(run(&mut scheduler, &mut arena, &mut rng, 0, 120));
    assert_eq!(
        events,
        vec![
            WaveEvent::GameStarted,
            WaveEvent::Stopped {
                cancelled_timers: 1
            }
        ]
    );
    assert_eq!(arena.spawn_count(), 0);
    assert_eq!(scheduler.phase(), WavePhase::Idle);
}

#[test]
fn reload_mid_wave_keeps_the_running_wave() {
    let mut scheduler = two_wave_scheduler();
    let mut arena = SimulatedArena::new();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    scheduler.start_waves(0, &mut arena).unwrap();
    run(&mut scheduler, &mut arena, &mut rng, 0, 16);
    assert_eq!(scheduler.phase(), WavePhase::Running { wave: 0 });

    scheduler.reload_plan(WavePlan::new(vec![wave("A-long", 50, 1), wave("C", 2, 1)]));
    assert_eq!(scheduler.running_wave().map(|w| w.name.as_str()), Some("A"));

    let events = run(&mut scheduler, &mut arena, &mut rng, 17, 60);
    // The running wave still ends at its original time.
    assert!(events.contains(&WaveEvent::WaveEnded {
        index: 0,
        name: "A".into(),
        despawned: 3,
    }));
    assert!(events.contains(&WaveEvent::WaveStarted {
        index: 1,
        name: "C".into(),
        duration_secs: 2,
        started_at_ms: 30_000,
    }));
    assert_eq!(scheduler.phase(), WavePhase::Idle);
}

#[test]
fn plan_shrinking_under_a_countdown_finishes_the_run() {
    let mut scheduler = two_wave_scheduler();
    let mut arena = SimulatedArena::new();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    scheduler.start_waves(0, &mut arena).unwrap();
    run(&mut scheduler, &mut arena, &mut rng, 0, 22);
    assert_eq!(scheduler.phase(), WavePhase::Countdown { next_wave: 1 });

    scheduler.reload_plan(WavePlan::new(vec![wave("A", 5, 2)]));
    let events = run(&mut scheduler, &mut arena, &mut rng, 23, 40);
    assert_eq!(events.last(), Some(&WaveEvent::Completed { waves_run: 1 }));
    assert_eq!(scheduler.phase(), WavePhase::Idle);
}
