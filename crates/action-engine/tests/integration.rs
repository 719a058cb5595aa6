use std::sync::Arc;
use std::time::{Duration, Instant};

use action_engine::store::write_group;
use action_engine::{
    ActionGroup, EngineConfig, EngineError, Frame, GaitEngine, LockOverrides, PlayOutcome,
    RecordingSink, RunRequest, ServoId,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const LOCOMOTION: &[&str] = &[
    "go_forward",
    "go_forward_start",
    "go_forward_end",
    "back",
    "back_start",
    "back_end",
];

/// Write one short action group per name into a fresh action root.
fn action_root(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (i, name) in names.iter().enumerate() {
        let base = 100 * (i as i32 + 1);
        let group = ActionGroup::new(
            *name,
            vec![
                Frame::from_positions(2, &[base, base + 1, base + 2]),
                Frame::from_positions(3, &[base + 10, base + 11, base + 12]),
            ],
        );
        write_group(&dir.path().join(format!("{name}.d6a")), &group).unwrap();
    }
    dir
}

fn engine_at(dir: &TempDir) -> GaitEngine<RecordingSink> {
    let config = EngineConfig {
        cache: false,
        ..EngineConfig::with_root(dir.path())
    };
    GaitEngine::new(RecordingSink::new(), &config)
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[test]
fn play_delivers_file_order_and_paces() {
    let dir = action_root(&["wave"]);
    let engine = engine_at(&dir);

    let started = Instant::now();
    let outcome = engine
        .play_action("wave", &LockOverrides::new(), None)
        .unwrap();
    assert_eq!(outcome, PlayOutcome::Completed);
    assert!(started.elapsed() >= Duration::from_millis(5));

    let cmds = engine.sink().commands();
    let observed: Vec<(u8, i32, u32)> = cmds
        .iter()
        .map(|c| (c.servo.get(), c.position, c.duration_ms))
        .collect();
    assert_eq!(
        observed,
        vec![
            (1, 100, 2),
            (2, 101, 2),
            (3, 102, 2),
            (1, 110, 3),
            (2, 111, 3),
            (3, 112, 3),
        ]
    );
}

#[test]
fn locked_servo_holds_override_in_every_frame() {
    let dir = action_root(&["wave"]);
    let engine = engine_at(&dir);
    let overrides = LockOverrides::new().lock(ServoId(3), 777);
    engine.play_action("wave", &overrides, None).unwrap();

    let servo3: Vec<(i32, u32)> = engine
        .sink()
        .commands()
        .iter()
        .filter(|c| c.servo == ServoId(3))
        .map(|c| (c.position, c.duration_ms))
        .collect();
    assert_eq!(servo3, vec![(777, 2), (777, 3)]);
}

#[test]
fn stop_action_before_play_sends_nothing() {
    let dir = action_root(&["wave"]);
    let engine = engine_at(&dir);
    engine.stop_action();
    let outcome = engine
        .play_action("wave", &LockOverrides::new(), None)
        .unwrap();
    assert_eq!(outcome, PlayOutcome::Cancelled);
    assert!(engine.sink().is_empty());
}

// ---------------------------------------------------------------------------
// Gait stitching
// ---------------------------------------------------------------------------

#[test]
fn backward_gait_with_stand() {
    let dir = action_root(LOCOMOTION);
    let engine = engine_at(&dir);
    let summary = engine
        .run_action_group(&RunRequest::new("back").times(3).with_stand(true))
        .unwrap();
    assert_eq!(
        summary.played(),
        vec!["back_start", "back", "back", "back", "back_end"]
    );
    assert!(engine.gait_state().is_idle());
}

#[test]
fn stop_from_another_thread_lands_stable() {
    let dir = action_root(LOCOMOTION);
    let engine = Arc::new(engine_at(&dir));

    let worker = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            engine.run_action_group(&RunRequest::new("go_forward").times(0))
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.sink().len() < 12 {
        assert!(Instant::now() < deadline, "walk never started");
        std::thread::sleep(Duration::from_millis(1));
    }
    engine.stop_handle().stop_action_group();

    let summary = worker.join().unwrap().unwrap();
    assert!(summary.stopped);
    let played = summary.played();
    assert_eq!(played[0], "go_forward_start");
    assert_eq!(played.iter().filter(|a| **a == "go_forward_end").count(), 1);
    assert_eq!(played.last(), Some(&"go_forward_end"));
    assert!(engine.gait_state().is_idle());
    assert!(!engine.is_playing());
}

#[test]
fn direct_play_cannot_steal_an_owed_end() {
    let dir = action_root(LOCOMOTION);
    let engine = Arc::new(engine_at(&dir));

    let worker = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            engine.run_action_group(&RunRequest::new("go_forward").times(0))
        })
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.sink().len() < 6 {
        assert!(Instant::now() < deadline, "walk never started");
        std::thread::sleep(Duration::from_millis(1));
    }

    // hammer the engine from another thread while the walk runs
    let intruder = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            let mut busy = 0;
            let mut played = 0;
            while busy < 50 {
                match engine.play_action("back_start", &LockOverrides::new(), None) {
                    Err(EngineError::Busy) => busy += 1,
                    _ => played += 1,
                }
            }
            played
        })
    };
    assert_eq!(intruder.join().unwrap(), 0);
    engine.stop_action_group();

    let summary = worker.join().unwrap().unwrap();
    assert!(summary.stopped);
    assert!(summary.is_clean(), "failures: {:?}", summary.failures);
    assert_eq!(summary.played().last(), Some(&"go_forward_end"));
    assert!(engine.gait_state().is_idle());
    assert!(!engine.is_group_running());
}

// ---------------------------------------------------------------------------
// Errors and exclusivity
// ---------------------------------------------------------------------------

#[test]
fn exclusivity_released_across_valid_and_missing_actions() {
    let dir = action_root(&["wave", "bow"]);
    let engine = engine_at(&dir);
    assert!(!engine.is_playing());

    for name in ["wave", "missing", "bow", "also_missing", "wave"] {
        let summary = engine.run_action_group(&RunRequest::new(name)).unwrap();
        assert!(!engine.is_playing(), "exclusivity held after {name}");
        assert!(!engine.is_group_running());
        if name.contains("missing") {
            assert!(matches!(
                summary.into_result(),
                Err(EngineError::NotFound { .. })
            ));
        } else {
            assert_eq!(summary.played(), vec![name]);
        }

        let single = engine.play_action(name, &LockOverrides::new(), None);
        assert_eq!(single.is_err(), name.contains("missing"));
        assert!(!engine.is_playing());
    }
}

#[test]
fn concurrent_requests_are_busy() {
    let dir = TempDir::new().unwrap();
    let slow = ActionGroup::new("slow", vec![Frame::from_positions(300, &[500])]);
    write_group(&dir.path().join("slow.d6a"), &slow).unwrap();
    let quick = ActionGroup::new("quick", vec![Frame::from_positions(1, &[500])]);
    write_group(&dir.path().join("quick.d6a"), &quick).unwrap();

    let engine = Arc::new(engine_at(&dir));
    let worker = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.play_action("slow", &LockOverrides::new(), None))
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while !engine.is_playing() {
        assert!(Instant::now() < deadline, "slow action never started");
        std::thread::sleep(Duration::from_millis(1));
    }

    let before = engine.gait_state();
    assert!(matches!(
        engine.play_action("quick", &LockOverrides::new(), None),
        Err(EngineError::Busy)
    ));
    assert!(matches!(
        engine.run_action_group(&RunRequest::new("quick")),
        Err(EngineError::Busy)
    ));
    assert_eq!(engine.gait_state(), before);

    assert_eq!(worker.join().unwrap().unwrap(), PlayOutcome::Completed);
    assert!(!engine.is_playing());
    assert_eq!(engine.sink().len(), 1);
}

#[test]
fn engine_resolves_root_from_config_file() {
    let dir = action_root(&["go_forward", "wave"]);
    let cfg_dir = TempDir::new().unwrap();
    let cfg_path = cfg_dir.path().join("engine.yaml");
    std::fs::write(
        &cfg_path,
        format!(
            "search_roots:\n  - {}\n  - {}\n",
            cfg_dir.path().display(),
            dir.path().display()
        ),
    )
    .unwrap();

    let config = EngineConfig::load(&cfg_path).unwrap();
    let engine = GaitEngine::new(RecordingSink::new(), &config);
    assert_eq!(engine.action_root(), dir.path());
    engine.play_action("wave", &LockOverrides::new(), None).unwrap();
}
