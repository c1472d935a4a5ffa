use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use glyphcast::host::HeadlessHost;
use glyphcast::{
    AsyncMediaLoader, Config, LoadError, PlaybackOptions, PlaybackState, Resolution, Rgb, Screen,
};

const WAIT: Duration = Duration::from_secs(10);

fn write_ppm(path: &Path, w: u32, h: u32, value: u8) {
    let mut data = format!("P6\n# frame\n{w} {h}\n255\n").into_bytes();
    data.extend(std::iter::repeat(value).take((w * h * 3) as usize));
    std::fs::write(path, data).unwrap();
}

/// Folder `clip` with one uniformly shaded 2x1 frame per timestamp
fn write_clip(root: &Path, stamps: &[(&str, u8)]) {
    let dir = root.join("clip");
    std::fs::create_dir_all(&dir).unwrap();
    let mut index = serde_json::Map::new();
    for (i, (ts, value)) in stamps.iter().enumerate() {
        let name = format!("f{i}.ppm");
        write_ppm(&dir.join(&name), 2, 1, *value);
        index.insert(ts.to_string(), name.into());
    }
    std::fs::write(
        dir.join("stamps.json"),
        serde_json::to_string(&index).unwrap(),
    )
    .unwrap();
}

fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.media.root = root.to_path_buf();
    config.loader.workers = 3;
    config.screen.width = 2;
    config.screen.height = 1;
    config
}

fn gray(value: u8) -> Rgb {
    let v = value as f32 / 255.0;
    Rgb::new(v, v, v)
}

#[test]
fn video_job_aggregates_every_frame_once() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(dir.path(), &[("0.0", 0), ("0.04", 100), ("0.12", 200)]);
    let mut loader = AsyncMediaLoader::new(&config(dir.path()));

    let fired = Rc::new(Cell::new(0));
    let mut results = Vec::new();
    for _ in 0..3 {
        let job = loader.load_video_folder("clip", Some(Resolution::new(2, 1)));
        let counter = fired.clone();
        loader.on_ready(job, move |j| {
            assert_eq!(j.processed(), 3);
            counter.set(counter.get() + 1);
        });
        assert!(loader.wait(job, WAIT));
        loader.pump();

        let done = loader.release(job).unwrap();
        assert!(done.errors().is_empty());
        results.push(done.frames().unwrap().clone());
    }

    assert_eq!(fired.get(), 3);
    assert_eq!(results[0].len(), 3);
    assert!(results.iter().all(|r| r == &results[0]));
}

#[test]
fn screen_plays_video_with_recorded_gaps() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(dir.path(), &[("0.0", 0), ("0.04", 100), ("0.12", 200)]);
    let config = config(dir.path());
    let mut loader = AsyncMediaLoader::new(&config);
    let mut host = HeadlessHost::new();
    let mut screen = Screen::new(&mut host, config.screen.clone());

    let job = loader.load_video_folder("clip", Some(config.screen.resolution()));
    screen.load(&mut host, &mut loader, job, PlaybackOptions::default());
    assert!(loader.wait(job, WAIT));
    screen.update(&mut host, &loader);

    assert_eq!(screen.scheduler().state(), PlaybackState::Playing);
    assert_eq!(host.colors(), [gray(0); 2]);

    let mut shown = Vec::new();
    while !screen.is_idle() {
        for timer in host.advance_to_next() {
            screen.on_timer(&mut host, timer);
        }
        shown.push(host.colors()[0]);
    }

    assert_eq!(shown, [gray(100), gray(200)]);
    let delays: Vec<f64> = host
        .scheduled_delays()
        .iter()
        .map(Duration::as_secs_f64)
        .collect();
    assert_eq!(delays.len(), 2);
    assert!((delays[0] - 0.04).abs() < 1e-6);
    assert!((delays[1] - 0.08).abs() < 1e-6);
    assert_eq!(screen.scheduler().state(), PlaybackState::Complete);
}

#[test]
fn partial_failure_still_plays_decoded_frames() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(dir.path(), &[("0", 10), ("1", 20), ("2", 30)]);
    std::fs::write(dir.path().join("clip/f1.ppm"), b"P5\n2 1\n255\n").unwrap();

    let config = config(dir.path());
    let mut loader = AsyncMediaLoader::new(&config);
    let mut host = HeadlessHost::new();
    let mut screen = Screen::new(&mut host, config.screen.clone());

    let job = loader.load_video_folder("clip", None);
    screen.load(&mut host, &mut loader, job, PlaybackOptions::new(2.0, false));
    assert!(loader.wait(job, WAIT));
    screen.update(&mut host, &loader);

    let done = loader.job(job).unwrap();
    assert_eq!(done.frames().unwrap().len(), 2);
    assert!(matches!(
        done.error(),
        Some(LoadError::PartialFrameFailure { .. })
    ));
    assert!(done.fatal_error().is_none());

    assert_eq!(screen.scheduler().frame_count(), 2);
    // 0s -> 2s at double speed
    assert_eq!(host.scheduled_delays(), [Duration::from_secs(1)]);
}

#[test]
fn new_load_cancels_previous_playback() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(dir.path(), &[("0", 50), ("30", 60)]);
    let config = config(dir.path());
    let mut loader = AsyncMediaLoader::new(&config);
    let mut host = HeadlessHost::new();
    let mut screen = Screen::new(&mut host, config.screen.clone());

    let first = loader.load_video_folder("clip", None);
    screen.load(&mut host, &mut loader, first, PlaybackOptions::new(1.0, true));
    assert!(loader.wait(first, WAIT));
    screen.update(&mut host, &loader);
    assert!(screen.scheduler().has_timer());
    assert_eq!(host.pending_timers(), 1);

    let second = loader.load_video_folder("clip", None);
    screen.load(&mut host, &mut loader, second, PlaybackOptions::default());
    assert_eq!(host.pending_timers(), 0);
    assert_eq!(screen.scheduler().state(), PlaybackState::Stopped);

    assert!(loader.wait(second, WAIT));
    screen.update(&mut host, &loader);
    assert_eq!(host.pending_timers(), 1);
    assert!(!screen.scheduler().is_looping());
}

#[test]
fn missing_index_never_starts_playback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("clip")).unwrap();
    let config = config(dir.path());
    let mut loader = AsyncMediaLoader::new(&config);
    let mut host = HeadlessHost::new();
    let mut screen = Screen::new(&mut host, config.screen.clone());

    let job = loader.load_video_folder("clip", None);
    screen.load(&mut host, &mut loader, job, PlaybackOptions::default());
    screen.update(&mut host, &loader);

    assert!(screen.is_idle());
    assert_eq!(screen.scheduler().state(), PlaybackState::Idle);
    assert_eq!(host.color_writes(), 0);
}
