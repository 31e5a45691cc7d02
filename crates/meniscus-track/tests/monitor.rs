use std::collections::VecDeque;

use approx::assert_abs_diff_eq;
use meniscus_core::{ImageSize, PixelPoint, RgbImage};
use meniscus_level::{LevelFinder, LevelFinderParams};
use meniscus_track::{
    BoxError, CycleAction, FrameSource, LevelLogDocument, LevelLogFile, LevelLogOptions, Monitor,
    MonitorActions, MonitorConfig, MonitorError, ToleranceBounds, TrackerError,
};

const W: usize = 60;
const H: usize = 100;

/// Dark headspace above a bright liquid starting at `boundary`.
fn frame(boundary: usize) -> RgbImage {
    let mut img = RgbImage::new_fill(W, H, [30, 30, 30]);
    for y in boundary..H {
        for x in 0..W {
            img.put_pixel(x, y, [220, 220, 220]);
        }
    }
    img
}

fn blank() -> RgbImage {
    RgbImage::new_fill(W, H, [128, 128, 128])
}

struct Frames(VecDeque<RgbImage>);

impl Frames {
    fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self(frames.into_iter().collect())
    }
}

impl FrameSource for Frames {
    fn next_frame(&mut self) -> Result<RgbImage, BoxError> {
        self.0.pop_front().ok_or_else(|| "camera ran dry".into())
    }
}

#[derive(Default)]
struct Recorder {
    pre_runs: usize,
    advances: usize,
    corrections: Vec<f64>,
}

impl MonitorActions for Recorder {
    fn pre_run(&mut self) -> Result<(), BoxError> {
        self.pre_runs += 1;
        Ok(())
    }

    fn advance(&mut self) -> Result<(), BoxError> {
        self.advances += 1;
        Ok(())
    }

    fn self_correct(&mut self, average_distance: f64) -> Result<(), BoxError> {
        self.corrections.push(average_distance);
        Ok(())
    }
}

fn size() -> ImageSize {
    ImageSize::new(W, H)
}

/// A blank frame has no band with half of its pixels on an edge.
fn finder_params() -> LevelFinderParams {
    LevelFinderParams {
        find_meniscus_minimum: 0.5,
        ..LevelFinderParams::default()
    }
}

fn monitor(config: MonitorConfig) -> Monitor {
    let finder = LevelFinder::new(finder_params()).expect("finder");
    let mut monitor = Monitor::new(config, finder).expect("monitor");
    monitor
        .select_region(size(), &[PixelPoint::new(0, 0), PixelPoint::new(W - 1, H - 1)])
        .expect("region");
    monitor
}

/// Reference at the level of `frame(50)`, band of +-0.05 around it.
fn configured(config: MonitorConfig) -> Monitor {
    let mut monitor = monitor(config);
    let reference = monitor
        .set_reference_from_frame(frame(50))
        .expect("reference");
    monitor
        .set_tolerance(
            ToleranceBounds::TwoSided {
                first: reference - 0.05,
                second: reference + 0.05,
            },
            size(),
        )
        .expect("tolerance");
    monitor
}

#[test]
fn reference_from_frame_uses_the_detected_band() {
    let mut monitor = monitor(MonitorConfig::default());
    let reference = monitor
        .set_reference_from_frame(frame(50))
        .expect("reference");
    // edge on row 49, inside the band starting at row 48
    assert_abs_diff_eq!(reference, 0.48, epsilon = 1e-12);
    assert_eq!(monitor.history().len(), 1);
}

#[test]
fn in_tolerance_cycle_advances() {
    let mut monitor = configured(MonitorConfig::default());
    let mut source = Frames::new([frame(50), frame(52), frame(50)]);
    let mut actions = Recorder::default();

    let report = monitor
        .run_cycle(&mut source, &mut actions)
        .expect("cycle");
    assert_eq!(report.action, CycleAction::Advanced);
    assert_eq!(report.replicates.len(), 3);
    assert_eq!(actions.advances, 1);
    assert!(actions.corrections.is_empty());
    assert!(report.measurement.in_tolerance);
}

#[test]
fn out_of_tolerance_cycle_self_corrects_with_average_distance() {
    let mut monitor = configured(MonitorConfig::default());
    // liquid dropped by 0.2 of the image height in every replicate
    let mut source = Frames::new([frame(70), frame(70), frame(70)]);
    let mut actions = Recorder::default();

    let report = monitor
        .run_cycle(&mut source, &mut actions)
        .expect("cycle");
    assert_eq!(report.action, CycleAction::SelfCorrected);
    assert_eq!(actions.corrections.len(), 1);
    assert_abs_diff_eq!(actions.corrections[0], -0.2, epsilon = 1e-12);
    assert_abs_diff_eq!(report.measurement.relative_height, 0.68, epsilon = 1e-12);
}

#[test]
fn outlier_replicate_is_ignored() {
    let mut monitor = configured(MonitorConfig::default());
    let mut source = Frames::new([frame(50), frame(90), frame(50)]);
    let mut actions = Recorder::default();

    let report = monitor
        .run_cycle(&mut source, &mut actions)
        .expect("cycle");
    assert_eq!(report.action, CycleAction::Advanced);
    assert_abs_diff_eq!(report.measurement.average_distance, 0.0, epsilon = 1e-12);
}

#[test]
fn transient_failures_are_retried() {
    let config = MonitorConfig {
        number_of_replicate_measurements: 1,
        max_tries: 3,
        ..MonitorConfig::default()
    };
    let mut monitor = configured(config);
    let mut source = Frames::new([blank(), blank(), frame(50)]);
    let mut actions = Recorder::default();

    let report = monitor
        .run_cycle(&mut source, &mut actions)
        .expect("cycle");
    assert_eq!(report.replicates.len(), 1);
    assert_eq!(monitor.tries().count(), 0);
    assert!(monitor.last_failure().is_some());
}

#[test]
fn repeated_failures_give_up() {
    let config = MonitorConfig {
        max_tries: 2,
        ..MonitorConfig::default()
    };
    let mut monitor = configured(config);
    let mut source = Frames::new([frame(50), blank(), blank(), frame(50)]);
    let mut actions = Recorder::default();

    let err = monitor
        .run_cycle(&mut source, &mut actions)
        .unwrap_err();
    match err {
        MonitorError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.image, blank());
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(actions.advances + actions.corrections.len(), 0);
    let last_failure = monitor.last_failure().expect("last failure");
    assert_eq!(last_failure.image, blank());
    assert_eq!(monitor.tries().count(), 0);
}

#[test]
fn frame_of_another_size_is_rejected() {
    let mut monitor = configured(MonitorConfig::default());
    let history_before = monitor.history().len();

    let mut wide = RgbImage::new_fill(W * 2, H / 2, [30, 30, 30]);
    for y in H / 4..H / 2 {
        for x in 0..W * 2 {
            wide.put_pixel(x, y, [220, 220, 220]);
        }
    }
    let mut source = Frames::new([wide.clone(), frame(50), frame(50)]);
    let mut actions = Recorder::default();

    let err = monitor
        .run_cycle(&mut source, &mut actions)
        .unwrap_err();
    assert!(matches!(
        err,
        MonitorError::Tracker(TrackerError::ImageSizeMismatch { expected, got })
            if expected == size() && got == ImageSize::new(W * 2, H / 2)
    ));
    assert_eq!(actions.advances + actions.corrections.len(), 0);
    assert_eq!(monitor.history().len(), history_before);
    assert!(matches!(
        monitor.measure(wide),
        Err(MonitorError::Tracker(TrackerError::ImageSizeMismatch { .. }))
    ));
}

#[test]
fn run_flushes_the_level_log_even_on_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("levels.json");
    let header = LevelLogDocument::for_params(&LevelFinderParams::default());
    let log = LevelLogFile::create(&path, &header, LevelLogOptions::default()).expect("log");

    let finder = LevelFinder::new(LevelFinderParams::default()).expect("finder");
    let mut monitor = Monitor::new(MonitorConfig::default(), finder)
        .expect("monitor")
        .with_level_log(log);
    monitor
        .select_region(size(), &[PixelPoint::new(0, 0), PixelPoint::new(W - 1, H - 1)])
        .expect("region");
    monitor.set_reference(&[0.48], size()).expect("reference");
    monitor
        .set_tolerance(
            ToleranceBounds::OneSided {
                level: 0.6,
                above_is_in_tolerance: true,
            },
            size(),
        )
        .expect("tolerance");

    // one full cycle, then the camera runs dry mid-cycle
    let mut source = Frames::new([frame(50), frame(50), frame(50), frame(50)]);
    let mut actions = Recorder::default();
    let err = monitor
        .run(&mut source, &mut actions, 3)
        .unwrap_err();
    assert!(matches!(err, MonitorError::Source(_)));
    assert_eq!(actions.pre_runs, 1);
    assert_eq!(actions.advances, 1);

    let doc = LevelLogDocument::load_json(&path).expect("load");
    assert_eq!(doc.reference_level_relative, vec![0.48]);
    assert_eq!(doc.tolerance_level_relative, vec![0.6]);
    assert_eq!(doc.liquid_level_data.len(), 1);
    let height = *doc.liquid_level_data.values().next().expect("entry");
    assert_abs_diff_eq!(height, 0.48, epsilon = 1e-12);
}

#[test]
fn run_reports_every_cycle() {
    let mut monitor = configured(MonitorConfig::default());
    let mut source = Frames::new(std::iter::repeat_with(|| frame(50)).take(6));
    let mut actions = Recorder::default();

    let reports = monitor
        .run(&mut source, &mut actions, 2)
        .expect("run");
    assert_eq!(reports.len(), 2);
    assert_eq!(actions.advances, 2);
    assert_eq!(monitor.history().len(), 7);
}
