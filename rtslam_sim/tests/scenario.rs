// rtslam_sim/tests/scenario.rs

use std::path::PathBuf;

use rtslam_sim::prelude::*;

fn scenario(name: &str) -> ScenarioConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("assets/scenarios")
        .join(name);
    ScenarioConfig::load(&path).unwrap()
}

#[test]
fn test_gps_compass_loop_tracks_truth() {
    let config = scenario("00_gps_compass_loop.toml");
    assert_eq!(config.map.landmarks.len(), 2);

    let report = ScenarioRunner::new(config).unwrap().run().unwrap();
    assert_eq!(report.ticks, 200);
    assert_eq!(report.corrected, 200);
    assert!(report.rms_position_error < 0.5, "{report}");
    assert!(report.final_yaw_error.unwrap() < 5f64.to_radians(), "{report}");
}

#[test]
fn test_relative_mode_exports_absolute_position() {
    let config = scenario("01_gps_straight_relative.toml");
    let mut runner = ScenarioRunner::new(config).unwrap();
    let report = runner.run().unwrap();

    // The estimate lives near the local origin, the exported position near the truth.
    assert!(runner.robot().position(runner.map()).norm() < 100.0);
    assert!(runner.robot().origin_sensors().norm() > 1000.0);
    assert!(report.rms_position_error < 1.0, "{report}");
    assert_eq!(report.final_yaw_error, None);
}

#[test]
fn test_gated_run_with_reinitialization() {
    let config = scenario("02_gated_reinit.toml");
    let report = ScenarioRunner::new(config).unwrap().run().unwrap();

    assert!(report.reinitialized);
    assert_eq!(report.corrected + report.rejected, report.ticks);
    assert!(report.corrected > report.ticks / 2, "{report}");
    assert!(report.final_position_error < 0.5, "{report}");
}
