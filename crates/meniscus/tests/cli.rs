use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn write_vial(path: &Path) {
    image::RgbImage::from_fn(200, 200, |_, y| {
        if y < 80 {
            image::Rgb([30, 30, 30])
        } else {
            image::Rgb([220, 220, 220])
        }
    })
    .save(path)
    .expect("save image");
}

fn write_config(dir: &Path, minimum: f64) -> std::path::PathBuf {
    let image_path = dir.join("vial.png");
    write_vial(&image_path);
    let cfg = serde_json::json!({
        "image_path": image_path,
        "output_path": dir.join("report.json"),
        "finder": { "find_meniscus_minimum": minimum }
    });
    let cfg_path = dir.join("detect.json");
    std::fs::write(&cfg_path, serde_json::to_string_pretty(&cfg).expect("json"))
        .expect("write config");
    cfg_path
}

fn read_report(dir: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(dir.join("report.json")).expect("report");
    serde_json::from_str(&raw).expect("parse report")
}

#[test]
fn detect_writes_a_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(dir.path(), 0.5);

    Command::cargo_bin("meniscus")
        .expect("binary")
        .args(["detect", "--config"])
        .arg(&cfg_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"candidates\""));

    let report = read_report(dir.path());
    let rel = report["candidates"][0]["relative_height"]
        .as_f64()
        .expect("relative height");
    assert!((rel - 0.39).abs() < 1e-9, "relative height {rel}");
    assert!(report["error"].is_null());
}

#[test]
fn detect_draws_the_level_overlay() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(dir.path(), 0.5);
    let overlay = dir.path().join("overlay.png");

    Command::cargo_bin("meniscus")
        .expect("binary")
        .args(["detect", "--config"])
        .arg(&cfg_path)
        .arg("--overlay")
        .arg(&overlay)
        .assert()
        .success();

    let img = image::open(&overlay).expect("overlay").to_rgb8();
    // level band starts at row 78
    assert_eq!(img.get_pixel(5, 78).0, [0, 255, 0]);
    assert_eq!(img.get_pixel(5, 10).0, [30, 30, 30]);
}

#[test]
fn detect_failure_is_reported_not_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(dir.path(), 0.99);
    let failures = dir.path().join("failures");

    Command::cargo_bin("meniscus")
        .expect("binary")
        .args(["detect", "--config"])
        .arg(&cfg_path)
        .arg("--failure-dir")
        .arg(&failures)
        .assert()
        .success();

    let report = read_report(dir.path());
    assert!(report["error"].as_str().is_some());
    assert!(failures.join("vial_no_level_found.png").exists());
}

#[test]
fn missing_config_fails() {
    Command::cargo_bin("meniscus")
        .expect("binary")
        .args(["detect", "--config", "/definitely/not/here.json"])
        .assert()
        .failure();
}

#[test]
fn subcommand_is_required() {
    Command::cargo_bin("meniscus")
        .expect("binary")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
