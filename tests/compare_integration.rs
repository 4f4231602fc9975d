use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use serde_json::Value;
use tempfile::tempdir;
use vsme_lib::error::ErrorCategory;
use vsme_lib::types::ChangeClassification;
use vsme_lib::VsmeOutput;

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vsme"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run vsme")
}

fn parse_output(stdout: &[u8]) -> VsmeOutput {
    serde_json::from_slice(stdout).expect("output should be valid JSON")
}

fn write_png(path: &Path, img: &RgbaImage) {
    img.save(path).expect("write png");
}

fn page(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([240, 240, 240, 255]))
}

fn with_block(mut img: RgbaImage, x0: u32, y0: u32, size: u32) -> RgbaImage {
    for y in y0..y0 + size {
        for x in x0..x0 + size {
            img.put_pixel(x, y, Rgba([200, 0, 0, 255]));
        }
    }
    img
}

fn s(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn identical_images_pass() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    write_png(&a, &page(40, 30));
    write_png(&b, &page(40, 30));

    let out = run(&["compare", "--baseline", s(&a), "--actual", s(&b)]);
    assert_eq!(out.status.code(), Some(0));
    match parse_output(&out.stdout) {
        VsmeOutput::Compare(c) => {
            assert!(c.result.passed);
            assert_eq!(c.result.classification, Some(ChangeClassification::Identical));
            assert_eq!(c.result.pixels_different, 0);
            assert!((c.result.ssim_score - 1.0).abs() < 1e-12);
            assert!(c.diff_image.is_none());
        }
        other => panic!("expected compare output, got {other:?}"),
    }
}

#[test]
fn content_change_fails_and_writes_diff_image() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    let diff = dir.path().join("out").join("diff.png");
    write_png(&a, &page(60, 60));
    write_png(&b, &with_block(page(60, 60), 10, 20, 20));

    let out = run(&[
        "compare",
        "--baseline",
        s(&a),
        "--actual",
        s(&b),
        "--diff-output",
        s(&diff),
    ]);
    assert_eq!(out.status.code(), Some(1));

    let json: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["mode"], "compare");
    assert_eq!(json["passed"], false);
    assert_eq!(json["classification"], "contentChange");
    let regions = json["regions"].as_array().expect("regions");
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0]["x"], 10);
    assert_eq!(regions[0]["y"], 20);
    assert_eq!(regions[0]["width"], 20);
    assert_eq!(regions[0]["height"], 20);
    assert_eq!(regions[0]["pixelCount"], 400);

    assert!(diff.exists(), "diff image should be written");
    let rendered = image::open(&diff).unwrap().to_rgba8();
    assert_eq!(rendered.dimensions(), (60, 60));
}

#[test]
fn ignore_regions_mask_the_change() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    let regions = dir.path().join("ignore.json");
    write_png(&a, &page(60, 60));
    write_png(&b, &with_block(page(60, 60), 10, 20, 20));
    std::fs::write(&regions, r#"[{"x":8,"y":18,"w":24,"h":24}]"#).unwrap();

    let out = run(&[
        "compare",
        "--baseline",
        s(&a),
        "--actual",
        s(&b),
        "--ignore-regions",
        s(&regions),
    ]);
    assert_eq!(out.status.code(), Some(0));
    let json: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["classification"], "identical");
    assert_eq!(json["totalPixels"], 60 * 60 - 24 * 24);
}

#[test]
fn dimension_mismatch_is_a_failed_check_not_an_error() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    write_png(&a, &page(40, 30));
    write_png(&b, &page(30, 40));

    let out = run(&["compare", "--baseline", s(&a), "--actual", s(&b)]);
    assert_eq!(out.status.code(), Some(1));
    let json: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(json["errorMessage"]
        .as_str()
        .unwrap_or_default()
        .contains("Dimension mismatch"));
}

#[test]
fn missing_input_is_a_config_error() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    write_png(&a, &page(4, 4));
    let missing = dir.path().join("missing.png");

    let out = run(&["compare", "--baseline", s(&a), "--actual", s(&missing)]);
    assert_eq!(out.status.code(), Some(2));
    match parse_output(&out.stdout) {
        VsmeOutput::Error(e) => {
            assert_eq!(e.error.category, ErrorCategory::Config);
            assert!(e.error.message.contains("missing.png"));
        }
        other => panic!("expected error output, got {other:?}"),
    }
}

#[test]
fn config_tolerance_applies_unless_flag_given() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    let cfg = dir.path().join("vsme.toml");
    write_png(&a, &page(20, 20));
    // Uniform shift of 40 per channel: distance ~0.136
    write_png(&b, &RgbaImage::from_pixel(20, 20, Rgba([200, 200, 200, 255])));
    std::fs::write(&cfg, "[comparison]\ntolerance = 0.5\n").unwrap();

    let out = run(&[
        "compare",
        "--baseline",
        s(&a),
        "--actual",
        s(&b),
        "--config",
        s(&cfg),
    ]);
    assert_eq!(out.status.code(), Some(0));

    let out = run(&[
        "compare",
        "--baseline",
        s(&a),
        "--actual",
        s(&b),
        "--config",
        s(&cfg),
        "--tolerance",
        "0.05",
    ]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn invalid_config_file_is_reported() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    let cfg = dir.path().join("vsme.toml");
    write_png(&a, &page(4, 4));
    std::fs::write(&cfg, "[comparison]\ntolerance = 3.0\n").unwrap();

    let out = run(&[
        "compare",
        "--baseline",
        s(&a),
        "--actual",
        s(&a),
        "--config",
        s(&cfg),
    ]);
    assert_eq!(out.status.code(), Some(2));
    let json: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["mode"], "error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Invalid config"));
}

#[test]
fn output_file_receives_json() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    let report = dir.path().join("report.json");
    write_png(&a, &page(8, 8));

    let out = run(&[
        "compare",
        "--baseline",
        s(&a),
        "--actual",
        s(&a),
        "--format",
        "pretty",
        "--output",
        s(&report),
    ]);
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
    let body = std::fs::read(&report).unwrap();
    assert!(matches!(parse_output(&body), VsmeOutput::Compare(_)));
}
