use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use spatialdata::dataset::io_json::{read_spatialdata_json, write_spatialdata_json};
use spatialdata::dataset::SpatialData;
use spatialdata::model::ElementKind;
use spatialdata::transform::Transformation;
use tempfile::TempDir;

mod common;

fn write_fixture(dir: &TempDir, name: &str, sdata: &SpatialData) -> PathBuf {
    let path = dir.path().join(name);
    write_spatialdata_json(&path, sdata).expect("write fixture");
    path
}

/// Shapes only, with a table annotating both shape elements.
fn shapes_sdata() -> SpatialData {
    let mut sdata = SpatialData::new();
    for (name, shapes) in common::shapes() {
        sdata.add_shapes(name, shapes).unwrap();
    }
    sdata
        .set_table(common::table(
            &["shapes/circles", "shapes/poly"],
            Some("annotated_shapes"),
        ))
        .unwrap();
    sdata
        .set_transformation(
            ElementKind::Shapes,
            "circles",
            Transformation::Identity,
            "aligned",
        )
        .unwrap();
    sdata
}

fn cmd() -> Command {
    Command::cargo_bin("spatialdata").unwrap()
}

fn path_arg(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn runs() {
    cmd().assert().success();
}

#[test]
fn outputs_tool_name() {
    cmd().arg("-V").assert().success().stdout("spatialdata 0.1.0\n");
}

#[test]
fn validate_valid_container_succeeds() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(&dir, "valid.json", &shapes_sdata());

    cmd()
        .args(["validate", path_arg(&input)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation passed"));
}

#[test]
fn validate_dangling_region_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(&dir, "full.json", &common::full_sdata());

    cmd()
        .args(["validate", path_arg(&input)])
        .assert()
        .success()
        .stdout(predicate::str::contains("DanglingRegion"));

    cmd()
        .args(["validate", "--strict", path_arg(&input)])
        .assert()
        .failure()
        .stdout(predicate::str::contains("0 error(s)"));
}

#[test]
fn validate_require_global() {
    let dir = TempDir::new().unwrap();
    let mut sdata = shapes_sdata();
    let circles = sdata.element_mut(ElementKind::Shapes, "circles").unwrap();
    spatialdata::transform::remove_transformation(circles, "global").unwrap();
    let input = write_fixture(&dir, "no_global.json", &sdata);

    cmd()
        .args(["validate", path_arg(&input)])
        .assert()
        .success();
    cmd()
        .args(["validate", "--require-global", path_arg(&input)])
        .assert()
        .failure()
        .stdout(predicate::str::contains("MissingCoordinateSystem"));
}

#[test]
fn validate_json_output_format() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(&dir, "valid.json", &shapes_sdata());

    cmd()
        .args(["validate", path_arg(&input), "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"error_count\": 0"))
        .stdout(predicate::str::contains("\"warning_count\": 0"));
}

#[test]
fn validate_rejects_schema_violations_on_read() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.json");
    std::fs::write(
        &input,
        r#"{"shapes": {"circles": {
            "geometry": [{"type": "Point", "coordinates": [0.0, 0.0]}],
            "transformations": {"global": {"type": "identity"}}
        }}}"#,
    )
    .unwrap();

    cmd()
        .args(["validate", path_arg(&input)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("radius"));
}

#[test]
fn validate_nonexistent_file_fails() {
    cmd()
        .args(["validate", "nonexistent_file.json"])
        .assert()
        .failure();
}

#[test]
fn info_lists_elements() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(&dir, "shapes.json", &shapes_sdata());

    cmd()
        .args(["info", path_arg(&input)])
        .assert()
        .success()
        .stdout(predicate::str::contains("'circles': 5 circles"))
        .stdout(predicate::str::contains("\"aligned\""));

    cmd()
        .args(["info", path_arg(&input), "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"n_obs\": 100"));
}

#[test]
fn filter_writes_selected_elements() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(&dir, "shapes.json", &shapes_sdata());
    let output = dir.path().join("aligned.json");

    cmd()
        .args([
            "filter",
            path_arg(&input),
            "-c",
            "aligned",
            "--filter-table",
            "-o",
            path_arg(&output),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kept 1 of 3"));

    let filtered = read_spatialdata_json(&output).unwrap();
    assert_eq!(filtered.names(ElementKind::Shapes), vec!["circles"]);
    assert_eq!(filtered.table().unwrap().n_obs(), 50);
}

#[test]
fn concat_merges_files() {
    let dir = TempDir::new().unwrap();
    let sdata = shapes_sdata();
    let first = write_fixture(
        &dir,
        "first.json",
        &sdata.filter_by_single_coordinate_system("aligned", true),
    );
    let mut rest = sdata.clone();
    rest.remove(ElementKind::Shapes, "circles").unwrap();
    rest.take_table();
    let second = write_fixture(&dir, "second.json", &rest);
    let output = dir.path().join("merged.json");

    cmd()
        .args([
            "concat",
            path_arg(&first),
            path_arg(&second),
            "-o",
            path_arg(&output),
        ])
        .assert()
        .success();

    let merged = read_spatialdata_json(&output).unwrap();
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.table().unwrap().n_obs(), 50);

    cmd()
        .args(["concat", path_arg(&first), path_arg(&first), "-o", path_arg(&output)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("collide"));
}
