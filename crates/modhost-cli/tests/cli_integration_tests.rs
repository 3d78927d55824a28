//! Integration tests for the `modhost` binary.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::str::contains;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

fn write_archive(path: &Path, manifest: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    let mut zip = zip::ZipWriter::new(File::create(path).expect("create archive"));
    zip.start_file("module.yml", SimpleFileOptions::default())
        .expect("start manifest");
    zip.write_all(manifest.as_bytes()).expect("write manifest");
    zip.finish().expect("finish archive");
}

fn modhost(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("modhost").expect("modhost bin");
    cmd.arg("--data-dir").arg(data_dir).env_remove("RUST_LOG");
    cmd
}

#[test]
fn finalize_applies_staged_update() {
    let root = tempdir().expect("tempdir");
    let modules = root.path().join("modules");
    write_archive(&modules.join("shop.zip"), "name: shop\nmain: acme::Shop\nversion: 1.0.0\n");
    write_archive(
        &modules.join("shop.zip.update"),
        "name: shop\nmain: acme::Shop\nversion: 2.0.0\n",
    );

    modhost(root.path())
        .arg("finalize")
        .assert()
        .success()
        .stdout(contains("applied"));

    assert!(modules.join("shop.zip").is_file());
    assert!(!modules.join("shop.zip.update").exists());
}

#[test]
fn finalize_with_nothing_staged() {
    let root = tempdir().expect("tempdir");
    fs::create_dir_all(root.path().join("modules")).expect("modules dir");

    modhost(root.path())
        .arg("finalize")
        .assert()
        .success()
        .stdout(contains("Nothing to finalize"));
}

#[test]
fn list_json_on_empty_directory() {
    let root = tempdir().expect("tempdir");

    let output = modhost(root.path())
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).expect("valid json output");
    assert_eq!(value, serde_json::json!([]));
    assert!(root.path().join("modules").is_dir());
}

#[test]
fn list_reports_modules_it_cannot_load() {
    let root = tempdir().expect("tempdir");
    write_archive(
        &root.path().join("modules").join("shop.zip"),
        "name: shop\nmain: acme::Shop\n",
    );
    write_archive(
        &root.path().join("modules").join("cart.zip"),
        "name: cart\nmain: acme::Cart\nextension:\n  depend: [basket]\n",
    );

    modhost(root.path())
        .arg("list")
        .assert()
        .success()
        .stdout(contains("No modules loaded"))
        .stdout(contains("failed"))
        .stdout(contains("cart waits for basket"));
}

#[test]
fn configured_module_directory_is_used() {
    let root = tempdir().expect("tempdir");
    fs::write(
        root.path().join("modhost.yml"),
        "modules:\n  directory: ext\n",
    )
    .expect("write config");

    modhost(root.path())
        .args(["list", "--json"])
        .assert()
        .success();

    assert!(root.path().join("ext").is_dir());
    assert!(!root.path().join("modules").exists());
}

#[test]
fn missing_data_dir_fails() {
    let root = tempdir().expect("tempdir");

    modhost(&root.path().join("absent"))
        .arg("list")
        .assert()
        .failure()
        .stderr(contains("does not exist"));
}
