//! CLI 集成测试

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn insight() -> Command {
    let mut cmd = Command::cargo_bin("insight").unwrap();
    cmd.env("RUST_LOG", "error");
    cmd
}

/// 写入指向临时缓存目录的配置文件
fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let cache_dir = dir.path().join("cache");
    let path = dir.path().join("insight.toml");
    std::fs::write(
        &path,
        format!(
            "[cache]\nbackend = \"file\"\ndir = \"{}\"\n\n[batch]\nmax_workers = 2\n",
            cache_dir.display()
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_config_template() {
    insight()
        .args(["config", "template"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[batch]"))
        .stdout(predicate::str::contains("max_workers = 3"));
}

#[test]
fn test_missing_config_file_fails() {
    insight()
        .args(["--config", "/nonexistent/insight.toml", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_batch_then_stats() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    insight()
        .arg("--config")
        .arg(&config)
        .args(["--json", "batch", "mouse", "pen", "mouse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"misses\": 2"))
        .stdout(predicate::str::contains("\"deduplicated\": 1"))
        .stdout(predicate::str::contains("Mouse Logitech G502"));

    insight()
        .arg("--config")
        .arg(&config)
        .args(["--json", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid_entries\": 2"));

    insight()
        .arg("--config")
        .arg(&config)
        .args(["--json", "batch", "pen"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hits\": 1"));
}

#[test]
fn test_market_pads_prices() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    insight()
        .arg("--config")
        .arg(&config)
        .args(["--json", "market", "monitor", "tv", "--price", "250"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"preco\": 250.0"))
        .stdout(predicate::str::contains("\"preco\": 100.0"));
}

#[test]
fn test_sweep_empty_cache() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    insight()
        .arg("--config")
        .arg(&config)
        .arg("sweep")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 entries"));
}
