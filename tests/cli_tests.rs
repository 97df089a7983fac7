use assert_cmd::Command;
use cosign_store::{FileStore, KvPersistence, MultisigOperationStore};
use cosign_types::{AccountId, CallHash, ChainId, Config, CryptoFamily, MultisigDescriptor};
use predicates::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

const MEMBER_1: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";
const MEMBER_2: &str = "0x0202020202020202020202020202020202020202020202020202020202020202";
const MEMBER_3: &str = "0x0303030303030303030303030303030303030303030303030303030303030303";

#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cosign"))
        .stdout(predicate::str::contains("build:"));
}

#[test]
fn test_metrics_command() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.arg("metrics")
        .assert()
        .success()
        .stdout(predicate::str::contains("# TYPE cosign_operations_opened_total counter"))
        .stdout(predicate::str::contains("cosign_submissions_in_flight 0"));
}

#[test]
fn test_derive_command() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["derive", "--threshold", "2"])
        .args(["--member", MEMBER_3, "--member", MEMBER_1, "--member", MEMBER_2])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "0x3ffd20eb97bafd6f5af8d026cd11101f1553fa9cb4b8a37d1721314fbbb48fc5",
        ));
}

#[test]
fn test_derive_command_missing_threshold() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["derive", "--member", MEMBER_1])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "required arguments were not provided",
        ));
}

#[test]
fn test_derive_command_invalid_threshold() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["derive", "--threshold", "3"])
        .args(["--member", MEMBER_1, "--member", MEMBER_2])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid threshold"));
}

#[test]
fn test_call_hash_command() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["call-hash", "0x"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "0x0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8",
        ));
}

#[test]
fn test_call_hash_command_invalid_hex() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["call-hash", "0xzz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid call"));
}

#[test]
fn test_wrap_command_keeps_core_call_hash() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["wrap", "--chain", "polkadot", "--call", "0x000102"])
        .args(["--threshold", "2"])
        .args(["--member", MEMBER_1, "--member", MEMBER_2, "--member", MEMBER_3])
        .args(["--signer", MEMBER_1])
        .arg("--home")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "call_hash: 0x3d8c3d594928271f44aad7a04b177154806867bcf918e1549c0bc16f9da2b09b",
        ))
        .stdout(predicate::str::contains("wrapped_call: 0x1e01"))
        .stdout(predicate::str::contains(format!("submitter: {MEMBER_1}")));
}

#[test]
fn test_wrap_command_unknown_chain() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["wrap", "--chain", "westend", "--call", "0x00"])
        .args(["--threshold", "2"])
        .args(["--member", MEMBER_1, "--member", MEMBER_2])
        .args(["--signer", MEMBER_1])
        .arg("--home")
        .arg(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn test_wrap_command_signer_not_member() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["wrap", "--chain", "kusama", "--call", "0x00"])
        .args(["--threshold", "2"])
        .args(["--member", MEMBER_1, "--member", MEMBER_2])
        .args(["--signer", MEMBER_3])
        .arg("--home")
        .arg(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a member"));
}

#[test]
fn test_config_init_and_validate() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["config", "init", "--home"])
        .arg(temp_dir.path())
        .assert()
        .success();

    let config_path = temp_dir.path().join("config.toml");
    assert!(config_path.exists());

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["config", "validate"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["config", "show", "--home"])
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("polkadot"));

    // a second init refuses to overwrite
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["config", "init", "--home"])
        .arg(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_validate_invalid_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "chains = 1\n").unwrap();

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["config", "validate"])
        .arg(&config_path)
        .assert()
        .failure();
}

#[test]
fn test_config_validate_missing_file() {
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["config", "validate", "non_existent_config.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_operations_list_and_show() {
    let temp_dir = TempDir::new().unwrap();
    let call_hash = CallHash::from_bytes([0x42; 32]);
    {
        let persistence =
            KvPersistence::new(FileStore::open(temp_dir.path().join("operations")).unwrap());
        let store = MultisigOperationStore::new(Arc::new(persistence));
        let descriptor = MultisigDescriptor::from_accounts(
            [MEMBER_1, MEMBER_2, MEMBER_3]
                .iter()
                .map(|hex| AccountId::from_hex(hex).unwrap()),
            2,
            CryptoFamily::Standard,
        );
        store
            .open_or_get(
                ChainId::from("polkadot"),
                call_hash,
                descriptor,
                AccountId::from_hex(MEMBER_1).unwrap(),
            )
            .unwrap();
    }

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["operations", "list", "--home"])
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(call_hash.to_hex()))
        .stdout(predicate::str::contains("signing"))
        .stdout(predicate::str::contains("0/2"));

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["operations", "list", "--status", "executed", "--home"])
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(call_hash.to_hex()).not());

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["operations", "show", "--home"])
        .arg(temp_dir.path())
        .arg("polkadot")
        .arg(call_hash.to_hex())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\""));
}

#[test]
fn test_log_level_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let mut config = Config::default();
    config.log.level = "debug".to_string();
    config.save_to(&config_path).unwrap();

    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["operations", "list", "--home"])
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("opened operation store"));

    // the flag wins over the file
    let mut cmd = Command::cargo_bin("cosign").unwrap();
    cmd.args(["--log-level", "warn", "operations", "list", "--home"])
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("opened operation store").not());
}
