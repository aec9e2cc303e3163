// tests/cli_test.rs
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn nbpkg(args: &[&str], config_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nbpkg"))
        .args(args)
        .env("NBPKG_CONFIG_DIR", config_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute nbpkg")
}

/// A checkout of `bash` on `branch`, tracking the same branch on `remote`
fn checkout(dir: &Path, branch: &str, remote: &str, url: &str) {
    let repo = git2::Repository::init(dir).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Packager").unwrap();
        config.set_str("user.email", "packager@example.com").unwrap();
        config
            .set_str(&format!("branch.{}.remote", branch), remote)
            .unwrap();
        config
            .set_str(&format!("branch.{}.merge", branch), &format!("refs/heads/{}", branch))
            .unwrap();
    }
    repo.remote(remote, url).unwrap();
    repo.set_head(&format!("refs/heads/{}", branch)).unwrap();

    fs::write(dir.join("bash.spec"), "Name: bash\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("bash.spec")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = repo.signature().unwrap();
    repo.commit(Some("HEAD"), &signature, &signature, "Initial import", &tree, &[])
        .unwrap();
}

#[test]
fn test_nbpkg_help() {
    let config_dir = TempDir::new().unwrap();
    let output = nbpkg(&["--help"], config_dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("nbpkg"));
    assert!(stdout.contains("fetch-upstream"));
    assert!(stdout.contains("new-sources-upstream"));
}

#[test]
fn test_nbpkg_version() {
    let config_dir = TempDir::new().unwrap();
    let output = nbpkg(&["--version"], config_dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_target_of_release_branch() {
    let config_dir = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    checkout(dir.path(), "nb5.0", "networkbox", "ssh://pkgs.network-box.com/bash");

    let path = dir.path().display().to_string();
    let output = nbpkg(&["--path", &path, "target"], config_dir.path());

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "nb5.0-free-candidate");
}

#[test]
fn test_nonfree_checkout_and_dist_override() {
    let config_dir = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    checkout(
        dir.path(),
        "nb5.0",
        "networkbox-nonfree",
        "ssh://pkgs.network-box.com/nonfree/bash",
    );

    let path = dir.path().display().to_string();
    let output = nbpkg(
        &["--path", &path, "--dist", "nb-epel7", "resolve", "--defines"],
        config_dir.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("--define 'dist .el7'"));
    assert!(stdout.contains("--define 'rhel 7'"));
}

#[test]
fn test_unrecognized_branch_fails() {
    let config_dir = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    checkout(dir.path(), "feature", "networkbox", "ssh://pkgs.network-box.com/bash");

    let path = dir.path().display().to_string();
    let output = nbpkg(&["--path", &path, "target"], config_dir.path());

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Could not execute target"));
    assert!(stderr.contains("feature"));
    assert!(stderr.contains("--dist"));
}

#[test]
fn test_clone_refuses_all_branches() {
    let config_dir = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();

    let path = dir.path().display().to_string();
    let output = nbpkg(&["--path", &path, "clone", "--branches", "bash"], config_dir.path());

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr).unwrap().contains("Just no."));
    assert!(!dir.path().join("bash").exists());
}
