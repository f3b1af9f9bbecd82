//! Integration tests for the `batch` command.
use portfolio_match::cli::{RunOpts, handle_batch_command};
use portfolio_match::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Every demo is a scenario, so the demos folder can be run as a batch
#[test]
fn test_handle_batch_command() {
    unsafe { std::env::set_var("PORTFOLIO_MATCH_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        ..Default::default()
    };
    handle_batch_command(&PathBuf::from("demos"), &opts, Some(Settings::default())).unwrap();

    for name in ["hourly", "simple"] {
        assert!(tempdir.path().join(name).join("summary.toml").is_file());
    }
    assert!(tempdir.path().join("portfolio_match_info.log").is_file());
}
