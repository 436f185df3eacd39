//! Integration tests for Settings config loading with layered merge semantics.
//!
//! Merge Semantics:
//! - Defaults → Global: REPLACE (global defines the real baseline)
//! - Global → Local: `exclude` UNIONS with negation support, scalars override
//! - Any → Env vars: REPLACE (explicit user override)
//!
//! Note: These tests run without a global config (temp directories only),
//! so they effectively test local config merging with defaults.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use treeplayer::application::services::ExportFormat;
use treeplayer::application::ApplicationError;
use treeplayer::config::{local_config_path, merge_array, MaskRule, Settings};
use treeplayer::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

#[test]
fn given_no_local_config_when_load_then_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.n_entries, 100_000_000);
    assert_eq!(settings.first_entry, 0);
    assert_eq!(settings.format, ExportFormat::Csv);
    assert!(settings.exclude.is_empty());
}

#[test]
fn given_local_config_when_load_then_scalars_override() {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "n_entries = 1000\nfirst_entry = 10\nformat = \"ipc\"\n",
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.n_entries, 1000);
    assert_eq!(settings.first_entry, 10);
    assert_eq!(settings.format, ExportFormat::Ipc);
}

#[test]
fn given_local_column_mask_when_load_then_replaces_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "[[column_mask]]\npattern = '\\.meanG$'\nreplacement = \"_mean\"\n",
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");
    let options = settings.frame_options(None).unwrap();

    // Assert
    assert_eq!(
        settings.column_mask,
        vec![MaskRule {
            pattern: r"\.meanG$".to_string(),
            replacement: "_mean".to_string(),
        }]
    );
    assert_eq!(options.mask.apply("hist.meanG"), "hist_mean");
    assert_eq!(options.mask.apply("track.fX"), "track.fX");
}

#[test]
fn given_user_mask_when_building_frame_options_then_replaces_configured_mask() {
    // Arrange
    let settings = Settings::default();

    // Act
    let options = settings
        .frame_options(Some("hnormChi2:_Tgl"))
        .expect("frame options");

    // Assert
    assert_eq!(options.mask.apply("hnormChi2TPCMult_Tgl_qPtDist.fX"), "TPCMult_qPtDist.fX");
}

#[test]
fn given_malformed_local_config_when_load_then_config_error() {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "n_entries = \"many\"\n").unwrap();

    // Act
    let result = Settings::load(Some(dir.path()));

    // Assert
    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_tree_dir_when_resolving_tree_path_then_relative_paths_joined() {
    // Arrange
    let settings = Settings {
        tree_dir: Some("/data/trees".into()),
        ..Default::default()
    };

    // Act & Assert
    assert_eq!(
        settings.tree_path(Path::new("qa.toml")),
        Path::new("/data/trees/qa.toml")
    );
    assert_eq!(
        settings.tree_path(Path::new("/tmp/qa.toml")),
        Path::new("/tmp/qa.toml")
    );
}

#[test]
fn given_negated_entry_when_merging_arrays_then_item_removed() {
    let base = vec![".*ITS.*".to_string(), ".*rmsG".to_string()];
    let overlay = vec!["!.*ITS.*".to_string(), ".*entries".to_string()];

    let merged = merge_array(&base, &overlay);

    assert_eq!(merged, vec![".*rmsG", ".*entries"]);
}

#[test]
fn given_settings_when_rendering_toml_then_round_trips() {
    let settings = Settings::default();

    let rendered = settings.to_toml().unwrap();
    let parsed: Settings = toml::from_str(&rendered).unwrap();

    assert_eq!(parsed, settings);
}
