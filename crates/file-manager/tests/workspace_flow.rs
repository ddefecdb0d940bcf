use pretty_assertions::assert_eq;
use pwa_file_manager::{
    store, BuildWarning, EventsType, FileManager, FileManagerConfig, FileManagerError,
    FilesPerDirLimit, SidecarMetadataReader,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const WAVES: [&str; 4] = [
    "1-0-+0+f0980_00_pi-.amp",
    "1-1++0+rho770_01_pi-.amp",
    "1-2++1+rho770_11_pi-.amp",
    "1-2-+0+f2_12_pi-.amp",
];

const MASS_BINS: [(f64, f64); 3] = [(1000.0, 1100.0), (1100.0, 1200.0), (1200.0, 1300.0)];

fn write_data_file(dir: &Path, name: &str, events_type: i64, lower: f64, upper: f64) {
    let path = dir.join(name);
    fs::write(&path, b"").expect("write data file");
    fs::write(
        SidecarMetadataReader::sidecar_path(&path),
        format!(r#"{{"events_type": {events_type}, "binning": {{"mass": [{lower:?}, {upper:?}]}}}}"#),
    )
    .expect("write sidecar");
}

fn write_key_file(dir: &Path, name: &str, waves: &[&str]) {
    let body: String = waves
        .iter()
        .map(|wave| format!("waveName = \"{wave}\";\n"))
        .collect();
    fs::write(dir.join(name), body).expect("write key file");
}

/// Two events types over three mass bins and four waves in three key files.
fn setup(limit: i64, additional: Option<&str>) -> (TempDir, FileManagerConfig) {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    for dir in ["data", "keys", "amps", "ints"] {
        fs::create_dir_all(root.join(dir)).expect("create dir");
    }
    for (i, (lower, upper)) in MASS_BINS.iter().enumerate() {
        write_data_file(&root.join("data"), &format!("real_{i}.root"), 1, *lower, *upper);
        write_data_file(&root.join("data"), &format!("acc_{i}.root"), 3, *lower, *upper);
    }
    write_key_file(&root.join("keys"), "a.key", &WAVES[..2]);
    write_key_file(&root.join("keys"), "b.key", &WAVES[2..3]);
    write_key_file(&root.join("keys"), "c.key", &WAVES[3..]);

    let mut config_text = format!(
        r#"
data_directory = "data"
key_directory = "keys"
amplitude_directory = "amps"
integral_directory = "ints"
file_manager_path = "out/fm.json"
limit_files_per_dir = {limit}
"#
    );
    if let Some(text) = additional {
        fs::write(root.join("add.txt"), text).expect("write additional binning");
        config_text.push_str("additional_binning_file = \"add.txt\"\n");
    }
    fs::write(root.join("pwa.toml"), config_text).expect("write config");
    let config = FileManagerConfig::load(root.join("pwa.toml")).expect("load config");
    (temp, config)
}

#[test]
fn builds_the_full_workspace_index() {
    let (temp, config) = setup(-1, None);
    let built = FileManager::initialize(config).expect("build");
    let manager = &built.manager;

    assert_eq!(built.report.data_files, 6);
    assert_eq!(built.report.key_files, 3);
    assert_eq!(built.report.bins, 3);
    assert_eq!(built.report.amplitude_files, 24);
    assert_eq!(built.report.integral_files, 6);
    assert!(built.report.warnings.is_empty());
    assert_eq!(manager.bin_ids(), 0..3);
    assert_eq!(
        manager.wave_names().collect::<Vec<_>>(),
        WAVES.to_vec()
    );
    assert!(manager.missing_bins().is_empty());

    let amps = temp.path().join("amps");
    assert_eq!(
        manager
            .amplitude_file_path(2, WAVES[1], EventsType::Accepted)
            .expect("amplitude path"),
        amps.join("1-1++0+rho770_01_pi-.amp_binID-2_3.root")
    );
    let per_wave = manager
        .amplitude_file_paths(0, EventsType::Real)
        .expect("amplitude paths");
    assert_eq!(per_wave.len(), 4);

    let record = manager.data_file(1, EventsType::Real).expect("data file");
    assert_eq!(record.path, temp.path().join("data").join("real_1.root"));
    assert_eq!(
        manager.key_file(WAVES[1]).expect("key file").path,
        temp.path().join("keys").join("a.key")
    );
    assert!(manager.are_files_synced());
}

#[test]
fn unlimited_and_auto_limits_assign_the_same_paths() {
    let (_unlimited_dir, unlimited) = setup(-1, None);
    let (_auto_dir, auto) = setup(0, None);
    let unlimited = FileManager::initialize(unlimited).expect("build").manager;
    let auto = FileManager::initialize(auto).expect("build").manager;

    assert_eq!(unlimited.limit_setting(), FilesPerDirLimit::Unlimited);
    assert_eq!(auto.limit_files_per_dir(), Some(24));
    assert_eq!(unlimited.amplitude_files(), auto.amplitude_files());
    assert!(!auto.is_shard_limit_reached());
}

#[test]
fn sharded_workspace_creates_numbered_dirs() {
    let (temp, config) = setup(10, None);
    let built = FileManager::initialize(config).expect("build");
    assert_eq!(built.report.shard_dirs, 3);
    assert!(built.manager.is_shard_limit_reached());
    for shard in ["0", "1", "2"] {
        assert!(temp.path().join("amps").join(shard).is_dir());
    }
    let first = built
        .manager
        .amplitude_file_path(0, WAVES[0], EventsType::Real)
        .expect("amplitude path");
    assert_eq!(
        first,
        temp.path().join("amps").join("0").join("1-0-+0+f0980_00_pi-.amp_binID-0_1.root")
    );
}

#[test]
fn rebuild_from_unchanged_inputs_is_identical() {
    let (_temp, config) = setup(7, None);
    let first = FileManager::initialize(config.clone()).expect("build").manager;
    let second = FileManager::initialize(config).expect("rebuild").manager;
    assert_eq!(first, second);
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn save_load_round_trip_and_sync_guard() {
    let (temp, config) = setup(-1, None);
    let manager = FileManager::initialize(config.clone()).expect("build").manager;
    store::save(&manager, &config.file_manager_path).expect("save");

    let loaded = store::load(&config.file_manager_path).expect("load");
    assert_eq!(loaded, manager);
    assert_eq!(
        loaded.amplitude_file_path(1, WAVES[3], EventsType::Real).expect("path"),
        manager.amplitude_file_path(1, WAVES[3], EventsType::Real).expect("path")
    );

    let err = store::save(&manager, &config.file_manager_path).expect_err("overwrite");
    assert!(matches!(err, FileManagerError::AlreadyExists(_)));

    write_key_file(&temp.path().join("keys"), "d.key", &["extra.amp"]);
    let err = store::load(&config.file_manager_path).expect_err("desynced");
    assert!(matches!(err, FileManagerError::Sync(_)));

    fs::remove_file(temp.path().join("keys").join("d.key")).expect("remove key file");
    fs::remove_file(temp.path().join("keys").join("c.key")).expect("remove key file");
    let err = store::load(&config.file_manager_path).expect_err("desynced");
    match err {
        FileManagerError::Sync(assessment) => {
            assert_eq!(
                assessment.reasons[0].removed,
                vec![temp.path().join("keys").join("c.key")]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn gap_between_bins_is_a_warning() {
    let (temp, config) = setup(-1, None);
    let data = temp.path().join("data");
    write_data_file(&data, "real_3.root", 1, 1400.0, 1500.0);
    write_data_file(&data, "acc_3.root", 3, 1400.0, 1500.0);

    let built = FileManager::initialize(config).expect("build");
    assert_eq!(built.report.bins, 4);
    assert_eq!(built.report.gap_count(), 1);
    assert!(matches!(
        &built.report.warnings[0],
        BuildWarning::Gap { variable, .. } if variable == "mass"
    ));
}

#[test]
fn overlapping_bins_abort_the_build() {
    let (temp, config) = setup(-1, None);
    write_data_file(&temp.path().join("data"), "real_x.root", 1, 1150.0, 1250.0);
    let err = FileManager::initialize(config).expect_err("overlap");
    assert!(matches!(err, FileManagerError::BinningConsistency(_)));
}

#[test]
fn duplicate_wave_across_key_files_aborts_the_build() {
    let (temp, config) = setup(-1, None);
    write_key_file(&temp.path().join("keys"), "dup.key", &[WAVES[2]]);
    let err = FileManager::initialize(config).expect_err("duplicate");
    assert!(matches!(
        err,
        FileManagerError::DuplicateWaveName { wave_name, .. } if wave_name == WAVES[2]
    ));
}

#[test]
fn point_lookup_finds_bins() {
    let (_temp, config) = setup(-1, None);
    let manager = FileManager::initialize(config).expect("build").manager;
    let point = BTreeMap::from([("mass".to_string(), 1150.0)]);
    assert_eq!(manager.bin_ids_containing(&point).expect("lookup"), vec![1]);
}

#[test]
fn additional_binning_maps_and_splits_integrals() {
    let (temp, config) = setup(-1, Some("mass;1.0;1.2 tPrime;0.1;1.0\n\nmass;1.25;1.3\n"));
    let built = FileManager::initialize(config).expect("build");
    let manager = &built.manager;

    assert_eq!(manager.additional_bins().expect("bins").len(), 2);
    assert_eq!(
        manager
            .bin_ids_for_additional_bin(0)
            .expect("map")
            .iter()
            .copied()
            .collect::<Vec<_>>(),
        vec![0, 1]
    );
    assert_eq!(manager.additional_bin_ids_for_bin(2).expect("inverse"), vec![1]);
    assert_eq!(manager.active_bins().expect("active"), vec![0, 1, 2]);
    assert_eq!(built.report.integral_files, 3 * 2 * 2);

    let ints = temp.path().join("ints");
    assert_eq!(
        manager
            .integral_file_path(0, EventsType::Generated, Some(0))
            .expect("integral path"),
        ints.join("integral_binID-0").join("mass:1.0-1.2_tPrime:0.1-1.0_2.root")
    );
    assert!(ints.join("integral_binID-2").is_dir());
    assert!(manager
        .integral_file_path(0, EventsType::Generated, None)
        .is_err());
    assert_eq!(
        manager
            .additional_integral_file_path(1, EventsType::Accepted)
            .expect("combined integral"),
        ints.join("mass:1.25-1.3_3.root")
    );
}
