use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use framesync::config::PipelineConfig;
use framesync::EntityKind;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FRAMESYNC_CONFIG",
        "FRAMESYNC_SAMPLING_FPS",
        "FRAMESYNC_STALENESS_MS",
        "FRAMESYNC_CALLBACK_INTERVAL_MS",
        "FRAMESYNC_CABIN_REGIONS",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_toml_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
kind = "occupant"
loop = true

[sampling]
fps = 5

[sync]
staleness_ms = 400
callback_interval_ms = 100

[cabin]
regions = [0, 1, 2]

[output]
dir = "annotated"
csv = "run.csv"
lossless = true
"#,
    );

    std::env::set_var("FRAMESYNC_STALENESS_MS", "750");
    std::env::set_var("FRAMESYNC_CABIN_REGIONS", "3, 4");

    let cfg = PipelineConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.kind, EntityKind::Occupant);
    assert_eq!(cfg.sampling_fps, 5);
    assert_eq!(cfg.sync.staleness_ms, Some(750));
    assert_eq!(cfg.sync.callback_interval_ms, 100);
    assert_eq!(cfg.cabin_regions, vec![3, 4]);
    assert_eq!(cfg.output.dir, Some(PathBuf::from("annotated")));
    assert_eq!(cfg.output.csv, Some(PathBuf::from("run.csv")));
    assert!(cfg.output.lossless);
    assert!(cfg.loop_input);
    assert!(cfg.validate().is_ok());

    clear_env();
}

#[test]
fn loads_json_config_from_env_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "kind": "face",
            "sync": { "staleness_ms": 500 },
            "face": { "drowsiness": true },
            "output": { "summary_json": "summary.json" }
        }"#,
    );
    std::env::set_var("FRAMESYNC_CONFIG", file.path());

    let cfg = PipelineConfig::load(None).expect("load config");
    assert_eq!(cfg.kind, EntityKind::Face);
    assert_eq!(cfg.staleness_ms().unwrap(), 500);
    assert!(cfg.drowsiness);
    assert_eq!(cfg.output.summary_json, Some(PathBuf::from("summary.json")));
    assert_eq!(cfg.sampling_fps, 0);

    clear_env();
}

#[test]
fn env_only_config_still_needs_a_window() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load(None).expect("load defaults");
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("staleness window is required"));

    std::env::set_var("FRAMESYNC_STALENESS_MS", "300");
    let cfg = PipelineConfig::load(None).expect("load env");
    assert!(cfg.validate().is_ok());

    clear_env();
}

#[test]
fn rejects_bad_env_values_and_unknown_keys() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FRAMESYNC_SAMPLING_FPS", "fast");
    let err = PipelineConfig::load(None).unwrap_err();
    assert!(err.to_string().contains("FRAMESYNC_SAMPLING_FPS"));
    clear_env();

    std::env::set_var("FRAMESYNC_CABIN_REGIONS", "1,front");
    let err = PipelineConfig::load(None).unwrap_err();
    assert!(err.to_string().contains("front"));
    clear_env();

    let file = config_file(".toml", "[sync]\nstaleness = 500\n");
    assert!(PipelineConfig::load(Some(file.path())).is_err());

    clear_env();
}
