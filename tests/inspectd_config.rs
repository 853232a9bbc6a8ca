use std::sync::Mutex;

use tempfile::NamedTempFile;

use inspection_kernel::InspectdConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "INSPECT_CONFIG",
        "INSPECT_MODEL_PATH",
        "INSPECT_CONFIDENCE",
        "INSPECT_CAMERA_URLS",
        "INSPECT_DEMO_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_run_without_weights_or_hardware() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = InspectdConfig::load().expect("load defaults");
    assert_eq!(cfg.model.path, "stub:");
    assert_eq!(cfg.confidence.ratio(), 0.40);
    assert_eq!(cfg.cameras.len(), 1);
    assert!(cfg.cameras[0].url.starts_with("stub://"));
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "path": "weights/line3.onnx",
            "input_size": 640,
            "iou_threshold": 0.5
        },
        "confidence_percent": 55,
        "cameras": [
            { "name": "left", "url": "http://192.168.1.4:8081", "target_fps": 12 },
            { "name": "right", "url": "http://192.168.1.5:8081" }
        ],
        "demo_dir": "demo_images"
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("INSPECT_CONFIG", file.path());
    std::env::set_var("INSPECT_CONFIDENCE", "70");

    let cfg = InspectdConfig::load().expect("load config");
    clear_env();

    // File values survive...
    assert_eq!(cfg.model.path, "weights/line3.onnx");
    assert_eq!(cfg.model.iou_threshold, 0.5);
    assert_eq!(cfg.cameras.len(), 2);
    assert_eq!(cfg.cameras[0].name, "left");
    assert_eq!(cfg.cameras[0].target_fps, 12);
    assert_eq!(cfg.demo_dir.to_str(), Some("demo_images"));
    // ...except where the environment overrides them.
    assert_eq!(cfg.confidence.ratio(), 0.70);
}

#[test]
fn camera_urls_can_come_from_the_environment() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var(
        "INSPECT_CAMERA_URLS",
        "stub://front, stub://rear",
    );
    let cfg = InspectdConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.cameras.len(), 2);
    assert_eq!(cfg.cameras[0].name, "camera_1");
    assert_eq!(cfg.cameras[0].url, "stub://front");
    assert_eq!(cfg.cameras[1].url, "stub://rear");
}

#[test]
fn out_of_range_confidence_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("INSPECT_CONFIDENCE", "10");
    let result = InspectdConfig::load();
    clear_env();
    assert!(result.is_err());
}

#[test]
fn an_unreadable_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("INSPECT_CONFIG", "/nonexistent/inspectd.json");
    let result = InspectdConfig::load();
    clear_env();
    assert!(result.is_err());
}
