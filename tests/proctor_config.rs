use std::sync::Mutex;

use tempfile::NamedTempFile;

use exam_proctor::ProctorConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PROCTOR_CONFIG",
        "PROCTOR_SERVICE_URL",
        "PROCTOR_CAMERA",
        "PROCTOR_MICROPHONE",
        "PROCTOR_DETECTOR",
        "PROCTOR_TIMEOUT_SECS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ProctorConfig::load().expect("load config");
    assert!(cfg.service_url.is_none());
    assert_eq!(cfg.camera, "stub://camera0");
    assert_eq!(cfg.microphone, "stub://mic0");
    assert_eq!(cfg.detector, "synthetic");
    assert_eq!(cfg.request_timeout.as_secs(), 10);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "service_url": "https://exams.example.test",
        "devices": {
            "camera": "stub://lecture_hall",
            "microphone": "stub://headset"
        },
        "detector": "synthetic",
        "request_timeout_secs": 30
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PROCTOR_CONFIG", file.path());
    std::env::set_var("PROCTOR_CAMERA", "stub://override_cam");
    std::env::set_var("PROCTOR_TIMEOUT_SECS", "5");

    let cfg = ProctorConfig::load().expect("load config");
    assert_eq!(cfg.service_url.as_deref(), Some("https://exams.example.test"));
    assert_eq!(cfg.camera, "stub://override_cam");
    assert_eq!(cfg.microphone, "stub://headset");
    assert_eq!(cfg.request_timeout.as_secs(), 5);

    clear_env();
}

#[test]
fn rejects_unknown_detector() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_DETECTOR", "onnx");
    assert!(ProctorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_non_http_service_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_SERVICE_URL", "ftp://exams.example.test");
    assert!(ProctorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_zero_timeout() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_TIMEOUT_SECS", "0");
    assert!(ProctorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_device_spec() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_CAMERA", "not a url");
    assert!(ProctorConfig::load().is_err());

    clear_env();
}
