use std::sync::Mutex;

use tempfile::NamedTempFile;

use cabinwatch::config::WatchConfig;
use cabinwatch::{Fault, NotificationPolicy, Resolution};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CABINWATCH_CONFIG",
        "CABINWATCH_SOURCE",
        "CABINWATCH_MODEL",
        "CABINWATCH_LABELS",
        "CABINWATCH_MIN_CONFIDENCE",
        "CABINWATCH_TARGET_LABEL",
        "CABINWATCH_RESOLUTION",
        "CABINWATCH_RECORD",
        "CABINWATCH_BACKEND",
        "CABINWATCH_ALERT_ENDPOINT",
        "CABINWATCH_BOT_TOKEN",
        "CABINWATCH_CHAT_ID",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model_path": "models/cabin.onnx",
        "source": "stub://cabin",
        "min_confidence": 0.6,
        "target_label": "Kid",
        "resolution": "800x600",
        "backend": "scripted",
        "alert": {
            "bot_token": "123:abc",
            "chat_id": "42",
            "policy": "end_of_run"
        },
        "gate": {
            "enabled": true,
            "lamp_pin": 5,
            "button_pin": 6,
            "poll_ms": 50
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("CABINWATCH_CONFIG", file.path());
    std::env::set_var("CABINWATCH_TARGET_LABEL", "Baby");
    std::env::set_var("CABINWATCH_MIN_CONFIDENCE", "0.75");

    let cfg = WatchConfig::load().expect("load config");

    assert_eq!(cfg.model_path.to_str().unwrap(), "models/cabin.onnx");
    assert_eq!(cfg.source, "stub://cabin");
    assert_eq!(cfg.min_confidence, 0.75);
    assert_eq!(cfg.target_label, "Baby");
    assert_eq!(
        cfg.resolution,
        Some(Resolution {
            width: 800,
            height: 600
        })
    );
    assert_eq!(cfg.alert.policy, NotificationPolicy::EndOfRun);
    assert!(cfg.gate.enabled);
    assert_eq!(cfg.gate.lamp_pin, 5);
    assert_eq!(cfg.gate.button_pin, 6);
    assert_eq!(cfg.gate.poll_ms, 50);

    clear_env();
}

#[test]
fn malformed_resolution_fails_before_any_frame_is_read() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": "stub://cabin",
        "resolution": "640by480",
        "alert": { "bot_token": "123:abc", "chat_id": "42" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("CABINWATCH_CONFIG", file.path());

    let err = WatchConfig::load().expect_err("malformed resolution");
    let fault = err.downcast_ref::<Fault>().expect("fault kind");
    assert!(matches!(fault, Fault::Configuration(_)));

    clear_env();
}

#[test]
fn record_without_motion_source_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": "stub://cabin",
        "record": true,
        "alert": { "bot_token": "123:abc", "chat_id": "42" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("CABINWATCH_CONFIG", file.path());

    let err = WatchConfig::load().expect_err("record on a stub source");
    let fault = err.downcast_ref::<Fault>().expect("fault kind");
    assert!(matches!(fault, Fault::Configuration(_)));

    clear_env();
}

#[test]
fn missing_alert_credentials_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "source": "stub://cabin" }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("CABINWATCH_CONFIG", file.path());

    let err = WatchConfig::load().expect_err("no credentials");
    let fault = err.downcast_ref::<Fault>().expect("fault kind");
    assert!(matches!(fault, Fault::Configuration(_)));

    // Credentials can come from the environment alone.
    std::env::set_var("CABINWATCH_BOT_TOKEN", "123:abc");
    std::env::set_var("CABINWATCH_CHAT_ID", "42");
    WatchConfig::load().expect("credentials via env");

    clear_env();
}
