use std::sync::Mutex;

use tempfile::Builder;

use pointcloud_baker::config::BakerConfig;
use pointcloud_baker::{Channel, PixelFormat, StreamKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BAKER_CONFIG",
        "BAKER_SOURCE_URL",
        "BAKER_SOURCE_FPS",
        "BAKER_TICK_HZ",
        "BAKER_MAP_SIZE",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "source": {
                "url": "stub://bench",
                "fps": 15,
                "width": 32,
                "height": 16,
                "points": 100
            },
            "maps": { "width": 128, "height": 32 },
            "tick": { "hz": 90 },
            "channels": {
                "color": { "kind": "color", "format": "bgra8", "index": 1 },
                "geometry": { "format": "xyz32f" }
            }
        }"#,
    );

    std::env::set_var("BAKER_CONFIG", file.path());
    std::env::set_var("BAKER_TICK_HZ", "120");
    std::env::set_var("BAKER_MAP_SIZE", "256x8");

    let cfg = BakerConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "stub://bench");
    assert_eq!(cfg.source.fps, 15);
    assert_eq!(cfg.source.width, 32);
    assert_eq!(cfg.source.height, 16);
    assert_eq!(cfg.source.points, 100);
    assert_eq!(cfg.tick_hz, 120);
    assert_eq!((cfg.map_width, cfg.map_height), (256, 8));
    assert_eq!(cfg.color_selector.kind, Some(StreamKind::Color));
    assert_eq!(cfg.color_selector.format, Some(PixelFormat::Bgra8));
    assert_eq!(cfg.color_selector.index, Some(1));
    assert_eq!(cfg.geometry_selector.kind, None);
    assert_eq!(cfg.geometry_selector.format, Some(PixelFormat::Xyz32f));

    let settings = cfg.pipeline_settings();
    assert_eq!(settings.map_width, 256);
    assert_eq!(settings.color_selector, cfg.color_selector);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
[source]
url = "stub://toml"
fps = 5

[tick]
hz = 24
"#,
    );
    std::env::set_var("BAKER_CONFIG", file.path());

    let cfg = BakerConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "stub://toml");
    assert_eq!(cfg.source.fps, 5);
    assert_eq!(cfg.tick_hz, 24);
    assert_eq!(cfg.color_selector, Channel::Color.default_selector());
    assert_eq!(cfg.geometry_selector, Channel::Geometry.default_selector());

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = BakerConfig::load().expect("load config");

    assert!(cfg.source.url.starts_with("stub://"));
    assert!(cfg.tick_hz > 0);
    assert!(cfg.map_width > 0 && cfg.map_height > 0);
}

#[test]
fn rejects_malformed_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BAKER_TICK_HZ", "fast");
    assert!(BakerConfig::load().is_err());
    clear_env();

    std::env::set_var("BAKER_MAP_SIZE", "256");
    assert!(BakerConfig::load().is_err());
    clear_env();

    std::env::set_var("BAKER_SOURCE_FPS", "0");
    assert!(BakerConfig::load().is_err());
    clear_env();
}

#[test]
fn overridden_tick_rate_is_revalidated() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut cfg = BakerConfig::load().expect("load config");
    cfg.tick_hz = 5000;
    assert!(cfg.validate().is_err());
    cfg.tick_hz = 1000;
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_oversized_source_in_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
[source]
width = 100000
height = 100000
"#,
    );
    std::env::set_var("BAKER_CONFIG", file.path());
    assert!(BakerConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unreadable_or_invalid_files() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BAKER_CONFIG", "/nonexistent/baker.json");
    assert!(BakerConfig::load().is_err());

    let file = write_config(".json", "{ not json");
    std::env::set_var("BAKER_CONFIG", file.path());
    assert!(BakerConfig::load().is_err());

    let file = write_config(".json", r#"{ "maps": { "width": 0 } }"#);
    std::env::set_var("BAKER_CONFIG", file.path());
    assert!(BakerConfig::load().is_err());

    clear_env();
}
