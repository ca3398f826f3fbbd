use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::channel::Channel;
use crate::classify::StreamSelector;
use crate::ingest::synthetic::{MAX_SOURCE_DIMENSION, MAX_SOURCE_POINTS};
use crate::ingest::SourceSettings;
use crate::pipeline::PipelineSettings;

const DEFAULT_SOURCE_URL: &str = "stub://sensor";
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_SOURCE_WIDTH: u32 = 64;
const DEFAULT_SOURCE_HEIGHT: u32 = 48;
const DEFAULT_MAP_WIDTH: u32 = 64;
const DEFAULT_MAP_HEIGHT: u32 = 64;
const DEFAULT_TICK_HZ: u32 = 60;
const MAX_RATE_HZ: u32 = 1000;

#[derive(Debug, Deserialize, Default)]
struct BakerConfigFile {
    source: Option<SourceConfigFile>,
    maps: Option<MapConfigFile>,
    tick: Option<TickConfigFile>,
    channels: Option<ChannelsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    points: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct MapConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TickConfigFile {
    hz: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ChannelsConfigFile {
    color: Option<StreamSelector>,
    geometry: Option<StreamSelector>,
}

#[derive(Debug, Clone)]
pub struct BakerConfig {
    pub source: SourceSettings,
    pub map_width: u32,
    pub map_height: u32,
    pub tick_hz: u32,
    pub color_selector: StreamSelector,
    pub geometry_selector: StreamSelector,
}

impl BakerConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BAKER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BakerConfigFile) -> Self {
        let source_file = file.source.unwrap_or_default();
        let width = source_file.width.unwrap_or(DEFAULT_SOURCE_WIDTH);
        let height = source_file.height.unwrap_or(DEFAULT_SOURCE_HEIGHT);
        let source = SourceSettings {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            fps: source_file.fps.unwrap_or(DEFAULT_SOURCE_FPS),
            width,
            height,
            points: source_file
                .points
                .unwrap_or_else(|| width.saturating_mul(height)),
        };
        let maps = file.maps.unwrap_or_default();
        let channels = file.channels.unwrap_or_default();
        Self {
            source,
            map_width: maps.width.unwrap_or(DEFAULT_MAP_WIDTH),
            map_height: maps.height.unwrap_or(DEFAULT_MAP_HEIGHT),
            tick_hz: file
                .tick
                .and_then(|tick| tick.hz)
                .unwrap_or(DEFAULT_TICK_HZ),
            color_selector: channels
                .color
                .unwrap_or_else(|| Channel::Color.default_selector()),
            geometry_selector: channels
                .geometry
                .unwrap_or_else(|| Channel::Geometry.default_selector()),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("BAKER_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("BAKER_SOURCE_FPS") {
            self.source.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("BAKER_SOURCE_FPS must be an integer frame rate"))?;
        }
        if let Ok(hz) = std::env::var("BAKER_TICK_HZ") {
            self.tick_hz = hz
                .trim()
                .parse()
                .map_err(|_| anyhow!("BAKER_TICK_HZ must be an integer tick rate"))?;
        }
        if let Ok(size) = std::env::var("BAKER_MAP_SIZE") {
            let (width, height) = parse_size(&size)
                .ok_or_else(|| anyhow!("BAKER_MAP_SIZE must look like WIDTHxHEIGHT"))?;
            self.map_width = width;
            self.map_height = height;
        }
        Ok(())
    }

    /// Check bounds. `load` calls this; call it again after overriding fields.
    pub fn validate(&self) -> Result<()> {
        if self.map_width == 0 || self.map_height == 0 {
            return Err(anyhow!("map dimensions must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be greater than zero"));
        }
        if self.source.width > MAX_SOURCE_DIMENSION || self.source.height > MAX_SOURCE_DIMENSION {
            return Err(anyhow!(
                "source dimensions must be at most {}x{}",
                MAX_SOURCE_DIMENSION,
                MAX_SOURCE_DIMENSION
            ));
        }
        if self.source.points > MAX_SOURCE_POINTS {
            return Err(anyhow!(
                "source point count must be at most {}",
                MAX_SOURCE_POINTS
            ));
        }
        if !(1..=MAX_RATE_HZ).contains(&self.tick_hz) {
            return Err(anyhow!("tick rate must be between 1 and {} Hz", MAX_RATE_HZ));
        }
        if !(1..=MAX_RATE_HZ).contains(&self.source.fps) {
            return Err(anyhow!(
                "source frame rate must be between 1 and {} fps",
                MAX_RATE_HZ
            ));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            map_width: self.map_width,
            map_height: self.map_height,
            color_selector: self.color_selector,
            geometry_selector: self.geometry_selector,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }

    pub fn delivery_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.source.fps as f64)
    }
}

fn read_config_file(path: &Path) -> Result<BakerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: BakerConfigFile = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (width, height) = value.trim().split_once(|c| c == 'x' || c == 'X')?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}
