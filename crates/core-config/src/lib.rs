//! Configuration loading and parsing.
//!
//! Parses `lumen.toml` into render settings and strip layouts. A missing
//! or unparsable file falls back to the built-in default layout with a
//! warning (the daemon should light LEDs, not argue about files); a file
//! that parses but describes an impossible layout (unknown zone names,
//! overlapping spans) is a hard error surfaced before startup.
//!
//! Unknown fields are ignored (TOML deserialization tolerance) to allow
//! forward evolution without immediate warnings.

use std::{fs, path::PathBuf, str::FromStr, time::Duration};

use core_render::RenderSettings;
use core_zone::{StripId, ZoneId, ZoneMap, ZoneMapError, ZoneSpan};
use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "lumen.toml";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown strip id {0:?}")]
    UnknownStrip(String),
    #[error("unknown zone id {0:?}")]
    UnknownZone(String),
    #[error("strip {strip} appears more than once")]
    DuplicateStrip { strip: StripId },
    #[error("strip {strip}: {source}")]
    Layout {
        strip: StripId,
        source: ZoneMapError,
    },
}

// -------------------------------------------------------------------------------------------------
// Raw file model
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct RenderSection {
    #[serde(default = "RenderSection::default_fps")]
    pub fps: u32,
    #[serde(default = "RenderSection::default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    #[serde(default = "RenderSection::default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    #[serde(default)]
    pub blackout_on_stop: bool,
}

impl RenderSection {
    const fn default_fps() -> u32 {
        60
    }
    const fn default_drain_timeout_ms() -> u64 {
        1_000
    }
    const fn default_stop_timeout_ms() -> u64 {
        1_000
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            fps: Self::default_fps(),
            drain_timeout_ms: Self::default_drain_timeout_ms(),
            stop_timeout_ms: Self::default_stop_timeout_ms(),
            blackout_on_stop: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Colored cells on the controlling terminal.
    #[default]
    Term,
    /// In-process buffers only (tests, headless development).
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSection {
    #[serde(default)]
    pub port: PortKind,
    #[serde(default = "OutputSection::default_brightness")]
    pub brightness: u8,
}

impl OutputSection {
    const fn default_brightness() -> u8 {
        100
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            port: PortKind::default(),
            brightness: Self::default_brightness(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
struct ZoneSection {
    id: String,
    start: usize,
    len: usize,
    #[serde(default)]
    reversed: bool,
}

#[derive(Debug, Deserialize, Clone)]
struct StripSection {
    id: String,
    pixels: usize,
    #[serde(default)]
    zone: Vec<ZoneSection>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct ConfigFile {
    #[serde(default)]
    render: Option<RenderSection>,
    #[serde(default)]
    output: Option<OutputSection>,
    #[serde(default)]
    strip: Vec<StripSection>,
}

// -------------------------------------------------------------------------------------------------
// Resolved model
// -------------------------------------------------------------------------------------------------

/// One strip's validated layout.
#[derive(Debug, Clone)]
pub struct StripLayout {
    pub id: StripId,
    pub map: ZoneMap,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: RenderSettings,
    pub output: OutputSection,
    pub strips: Vec<StripLayout>,
}

impl Default for Config {
    /// Built-in layout: a 90-pixel main strip (floor, left, top, lamp)
    /// plus a 20-pixel preview strip.
    fn default() -> Self {
        let main = ZoneMap::new(
            90,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 40)),
                (ZoneId::Left, ZoneSpan::new(40, 20)),
                (ZoneId::Top, ZoneSpan::new(60, 20)),
                (ZoneId::Lamp, ZoneSpan::new(80, 10)),
            ],
        )
        .expect("default main layout is valid");
        let preview = ZoneMap::new(20, [(ZoneId::Preview, ZoneSpan::new(0, 20))])
            .expect("default preview layout is valid");
        Self {
            settings: RenderSettings::default(),
            output: OutputSection::default(),
            strips: vec![
                StripLayout {
                    id: StripId::Main,
                    map: main,
                },
                StripLayout {
                    id: StripId::Preview,
                    map: preview,
                },
            ],
        }
    }
}

fn resolve(file: ConfigFile) -> Result<Config, ConfigError> {
    let render = file.render.unwrap_or_default();
    let settings = RenderSettings {
        fps: render.fps,
        drain_timeout: Duration::from_millis(render.drain_timeout_ms),
        stop_timeout: Duration::from_millis(render.stop_timeout_ms),
        blackout_on_stop: render.blackout_on_stop,
    };
    let mut strips = Vec::with_capacity(file.strip.len());
    for section in &file.strip {
        let id = StripId::from_str(&section.id)
            .map_err(|_| ConfigError::UnknownStrip(section.id.clone()))?;
        if strips.iter().any(|s: &StripLayout| s.id == id) {
            return Err(ConfigError::DuplicateStrip { strip: id });
        }
        let mut spans = Vec::with_capacity(section.zone.len());
        for zone in &section.zone {
            let zone_id = ZoneId::from_str(&zone.id)
                .map_err(|_| ConfigError::UnknownZone(zone.id.clone()))?;
            let span = if zone.reversed {
                ZoneSpan::reversed(zone.start, zone.len)
            } else {
                ZoneSpan::new(zone.start, zone.len)
            };
            spans.push((zone_id, span));
        }
        let map = ZoneMap::new(section.pixels, spans)
            .map_err(|source| ConfigError::Layout { strip: id, source })?;
        strips.push(StripLayout { id, map });
    }
    if strips.is_empty() {
        // A render section without strips keeps the default layout.
        strips = Config::default().strips;
    }
    Ok(Config {
        settings,
        output: file.output.unwrap_or_default(),
        strips,
    })
}

/// Best-effort config path: local working directory first, then the
/// platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("lumen").join(CONFIG_FILE);
    }
    PathBuf::from(CONFIG_FILE)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                let config = resolve(file)?;
                info!(target: "config", path = %path.display(), strips = config.strips.len(), "config_loaded");
                Ok(config)
            }
            Err(e) => {
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
                Ok(Config::default())
            }
        },
        Err(_) => {
            info!(target: "config", path = %path.display(), "config_missing_using_defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let mut f = fs::File::create(&path).expect("create");
        f.write_all(content.as_bytes()).expect("write");
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_from(Some(PathBuf::from("/nonexistent/lumen.toml"))).expect("load");
        assert_eq!(config.settings.fps, 60);
        assert_eq!(config.strips.len(), 2);
        assert_eq!(config.strips[0].id, StripId::Main);
        assert_eq!(config.strips[0].map.pixel_count(), 90);
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let (_dir, path) = write_config("this is not toml [");
        let config = load_from(Some(path)).expect("load");
        assert_eq!(config.settings.fps, 60);
    }

    #[test]
    fn full_file_resolves() {
        let (_dir, path) = write_config(
            r#"
            [render]
            fps = 30
            blackout_on_stop = true

            [output]
            port = "memory"
            brightness = 60

            [[strip]]
            id = "main"
            pixels = 20

            [[strip.zone]]
            id = "floor"
            start = 0
            len = 15

            [[strip.zone]]
            id = "lamp"
            start = 15
            len = 5
            reversed = true
            "#,
        );
        let config = load_from(Some(path)).expect("load");
        assert_eq!(config.settings.fps, 30);
        assert!(config.settings.blackout_on_stop);
        assert_eq!(config.output.port, PortKind::Memory);
        assert_eq!(config.output.brightness, 60);
        assert_eq!(config.strips.len(), 1);
        let map = &config.strips[0].map;
        assert_eq!(map.pixel_count(), 20);
        let lamp = map.span(ZoneId::Lamp).expect("lamp span");
        assert!(lamp.reversed);
        assert_eq!(lamp.start, 15);
    }

    #[test]
    fn unknown_zone_is_a_hard_error() {
        let (_dir, path) = write_config(
            r#"
            [[strip]]
            id = "main"
            pixels = 10

            [[strip.zone]]
            id = "ceiling"
            start = 0
            len = 10
            "#,
        );
        let err = load_from(Some(path)).unwrap_err();
        assert_eq!(err, ConfigError::UnknownZone("ceiling".into()));
    }

    #[test]
    fn bad_layout_is_a_hard_error() {
        let (_dir, path) = write_config(
            r#"
            [[strip]]
            id = "main"
            pixels = 10

            [[strip.zone]]
            id = "floor"
            start = 0
            len = 6
            "#,
        );
        let err = load_from(Some(path)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Layout {
                strip: StripId::Main,
                source: ZoneMapError::Gap { pixel: 6 }
            }
        ));
    }

    #[test]
    fn duplicate_strip_rejected() {
        let (_dir, path) = write_config(
            r#"
            [[strip]]
            id = "preview"
            pixels = 5
            [[strip.zone]]
            id = "preview"
            start = 0
            len = 5

            [[strip]]
            id = "preview"
            pixels = 5
            [[strip.zone]]
            id = "preview"
            start = 0
            len = 5
            "#,
        );
        let err = load_from(Some(path)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateStrip {
                strip: StripId::Preview
            }
        );
    }
}
