use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::entity::{EntityKind, RegionId};

/// Above this rate the sampling interval rounds down to zero milliseconds.
pub const MAX_SAMPLING_FPS: u32 = 1000;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    kind: Option<EntityKind>,
    sampling: Option<SamplingConfigFile>,
    sync: Option<SyncConfigFile>,
    cabin: Option<CabinConfigFile>,
    face: Option<FaceConfigFile>,
    output: Option<OutputConfigFile>,
    #[serde(rename = "loop")]
    loop_input: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SamplingConfigFile {
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SyncConfigFile {
    staleness_ms: Option<u64>,
    callback_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CabinConfigFile {
    regions: Option<Vec<RegionId>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FaceConfigFile {
    drowsiness: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    csv: Option<PathBuf>,
    lossless: Option<bool>,
    summary_json: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub kind: EntityKind,
    /// Target rate in frames per second; 0 passes every decodable frame through.
    pub sampling_fps: u32,
    pub sync: SyncSettings,
    /// Configured cabin region ids, one log column each (object and occupant runs).
    pub cabin_regions: Vec<RegionId>,
    /// Adds the drowsiness column pair to face logs.
    pub drowsiness: bool,
    pub output: OutputSettings,
    pub loop_input: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SyncSettings {
    /// Staleness window. Required; there is no implicit default.
    pub staleness_ms: Option<u64>,
    /// Minimum spacing between detector callbacks.
    pub callback_interval_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OutputSettings {
    /// Annotated frames are written here when set.
    pub dir: Option<PathBuf>,
    /// CSV log path. Defaults to `<input stem>_<kind>s.csv`.
    pub csv: Option<PathBuf>,
    pub lossless: bool,
    pub summary_json: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_file(PipelineConfigFile::default())
    }
}

impl PipelineConfig {
    /// Read the optional config file, then apply environment overrides.
    ///
    /// The file path comes from `path` or `FRAMESYNC_CONFIG`. Files ending in `.toml`
    /// are parsed as TOML, anything else as JSON. Call `validate` once command-line
    /// overrides have been applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("FRAMESYNC_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let sync = SyncSettings {
            staleness_ms: file.sync.as_ref().and_then(|sync| sync.staleness_ms),
            callback_interval_ms: file
                .sync
                .as_ref()
                .and_then(|sync| sync.callback_interval_ms)
                .unwrap_or(0),
        };
        let output = match file.output {
            Some(output) => OutputSettings {
                dir: output.dir,
                csv: output.csv,
                lossless: output.lossless.unwrap_or(false),
                summary_json: output.summary_json,
            },
            None => OutputSettings::default(),
        };
        Self {
            kind: file.kind.unwrap_or_default(),
            sampling_fps: file.sampling.and_then(|sampling| sampling.fps).unwrap_or(0),
            sync,
            cabin_regions: file
                .cabin
                .and_then(|cabin| cabin.regions)
                .unwrap_or_default(),
            drowsiness: file
                .face
                .and_then(|face| face.drowsiness)
                .unwrap_or(false),
            output,
            loop_input: file.loop_input.unwrap_or(false),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(fps) = std::env::var("FRAMESYNC_SAMPLING_FPS") {
            self.sampling_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("FRAMESYNC_SAMPLING_FPS must be a non-negative integer"))?;
        }
        if let Ok(window) = std::env::var("FRAMESYNC_STALENESS_MS") {
            let ms: u64 = window.trim().parse().map_err(|_| {
                anyhow!("FRAMESYNC_STALENESS_MS must be an integer number of milliseconds")
            })?;
            self.sync.staleness_ms = Some(ms);
        }
        if let Ok(interval) = std::env::var("FRAMESYNC_CALLBACK_INTERVAL_MS") {
            self.sync.callback_interval_ms = interval.trim().parse().map_err(|_| {
                anyhow!("FRAMESYNC_CALLBACK_INTERVAL_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(regions) = std::env::var("FRAMESYNC_CABIN_REGIONS") {
            self.cabin_regions = split_csv(&regions)
                .iter()
                .map(|entry| {
                    entry
                        .parse::<RegionId>()
                        .map_err(|_| anyhow!("invalid cabin region id '{}'", entry))
                })
                .collect::<Result<_>>()?;
        }
        Ok(())
    }

    /// Reject incomplete or contradictory settings.
    pub fn validate(&self) -> Result<()> {
        if self.sync.staleness_ms.is_none() {
            return Err(anyhow!(
                "staleness window is required (sync.staleness_ms, FRAMESYNC_STALENESS_MS or --staleness-ms)"
            ));
        }
        if self.sampling_fps > MAX_SAMPLING_FPS {
            return Err(anyhow!(
                "sampling rate {} fps exceeds {} fps",
                self.sampling_fps,
                MAX_SAMPLING_FPS
            ));
        }
        for (i, region) in self.cabin_regions.iter().enumerate() {
            if *region < 0 {
                return Err(anyhow!("cabin region ids must be non-negative, got {}", region));
            }
            if self.cabin_regions[..i].contains(region) {
                return Err(anyhow!("cabin region {} is configured twice", region));
            }
        }
        if self.drowsiness && self.kind != EntityKind::Face {
            log::warn!("drowsiness columns only apply to face runs; ignoring for {}", self.kind);
        }
        if let Some(window) = self.sync.staleness_ms {
            if self.sync.callback_interval_ms > window {
                log::warn!(
                    "callback interval {} ms exceeds the staleness window {} ms; overlays will flicker",
                    self.sync.callback_interval_ms,
                    window
                );
            }
        }
        Ok(())
    }

    /// Staleness window after validation.
    pub fn staleness_ms(&self) -> Result<u64> {
        self.sync
            .staleness_ms
            .ok_or_else(|| anyhow!("staleness window is not configured"))
    }

    /// CSV log path: the configured one, or `<input stem>_<kind>s.csv` next to the
    /// working directory.
    pub fn csv_path(&self, input: &str) -> PathBuf {
        if let Some(path) = &self.output.csv {
            return path.clone();
        }
        let stem = Path::new(input)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        PathBuf::from(format!("{}_{}.csv", stem, self.kind.log_suffix()))
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_window(ms: u64) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.sync.staleness_ms = Some(ms);
        cfg
    }

    #[test]
    fn staleness_window_is_required() {
        let err = PipelineConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("staleness window is required"));
        assert!(with_window(500).validate().is_ok());
    }

    #[test]
    fn rejects_bad_regions_and_rates() {
        let mut cfg = with_window(500);
        cfg.cabin_regions = vec![1, 2, 1];
        assert!(cfg.validate().is_err());
        cfg.cabin_regions = vec![-3];
        assert!(cfg.validate().is_err());
        cfg.cabin_regions = vec![0, 1];
        cfg.sampling_fps = 2000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_csv_path_uses_stem_and_kind() {
        let mut cfg = with_window(500);
        cfg.kind = EntityKind::Body;
        assert_eq!(cfg.csv_path("/videos/drive.mp4"), PathBuf::from("drive_bodies.csv"));
        cfg.output.csv = Some(PathBuf::from("/tmp/out.csv"));
        assert_eq!(cfg.csv_path("/videos/drive.mp4"), PathBuf::from("/tmp/out.csv"));
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" 1, ,2,"), vec!["1", "2"]);
    }
}
