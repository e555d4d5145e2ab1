use crate::config::StageConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "config/stage.json";
const DEFAULT_FRAMES: u32 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    frames: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    assets: Option<PathBuf>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "assets" => overrides.assets = Some(PathBuf::from(value)),
                "frames" => {
                    overrides.frames =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid frame count '{value}'"))?);
                }
                "width" => {
                    overrides.width =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid width '{value}'"))?);
                }
                "height" => {
                    overrides.height =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid height '{value}'"))?);
                }
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --frames, --width, --height, --assets."),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn frames(&self) -> u32 {
        self.frames.unwrap_or(DEFAULT_FRAMES)
    }

    pub fn config_overrides(&self) -> StageConfigOverrides {
        StageConfigOverrides { width: self.width, height: self.height, assets: self.assets.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_flag() {
        let args = ["stage", "--config", "demo.json", "--frames", "120", "--width", "1600", "--height", "900"];
        let cli = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(cli.config_path(), PathBuf::from("demo.json"));
        assert_eq!(cli.frames(), 120);
        let overrides = cli.config_overrides();
        assert_eq!((overrides.width, overrides.height), (Some(1600), Some(900)));
        assert!(overrides.assets.is_none());
    }

    #[test]
    fn defaults_apply_without_flags() {
        let cli = CliOverrides::parse(["stage"]).expect("parse overrides");
        assert_eq!(cli.config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.frames(), DEFAULT_FRAMES);
        assert!(cli.config_overrides().is_empty());
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["stage", "--width", "800", "--width", "1920", "--assets", "a", "--assets", "b"];
        let cli = CliOverrides::parse(args).expect("parse overrides");
        let overrides = cli.config_overrides();
        assert_eq!(overrides.width, Some(1920));
        assert_eq!(overrides.assets, Some(PathBuf::from("b")));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["stage", "--width"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_bad_numbers_and_unknown_flags() {
        let err = CliOverrides::parse(["stage", "--frames", "lots"]).unwrap_err();
        assert!(err.to_string().contains("Invalid frame count"));
        let err = CliOverrides::parse(["stage", "--vsync", "on"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }
}
