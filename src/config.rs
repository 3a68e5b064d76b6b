// THEORY:
// Runtime configuration lives in one plain struct with sensible defaults. Each
// field can be overridden by an environment variable. Parsing goes through a
// lookup function so the same code path serves both the process environment
// and tests.

use std::time::Duration;

use crate::core_modules::category_mask::MaskMode;
use crate::core_modules::placement::PlacementConfig;
use crate::error::ConfigError;

pub const SEGMENTATION_URL_VAR: &str = "OVERLAY_SEGMENTATION_URL";
pub const SPRITE_URL_VAR: &str = "OVERLAY_SPRITE_URL";
pub const TIMEOUT_VAR: &str = "OVERLAY_TIMEOUT_SECS";
pub const MODE_VAR: &str = "OVERLAY_MODE";
pub const THRESHOLD_VAR: &str = "OVERLAY_THRESHOLD";

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// Base URL of the segmentation service.
    pub segmentation_url: String,
    /// Base URL of the sprite metadata service; ids are appended as a path segment.
    pub sprite_url: String,
    /// Upper bound on one segmentation round trip.
    pub request_timeout: Duration,
    pub mode: MaskMode,
    /// Initial sensitivity in [0,1].
    pub threshold: f64,
    pub placement: PlacementConfig,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            segmentation_url: "http://localhost:5001".to_string(),
            sprite_url: "https://pokeapi.co/api/v2/pokemon".to_string(),
            request_timeout: Duration::from_secs(10),
            mode: MaskMode::ColorCoded,
            threshold: 0.5,
            placement: PlacementConfig::default(),
        }
    }
}

impl OverlayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(SEGMENTATION_URL_VAR) {
            config.segmentation_url = parse_url(SEGMENTATION_URL_VAR, url)?;
        }
        if let Some(url) = lookup(SPRITE_URL_VAR) {
            config.sprite_url = parse_url(SPRITE_URL_VAR, url)?;
        }
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: TIMEOUT_VAR,
                value: raw.clone(),
                reason: "expected a whole number of seconds",
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: TIMEOUT_VAR,
                    value: raw,
                    reason: "timeout must be positive",
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(MODE_VAR) {
            config.mode = parse_mode(&raw)?;
        }
        if let Some(raw) = lookup(THRESHOLD_VAR) {
            let threshold: f64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: THRESHOLD_VAR,
                value: raw.clone(),
                reason: "expected a number",
            })?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue {
                    key: THRESHOLD_VAR,
                    value: raw,
                    reason: "threshold must lie in [0, 1]",
                });
            }
            config.threshold = threshold;
        }

        Ok(config)
    }
}

fn parse_url(key: &'static str, raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidValue {
            key,
            value: raw,
            reason: "expected an http(s) URL",
        })
    }
}

fn parse_mode(raw: &str) -> Result<MaskMode, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "segment" | "color" | "color-coded" => Ok(MaskMode::ColorCoded),
        "cutout" | "alpha" | "remove-background" => Ok(MaskMode::AlphaCutout),
        _ => Err(ConfigError::InvalidValue {
            key: MODE_VAR,
            value: raw.to_string(),
            reason: "expected `segment` or `cutout`",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = OverlayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, OverlayConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.mode, MaskMode::ColorCoded);
        assert_eq!(config.placement.max_retries, 5);
    }

    #[test]
    fn overrides_are_applied() {
        let config = OverlayConfig::from_lookup(lookup_from(&[
            (SEGMENTATION_URL_VAR, "http://segmenter:9000/"),
            (TIMEOUT_VAR, "3"),
            (MODE_VAR, "Cutout"),
            (THRESHOLD_VAR, "0.25"),
        ]))
        .unwrap();
        assert_eq!(config.segmentation_url, "http://segmenter:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.mode, MaskMode::AlphaCutout);
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.sprite_url, OverlayConfig::default().sprite_url);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let cases = [
            (TIMEOUT_VAR, "soon"),
            (TIMEOUT_VAR, "0"),
            (MODE_VAR, "sketch"),
            (THRESHOLD_VAR, "1.5"),
            (THRESHOLD_VAR, "half"),
            (SPRITE_URL_VAR, "ftp://sprites"),
        ];
        for (key, value) in cases {
            match OverlayConfig::from_lookup(lookup_from(&[(key, value)])) {
                Err(ConfigError::InvalidValue { key: reported, .. }) => assert_eq!(reported, key),
                Ok(_) => panic!("{key}={value} should be rejected"),
            }
        }
    }
}
