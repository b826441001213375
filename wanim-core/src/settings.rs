//! Editor and export settings

use crate::log::DEFAULT_LENGTH_LIMIT;
use crate::raster::Color;
use crate::time::{Ms, DEFAULT_FRAME_DURATION};
use crate::{Error, Result};

/// Settings shared by the session, the compositor and the exporters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct Settings {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Duration of newly recorded frames
    pub default_frame_duration: Ms,
    /// A blank longer than this many default durations gets a new frame instead of being filled
    pub min_outlier_inbetween_ratio: f64,
    pub aliasing_enabled: bool,
    pub alias_threshold: u8,
    /// Number of undoable commands kept
    pub log_length_limit: usize,
    /// Sampling step when exporting, in ms
    pub export_epsilon: Ms,
    /// Sampling step when baking transitions, in ms
    pub bake_epsilon: Ms,
    pub background: Color,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            default_frame_duration: DEFAULT_FRAME_DURATION,
            min_outlier_inbetween_ratio: 1.5,
            aliasing_enabled: true,
            alias_threshold: 127,
            log_length_limit: DEFAULT_LENGTH_LIMIT,
            export_epsilon: 16.0,
            bake_epsilon: 16.0,
            background: Color::WHITE,
        }
    }
}

impl Settings {
    /// Shortest blank that is not filled entirely when recording into it
    pub fn min_outlier_duration(&self) -> Ms {
        self.default_frame_duration * self.min_outlier_inbetween_ratio
    }

    /// Alias threshold when aliasing is enabled
    pub fn alias(&self) -> Option<u8> {
        self.aliasing_enabled.then_some(self.alias_threshold)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "canvas size {}x{} is empty",
                self.width, self.height
            )));
        }
        let positive = [
            ("default_frame_duration", self.default_frame_duration),
            ("export_epsilon", self.export_epsilon),
            ("bake_epsilon", self.bake_epsilon),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value < 1.0 {
                return Err(Error::ValueOutOfRange { field, value });
            }
        }
        if !self.min_outlier_inbetween_ratio.is_finite() || self.min_outlier_inbetween_ratio < 0.0 {
            return Err(Error::ValueOutOfRange {
                field: "min_outlier_inbetween_ratio",
                value: self.min_outlier_inbetween_ratio,
            });
        }
        if self.log_length_limit == 0 {
            return Err(Error::Config("log_length_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// Parses and validates settings from JSON. Missing fields keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}
