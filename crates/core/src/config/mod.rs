use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LanebeatError, Result};

/// Top-level configuration structure for a play session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub judge: JudgeWindows,
    pub hold: HoldThresholds,
    pub field: FieldConfig,
    pub audio: AudioConfig,
    pub session: SessionConfig,
}

impl GameConfig {
    /// Parses a (possibly partial) JSON configuration and validates it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Same as the default configuration with a different lane count.
    pub fn with_lanes(lane_count: usize) -> Self {
        let mut config = Self::default();
        config.session.lane_count = lane_count;
        config
    }

    pub fn validate(&self) -> Result<()> {
        self.judge.validate()?;
        self.hold.validate()?;
        self.field.validate()?;
        self.audio.validate()?;
        if self.session.lane_count == 0 {
            return Err(invalid("session.lane_count must be at least 1"));
        }
        if !(self.session.song_end_grace.is_finite() && self.session.song_end_grace >= 0.0) {
            return Err(invalid("session.song_end_grace must be a non-negative number"));
        }
        Ok(())
    }
}

/// Tap timing windows in seconds, measured as `|song_time - onset|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeWindows {
    pub excellent: f64,
    pub great: f64,
    pub good: f64,
    /// How late a press may land before the note counts as missed.
    pub miss_forgive: f64,
}

impl Default for JudgeWindows {
    fn default() -> Self {
        Self {
            excellent: 0.040,
            great: 0.090,
            good: 0.140,
            miss_forgive: 0.180,
        }
    }
}

impl JudgeWindows {
    fn validate(&self) -> Result<()> {
        let ordered = 0.0 < self.excellent
            && self.excellent < self.great
            && self.great < self.good
            && self.good <= self.miss_forgive;
        if !ordered || !self.miss_forgive.is_finite() {
            return Err(invalid(format!(
                "judge windows must satisfy 0 < excellent < great < good <= miss_forgive, got {self:?}"
            )));
        }
        Ok(())
    }
}

/// Fractions of a hold's duration that must be covered for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldThresholds {
    pub excellent: f64,
    pub great: f64,
    pub good: f64,
}

impl Default for HoldThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.98,
            great: 0.70,
            good: 0.40,
        }
    }
}

impl HoldThresholds {
    fn validate(&self) -> Result<()> {
        let ordered = 1.0 >= self.excellent
            && self.excellent > self.great
            && self.great > self.good
            && self.good >= 0.0;
        if !ordered {
            return Err(invalid(format!(
                "hold thresholds must satisfy 1 >= excellent > great > good >= 0, got {self:?}"
            )));
        }
        Ok(())
    }
}

/// Playfield geometry. Notes travel downwards: `y` shrinks as song time grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub hit_y: f64,
    /// World units per second of song time.
    pub speed: f64,
    /// An unjudged note whose leading edge drops below this line ends the session.
    pub game_over_y: f64,
    /// Width of the input surface that gets split into equal lane bins.
    pub input_width: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            hit_y: 0.0,
            speed: 6.0,
            game_over_y: -4.0,
            input_width: 1.0,
        }
    }
}

impl FieldConfig {
    fn validate(&self) -> Result<()> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(invalid("field.speed must be positive"));
        }
        if !(self.hit_y.is_finite() && self.game_over_y < self.hit_y) {
            return Err(invalid("field.game_over_y must lie below field.hit_y"));
        }
        if !(self.input_width.is_finite() && self.input_width > 0.0) {
            return Err(invalid("field.input_width must be positive"));
        }
        Ok(())
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Lead time between arming playback and the first audible sample.
    pub safety_delay: f64,
    /// Player calibration added to the scheduled start instant.
    pub offset_seconds: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
            safety_delay: 0.100,
            offset_seconds: 0.0,
        }
    }
}

impl AudioConfig {
    /// Duration of one device callback buffer.
    pub fn block_seconds(&self) -> f64 {
        self.block_size as f64 / f64::from(self.sample_rate.max(1))
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.block_size == 0 {
            return Err(invalid("audio.sample_rate and audio.block_size must be non-zero"));
        }
        if !(self.safety_delay.is_finite() && self.safety_delay >= self.block_seconds()) {
            return Err(invalid(format!(
                "audio.safety_delay must cover one callback buffer ({:.4}s)",
                self.block_seconds()
            )));
        }
        if !self.offset_seconds.is_finite() {
            return Err(invalid("audio.offset_seconds must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub lane_count: usize,
    /// The song counts as finished this many seconds before the clip ends.
    pub song_end_grace: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lane_count: 4,
            song_end_grace: 0.0,
        }
    }
}

fn invalid(message: impl Into<String>) -> LanebeatError {
    LanebeatError::InvalidConfig(message.into())
}
