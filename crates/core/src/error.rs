/// Result alias that carries the custom [`LanebeatError`] type.
pub type Result<T> = std::result::Result<T, LanebeatError>;

/// Common error type for the core crate.
///
/// Judgement outcomes (early presses, late misses, abandoned holds) are
/// regular state transitions and never surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum LanebeatError {
    /// The beatmap failed structural validation.
    #[error("invalid beatmap: {0}")]
    InvalidBeatmap(String),
    /// The beatmap references an audio asset that was never loaded.
    #[error("audio asset `{0}` is not loaded")]
    MissingAudioAsset(String),
    /// The beatmap declares a different number of lanes than the session runs.
    #[error("beatmap declares {beatmap} lanes but {configured} lane judges are configured")]
    LaneCountMismatch { beatmap: usize, configured: usize },
    /// Judge windows, hold thresholds or field geometry are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The audio device refused to arm playback.
    #[error("failed to schedule playback: {0}")]
    Scheduling(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl LanebeatError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// True for errors that stop a session from ever starting.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidBeatmap(_)
                | Self::MissingAudioAsset(_)
                | Self::LaneCountMismatch { .. }
                | Self::InvalidConfig(_)
                | Self::Json(_)
        )
    }
}

impl From<&str> for LanebeatError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LanebeatError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_configuration_from_scheduling_errors() {
        assert!(LanebeatError::MissingAudioAsset("song.ogg".into()).is_configuration());
        assert!(LanebeatError::LaneCountMismatch {
            beatmap: 4,
            configured: 3
        }
        .is_configuration());
        assert!(!LanebeatError::Scheduling("device busy".into()).is_configuration());
        assert!(!LanebeatError::from("boom").is_configuration());
    }
}
