//! Timing and judgement core for the Lanebeat rhythm game runtime.
//!
//! The crate owns the parts of a rhythm game that must be exact: song time
//! derived from the audio device clock, the validated beatmap, per-note
//! position as a pure function of time, and the per-lane judgement state
//! machine. Rendering, asset decoding and menus sit behind the small traits
//! in [`audio`] and [`render`].

pub mod assets;
pub mod audio;
pub mod autoplay;
pub mod beatmap;
pub mod clock;
pub mod config;
pub mod error;
pub mod judge;
pub mod mapping;
pub mod note;
pub mod render;
pub mod score;
pub mod session;

pub use assets::AudioAssetStore;
pub use audio::{AudioClip, AudioDevice, SimulatedDevice};
pub use autoplay::Autoplay;
pub use beatmap::{Beatmap, NoteDescriptor};
pub use clock::SongClock;
pub use config::{
    AudioConfig, FieldConfig, GameConfig, HoldThresholds, JudgeWindows, SessionConfig,
};
pub use error::{LanebeatError, Result};
pub use judge::{
    classify_hold, classify_tap, hold_fraction, JudgeRules, Judgement, LaneEvent, LaneJudge,
    LaneState, NoteKind, Tier,
};
pub use mapping::{InputEvent, InputKind, InputRouter, InputSource, InputTarget, RoutedInput};
pub use note::{FieldGeometry, NoteArena, NoteEnvelope, NoteHandle, NoteState};
pub use render::{pop_scale, NullPresentation, Presentation, PresentationCall, PresentationLog};
pub use score::{ScoreSummary, Scoreboard, TierCounts};
pub use session::{EndReason, Session, SessionState, TickReport};
