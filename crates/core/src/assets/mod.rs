use std::collections::HashMap;

use crate::{AudioClip, Beatmap, LanebeatError, Result};

/// Registry of audio clips the loader has already decoded, keyed by the
/// asset reference beatmaps use in their `audioFile` field.
#[derive(Debug, Default)]
pub struct AudioAssetStore {
    clips: HashMap<String, AudioClip>,
}

impl AudioAssetStore {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
        }
    }

    pub fn register(&mut self, clip: AudioClip) {
        self.clips.insert(clip.id.clone(), clip);
    }

    pub fn clip(&self, id: &str) -> Option<&AudioClip> {
        self.clips.get(id)
    }

    /// Looks up the clip a beatmap plays against.
    pub fn resolve_beatmap_audio(&self, beatmap: &Beatmap) -> Result<&AudioClip> {
        self.clips
            .get(&beatmap.audio_file)
            .ok_or_else(|| LanebeatError::MissingAudioAsset(beatmap.audio_file.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beatmap(audio_file: &str) -> Beatmap {
        Beatmap::from_json_str(&format!(
            r#"{{ "songId": "s", "bpm": 120, "audioFile": "{audio_file}", "globalOffset": 0,
                 "spawnLeadTime": 1.5, "lanes": 4, "notes": [] }}"#
        ))
        .unwrap()
    }

    #[test]
    fn resolves_registered_clips() {
        let mut store = AudioAssetStore::new();
        store.register(AudioClip::new("song.ogg", 90.0, 48_000));

        let clip = store.resolve_beatmap_audio(&beatmap("song.ogg")).unwrap();
        assert_eq!(clip.length_seconds, 90.0);
    }

    #[test]
    fn errors_on_missing_clips() {
        let store = AudioAssetStore::new();

        let err = store.resolve_beatmap_audio(&beatmap("missing.ogg")).unwrap_err();
        assert!(format!("{err}").contains("missing.ogg"));
        assert!(err.is_configuration());
    }
}
