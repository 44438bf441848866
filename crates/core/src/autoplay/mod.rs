//! Scripted input for headless runs.

use crate::{Beatmap, InputEvent};

/// How long a tap stays pressed.
const TAP_PRESS_SECONDS: f64 = 0.050;
/// Minimum gap between a release and the next press on the same lane.
const RELEASE_GAP_SECONDS: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScriptedInput {
    time: f64,
    event: InputEvent,
}

/// Pre-computed press/release script that plays a beatmap, one input source
/// per lane. Presses land `jitter` seconds off each onset, alternating early
/// and late from note to note.
#[derive(Debug, Clone)]
pub struct Autoplay {
    script: Vec<ScriptedInput>,
    cursor: usize,
}

impl Autoplay {
    pub fn from_beatmap(beatmap: &Beatmap, jitter: f64) -> Self {
        let mut script = Vec::with_capacity(beatmap.notes().len() * 2);

        for lane in 0..beatmap.lanes {
            let presses: Vec<(f64, f64)> = beatmap
                .notes()
                .iter()
                .filter(|note| note.lane == lane)
                .enumerate()
                .map(|(index, note)| {
                    let offset = if index % 2 == 0 { jitter } else { -jitter };
                    let onset = beatmap.onset_of(note);
                    let release = if note.is_hold() {
                        onset + note.duration
                    } else {
                        onset + offset + TAP_PRESS_SECONDS
                    };
                    (onset + offset, release)
                })
                .collect();

            for (index, &(press, release)) in presses.iter().enumerate() {
                let release = match presses.get(index + 1) {
                    Some(&(next_press, _)) => release.min(next_press - RELEASE_GAP_SECONDS),
                    None => release,
                };
                let source = lane as u64;
                script.push(ScriptedInput {
                    time: press,
                    event: InputEvent::press_lane(source, lane),
                });
                script.push(ScriptedInput {
                    time: release.max(press),
                    event: InputEvent::release(source),
                });
            }
        }

        script.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { script, cursor: 0 }
    }

    /// Returns every scripted event due at or before `song_time`.
    pub fn due(&mut self, song_time: f64) -> Vec<InputEvent> {
        let start = self.cursor;
        while self
            .script
            .get(self.cursor)
            .is_some_and(|input| input.time <= song_time)
        {
            self.cursor += 1;
        }
        self.script[start..self.cursor]
            .iter()
            .map(|input| input.event)
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.script.len() - self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.script.len()
    }
}
