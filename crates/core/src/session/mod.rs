//! Session orchestration: spawning, lane updates, input routing, scoring and
//! the single end-of-session transition.

use serde::{Deserialize, Serialize};

use crate::note::lane_anchor_x;
use crate::{
    AudioAssetStore, AudioClip, AudioDevice, Beatmap, GameConfig, InputEvent, InputKind,
    InputRouter, JudgeRules, Judgement, LaneEvent, LaneJudge, LanebeatError, NoteArena,
    NoteHandle, NoteState, Presentation, Result, Scoreboard, SongClock, Tier,
};


/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// An unjudged note fell past the game-over line.
    NoteEscaped,
    /// The audio clip played out.
    SongFinished,
    /// The caller stopped the session.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Playing,
    Ended(EndReason),
}

/// What happened during one [`Session::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub song_time: f64,
    pub spawned: usize,
    pub judgements: Vec<Judgement>,
    pub ended: Option<EndReason>,
}

/// One play-through of a beatmap against an audio device.
pub struct Session<D, P> {
    config: GameConfig,
    rules: JudgeRules,
    beatmap: Beatmap,
    clip: AudioClip,
    clock: SongClock<D>,
    presentation: P,
    arena: NoteArena,
    lanes: Vec<LaneJudge>,
    router: InputRouter,
    scoreboard: Scoreboard,
    next_spawn: usize,
    state: SessionState,
    device_seen_playing: bool,
    outbox: Vec<LaneEvent>,
}

impl<D: AudioDevice, P: Presentation> Session<D, P> {
    /// Validates everything up front. Any configuration error leaves no
    /// session behind, so a half-configured run can never start.
    pub fn new(
        config: GameConfig,
        mut beatmap: Beatmap,
        clip: AudioClip,
        device: D,
        presentation: P,
    ) -> Result<Self> {
        if let Err(err) = validate_setup(&config, &beatmap, &clip) {
            tracing::warn!(song = %beatmap.song_id, %err, "session disabled");
            return Err(err);
        }
        // Deserialized beatmaps skip the sort in `Beatmap::from_json_str`.
        beatmap.sort_notes();

        let lane_count = config.session.lane_count;
        tracing::info!(
            song = %beatmap.song_id,
            notes = beatmap.notes().len(),
            lanes = lane_count,
            "session ready"
        );
        Ok(Self {
            rules: JudgeRules::from_config(&config),
            clock: SongClock::new(device, config.audio.safety_delay),
            router: InputRouter::new(lane_count, config.field.input_width),
            lanes: (0..lane_count).map(LaneJudge::new).collect(),
            arena: NoteArena::new(),
            scoreboard: Scoreboard::new(),
            next_spawn: 0,
            state: SessionState::Ready,
            device_seen_playing: false,
            outbox: Vec::new(),
            config,
            beatmap,
            clip,
            presentation,
        })
    }

    /// Same as [`Session::new`], resolving the clip from loaded assets first.
    pub fn from_assets(
        config: GameConfig,
        beatmap: Beatmap,
        assets: &AudioAssetStore,
        device: D,
        presentation: P,
    ) -> Result<Self> {
        let clip = match assets.resolve_beatmap_audio(&beatmap) {
            Ok(clip) => clip.clone(),
            Err(err) => {
                tracing::warn!(song = %beatmap.song_id, %err, "session disabled");
                return Err(err);
            }
        };
        Self::new(config, beatmap, clip, device, presentation)
    }

    /// Schedules playback. Returns the device instant the song starts at.
    pub fn start(&mut self) -> Result<f64> {
        if self.state != SessionState::Ready {
            return Err(LanebeatError::msg("session has already been started"));
        }
        let start_instant = self.clock.start(&self.clip, self.config.audio.offset_seconds)?;
        self.state = SessionState::Playing;
        tracing::info!(song = %self.beatmap.song_id, start_instant, "playback scheduled");
        Ok(start_instant)
    }

    /// Runs one simulation step: spawn, lane updates, input, song end.
    pub fn tick(&mut self, inputs: &[InputEvent]) -> TickReport {
        let now = self.clock.song_time();
        let mut report = TickReport {
            song_time: now,
            ..TickReport::default()
        };
        if self.state != SessionState::Playing {
            report.ended = self.end_reason();
            return report;
        }

        report.spawned = self.spawn_due(now);

        for lane in 0..self.lanes.len() {
            self.lanes[lane].update(now, &self.rules, &mut self.outbox);
            self.dispatch(&mut report);
            if self.is_ended() {
                report.ended = self.end_reason();
                return report;
            }
        }

        for event in inputs {
            if self.is_ended() {
                break;
            }
            let Some(routed) = self.router.route(event) else {
                continue;
            };
            let lane = &mut self.lanes[routed.lane];
            match routed.kind {
                InputKind::Press => lane.press(now, &self.rules, &mut self.outbox),
                InputKind::Release => lane.release(now, &self.rules, &mut self.outbox),
            }
            self.dispatch(&mut report);
        }

        if !self.is_ended() && self.song_has_finished(now) {
            self.end(EndReason::SongFinished);
        }
        report.ended = self.end_reason();
        report
    }

    /// Stops playback and releases every pending note.
    pub fn stop(&mut self) {
        self.end(EndReason::Stopped);
    }

    pub fn register_hit(&mut self, lane: usize, tier: Tier) {
        if self.is_ended() {
            return;
        }
        if tier == Tier::Miss {
            self.register_miss(lane);
            return;
        }
        self.scoreboard.register_hit(tier);
        self.presentation.hit(lane, tier, self.scoreboard.combo());
    }

    pub fn register_miss(&mut self, lane: usize) {
        if self.is_ended() {
            return;
        }
        self.scoreboard.register_miss();
        self.presentation.miss(lane);
    }

    pub fn trigger_game_over(&mut self) {
        self.end(EndReason::NoteEscaped);
    }

    /// Returns `note` to the arena. Stale handles are ignored, so every note
    /// reaches the presentation's despawn exactly once.
    pub fn despawn(&mut self, note: NoteHandle) {
        if self.arena.remove(note).is_some() {
            self.presentation.note_despawned(note);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        match self.state {
            SessionState::Ended(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, SessionState::Ended(_))
    }

    pub fn song_time(&self) -> f64 {
        self.clock.song_time()
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    pub fn beatmap(&self) -> &Beatmap {
        &self.beatmap
    }

    pub fn clip(&self) -> &AudioClip {
        &self.clip
    }

    pub fn lane(&self, lane: usize) -> Option<&LaneJudge> {
        self.lanes.get(lane)
    }

    pub fn pending_notes(&self, lane: usize) -> usize {
        self.lanes.get(lane).map_or(0, LaneJudge::pending)
    }

    /// Notes currently spawned and not yet despawned.
    pub fn live_notes(&self) -> usize {
        self.arena.len()
    }

    fn spawn_due(&mut self, now: f64) -> usize {
        let mut spawned = 0;
        while let Some(descriptor) = self.beatmap.notes().get(self.next_spawn).copied() {
            let onset = self.beatmap.onset_of(&descriptor);
            if onset - now > self.beatmap.spawn_lead_time {
                break;
            }
            self.next_spawn += 1;

            let note = NoteState::new(descriptor, onset);
            let handle = self.arena.insert(note);
            self.lanes[descriptor.lane].enqueue(handle, &note);

            let x = lane_anchor_x(
                descriptor.lane,
                self.lanes.len(),
                self.config.field.input_width,
            );
            let y = self.rules.field.leading_y(onset, now);
            self.presentation.note_spawned(handle, &note, x, y);
            spawned += 1;
        }
        spawned
    }

    fn dispatch(&mut self, report: &mut TickReport) {
        while !self.outbox.is_empty() {
            for event in std::mem::take(&mut self.outbox) {
                match event {
                    LaneEvent::Judged(judgement) => {
                        if self.is_ended() {
                            continue;
                        }
                        tracing::debug!(
                            lane = judgement.lane,
                            tier = ?judgement.tier,
                            measure = judgement.measure,
                            "judged"
                        );
                        self.register_hit(judgement.lane, judgement.tier);
                        report.judgements.push(judgement);
                    }
                    LaneEvent::Despawn(handle) => self.despawn(handle),
                    LaneEvent::GameOver { lane, note } => {
                        tracing::debug!(lane, ?note, "note crossed the game-over line");
                        self.trigger_game_over();
                    }
                }
            }
        }
    }

    fn song_has_finished(&mut self, now: f64) -> bool {
        let playing = self.clock.device().is_playing();
        if playing {
            self.device_seen_playing = true;
        }
        if now < 0.0 {
            return false;
        }
        now >= self.clip.length_seconds - self.config.session.song_end_grace
            || (self.device_seen_playing && !playing)
    }

    fn end(&mut self, reason: EndReason) {
        if self.is_ended() {
            return;
        }
        self.state = SessionState::Ended(reason);

        let mut drained = Vec::new();
        for lane in &mut self.lanes {
            lane.drain(&mut drained);
        }
        for event in drained {
            if let LaneEvent::Despawn(handle) = event {
                self.despawn(handle);
            }
        }
        self.router.clear();
        self.clock.stop();

        let summary = self.scoreboard.summary();
        tracing::info!(
            song = %self.beatmap.song_id,
            ?reason,
            score = summary.score,
            max_combo = summary.max_combo,
            "session ended"
        );
        self.presentation.game_over(reason, &summary);
    }
}

fn validate_setup(config: &GameConfig, beatmap: &Beatmap, clip: &AudioClip) -> Result<()> {
    config.validate()?;
    beatmap.validate()?;
    if beatmap.lanes != config.session.lane_count {
        return Err(LanebeatError::LaneCountMismatch {
            beatmap: beatmap.lanes,
            configured: config.session.lane_count,
        });
    }
    if clip.id != beatmap.audio_file
        || !(clip.length_seconds.is_finite() && clip.length_seconds > 0.0)
    {
        return Err(LanebeatError::MissingAudioAsset(beatmap.audio_file.clone()));
    }
    Ok(())
}
