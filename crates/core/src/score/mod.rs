use serde::{Deserialize, Serialize};

use crate::Tier;

/// Per-tier tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub excellent: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl TierCounts {
    pub fn get(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Excellent => self.excellent,
            Tier::Great => self.great,
            Tier::Good => self.good,
            Tier::Miss => self.miss,
        }
    }

    fn bump(&mut self, tier: Tier) {
        match tier {
            Tier::Excellent => self.excellent += 1,
            Tier::Great => self.great += 1,
            Tier::Good => self.good += 1,
            Tier::Miss => self.miss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.excellent + self.great + self.good + self.miss
    }
}

pub fn points_for(tier: Tier) -> u64 {
    match tier {
        Tier::Excellent => 300,
        Tier::Great => 200,
        Tier::Good => 100,
        Tier::Miss => 0,
    }
}

fn accuracy_weight(tier: Tier) -> f64 {
    match tier {
        Tier::Excellent => 1.0,
        Tier::Great => 0.7,
        Tier::Good => 0.4,
        Tier::Miss => 0.0,
    }
}

/// Serializable end-of-song result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub accuracy: f64,
    pub counts: TierCounts,
}

/// Running score, combo and accuracy.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    score: u64,
    combo: u32,
    max_combo: u32,
    counts: TierCounts,
    weight_sum: f64,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_hit(&mut self, tier: Tier) {
        if tier == Tier::Miss {
            self.register_miss();
            return;
        }
        self.counts.bump(tier);
        self.score += points_for(tier);
        self.weight_sum += accuracy_weight(tier);
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
    }

    pub fn register_miss(&mut self) {
        self.counts.bump(Tier::Miss);
        self.combo = 0;
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn counts(&self) -> TierCounts {
        self.counts
    }

    /// Weighted share of judged notes, `1.0` before anything was judged.
    pub fn accuracy(&self) -> f64 {
        match self.counts.total() {
            0 => 1.0,
            judged => self.weight_sum / f64::from(judged),
        }
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary {
            score: self.score,
            combo: self.combo,
            max_combo: self.max_combo,
            accuracy: self.accuracy(),
            counts: self.counts,
        }
    }
}
