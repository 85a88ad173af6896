use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::KernelError;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeStage {
    Egg,
    Baby,
    Rookie,
    Champion,
    Ultimate,
}

impl LifeStage {
    /// Fixed escalation used when an evolution commits.
    pub fn escalate(self) -> LifeStage {
        match self {
            LifeStage::Baby => LifeStage::Rookie,
            LifeStage::Rookie => LifeStage::Champion,
            _ => LifeStage::Ultimate,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Personality {
    Brave,
    Timid,
    Stoic,
    Curious,
    Chaotic,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraumaType {
    Abandonment,
    Overload,
    DataCorruption,
    Betrayal,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefusalReason {
    None,
    Fear,
    Defiance,
    Apathy,
    Overwhelmed,
    Dissociated,
    Disgust,
    NotHungry,
}

impl RefusalReason {
    pub fn is_refused(self) -> bool {
        !matches!(self, RefusalReason::None)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Angry,
    Tired,
    Hyper,
    Fractured,
    Refusing,
}

/// Everything the player (or the caller on the player's behalf) can do to the creature.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stimulus {
    Feed,
    Train,
    Scan,
    Ignore,
    Praise,
    Scold,
    Sleep,
    /// The caller respected a refusal instead of forcing the command.
    Refusal,
    Wake,
}

impl Stimulus {
    pub const ALL: [Stimulus; 9] = [
        Stimulus::Feed,
        Stimulus::Train,
        Stimulus::Scan,
        Stimulus::Ignore,
        Stimulus::Praise,
        Stimulus::Scold,
        Stimulus::Sleep,
        Stimulus::Refusal,
        Stimulus::Wake,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stimulus::Feed => "feed",
            Stimulus::Train => "train",
            Stimulus::Scan => "scan",
            Stimulus::Ignore => "ignore",
            Stimulus::Praise => "praise",
            Stimulus::Scold => "scold",
            Stimulus::Sleep => "sleep",
            Stimulus::Refusal => "refusal",
            Stimulus::Wake => "wake",
        }
    }
}

impl fmt::Display for Stimulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stimulus {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match Stimulus::ALL.iter().find(|st| st.name() == wanted) {
            Some(st) => Ok(*st),
            None => {
                tracing::warn!(stimulus = %s, "rejected unknown stimulus");
                Err(KernelError::UnknownStimulus(s.to_string()))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionalAxes {
    pub trust: f32,
    pub stress: f32,
    pub aggression: f32,
    pub curiosity: f32,
    pub sync: f32,
    pub stability: f32,
}

impl EmotionalAxes {
    /// Pulls every axis back into [0, 100]. Must be the last step of any mutation.
    pub fn clamp(&mut self) {
        for v in [
            &mut self.trust,
            &mut self.stress,
            &mut self.aggression,
            &mut self.curiosity,
            &mut self.sync,
            &mut self.stability,
        ] {
            *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
        }
    }

    pub fn in_bounds(&self) -> bool {
        [
            self.trust,
            self.stress,
            self.aggression,
            self.curiosity,
            self.sync,
            self.stability,
        ]
        .iter()
        .all(|v| (0.0..=100.0).contains(v))
    }
}

impl Default for EmotionalAxes {
    fn default() -> Self {
        Self {
            trust: 20.0,
            stress: 10.0,
            aggression: 5.0,
            curiosity: 80.0,
            sync: 10.0,
            stability: 50.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TraumaState {
    pub kind: TraumaType,
    pub severity: f32,
    pub recovery: f32,
    pub is_active: bool,
    pub trigger_count: u32,
}

impl TraumaState {
    pub fn fresh(kind: TraumaType) -> Self {
        Self {
            kind,
            severity: 0.0,
            recovery: 0.0,
            is_active: true,
            trigger_count: 0,
        }
    }
}

/// At most one entry per trauma type.
pub type TraumaSet = BTreeMap<TraumaType, TraumaState>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryKind {
    Trauma,
    Triumph,
    Bonding,
    Neglect,
    Conflict,
    Dream,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MemoryTrace {
    pub id: u64,
    /// Creature age (in ticks) when the trace was laid down.
    pub at_age: u64,
    pub kind: MemoryKind,
    pub intensity: f32,
    pub tags: Vec<String>,
    pub description: String,
    pub resolved: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionalKernel {
    pub personality: Personality,
    pub axes: EmotionalAxes,
    pub memories: Vec<MemoryTrace>,
    pub traumas: TraumaSet,
    pub drift_rate: f32,
    pub consecutive_safe_ticks: u32,
    pub is_fragmented: bool,
}

impl EmotionalKernel {
    pub fn new(personality: Personality) -> Self {
        Self {
            personality,
            axes: EmotionalAxes::default(),
            memories: Vec::new(),
            traumas: TraumaSet::new(),
            drift_rate: 1.0,
            consecutive_safe_ticks: 0,
            is_fragmented: false,
        }
    }

    pub fn trauma(&self, kind: TraumaType) -> Option<&TraumaState> {
        self.traumas.get(&kind)
    }

    /// Active trauma of `kind` whose severity is strictly above `threshold`.
    pub fn active_trauma_above(&self, kind: TraumaType, threshold: f32) -> bool {
        self.traumas
            .get(&kind)
            .is_some_and(|t| t.is_active && t.severity > threshold)
    }

    pub fn remember(&mut self, at_age: u64, kind: MemoryKind, intensity: f32, tag: &str, description: &str) {
        let id = self.memories.len() as u64;
        self.memories.push(MemoryTrace {
            id,
            at_age,
            kind,
            intensity,
            tags: vec![tag.to_string()],
            description: description.to_string(),
            resolved: false,
        });
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub volatility_index: f32,
    pub input_entropy: f32,
    pub cruelty_score: f64,
    pub coherence: f32,
}

/// One-way flags: set once, never cleared.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NarrativeFlags {
    pub has_trusted_strangers: bool,
    pub has_survived_breakdown: bool,
    pub is_codependent: bool,
    pub is_lone_wolf: bool,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Safeguards {
    pub dissociation_level: f32,
    pub confusion_damping: f32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct MetaState {
    pub metrics: Metrics,
    pub narrative: NarrativeFlags,
    pub safeguards: Safeguards,
}

impl Default for MetaState {
    fn default() -> Self {
        Self {
            metrics: Metrics {
                coherence: 1.0,
                ..Metrics::default()
            },
            narrative: NarrativeFlags::default(),
            safeguards: Safeguards::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub hp: f32,
    pub max_hp: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub hunger: f32,
    pub exp: f32,
    pub strength: f32,
    pub defense: f32,
    pub speed: f32,
    pub weight: f32,
    pub age: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            hp: 20.0,
            max_hp: 20.0,
            energy: 50.0,
            max_energy: 50.0,
            hunger: 50.0,
            exp: 0.0,
            strength: 5.0,
            defense: 5.0,
            speed: 5.0,
            weight: 2.0,
            age: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub is_sleeping: bool,
    pub is_sick: bool,
    pub mood: Mood,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            is_sleeping: false,
            is_sick: false,
            mood: Mood::Neutral,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct History {
    pub battles_won: u32,
    pub training_sessions: u32,
    pub mistakes: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Creature {
    pub species_id: String,
    pub name: String,
    pub stage: LifeStage,
    pub kernel: EmotionalKernel,
    pub meta: MetaState,
    pub stats: Stats,
    pub condition: Condition,
    pub history: History,
}

impl Creature {
    /// The fixed starting template: a curious Botamon.
    pub fn new_default() -> Self {
        Self {
            species_id: "botamon".to_string(),
            name: "Botamon".to_string(),
            stage: LifeStage::Baby,
            kernel: EmotionalKernel::new(Personality::Curious),
            meta: MetaState::default(),
            stats: Stats::default(),
            condition: Condition::default(),
            history: History::default(),
        }
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.kernel.personality = personality;
        self
    }
}
