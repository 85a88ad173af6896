//! Evolution: the static table of life stages, the side-effect-free resolver,
//! and the four-phase transition machine the caller drives.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::EvolutionTunables;
use crate::error::KernelError;
use crate::model::{Creature, LifeStage, MemoryKind, Personality};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MinStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub str: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub def: Option<f32>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct KernelConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trust: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stress: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sync: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_personality: Option<Personality>,
    #[serde(default)]
    pub requires_trauma: bool,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Requirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stats: Option<MinStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_conditions: Option<KernelConditions>,
}

/// Severity a trauma must exceed to satisfy `requires_trauma`.
const SEVERE_TRAUMA: f32 = 70.0;

impl Requirements {
    pub fn satisfied_by(&self, creature: &Creature) -> bool {
        if let Some(min) = &self.min_stats {
            if min.str.is_some_and(|v| creature.stats.strength < v) {
                return false;
            }
            if min.def.is_some_and(|v| creature.stats.defense < v) {
                return false;
            }
        }
        if let Some(c) = &self.kernel_conditions {
            let k = &creature.kernel;
            if c.min_trust.is_some_and(|v| k.axes.trust < v)
                || c.max_stress.is_some_and(|v| k.axes.stress > v)
                || c.min_sync.is_some_and(|v| k.axes.sync < v)
                || c.required_personality.is_some_and(|p| k.personality != p)
            {
                return false;
            }
            if c.requires_trauma && !k.traumas.values().any(|t| t.severity > SEVERE_TRAUMA) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EvolutionNode {
    pub id: String,
    pub stage: LifeStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Requirements>,
    /// Candidates in priority order.
    #[serde(default)]
    pub next: Vec<String>,
}

/// Immutable id -> node table, loaded once.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EvolutionTable {
    nodes: BTreeMap<String, EvolutionNode>,
}

impl EvolutionTable {
    pub fn new(nodes: impl IntoIterator<Item = EvolutionNode>) -> Result<Self, KernelError> {
        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let table = Self { nodes };
        table.validate()?;
        Ok(table)
    }

    pub fn from_json(s: &str) -> Result<Self, KernelError> {
        let table: Self = serde_json::from_str(s)?;
        table.validate()?;
        Ok(table)
    }

    /// Reads and validates a table file.
    pub fn load(path: &Path) -> Result<Self, KernelError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), KernelError> {
        for (key, node) in &self.nodes {
            if *key != node.id {
                return Err(KernelError::MismatchedId {
                    key: key.clone(),
                    id: node.id.clone(),
                });
            }
            if let Some(missing) = node.next.iter().find(|id| !self.nodes.contains_key(*id)) {
                return Err(KernelError::DanglingCandidate {
                    from: node.id.clone(),
                    to: missing.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&EvolutionNode> {
        self.nodes.get(id)
    }

    pub fn node(&self, id: &str) -> Result<&EvolutionNode, KernelError> {
        self.get(id)
            .ok_or_else(|| KernelError::UnknownNode(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn node(
    id: &str,
    stage: LifeStage,
    requirements: Option<Requirements>,
    next: &[&str],
) -> EvolutionNode {
    EvolutionNode {
        id: id.to_string(),
        stage,
        requirements,
        next: next.iter().map(|s| s.to_string()).collect(),
    }
}

fn reqs(strength: f32, conditions: KernelConditions) -> Option<Requirements> {
    Some(Requirements {
        min_stats: Some(MinStats {
            str: Some(strength),
            def: None,
        }),
        kernel_conditions: Some(conditions),
    })
}

impl Default for EvolutionTable {
    fn default() -> Self {
        let nodes = [
            node("botamon", LifeStage::Baby, None, &["agumon", "betamon"]),
            node(
                "agumon",
                LifeStage::Rookie,
                reqs(
                    15.0,
                    KernelConditions {
                        min_trust: Some(30.0),
                        max_stress: Some(40.0),
                        ..KernelConditions::default()
                    },
                ),
                &["greymon", "darkgreymon"],
            ),
            node(
                "betamon",
                LifeStage::Rookie,
                reqs(
                    10.0,
                    KernelConditions {
                        min_trust: Some(10.0),
                        ..KernelConditions::default()
                    },
                ),
                &["seadramon"],
            ),
            node(
                "greymon",
                LifeStage::Champion,
                reqs(
                    50.0,
                    KernelConditions {
                        min_trust: Some(60.0),
                        min_sync: Some(40.0),
                        ..KernelConditions::default()
                    },
                ),
                &["metalgreymon"],
            ),
            node(
                "darkgreymon",
                LifeStage::Champion,
                reqs(
                    60.0,
                    KernelConditions {
                        max_stress: Some(100.0),
                        requires_trauma: true,
                        ..KernelConditions::default()
                    },
                ),
                &[],
            ),
            node(
                "seadramon",
                LifeStage::Champion,
                reqs(
                    40.0,
                    KernelConditions {
                        max_stress: Some(60.0),
                        ..KernelConditions::default()
                    },
                ),
                &[],
            ),
            node("metalgreymon", LifeStage::Ultimate, None, &[]),
        ];
        Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        }
    }
}

/// First candidate (in declared order) whose requirements hold.
pub fn check_evolution<'t>(creature: &Creature, table: &'t EvolutionTable) -> Option<&'t str> {
    let current = table.get(&creature.species_id)?;
    current
        .next
        .iter()
        .filter_map(|id| table.get(id))
        .find(|candidate| {
            candidate
                .requirements
                .as_ref()
                .map_or(true, |r| r.satisfied_by(creature))
        })
        .map(|candidate| candidate.id.as_str())
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionPhase {
    #[default]
    Idle,
    SignalDetected,
    Syncing,
    DataRewrite,
    Complete,
}

impl EvolutionPhase {
    /// Phases during which ordinary drift and mood must not run.
    pub fn freezes_drift(self) -> bool {
        matches!(self, EvolutionPhase::Syncing | EvolutionPhase::DataRewrite)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EvolutionState {
    pub phase: EvolutionPhase,
    pub progress: f32,
    pub target_id: Option<String>,
    /// Fast ticks left in DATA_REWRITE or COMPLETE.
    pub countdown: u32,
}

impl EvolutionState {
    /// Main-tick poll. Only acts while idle.
    pub fn poll(&mut self, creature: &Creature, table: &EvolutionTable) {
        if self.phase != EvolutionPhase::Idle {
            return;
        }
        if let Some(target) = check_evolution(creature, table) {
            info!(from = %creature.species_id, to = target, "evolution signal detected");
            self.phase = EvolutionPhase::SignalDetected;
            self.target_id = Some(target.to_string());
        }
    }

    /// The sustain signal started.
    pub fn begin_sync(&mut self) {
        if self.phase == EvolutionPhase::SignalDetected {
            self.phase = EvolutionPhase::Syncing;
        }
    }

    /// Fast-tick integration. `sustained` is the sampled sustain flag; this
    /// is the only place progress moves. Commits the rewrite into `creature`
    /// when progress reaches 100.
    pub fn step(
        &mut self,
        sustained: bool,
        creature: &mut Creature,
        table: &EvolutionTable,
        tun: &EvolutionTunables,
    ) {
        match self.phase {
            EvolutionPhase::Syncing => {
                if sustained {
                    self.progress = (self.progress + tun.sync_gain).min(100.0);
                    if self.progress >= 100.0 {
                        self.progress = 100.0;
                        self.phase = EvolutionPhase::DataRewrite;
                        self.countdown = tun.rewrite_settle_ticks;
                        self.commit(creature, table);
                    }
                } else {
                    self.progress = (self.progress - tun.sync_decay).max(0.0);
                    if self.progress == 0.0 {
                        self.phase = EvolutionPhase::SignalDetected;
                    }
                }
            }
            EvolutionPhase::DataRewrite => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    info!(species = %creature.species_id, "evolution complete");
                    self.phase = EvolutionPhase::Complete;
                    self.progress = 0.0;
                    self.target_id = None;
                    self.countdown = tun.complete_hold_ticks;
                }
            }
            EvolutionPhase::Complete => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.phase = EvolutionPhase::Idle;
                }
            }
            EvolutionPhase::Idle | EvolutionPhase::SignalDetected => {}
        }
    }

    fn commit(&self, creature: &mut Creature, table: &EvolutionTable) {
        let Some(target) = self.target_id.as_deref() else {
            return;
        };
        let stage = creature.stage.escalate();
        if let Some(declared) = table.get(target).map(|n| n.stage) {
            if declared != stage {
                warn!(to = target, ?declared, ladder = ?stage, "stage ladder disagrees with table");
            }
        }
        info!(from = %creature.species_id, to = target, ?stage, "evolution committed");
        creature.species_id = target.to_string();
        creature.stage = stage;
        creature
            .kernel
            .remember(creature.stats.age, MemoryKind::Triumph, 100.0, "evolution", target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TraumaState, TraumaType};

    fn agumon_ready() -> Creature {
        let mut c = Creature::new_default();
        c.stats.strength = 15.0;
        c.kernel.axes.trust = 30.0;
        c.kernel.axes.stress = 40.0;
        c
    }

    #[test]
    fn default_table_is_consistent() {
        let table = EvolutionTable::default();
        assert_eq!(table.len(), 7);
        assert!(table.validate().is_ok());
        assert_eq!(table.node("metalgreymon").unwrap().stage, LifeStage::Ultimate);
        assert!(matches!(table.node("gabumon"), Err(KernelError::UnknownNode(_))));
    }

    #[test]
    fn boundaries_are_inclusive() {
        let table = EvolutionTable::default();
        assert_eq!(check_evolution(&agumon_ready(), &table), Some("agumon"));
    }

    #[test]
    fn falls_through_to_next_candidate_in_order() {
        let table = EvolutionTable::default();
        let mut c = agumon_ready();
        c.stats.strength = 14.0;
        assert_eq!(check_evolution(&c, &table), Some("betamon"));
        c.stats.strength = 9.0;
        assert_eq!(check_evolution(&c, &table), None);
    }

    #[test]
    fn unrequired_candidate_wins_immediately() {
        let table = EvolutionTable::new([
            node("a", LifeStage::Baby, None, &["b", "c"]),
            node("b", LifeStage::Rookie, None, &[]),
            node("c", LifeStage::Rookie, None, &[]),
        ])
        .unwrap();
        let mut c = Creature::new_default();
        c.species_id = "a".to_string();
        assert_eq!(check_evolution(&c, &table), Some("b"));
    }

    #[test]
    fn leaf_or_unknown_node_yields_none() {
        let table = EvolutionTable::default();
        let mut c = Creature::new_default();
        c.species_id = "seadramon".to_string();
        assert_eq!(check_evolution(&c, &table), None);
        c.species_id = "missingno".to_string();
        assert_eq!(check_evolution(&c, &table), None);
    }

    #[test]
    fn dark_path_requires_severe_trauma() {
        let table = EvolutionTable::default();
        let mut c = Creature::new_default();
        c.species_id = "agumon".to_string();
        c.stats.strength = 60.0;
        assert_eq!(check_evolution(&c, &table), None);

        let mut t = TraumaState::fresh(TraumaType::Overload);
        t.severity = 71.0;
        c.kernel.traumas.insert(TraumaType::Overload, t);
        assert_eq!(check_evolution(&c, &table), Some("darkgreymon"));
    }

    #[test]
    fn personality_and_defense_requirements() {
        let brave_only = Requirements {
            min_stats: Some(MinStats {
                str: None,
                def: Some(8.0),
            }),
            kernel_conditions: Some(KernelConditions {
                required_personality: Some(Personality::Brave),
                ..KernelConditions::default()
            }),
        };
        let mut c = Creature::new_default().with_personality(Personality::Brave);
        c.stats.defense = 8.0;
        assert!(brave_only.satisfied_by(&c));
        c.stats.defense = 7.0;
        assert!(!brave_only.satisfied_by(&c));
        c.stats.defense = 8.0;
        c.kernel.personality = Personality::Timid;
        assert!(!brave_only.satisfied_by(&c));
    }

    #[test]
    fn table_rejects_dangling_candidates() {
        let err = EvolutionTable::new([node("a", LifeStage::Baby, None, &["ghost"])]).unwrap_err();
        assert!(matches!(err, KernelError::DanglingCandidate { .. }));
    }

    #[test]
    fn table_loads_from_json() {
        let json = r#"{
            "egg": { "id": "egg", "stage": "EGG", "next": ["hatchling"] },
            "hatchling": {
                "id": "hatchling",
                "stage": "BABY",
                "requirements": { "kernel_conditions": { "min_sync": 20.0 } }
            }
        }"#;
        let table = EvolutionTable::from_json(json).unwrap();
        let mut c = Creature::new_default();
        c.species_id = "egg".to_string();
        c.kernel.axes.sync = 19.0;
        assert_eq!(check_evolution(&c, &table), None);
        c.kernel.axes.sync = 20.0;
        assert_eq!(check_evolution(&c, &table), Some("hatchling"));
    }

    #[test]
    fn table_file_load_reports_io_and_json_errors() {
        let missing = Path::new("/definitely/not/here/evolution.json");
        assert!(matches!(EvolutionTable::load(missing), Err(KernelError::Io(_))));

        let dir = std::env::temp_dir().join(format!("digikernel-evo-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("evolution.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(EvolutionTable::load(&path), Err(KernelError::Json(_))));

        let stock = EvolutionTable::default();
        fs::write(&path, serde_json::to_string(&stock).unwrap()).unwrap();
        assert_eq!(EvolutionTable::load(&path).unwrap(), stock);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn sync_rewrite_complete_idle() {
        let table = EvolutionTable::default();
        let tun = EvolutionTunables::default();
        let mut c = agumon_ready();
        let mut evo = EvolutionState::default();

        evo.poll(&c, &table);
        assert_eq!(evo.phase, EvolutionPhase::SignalDetected);
        assert_eq!(evo.target_id.as_deref(), Some("agumon"));

        // Stepping without a sustain start does nothing.
        evo.step(true, &mut c, &table, &tun);
        assert_eq!(evo.progress, 0.0);

        evo.begin_sync();
        for _ in 0..49 {
            evo.step(true, &mut c, &table, &tun);
        }
        assert_eq!(evo.phase, EvolutionPhase::Syncing);
        assert_eq!(c.species_id, "botamon");

        evo.step(true, &mut c, &table, &tun);
        assert_eq!(evo.phase, EvolutionPhase::DataRewrite);
        assert_eq!(c.species_id, "agumon");
        assert_eq!(c.stage, LifeStage::Rookie);
        assert!(c.kernel.memories.iter().any(|m| m.kind == MemoryKind::Triumph));

        // Releasing after the commit point changes nothing.
        for _ in 0..tun.rewrite_settle_ticks {
            evo.step(false, &mut c, &table, &tun);
        }
        assert_eq!(evo.phase, EvolutionPhase::Complete);
        assert_eq!(evo.target_id, None);
        assert_eq!(c.species_id, "agumon");

        for _ in 0..tun.complete_hold_ticks {
            evo.step(false, &mut c, &table, &tun);
        }
        assert_eq!(evo.phase, EvolutionPhase::Idle);
    }

    #[test]
    fn releasing_early_decays_back_to_signal() {
        let table = EvolutionTable::default();
        let tun = EvolutionTunables::default();
        let mut c = agumon_ready();
        let mut evo = EvolutionState::default();
        evo.poll(&c, &table);
        evo.begin_sync();
        for _ in 0..10 {
            evo.step(true, &mut c, &table, &tun);
        }
        assert_eq!(evo.progress, 20.0);

        evo.step(false, &mut c, &table, &tun);
        assert_eq!(evo.progress, 15.0);
        assert_eq!(evo.phase, EvolutionPhase::Syncing);
        for _ in 0..3 {
            evo.step(false, &mut c, &table, &tun);
        }
        assert_eq!(evo.progress, 0.0);
        assert_eq!(evo.phase, EvolutionPhase::SignalDetected);
        assert_eq!(c.species_id, "botamon");

        // Never drops below SIGNAL_DETECTED on its own.
        evo.step(false, &mut c, &table, &tun);
        assert_eq!(evo.phase, EvolutionPhase::SignalDetected);
    }

    #[test]
    fn only_syncing_and_rewrite_freeze_drift() {
        assert!(EvolutionPhase::Syncing.freezes_drift());
        assert!(EvolutionPhase::DataRewrite.freezes_drift());
        assert!(!EvolutionPhase::Idle.freezes_drift());
        assert!(!EvolutionPhase::SignalDetected.freezes_drift());
        assert!(!EvolutionPhase::Complete.freezes_drift());
    }
}
