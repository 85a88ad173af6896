//! Long-horizon observations of the player and the creature: input entropy,
//! volatility, and one-way narrative flags.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::config::NarrativeTunables;
use crate::model::{Creature, MemoryKind, MetaState, Stimulus};

/// Sliding window over the most recent player actions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputWindow {
    capacity: usize,
    actions: VecDeque<Stimulus>,
}

impl InputWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            actions: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, action: Stimulus) {
        if self.actions.len() == self.capacity {
            self.actions.pop_front();
        }
        self.actions.push_back(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Distinct action types over window length. Zero when empty.
    pub fn entropy(&self) -> f32 {
        if self.actions.is_empty() {
            return 0.0;
        }
        let distinct: BTreeSet<_> = self.actions.iter().collect();
        distinct.len() as f32 / self.actions.len() as f32
    }
}

/// Confusion damping and volatility. Never touches the kernel.
pub fn analyze_player_patterns(
    creature: &Creature,
    window: &InputWindow,
    tun: &NarrativeTunables,
) -> MetaState {
    let mut meta = creature.meta;
    let entropy = window.entropy();
    meta.metrics.input_entropy = entropy;

    let damping = &mut meta.safeguards.confusion_damping;
    if entropy > tun.entropy_threshold && creature.kernel.axes.trust < tun.confusion_trust {
        *damping = (*damping + tun.confusion_step).min(100.0);
    } else {
        *damping = (*damping - tun.confusion_decay).max(0.0);
    }

    meta.metrics.volatility_index = (100.0 - creature.kernel.axes.stability) / 100.0;
    meta
}

pub fn update_narrative_tags(creature: &Creature) -> MetaState {
    let mut meta = creature.meta;
    let k = &creature.kernel;

    let broke_down = k.memories.iter().any(|m| m.kind == MemoryKind::Trauma);
    if broke_down && k.axes.stability > 80.0 && !meta.narrative.has_survived_breakdown {
        tracing::info!("narrative: survived breakdown");
        meta.narrative.has_survived_breakdown = true;
    }

    if k.axes.sync > 80.0 && k.axes.stability < 40.0 && !meta.narrative.has_trusted_strangers {
        tracing::info!("narrative: trusted strangers");
        meta.narrative.has_trusted_strangers = true;
    }

    meta.metrics.volatility_index = (100.0 - k.axes.stability) / 100.0;
    meta
}
