//! Ethical safeguard monitor.
//!
//! Tracks a decaying cruelty score across player actions. Once the score
//! crosses the threshold the creature dissociates: it goes numb and every
//! command is refused with `Dissociated` until the score decays again.

use tracing::info;

use crate::config::SafeguardTunables;
use crate::model::{Creature, MetaState, Mood, RefusalReason, Stimulus};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeguardVerdict {
    pub meta: MetaState,
    pub refusal: RefusalReason,
}

pub fn is_cruel(creature: &Creature, action: Stimulus, tun: &SafeguardTunables) -> bool {
    match action {
        Stimulus::Scold => creature.condition.mood == Mood::Sad,
        Stimulus::Train => creature.stats.energy < tun.cruel_train_energy,
        Stimulus::Wake => creature.stats.energy < tun.cruel_wake_energy,
        _ => false,
    }
}

/// Scores one action. Decay applies on every non-cruel action.
pub fn check(creature: &Creature, action: Stimulus, tun: &SafeguardTunables) -> SafeguardVerdict {
    let mut meta = creature.meta;
    let was_dissociated = meta.safeguards.dissociation_level > 0.0
        && meta.metrics.cruelty_score > tun.dissociation_threshold;

    if is_cruel(creature, action, tun) {
        meta.metrics.cruelty_score = (meta.metrics.cruelty_score + tun.cruelty_trigger).min(1.0);
    } else {
        meta.metrics.cruelty_score = (meta.metrics.cruelty_score - tun.cruelty_decay).max(0.0);
    }

    let refusal = if meta.metrics.cruelty_score > tun.dissociation_threshold {
        meta.safeguards.dissociation_level = 100.0;
        if !was_dissociated {
            info!(cruelty = meta.metrics.cruelty_score, %action, "creature dissociated");
        }
        RefusalReason::Dissociated
    } else {
        meta.safeguards.dissociation_level =
            (meta.safeguards.dissociation_level - tun.dissociation_decay).max(0.0);
        if was_dissociated {
            info!(cruelty = meta.metrics.cruelty_score, "dissociation lifting");
        }
        RefusalReason::None
    };

    SafeguardVerdict { meta, refusal }
}
