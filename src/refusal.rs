//! Autonomy layer: decides whether the creature refuses a command before any
//! of its effects are applied. First matching rule wins.

use tracing::debug;

use crate::config::{RefusalTunables, Tunables};
use crate::model::{Creature, MetaState, Personality, RefusalReason, Stimulus, TraumaType};
use crate::rng::RandomSource;
use crate::safeguard;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefusalDecision {
    /// Meta state after the safeguard monitor scored this action.
    pub meta: MetaState,
    pub reason: RefusalReason,
}

/// Rules 2 to 8, given that the safeguard did not already veto the action.
pub fn evaluate<R: RandomSource + ?Sized>(
    creature: &Creature,
    action: Stimulus,
    tun: &RefusalTunables,
    rng: &mut R,
) -> RefusalReason {
    let kernel = &creature.kernel;
    let axes = &kernel.axes;
    let stats = &creature.stats;

    // Biological hard limits.
    if action == Stimulus::Train && stats.energy < tun.train_energy_floor {
        return RefusalReason::Overwhelmed;
    }
    if action == Stimulus::Feed && stats.hunger > tun.feed_hunger_ceiling {
        return RefusalReason::NotHungry;
    }

    // Trauma triggers.
    if matches!(action, Stimulus::Train | Stimulus::Scan)
        && kernel.active_trauma_above(TraumaType::Overload, tun.fear_overload)
    {
        return RefusalReason::Fear;
    }
    if action == Stimulus::Feed
        && kernel.active_trauma_above(TraumaType::Betrayal, tun.defiance_betrayal)
        && axes.trust < tun.betrayal_trust_floor
    {
        return RefusalReason::Defiance;
    }

    // Emotional thresholds.
    if action == Stimulus::Train && axes.stress > tun.train_stress && axes.trust < tun.train_trust {
        return RefusalReason::Defiance;
    }
    if action == Stimulus::Wake && stats.energy < tun.wake_energy && axes.trust < tun.wake_trust {
        return RefusalReason::Defiance;
    }
    if action == Stimulus::Scan && axes.stability < tun.scan_stability {
        return RefusalReason::Overwhelmed;
    }

    if kernel.personality == Personality::Chaotic && rng.roll(tun.chaotic_defiance_chance) {
        return RefusalReason::Defiance;
    }

    RefusalReason::None
}

/// Scores the action with the safeguard monitor, then runs the decision table.
/// The returned meta must be stored by the caller whatever the outcome.
pub fn check_refusal<R: RandomSource + ?Sized>(
    creature: &Creature,
    action: Stimulus,
    tun: &Tunables,
    rng: &mut R,
) -> RefusalDecision {
    let verdict = safeguard::check(creature, action, &tun.safeguard);
    let reason = match verdict.refusal {
        RefusalReason::Dissociated => RefusalReason::Dissociated,
        _ => evaluate(creature, action, &tun.refusal, rng),
    };
    if reason.is_refused() {
        debug!(%action, ?reason, "command refused");
    }
    RefusalDecision {
        meta: verdict.meta,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TraumaState;
    use crate::rng::Fixed;

    fn tun() -> RefusalTunables {
        RefusalTunables::default()
    }

    fn never() -> Fixed {
        Fixed(0.99)
    }

    fn traumatized(kind: TraumaType, severity: f32) -> Creature {
        let mut c = Creature::new_default();
        let mut t = TraumaState::fresh(kind);
        t.severity = severity;
        c.kernel.traumas.insert(kind, t);
        c
    }

    #[test]
    fn healthy_creature_complies() {
        let c = Creature::new_default();
        for action in Stimulus::ALL {
            assert_eq!(evaluate(&c, action, &tun(), &mut never()), RefusalReason::None);
        }
    }

    #[test]
    fn biological_limits() {
        let mut c = Creature::new_default();
        c.stats.energy = 4.0;
        assert_eq!(evaluate(&c, Stimulus::Train, &tun(), &mut never()), RefusalReason::Overwhelmed);

        let mut c = Creature::new_default();
        c.stats.hunger = 91.0;
        assert_eq!(evaluate(&c, Stimulus::Feed, &tun(), &mut never()), RefusalReason::NotHungry);
        c.stats.hunger = 90.0;
        assert_eq!(evaluate(&c, Stimulus::Feed, &tun(), &mut never()), RefusalReason::None);
    }

    #[test]
    fn overload_breeds_fear_of_work() {
        let c = traumatized(TraumaType::Overload, 51.0);
        assert_eq!(evaluate(&c, Stimulus::Train, &tun(), &mut never()), RefusalReason::Fear);
        assert_eq!(evaluate(&c, Stimulus::Scan, &tun(), &mut never()), RefusalReason::Fear);
        assert_eq!(evaluate(&c, Stimulus::Feed, &tun(), &mut never()), RefusalReason::None);

        let mut inactive = traumatized(TraumaType::Overload, 80.0);
        inactive
            .kernel
            .traumas
            .get_mut(&TraumaType::Overload)
            .unwrap()
            .is_active = false;
        assert_eq!(evaluate(&inactive, Stimulus::Train, &tun(), &mut never()), RefusalReason::None);
    }

    #[test]
    fn betrayed_and_distrustful_refuses_food() {
        let mut c = traumatized(TraumaType::Betrayal, 41.0);
        c.kernel.axes.trust = 19.0;
        assert_eq!(evaluate(&c, Stimulus::Feed, &tun(), &mut never()), RefusalReason::Defiance);
        c.kernel.axes.trust = 20.0;
        assert_eq!(evaluate(&c, Stimulus::Feed, &tun(), &mut never()), RefusalReason::None);
    }

    #[test]
    fn emotional_thresholds() {
        let mut c = Creature::new_default();
        c.kernel.axes.stress = 81.0;
        c.kernel.axes.trust = 39.0;
        assert_eq!(evaluate(&c, Stimulus::Train, &tun(), &mut never()), RefusalReason::Defiance);

        let mut c = Creature::new_default();
        c.stats.energy = 29.0;
        c.kernel.axes.trust = 49.0;
        assert_eq!(evaluate(&c, Stimulus::Wake, &tun(), &mut never()), RefusalReason::Defiance);
        c.kernel.axes.trust = 50.0;
        assert_eq!(evaluate(&c, Stimulus::Wake, &tun(), &mut never()), RefusalReason::None);

        let mut c = Creature::new_default();
        c.kernel.axes.stability = 9.0;
        assert_eq!(evaluate(&c, Stimulus::Scan, &tun(), &mut never()), RefusalReason::Overwhelmed);
    }

    #[test]
    fn chaotic_rebels_at_random() {
        let c = Creature::new_default().with_personality(Personality::Chaotic);
        assert_eq!(evaluate(&c, Stimulus::Feed, &tun(), &mut Fixed(0.05)), RefusalReason::Defiance);
        assert_eq!(evaluate(&c, Stimulus::Feed, &tun(), &mut Fixed(0.1)), RefusalReason::None);

        let calm = Creature::new_default();
        assert_eq!(evaluate(&calm, Stimulus::Feed, &tun(), &mut Fixed(0.0)), RefusalReason::None);
    }

    #[test]
    fn hard_limit_outranks_chaos() {
        let mut c = Creature::new_default().with_personality(Personality::Chaotic);
        c.stats.energy = 3.0;
        let all = Tunables::default();
        let d = check_refusal(&c, Stimulus::Train, &all, &mut Fixed(0.0));
        assert_eq!(d.reason, RefusalReason::Overwhelmed);
    }

    #[test]
    fn dissociation_bypasses_the_table() {
        let mut c = Creature::new_default();
        c.meta.metrics.cruelty_score = 0.95;
        let all = Tunables::default();
        let d = check_refusal(&c, Stimulus::Feed, &all, &mut never());
        assert_eq!(d.reason, RefusalReason::Dissociated);
        assert_eq!(d.meta.safeguards.dissociation_level, 100.0);
    }
}
