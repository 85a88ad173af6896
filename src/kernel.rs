//! Kernel dynamics: how the emotional axes react to stimuli and drift over time,
//! and how trauma accrues and heals.
//!
//! Every public function takes a snapshot and returns a new one. Axes are only
//! clamped once, as the final step.

use tracing::{debug, info};

use crate::config::KernelTunables;
use crate::model::{
    Creature, EmotionalKernel, MemoryKind, Personality, Stats, Stimulus, TraumaSet, TraumaState,
    TraumaType,
};
use crate::rng::RandomSource;

/// Result of the trauma accrual/healing pass for one stimulus.
#[derive(Clone, Debug, PartialEq)]
pub struct TraumaImpact {
    pub traumas: TraumaSet,
    /// Positive: safe interaction. Negative: breaks the safe streak. Zero: neutral.
    pub safe_tick_bonus: i8,
    /// Trauma types that did not exist before this stimulus.
    pub created: Vec<TraumaType>,
}

/// Drops every trauma whose severity has healed to zero.
pub fn prune_traumas(traumas: &mut TraumaSet) {
    traumas.retain(|_, t| t.severity > 0.0);
}

fn trauma_entry<'a>(
    traumas: &'a mut TraumaSet,
    created: &mut Vec<TraumaType>,
    kind: TraumaType,
) -> &'a mut TraumaState {
    traumas.entry(kind).or_insert_with(|| {
        created.push(kind);
        TraumaState::fresh(kind)
    })
}

pub fn apply_trauma_impact(
    kernel: &EmotionalKernel,
    stimulus: Stimulus,
    stats: &Stats,
    tun: &KernelTunables,
) -> TraumaImpact {
    let mut traumas = kernel.traumas.clone();
    let mut created = Vec::new();
    let mut safe_tick_bonus = 0i8;

    // Work while stressed or exhausted overloads the kernel.
    if matches!(stimulus, Stimulus::Train | Stimulus::Scan) {
        if kernel.axes.stress > tun.overload_stress || stats.energy < tun.overload_energy {
            let t = trauma_entry(&mut traumas, &mut created, TraumaType::Overload);
            t.severity = (t.severity + 10.0).min(100.0);
            t.trigger_count += 1;
            t.recovery = 0.0;
            safe_tick_bonus = -1;
            debug!(severity = t.severity, "overload trauma accrued");
        } else {
            safe_tick_bonus = 1;
        }
    }

    if stimulus == Stimulus::Feed {
        if let Some(t) = traumas.get_mut(&TraumaType::Abandonment) {
            t.recovery += 5.0;
            if t.recovery >= 100.0 {
                t.severity = (t.severity - 10.0).max(0.0);
                // Keep half the momentum.
                t.recovery = 50.0;
                debug!(severity = t.severity, "abandonment trauma healed a step");
            }
        }
        safe_tick_bonus = 1;
    }

    let forced_wake = stimulus == Stimulus::Wake && stats.energy < tun.betrayal_wake_energy;
    if stimulus == Stimulus::Scold || forced_wake {
        if kernel.axes.stress > tun.betrayal_stress || stimulus == Stimulus::Wake {
            let t = trauma_entry(&mut traumas, &mut created, TraumaType::Betrayal);
            t.severity = (t.severity + 15.0).min(100.0);
            t.trigger_count += 1;
            t.recovery = 0.0;
            safe_tick_bonus = -1;
            debug!(severity = t.severity, "betrayal trauma accrued");
        }
    }

    if matches!(stimulus, Stimulus::Sleep | Stimulus::Refusal) {
        safe_tick_bonus = 1;
        for t in traumas.values_mut() {
            if t.severity > 0.0 {
                t.recovery += 1.0;
            }
        }
    }

    prune_traumas(&mut traumas);
    created.retain(|kind| traumas.contains_key(kind));

    TraumaImpact {
        traumas,
        safe_tick_bonus,
        created,
    }
}

fn base_reaction(kernel: &mut EmotionalKernel, stimulus: Stimulus, stats: &Stats) {
    let p = kernel.personality;
    let axes = &mut kernel.axes;
    match stimulus {
        Stimulus::Feed => {
            axes.trust += 2.0;
            axes.stress -= 5.0;
            if p == Personality::Curious {
                axes.curiosity -= 2.0;
            }
        }
        Stimulus::Train => {
            axes.stress += 5.0;
            axes.aggression += 2.0;
            match p {
                Personality::Brave => {
                    axes.stress -= 3.0;
                    axes.sync += 1.0;
                }
                Personality::Timid => axes.stress += 8.0,
                Personality::Stoic | Personality::Curious | Personality::Chaotic => {}
            }
        }
        Stimulus::Scan => {
            axes.curiosity -= 10.0;
            axes.sync += 2.0;
            axes.stability -= 1.0;
        }
        Stimulus::Praise => {
            axes.trust += 3.0;
            axes.stability += 2.0;
        }
        Stimulus::Refusal => {
            axes.trust += 1.0;
            axes.stress -= 2.0;
        }
        Stimulus::Sleep => {
            axes.stress -= 10.0;
            axes.stability += 5.0;
        }
        Stimulus::Wake => {
            if stats.energy < 50.0 {
                axes.stress += 10.0;
                axes.trust -= 5.0;
            } else {
                axes.stress += 2.0;
            }
        }
        Stimulus::Scold | Stimulus::Ignore => {}
    }
}

/// Active traumas bend the reaction that was just applied.
fn trauma_distortion(kernel: &mut EmotionalKernel, stimulus: Stimulus, tun: &KernelTunables) {
    let severe: Vec<TraumaType> = kernel
        .traumas
        .values()
        .filter(|t| t.severity > tun.distortion_threshold)
        .map(|t| t.kind)
        .collect();
    for kind in severe {
        match kind {
            TraumaType::Abandonment => {
                if stimulus == Stimulus::Praise {
                    kernel.axes.trust -= 2.0;
                    kernel.axes.stress += 1.0;
                }
            }
            TraumaType::Betrayal => {
                kernel.axes.trust *= 0.95;
                kernel.axes.stability -= 2.0;
            }
            TraumaType::Overload | TraumaType::DataCorruption => {}
        }
    }
}

/// Two-threshold latch. Anything between the enter and exit bands keeps the
/// previous state. Returns true when the latch changed.
pub fn update_fragmentation(kernel: &mut EmotionalKernel, tun: &KernelTunables) -> bool {
    let axes = kernel.axes;
    let before = kernel.is_fragmented;
    if axes.stress > tun.fragment_enter_stress && axes.stability < tun.fragment_enter_stability {
        kernel.is_fragmented = true;
    } else if axes.stress < tun.fragment_exit_stress && axes.stability > tun.fragment_exit_stability
    {
        kernel.is_fragmented = false;
    }
    before != kernel.is_fragmented
}

/// Base reaction, trauma distortion, fragmentation latch, clamp.
pub fn apply_stimulus_reaction(
    kernel: &EmotionalKernel,
    stimulus: Stimulus,
    stats: &Stats,
    tun: &KernelTunables,
) -> EmotionalKernel {
    let mut next = kernel.clone();
    base_reaction(&mut next, stimulus, stats);
    trauma_distortion(&mut next, stimulus, tun);
    if update_fragmentation(&mut next, tun) {
        if next.is_fragmented {
            info!(stress = next.axes.stress, stability = next.axes.stability, "kernel fragmented");
            next.remember(stats.age, MemoryKind::Trauma, next.axes.stress, "fragmentation", "kernel fragmented under stress");
        } else {
            info!("kernel reintegrated");
        }
    }
    next.axes.clamp();
    next
}

/// Full stimulus path: trauma impact, safe-streak bookkeeping, then the reaction.
pub fn apply_stimulus(
    kernel: &EmotionalKernel,
    stimulus: Stimulus,
    stats: &Stats,
    tun: &KernelTunables,
) -> EmotionalKernel {
    let impact = apply_trauma_impact(kernel, stimulus, stats, tun);
    let mut next = kernel.clone();
    next.traumas = impact.traumas;
    for kind in &impact.created {
        next.remember(stats.age, MemoryKind::Trauma, 0.0, trauma_tag(*kind), "new trauma formed");
    }

    if impact.safe_tick_bonus > 0 {
        next.consecutive_safe_ticks += 1;
    } else if impact.safe_tick_bonus < 0 {
        if next.consecutive_safe_ticks > 0 {
            debug!(streak = next.consecutive_safe_ticks, "safe streak broken");
        }
        next.consecutive_safe_ticks = 0;
    }
    if next.consecutive_safe_ticks > tun.safe_streak_threshold {
        next.axes.stability += 1.0;
        next.axes.stress -= 1.0;
    }

    apply_stimulus_reaction(&next, stimulus, stats, tun)
}

/// Once-per-tick drift. The only place fragmentation noise is injected.
pub fn passive_drift<R: RandomSource + ?Sized>(
    creature: &Creature,
    tun: &KernelTunables,
    rng: &mut R,
) -> EmotionalKernel {
    let mut kernel = creature.kernel.clone();

    if creature.stats.hunger < tun.abandonment_hunger {
        let mut created = Vec::new();
        let t = trauma_entry(&mut kernel.traumas, &mut created, TraumaType::Abandonment);
        t.severity = (t.severity + 5.0).min(100.0);
        t.trigger_count += 1;
        t.recovery = 0.0;
        debug!(severity = t.severity, "abandonment trauma accrued");
        if !created.is_empty() {
            kernel.remember(
                creature.stats.age,
                MemoryKind::Trauma,
                0.0,
                trauma_tag(TraumaType::Abandonment),
                "left starving",
            );
        }
        kernel.consecutive_safe_ticks = 0;
        kernel.axes.stress += 5.0;
        kernel.axes.trust -= 1.0;
    }

    if kernel.axes.trust > tun.trust_regen_threshold {
        kernel.axes.stability += tun.stability_regen;
    } else {
        kernel.axes.stability -= tun.stability_decay;
    }

    if kernel.is_fragmented {
        kernel.axes.stress += rng.noise(tun.fragment_noise);
        kernel.axes.aggression += rng.noise(tun.fragment_noise);
    }

    prune_traumas(&mut kernel.traumas);
    kernel.axes.clamp();
    kernel
}

fn trauma_tag(kind: TraumaType) -> &'static str {
    match kind {
        TraumaType::Abandonment => "abandonment",
        TraumaType::Overload => "overload",
        TraumaType::DataCorruption => "data_corruption",
        TraumaType::Betrayal => "betrayal",
    }
}
