use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{StatEffects, Tunables};
use crate::evolution::{EvolutionState, EvolutionTable};
use crate::kernel;
use crate::model::{Creature, Mood, RefusalReason, Stimulus, SNAPSHOT_VERSION};
use crate::narrative::{self, InputWindow};
use crate::refusal;
use crate::resonance::{calculate_resonance, ResonanceEffect, ResonanceLink};
use crate::rng::{RandomSource, SplitMix};

/// First matching rule wins; dissociation overrides everything.
pub fn derive_mood(creature: &Creature) -> Mood {
    let k = &creature.kernel.axes;
    let energy = creature.stats.energy;
    if creature.meta.safeguards.dissociation_level > 80.0 {
        Mood::Refusing
    } else if creature.kernel.is_fragmented {
        Mood::Fractured
    } else if k.stress > 80.0 {
        Mood::Angry
    } else if k.curiosity < 20.0 && k.stress > 50.0 {
        Mood::Sad
    } else if k.curiosity > 80.0 && energy > 50.0 {
        Mood::Hyper
    } else if k.trust > 70.0 && k.stress < 30.0 {
        Mood::Happy
    } else if energy < 20.0 {
        Mood::Tired
    } else {
        Mood::Neutral
    }
}

/// One fixed-interval step: biological decay, kernel drift, narrative, mood.
pub fn tick<R: RandomSource + ?Sized>(creature: &Creature, tun: &Tunables, rng: &mut R) -> Creature {
    let mut next = creature.clone();
    let cfg = &tun.tick;
    let s = &mut next.stats;

    if next.condition.is_sleeping {
        s.energy = (s.energy + cfg.sleep_regen).clamp(0.0, s.max_energy);
        s.hunger = (s.hunger - cfg.hunger_decay / 2.0).clamp(0.0, 100.0);
    } else {
        s.energy = (s.energy - cfg.energy_decay).clamp(0.0, s.max_energy);
        s.hunger = (s.hunger - cfg.hunger_decay).clamp(0.0, 100.0);
    }
    s.age += 1;

    next.kernel = kernel::passive_drift(&next, &tun.kernel, rng);
    next.meta = narrative::update_narrative_tags(&next);
    next.condition.mood = derive_mood(&next);
    next
}

fn apply_effects(creature: &mut Creature, action: Stimulus, fx: &StatEffects) {
    let s = &mut creature.stats;
    match action {
        Stimulus::Feed => {
            s.hunger = (s.hunger + fx.feed_hunger).clamp(0.0, 100.0);
            s.weight += fx.feed_weight;
        }
        Stimulus::Train => {
            s.energy = (s.energy - fx.train_energy).clamp(0.0, s.max_energy);
            s.strength += fx.train_strength;
            s.exp += fx.train_exp;
            creature.history.training_sessions += 1;
        }
        Stimulus::Scan => {
            s.energy = (s.energy - fx.scan_energy).clamp(0.0, s.max_energy);
            s.exp += fx.scan_exp;
        }
        Stimulus::Sleep => creature.condition.is_sleeping = true,
        Stimulus::Wake => creature.condition.is_sleeping = false,
        Stimulus::Scold => creature.history.mistakes += 1,
        Stimulus::Ignore | Stimulus::Praise | Stimulus::Refusal => {}
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickOutcome {
    Advanced,
    /// Skipped because an evolution is syncing or rewriting.
    Frozen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRefusal {
    pub reason: RefusalReason,
    pub at_tick: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub sim_ticks: u64,
    pub frozen_ticks: u64,
    pub creature: Creature,
    pub evolution: EvolutionState,
    pub last_refusal: Option<LastRefusal>,
}

/// Caller-side owner of one creature. Threads the snapshot through the pure
/// core and holds the only mutable copy.
pub struct Session<R: RandomSource = SplitMix> {
    pub creature: Creature,
    pub evolution: EvolutionState,
    pub tunables: Tunables,
    pub table: EvolutionTable,
    pub inputs: InputWindow,
    pub sim_ticks: u64,
    pub frozen_ticks: u64,
    pub last_refusal: Option<LastRefusal>,
    sustained: bool,
    rng: R,
}

impl Session<SplitMix> {
    pub fn seeded(seed: u64, tunables: Tunables, table: EvolutionTable) -> Self {
        Session::new(Creature::new_default(), tunables, table, SplitMix::new(seed))
    }
}

impl<R: RandomSource> Session<R> {
    pub fn new(creature: Creature, tunables: Tunables, table: EvolutionTable, rng: R) -> Self {
        let inputs = InputWindow::new(tunables.narrative.window);
        Self {
            creature,
            evolution: EvolutionState::default(),
            tunables,
            table,
            inputs,
            sim_ticks: 0,
            frozen_ticks: 0,
            last_refusal: None,
            sustained: false,
            rng,
        }
    }

    /// Player command: safeguard, refusal, then (only if allowed) the stimulus
    /// and its stat effects. A refused command changes no stat or axis.
    pub fn command(&mut self, action: Stimulus) -> RefusalReason {
        let decision = refusal::check_refusal(&self.creature, action, &self.tunables, &mut self.rng);
        self.creature.meta = decision.meta;
        self.inputs.push(action);
        self.creature.meta =
            narrative::analyze_player_patterns(&self.creature, &self.inputs, &self.tunables.narrative);

        if decision.reason == RefusalReason::Dissociated {
            self.creature.condition.mood = derive_mood(&self.creature);
        }
        if decision.reason.is_refused() {
            self.last_refusal = Some(LastRefusal {
                reason: decision.reason,
                at_tick: self.sim_ticks,
            });
            return decision.reason;
        }

        self.creature.kernel = kernel::apply_stimulus(
            &self.creature.kernel,
            action,
            &self.creature.stats,
            &self.tunables.kernel,
        );
        apply_effects(&mut self.creature, action, &self.tunables.effects);
        RefusalReason::None
    }

    /// Always-allowed interaction such as a tap to praise.
    pub fn interact(&mut self, stimulus: Stimulus) {
        self.creature.kernel = kernel::apply_stimulus(
            &self.creature.kernel,
            stimulus,
            &self.creature.stats,
            &self.tunables.kernel,
        );
    }

    /// The player backed off after a refusal. Returns false, touching nothing,
    /// if there was none or it was a dissociation.
    pub fn acknowledge_refusal(&mut self) -> bool {
        match self.last_refusal.take() {
            None => false,
            Some(last) if last.reason == RefusalReason::Dissociated => {
                debug!("refusal acknowledged while dissociated; kernel untouched");
                false
            }
            Some(_) => {
                self.interact(Stimulus::Refusal);
                true
            }
        }
    }

    /// Main fixed-interval tick.
    pub fn tick(&mut self) -> TickOutcome {
        if self.evolution.phase.freezes_drift() {
            self.frozen_ticks += 1;
            debug!(phase = ?self.evolution.phase, "tick skipped during evolution");
            return TickOutcome::Frozen;
        }
        self.creature = tick(&self.creature, &self.tunables, &mut self.rng);
        self.sim_ticks += 1;
        self.evolution.poll(&self.creature, &self.table);
        TickOutcome::Advanced
    }

    /// Fast tick that integrates evolution sync progress.
    pub fn fast_tick(&mut self) {
        self.evolution.step(
            self.sustained,
            &mut self.creature,
            &self.table,
            &self.tunables.evolution,
        );
    }

    /// Sustain signal started (press and hold).
    pub fn press(&mut self) {
        self.sustained = true;
        self.evolution.begin_sync();
    }

    pub fn release(&mut self) {
        self.sustained = false;
    }

    pub fn is_sustained(&self) -> bool {
        self.sustained
    }

    pub fn resonate<L: ResonanceLink + ?Sized>(&mut self, link: &mut L) -> Option<ResonanceEffect> {
        let signal = link.poll()?;
        let effect = calculate_resonance(&self.creature, signal);
        let axes = &mut self.creature.kernel.axes;
        axes.stress += effect.stress_mod;
        axes.sync += effect.sync_mod;
        axes.clamp();
        Some(effect)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            sim_ticks: self.sim_ticks,
            frozen_ticks: self.frozen_ticks,
            creature: self.creature.clone(),
            evolution: self.evolution.clone(),
            last_refusal: self.last_refusal,
        }
    }
}
