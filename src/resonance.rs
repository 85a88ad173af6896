//! Resonance with a remote creature. Interface only: no transport lives here.

use serde::{Deserialize, Serialize};

use crate::model::Creature;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteSignal {
    pub stress: f32,
    pub trust: f32,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResonanceEffect {
    pub stress_mod: f32,
    pub sync_mod: f32,
}

/// Source of remote signals, e.g. a network peer.
pub trait ResonanceLink {
    fn poll(&mut self) -> Option<RemoteSignal>;
}

/// A link that never hears anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl ResonanceLink for Silent {
    fn poll(&mut self) -> Option<RemoteSignal> {
        None
    }
}

pub fn calculate_resonance(local: &Creature, remote: RemoteSignal) -> ResonanceEffect {
    let stress = local.kernel.axes.stress;

    let mut stress_mod = 0.0;
    // Two anxious creatures feed each other.
    if stress > 60.0 && remote.stress > 60.0 {
        stress_mod = 0.5;
    }
    // A calm peer anchors an anxious one.
    if stress > 60.0 && remote.stress < 20.0 {
        stress_mod = -0.5;
    }

    let sync_mod = if (local.kernel.axes.trust - remote.trust).abs() > 50.0 {
        -1.0
    } else {
        1.0
    };

    ResonanceEffect {
        stress_mod,
        sync_mod,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anxious() -> Creature {
        let mut c = Creature::new_default();
        c.kernel.axes.stress = 70.0;
        c.kernel.axes.trust = 50.0;
        c
    }

    #[test]
    fn chorus_amplifies_and_anchor_soothes() {
        let e = calculate_resonance(&anxious(), RemoteSignal { stress: 65.0, trust: 40.0 });
        assert_eq!(e.stress_mod, 0.5);
        assert_eq!(e.sync_mod, 1.0);

        let e = calculate_resonance(&anxious(), RemoteSignal { stress: 10.0, trust: 40.0 });
        assert_eq!(e.stress_mod, -0.5);

        let e = calculate_resonance(&Creature::new_default(), RemoteSignal { stress: 90.0, trust: 20.0 });
        assert_eq!(e.stress_mod, 0.0);
    }

    #[test]
    fn trust_gap_creates_dissonance() {
        let e = calculate_resonance(&anxious(), RemoteSignal { stress: 40.0, trust: 0.0 });
        assert_eq!(e.sync_mod, 1.0);
        let e = calculate_resonance(&anxious(), RemoteSignal { stress: 40.0, trust: 100.1 });
        assert_eq!(e.sync_mod, -1.0);
    }

    #[test]
    fn silent_link_hears_nothing() {
        assert_eq!(Silent.poll(), None);
    }
}
