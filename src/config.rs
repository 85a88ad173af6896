use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub seed: u64,
    pub tick_step_ms: u64,
    pub sync_step_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0xC0FFEE_u64,
            tick_step_ms: 3000,
            sync_step_ms: 30,
            log_filter: "digikernel=info".to_string(),
        }
    }
}

impl Settings {
    /// Fast (sync) ticks that fit in one main tick.
    pub fn sync_steps_per_tick(&self) -> u64 {
        (self.tick_step_ms / self.sync_step_ms.max(1)).max(1)
    }
}

/// Biological decay applied by every main tick.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TickConfig {
    pub hunger_decay: f32,
    pub energy_decay: f32,
    pub sleep_regen: f32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            hunger_decay: 2.0,
            energy_decay: 1.0,
            sleep_regen: 5.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KernelTunables {
    pub fragment_enter_stress: f32,
    pub fragment_enter_stability: f32,
    pub fragment_exit_stress: f32,
    pub fragment_exit_stability: f32,
    pub distortion_threshold: f32,
    pub overload_stress: f32,
    pub overload_energy: f32,
    pub betrayal_wake_energy: f32,
    pub betrayal_stress: f32,
    pub abandonment_hunger: f32,
    pub safe_streak_threshold: u32,
    pub fragment_noise: f32,
    pub trust_regen_threshold: f32,
    pub stability_regen: f32,
    pub stability_decay: f32,
}

impl Default for KernelTunables {
    fn default() -> Self {
        Self {
            fragment_enter_stress: 90.0,
            fragment_enter_stability: 20.0,
            fragment_exit_stress: 50.0,
            fragment_exit_stability: 40.0,
            distortion_threshold: 30.0,
            overload_stress: 70.0,
            overload_energy: 10.0,
            betrayal_wake_energy: 20.0,
            betrayal_stress: 50.0,
            abandonment_hunger: 5.0,
            safe_streak_threshold: 10,
            fragment_noise: 5.0,
            trust_regen_threshold: 60.0,
            stability_regen: 0.5,
            stability_decay: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefusalTunables {
    pub train_energy_floor: f32,
    pub feed_hunger_ceiling: f32,
    pub fear_overload: f32,
    pub defiance_betrayal: f32,
    pub betrayal_trust_floor: f32,
    pub train_stress: f32,
    pub train_trust: f32,
    pub wake_energy: f32,
    pub wake_trust: f32,
    pub scan_stability: f32,
    pub chaotic_defiance_chance: f32,
}

impl Default for RefusalTunables {
    fn default() -> Self {
        Self {
            train_energy_floor: 5.0,
            feed_hunger_ceiling: 90.0,
            fear_overload: 50.0,
            defiance_betrayal: 40.0,
            betrayal_trust_floor: 20.0,
            train_stress: 80.0,
            train_trust: 40.0,
            wake_energy: 30.0,
            wake_trust: 50.0,
            scan_stability: 10.0,
            chaotic_defiance_chance: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SafeguardTunables {
    pub cruelty_trigger: f64,
    pub cruelty_decay: f64,
    pub dissociation_threshold: f64,
    pub dissociation_decay: f32,
    pub cruel_train_energy: f32,
    pub cruel_wake_energy: f32,
}

impl Default for SafeguardTunables {
    fn default() -> Self {
        Self {
            cruelty_trigger: 0.1,
            cruelty_decay: 0.05,
            dissociation_threshold: 0.8,
            dissociation_decay: 5.0,
            cruel_train_energy: 5.0,
            cruel_wake_energy: 20.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NarrativeTunables {
    pub window: usize,
    pub entropy_threshold: f32,
    pub confusion_trust: f32,
    pub confusion_step: f32,
    pub confusion_decay: f32,
}

impl Default for NarrativeTunables {
    fn default() -> Self {
        Self {
            window: 5,
            entropy_threshold: 0.9,
            confusion_trust: 30.0,
            confusion_step: 5.0,
            confusion_decay: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvolutionTunables {
    /// Progress gained per fast tick while the sustain signal is held.
    pub sync_gain: f32,
    /// Progress lost per fast tick once it is released.
    pub sync_decay: f32,
    /// Fast ticks spent in DATA_REWRITE before COMPLETE.
    pub rewrite_settle_ticks: u32,
    /// Fast ticks spent in COMPLETE before returning to IDLE.
    pub complete_hold_ticks: u32,
}

impl Default for EvolutionTunables {
    fn default() -> Self {
        Self {
            sync_gain: 2.0,
            sync_decay: 5.0,
            rewrite_settle_ticks: 33,
            complete_hold_ticks: 100,
        }
    }
}

/// Stat side effects of a command that was not refused.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatEffects {
    pub feed_hunger: f32,
    pub feed_weight: f32,
    pub train_energy: f32,
    pub train_strength: f32,
    pub train_exp: f32,
    pub scan_energy: f32,
    pub scan_exp: f32,
}

impl Default for StatEffects {
    fn default() -> Self {
        Self {
            feed_hunger: 20.0,
            feed_weight: 1.0,
            train_energy: 10.0,
            train_strength: 2.0,
            train_exp: 5.0,
            scan_energy: 5.0,
            scan_exp: 2.0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tunables {
    pub tick: TickConfig,
    pub kernel: KernelTunables,
    pub refusal: RefusalTunables,
    pub safeguard: SafeguardTunables,
    pub narrative: NarrativeTunables,
    pub evolution: EvolutionTunables,
    pub effects: StatEffects,
}

pub struct Paths {
    pub settings_path: PathBuf,
    pub tunables_path: PathBuf,
    pub evolution_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "digikernel", "Digikernel")
        .context("could not resolve project directories")?;
    let dir = data_dir(&proj);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    Ok(Paths::in_dir(&dir))
}

fn data_dir(proj: &ProjectDirs) -> PathBuf {
    proj.data_local_dir().to_path_buf()
}

impl Paths {
    /// Settings, tunables and the evolution table all live side by side.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            settings_path: dir.join("settings.json"),
            tunables_path: dir.join("tunables.json"),
            evolution_path: dir.join("evolution.json"),
        }
    }
}

/// Reads `path` as JSON, falling back to the default when missing or unreadable.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let Ok(s) = fs::read_to_string(path) else {
        return T::default();
    };
    match serde_json::from_str::<T>(&s) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable config, using defaults");
            T::default()
        }
    }
}

pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, data).with_context(|| format!("failed to write {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // Rename-over-existing is not atomic on Windows.
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
        .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tunables_fill_in_defaults() {
        let t: Tunables =
            serde_json::from_str(r#"{ "tick": { "hunger_decay": 4.0 }, "refusal": { "chaotic_defiance_chance": 0.0 } }"#)
                .unwrap();
        assert_eq!(t.tick.hunger_decay, 4.0);
        assert_eq!(t.tick.energy_decay, 1.0);
        assert_eq!(t.refusal.chaotic_defiance_chance, 0.0);
        assert_eq!(t.refusal.train_energy_floor, 5.0);
        assert_eq!(t.kernel, KernelTunables::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let s: Settings = load_or_default(Path::new("/definitely/not/here/settings.json"));
        assert_eq!(s.tick_step_ms, 3000);
        assert_eq!(s.sync_steps_per_tick(), 100);
    }

    #[test]
    fn save_then_load_settings() {
        let dir = std::env::temp_dir().join(format!("digikernel-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        let s = Settings {
            seed: 42,
            ..Settings::default()
        };
        save_json_atomic(&path, &s).unwrap();
        let back: Settings = load_or_default(&path);
        assert_eq!(back.seed, 42);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn files_live_in_the_local_data_dir() {
        let Some(proj) = ProjectDirs::from("com", "digikernel", "Digikernel") else {
            return;
        };
        let dir = data_dir(&proj);
        assert_eq!(dir, proj.data_local_dir());

        let paths = Paths::in_dir(&dir);
        for p in [&paths.settings_path, &paths.tunables_path, &paths.evolution_path] {
            assert_eq!(p.parent(), Some(dir.as_path()));
        }
        assert!(paths.evolution_path.ends_with("evolution.json"));
    }
}
