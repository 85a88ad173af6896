//! Headless driver: replays a script of player steps against one session on a
//! simulated clock and prints the final snapshot as JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

use crate::config::{load_or_default, project_paths, save_json_atomic, Paths, Settings, Tunables};
use crate::error::KernelError;
use crate::evolution::EvolutionTable;
use crate::logging::init_tracing;
use crate::model::{RefusalReason, Stimulus};
use crate::sim::{Session, SessionSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// A player command that passes safeguard and refusal checks.
    Command(Stimulus),
    /// Always-allowed tap (praise).
    Tap,
    /// Back off after a refusal.
    Acknowledge,
    /// Hold the sustain signal for one full tick interval.
    Hold,
    /// Do nothing for one tick interval.
    Wait,
}

impl FromStr for Step {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tap" => Ok(Step::Tap),
            "ack" => Ok(Step::Acknowledge),
            "hold" => Ok(Step::Hold),
            "wait" => Ok(Step::Wait),
            _ => s.parse::<Stimulus>().map(Step::Command),
        }
    }
}

pub fn parse_script(args: &[String]) -> Result<Vec<Step>> {
    args.iter()
        .map(|a| a.parse::<Step>().with_context(|| format!("bad script step '{}'", a)))
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: String,
    pub refusal: RefusalReason,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub generated_utc: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    pub session: SessionSnapshot,
}

pub struct App {
    settings: Settings,
    session: Session,
}

impl App {
    pub fn new(settings: Settings, tunables: Tunables, table: EvolutionTable) -> Self {
        let session = Session::seeded(settings.seed, tunables, table);
        Self { settings, session }
    }

    fn init(paths: &Paths) -> Result<Self> {
        let settings: Settings = load_or_default(&paths.settings_path);
        if !paths.settings_path.exists() {
            save_json_atomic(&paths.settings_path, &settings)?;
        }
        init_tracing(&settings.log_filter)?;

        let tunables: Tunables = load_or_default(&paths.tunables_path);
        let table = if paths.evolution_path.exists() {
            EvolutionTable::load(&paths.evolution_path)
                .with_context(|| format!("invalid evolution table {}", paths.evolution_path.display()))?
        } else {
            EvolutionTable::default()
        };

        Ok(Self::new(settings, tunables, table))
    }

    /// Each step takes one main tick interval: the step's action, then the
    /// fast ticks that fit in the interval, then the main tick.
    pub fn run(&mut self, script: &[Step]) -> RunReport {
        let fast_steps = self.settings.sync_steps_per_tick();
        let mut steps = Vec::with_capacity(script.len());

        for (index, step) in script.iter().enumerate() {
            let mut refusal = RefusalReason::None;
            match *step {
                Step::Command(action) => refusal = self.session.command(action),
                Step::Tap => self.session.interact(Stimulus::Praise),
                Step::Acknowledge => {
                    self.session.acknowledge_refusal();
                }
                Step::Hold => self.session.press(),
                Step::Wait => {}
            }

            for _ in 0..fast_steps {
                self.session.fast_tick();
            }
            if *step == Step::Hold {
                self.session.release();
            }
            self.session.tick();

            steps.push(StepRecord {
                index,
                step: format!("{:?}", step),
                refusal,
            });
        }

        RunReport {
            generated_utc: Utc::now(),
            steps,
            session: self.session.snapshot(),
        }
    }
}

pub fn run(args: &[String]) -> Result<()> {
    let script = parse_script(args)?;
    let paths = project_paths()?;
    let mut app = App::init(&paths)?;
    let report = app.run(&script);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
