//! Simulation runner for the Agora kernel.
//!
//! Loads a YAML run configuration (or falls back to a built-in demo
//! world), assembles a tick engine around the seeded survival policy,
//! and runs it to completion, logging a summary at the end.
//!
//! Usage:
//!
//! ```text
//! agora-engine [config.yml]
//! ```
//!
//! Set `AGORA_EVENTS=<path>` to stream the event log to a JSONL file.

mod policy;

use tracing::info;
use tracing_subscriber::EnvFilter;

use agora_core::{NeedDecayHook, SimulationConfig, StabilityCheckHook};
use agora_events::JsonlSink;
use agora_types::HookPhase;

use crate::policy::SurvivalPolicy;

/// A small two-biome world used when no configuration file is given.
const DEMO_CONFIG: &str = r"
engine:
  seed: 42
  ticks: 50
world:
  locations:
    - id: forest
      name: The Forest
      location_type: forest
      resource_richness:
        wood: 40
        berries: 20
    - id: plains
      name: The Plains
      location_type: plains
      resource_richness:
        wheat: 30
  edges:
    - from: forest
      to: plains
      distance: 2.0
  regeneration:
    rates:
      wood: 1
      berries: 2
      wheat: 2
    ceilings:
      wood: 40
      berries: 20
      wheat: 30
recipes:
  - id: plank
    name: Wooden Plank
    inputs:
      wood: 2
    outputs:
      plank: 1
    skill_gains:
      carpentry: 0.5
  - id: bread
    name: Bread
    inputs:
      wheat: 3
    outputs:
      bread: 1
agents:
  - name: Ada
    location: forest
  - name: Ben
    location: forest
  - name: Cal
    location: plains
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("agora-engine starting");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(path, "loading configuration");
            SimulationConfig::from_yaml_file(&path)?
        }
        None => {
            info!("no configuration file given; using the built-in demo world");
            SimulationConfig::from_yaml_str(DEMO_CONFIG)?
        }
    };

    let seed = config.engine.seed.unwrap_or(0);
    let mut engine = config.build_engine(Box::new(SurvivalPolicy::new(seed)))?;
    engine
        .hooks_mut()
        .register(HookPhase::AfterTick, Box::new(NeedDecayHook::default()));
    engine
        .hooks_mut()
        .register(HookPhase::AfterTick, Box::new(StabilityCheckHook::new(1)));

    if let Ok(path) = std::env::var("AGORA_EVENTS") {
        info!(path, "streaming events to JSONL");
        engine = engine.with_sink(Box::new(JsonlSink::create(&path)?));
    }

    if config.engine.warmup_ticks > 0 {
        info!(ticks = config.engine.warmup_ticks, "running warmup");
        let _ = engine.warmup(config.engine.warmup_ticks);
    }

    let stats = engine.run(config.engine.ticks);

    let (succeeded, failed) = stats.iter().fold((0_u64, 0_u64), |(ok, bad), s| {
        (
            ok.saturating_add(s.actions_succeeded),
            bad.saturating_add(s.actions_failed),
        )
    });
    info!(
        ticks_run = stats.len(),
        actions_succeeded = succeeded,
        actions_failed = failed,
        avg_tick_ms = engine.average_tick_duration_ms(),
        agents = engine.agents().len(),
        "simulation finished"
    );

    Ok(())
}
