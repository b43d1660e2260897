//! Cuesport command-line harness
//!
//! `cuesport play [seed] [racks] [eight-ball|nine-ball|snooker] [model.json]`
//! plays computer-vs-computer racks and logs a summary. Personas that use
//! the aim model get the one in `model.json` (default `aim_model.json`).
//! `cuesport calibrate [seed] [samples] [out.json] [polynomial|piecewise|split]`
//! measures cut shots with the headless simulator, keeps the raw samples in
//! `aim_samples.json` and writes a fitted aim model.
//! `cuesport fit [samples.json] [out.json] [polynomial|piecewise|split]`
//! refits a model from saved samples.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use cuesport::ai::aim_model::{
    AimModelKind, FitMethod, ShotSample, collect_samples, load_samples, polynomial_terms, save_samples,
};
use cuesport::ai::{AimModel, Persona, PersonaRoster, PlannerConfig, ShotPlanner};
use cuesport::driver::play_rack;
use cuesport::sim::{RackKind, Table};
use cuesport::{Error, PhysicsConfig, Result};

const PHYSICS_FILE: &str = "physics.json";
const PERSONAS_FILE: &str = "personas.json";
const AIM_MODEL_FILE: &str = "aim_model.json";
const SAMPLES_FILE: &str = "aim_samples.json";
const DEFAULT_SEED: u64 = 42;
const MAX_SHOTS_PER_RACK: u32 = 200;

/// Arguments after the subcommand
struct Args {
    values: Vec<String>,
}

impl Args {
    fn from_env() -> (Option<String>, Self) {
        let mut args = std::env::args().skip(1);
        let command = args.next();
        (command, Self { values: args.collect() })
    }

    fn get<T: std::str::FromStr>(&self, index: usize, default: T) -> Result<T> {
        match self.values.get(index) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("could not parse argument '{}'", raw))),
            None => Ok(default),
        }
    }

    fn str_or<'a>(&'a self, index: usize, default: &'a str) -> &'a str {
        self.values.get(index).map(String::as_str).unwrap_or(default)
    }
}

fn parse_rack(name: &str) -> Result<RackKind> {
    match name.to_lowercase().as_str() {
        "eight-ball" | "8ball" | "eight" => Ok(RackKind::EightBall),
        "nine-ball" | "9ball" | "nine" => Ok(RackKind::NineBall),
        "snooker" => Ok(RackKind::Snooker),
        other => Err(Error::InvalidConfig(format!("unknown rack '{}'", other))),
    }
}

fn play(args: &Args, physics: PhysicsConfig) -> Result<()> {
    let seed = args.get(0, DEFAULT_SEED)?;
    let racks: u32 = args.get(1, 1)?;
    let kind = parse_rack(args.str_or(2, "eight-ball"))?;

    let table = Table::new(kind.preset());
    let roster = PersonaRoster::load(PERSONAS_FILE);
    let expert = roster.get("Expert").cloned().unwrap_or_else(Persona::expert);
    let intermediate = roster.get("Intermediate").cloned().unwrap_or_else(Persona::intermediate);

    let mut planner = ShotPlanner::new(PlannerConfig::default(), physics);
    if expert.use_aim_model || intermediate.use_aim_model {
        let path = args.str_or(3, AIM_MODEL_FILE);
        match AimModel::try_load(path) {
            Ok(model) => {
                log::info!("Loaded aim model from {}", path);
                planner = planner.with_aim_model(model);
            }
            Err(e) => log::warn!("Could not load aim model from {}: {}, aiming uncorrected", path, e),
        }
    }
    let mut rng = Pcg32::seed_from_u64(seed);

    let mut wins = [0u32; 2];
    let mut shots = 0;
    let mut non_converged = 0;
    for i in 0..racks {
        // Alternate who breaks
        let personas = if i % 2 == 0 {
            [&expert, &intermediate]
        } else {
            [&intermediate, &expert]
        };
        let report = play_rack(kind, &table, &planner, personas, MAX_SHOTS_PER_RACK, &mut rng);
        shots += report.shots;
        non_converged += report.non_converged;
        if let Some(winner) = report.winner {
            // Credit by persona, not seat
            let expert_won = (winner == 0) == (i % 2 == 0);
            wins[if expert_won { 0 } else { 1 }] += 1;
        }
    }

    log::info!(
        "{} x {}: {} {} - {} {}, {} shots, {} did not settle",
        racks,
        kind.as_str(),
        expert.name,
        wins[0],
        wins[1],
        intermediate.name,
        shots,
        non_converged
    );
    Ok(())
}

/// Fit `method` to `samples` and write the model to `out`
fn fit_and_save(samples: &[ShotSample], method: FitMethod, out: &str) -> Result<()> {
    let model = AimModel::fit(samples, method, method.default_ridge())?;
    if let AimModelKind::Polynomial { degree, coefficients } = &model.model {
        for (name, c) in polynomial_terms(*degree).iter().zip(coefficients) {
            log::debug!("  {:>24} {:+.6e}", name, c);
        }
    }
    model.save(out)?;
    let holdout = model.holdout.unwrap_or(model.training);
    log::info!(
        "Wrote {} model to {} (holdout R^2 {:.3}, RMSE {:.3} deg)",
        method.as_str(),
        out,
        holdout.r_squared,
        holdout.rmse
    );
    Ok(())
}

fn calibrate(args: &Args, physics: PhysicsConfig) -> Result<()> {
    let seed = args.get(0, DEFAULT_SEED)?;
    let count: usize = args.get(1, 400)?;
    let out = args.str_or(2, AIM_MODEL_FILE);
    let method: FitMethod = args.get(3, FitMethod::default())?;

    let table = Table::new(cuesport::TablePreset::Pool9ft);
    let planner = ShotPlanner::new(PlannerConfig::default(), physics);
    let mut rng = Pcg32::seed_from_u64(seed);

    let samples = collect_samples(&planner, &table, count, &mut rng);
    log::info!("Collected {} of {} samples", samples.len(), count);
    save_samples(&samples, SAMPLES_FILE)?;

    fit_and_save(&samples, method, out)
}

fn fit(args: &Args) -> Result<()> {
    let input = args.str_or(0, SAMPLES_FILE);
    let out = args.str_or(1, AIM_MODEL_FILE);
    let method: FitMethod = args.get(2, FitMethod::default())?;

    let samples = load_samples(input)?;
    log::info!("Loaded {} samples from {}", samples.len(), input);
    fit_and_save(&samples, method, out)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (command, args) = Args::from_env();
    let physics = PhysicsConfig::load(PHYSICS_FILE);

    let result = match command.as_deref() {
        Some("play") | None => play(&args, physics),
        Some("calibrate") => calibrate(&args, physics),
        Some("fit") => fit(&args),
        Some(other) => Err(Error::InvalidConfig(format!(
            "unknown command '{}', expected 'play', 'calibrate' or 'fit'",
            other
        ))),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
