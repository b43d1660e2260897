//! Aim-error regression
//!
//! Predicts how far (degrees) the object ball leaves off its intended line.
//! Three model shapes are fitted by (ridge) least squares from samples
//! collected with the headless simulator:
//!
//! * `Polynomial`: one polynomial in cut angle, vertical spin and power.
//! * `Piecewise`: a cubic in cut angle for thin cuts, and a linear model in
//!   cut angle, power, cue-to-object distance and cut x distance for the
//!   rest.
//! * `Split`: the power range is cut into brackets; each bracket searches
//!   for the cut angle that best separates two cubics in (cut, power).
//!
//! When there are enough samples a fixed fifth of them is held back and
//! scored separately from the training fit.

use std::path::Path;
use std::str::FromStr;

use glam::DVec2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::headless::ShotSimulator;
use super::planner::{ShotPlanner, cut_side};
use crate::error::{Error, Result};
use crate::sim::{BallKind, BallSet, PocketId, ShotIntent, ShotSpin, Table};

/// Largest correction the model may suggest (degrees)
pub const MAX_PREDICTION_DEG: f64 = 15.0;

/// Default cut angle dividing a piecewise model (degrees)
pub const PIECEWISE_SPLIT_DEG: f64 = 30.0;

const FEATURE_NAMES: [&str; 3] = ["cut_angle", "spin_y", "power"];

const HOLDOUT_FRACTION: f64 = 0.2;
const HOLDOUT_SEED: u64 = 42;
/// Below this every sample trains and nothing is held back
const MIN_HOLDOUT_SAMPLES: usize = 50;

// Split models
const SPLIT_SEARCH_MIN_DEG: u32 = 10;
const SPLIT_SEARCH_MAX_DEG: u32 = 60;
const MIN_SAMPLES_PER_BRACKET: usize = 10;
const MIN_SAMPLES_PER_SIDE: usize = 5;

/// What a model sees of a shot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShotFeatures {
    pub cut_angle: f64,
    pub spin_y: f64,
    pub power: f64,
    pub cue_to_target_dist: f64,
}

/// One measured shot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotSample {
    pub cut_angle: f64,
    pub spin_y: f64,
    pub power: f64,
    pub cue_to_target_dist: f64,
    /// Measured minus intended object-ball direction, positive toward the
    /// side the ball is cut to
    pub angle_error: f64,
}

impl ShotSample {
    pub fn features(&self) -> ShotFeatures {
        ShotFeatures {
            cut_angle: self.cut_angle,
            spin_y: self.spin_y,
            power: self.power,
            cue_to_target_dist: self.cue_to_target_dist,
        }
    }
}

pub fn load_samples(path: impl AsRef<Path>) -> Result<Vec<ShotSample>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn save_samples(samples: &[ShotSample], path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(samples)?)?;
    Ok(())
}

/// Monomials up to `degree` in `features` variables, as lists of feature
/// indices, constant first
///
/// Three features at degree 2 give
/// `[], [0], [1], [2], [0,0], [0,1], [0,2], [1,1], [1,2], [2,2]`.
fn monomials(features: usize, degree: u32) -> Vec<Vec<usize>> {
    let mut terms = vec![Vec::new()];
    let mut previous: Vec<Vec<usize>> = vec![Vec::new()];
    for _ in 0..degree {
        let mut next = Vec::new();
        for term in &previous {
            let start = term.last().copied().unwrap_or(0);
            for f in start..features {
                let mut t = term.clone();
                t.push(f);
                next.push(t);
            }
        }
        terms.extend(next.iter().cloned());
        previous = next;
    }
    terms
}

fn evaluate_terms(terms: &[Vec<usize>], x: &[f64]) -> Vec<f64> {
    terms.iter().map(|t| t.iter().map(|&i| x[i]).product()).collect()
}

fn dot(row: &[f64], coefficients: &[f64]) -> f64 {
    row.iter().zip(coefficients).map(|(x, c)| x * c).sum()
}

fn polynomial_row(degree: u32, f: &ShotFeatures) -> Vec<f64> {
    evaluate_terms(&monomials(3, degree), &[f.cut_angle, f.spin_y, f.power])
}

fn bracket_row(degree: u32, f: &ShotFeatures) -> Vec<f64> {
    evaluate_terms(&monomials(2, degree), &[f.cut_angle, f.power])
}

fn thin_cut_row(f: &ShotFeatures) -> [f64; 4] {
    let c = f.cut_angle;
    [1.0, c, c * c, c * c * c]
}

fn thick_cut_row(f: &ShotFeatures) -> [f64; 5] {
    let (c, d) = (f.cut_angle, f.cue_to_target_dist);
    [1.0, c, f.power, d, c * d]
}

/// Names of the polynomial model's terms, e.g. `cut_angle*power`
pub fn polynomial_terms(degree: u32) -> Vec<String> {
    monomials(3, degree)
        .iter()
        .map(|t| {
            if t.is_empty() {
                "1".to_string()
            } else {
                t.iter().map(|&i| FEATURE_NAMES[i]).collect::<Vec<_>>().join("*")
            }
        })
        .collect()
}

/// Solve `a * x = b` in place by Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()))
        .max(f64::MIN_POSITIVE);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() <= scale * 1e-12 {
            return Err(Error::SingularSystem);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

/// Ridge least squares over design `rows`; column 0 is the unpenalised
/// constant
///
/// Columns are equilibrated before solving so cubic and cross terms of
/// very different magnitude do not swamp the pivot test. The ridge is
/// applied to the unscaled coefficients.
fn least_squares(rows: &[Vec<f64>], targets: &[f64], ridge: f64) -> Result<Vec<f64>> {
    let n = rows.first().map_or(0, Vec::len);
    let mut ata = vec![vec![0.0; n]; n];
    let mut aty = vec![0.0; n];
    for (row, &y) in rows.iter().zip(targets) {
        for i in 0..n {
            aty[i] += row[i] * y;
            for j in 0..n {
                ata[i][j] += row[i] * row[j];
            }
        }
    }

    let scale: Vec<f64> = (0..n)
        .map(|i| if ata[i][i] > 0.0 { ata[i][i].sqrt() } else { 1.0 })
        .collect();
    for i in 0..n {
        for j in 0..n {
            ata[i][j] /= scale[i] * scale[j];
        }
        if i > 0 {
            ata[i][i] += ridge / (scale[i] * scale[i]);
        }
        aty[i] /= scale[i];
    }

    let scaled = solve(ata, aty)?;
    Ok(scaled.iter().zip(&scale).map(|(x, s)| x / s).collect())
}

/// Fit `row` against the samples' angle errors
fn fit_rows<const N: usize>(
    samples: &[ShotSample],
    row: impl Fn(&ShotFeatures) -> [f64; N],
    ridge: f64,
) -> Result<[f64; N]> {
    if samples.len() < N {
        return Err(Error::NotEnoughSamples {
            needed: N,
            got: samples.len(),
        });
    }
    let rows: Vec<Vec<f64>> = samples.iter().map(|s| row(&s.features()).to_vec()).collect();
    let targets: Vec<f64> = samples.iter().map(|s| s.angle_error).collect();
    least_squares(&rows, &targets, ridge)?
        .try_into()
        .map_err(|_| Error::SingularSystem)
}

/// Fit a polynomial of `degree` in the listed features
fn fit_polynomial_rows(
    samples: &[ShotSample],
    row: impl Fn(&ShotFeatures) -> Vec<f64>,
    terms: usize,
    ridge: f64,
) -> Result<Vec<f64>> {
    if samples.len() < terms {
        return Err(Error::NotEnoughSamples {
            needed: terms,
            got: samples.len(),
        });
    }
    let rows: Vec<Vec<f64>> = samples.iter().map(|s| row(&s.features())).collect();
    let targets: Vec<f64> = samples.iter().map(|s| s.angle_error).collect();
    least_squares(&rows, &targets, ridge)
}

/// Which model shape to fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FitMethod {
    Polynomial { degree: u32 },
    Piecewise { split: f64 },
    Split { degree: u32, brackets: usize },
}

impl FitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMethod::Polynomial { .. } => "polynomial",
            FitMethod::Piecewise { .. } => "piecewise",
            FitMethod::Split { .. } => "split",
        }
    }

    /// Shape with its usual settings, by name
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "polynomial" | "poly" => Ok(FitMethod::Polynomial { degree: 2 }),
            "piecewise" => Ok(FitMethod::Piecewise {
                split: PIECEWISE_SPLIT_DEG,
            }),
            "split" => Ok(FitMethod::Split { degree: 3, brackets: 4 }),
            _ => Err(Error::InvalidConfig(format!("unknown aim model '{}'", s))),
        }
    }

    /// Ridge penalty the shape is normally fitted with
    pub fn default_ridge(&self) -> f64 {
        match self {
            FitMethod::Polynomial { .. } => 1e-3,
            FitMethod::Piecewise { .. } => 0.0,
            FitMethod::Split { .. } => 1.0,
        }
    }
}

impl Default for FitMethod {
    fn default() -> Self {
        FitMethod::Polynomial { degree: 2 }
    }
}

impl FromStr for FitMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One power range of a split model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerBracket {
    pub min_power: f64,
    /// Exclusive
    pub max_power: f64,
    /// Cuts below this use `left`, the rest `right` (degrees)
    pub split: f64,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
    pub samples: usize,
}

impl PowerBracket {
    fn contains(&self, power: f64) -> bool {
        power >= self.min_power && power < self.max_power
    }

    fn raw(&self, degree: u32, f: &ShotFeatures) -> f64 {
        let coefficients = if f.cut_angle < self.split { &self.left } else { &self.right };
        dot(&bracket_row(degree, f), coefficients)
    }
}

/// Bracket covering `power`, or the nearest end bracket outside the range
fn bracket_for(brackets: &[PowerBracket], power: f64) -> Option<&PowerBracket> {
    brackets.iter().find(|b| b.contains(power)).or_else(|| match brackets.first() {
        Some(first) if power < first.min_power => Some(first),
        _ => brackets.last(),
    })
}

/// Fitted model shape and its coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AimModelKind {
    /// Coefficients follow `polynomial_terms(degree)`
    Polynomial { degree: u32, coefficients: Vec<f64> },
    /// `low` is `1, c, c², c³`; `high` is `1, c, power, dist, c*dist`
    Piecewise { split: f64, low: [f64; 4], high: [f64; 5] },
    /// Bracket coefficients follow the monomials of (cut, power)
    Split { degree: u32, brackets: Vec<PowerBracket> },
}

impl AimModelKind {
    fn raw(&self, f: &ShotFeatures) -> f64 {
        match self {
            AimModelKind::Polynomial { degree, coefficients } => dot(&polynomial_row(*degree, f), coefficients),
            AimModelKind::Piecewise { split, low, high } => {
                if f.cut_angle <= *split {
                    dot(&thin_cut_row(f), low)
                } else {
                    dot(&thick_cut_row(f), high)
                }
            }
            AimModelKind::Split { degree, brackets } => {
                bracket_for(brackets, f.power).map_or(0.0, |b| b.raw(*degree, f))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            AimModelKind::Polynomial { degree, coefficients } => {
                let needed = monomials(3, *degree).len();
                if coefficients.len() != needed {
                    return Err(Error::InvalidConfig(format!(
                        "aim model of degree {} needs {} coefficients, got {}",
                        degree,
                        needed,
                        coefficients.len()
                    )));
                }
            }
            AimModelKind::Piecewise { split, .. } => {
                if !split.is_finite() {
                    return Err(Error::InvalidConfig("piecewise split must be finite".to_string()));
                }
            }
            AimModelKind::Split { degree, brackets } => {
                if brackets.is_empty() {
                    return Err(Error::InvalidConfig("split aim model has no power brackets".to_string()));
                }
                let needed = monomials(2, *degree).len();
                for b in brackets {
                    if b.left.len() != needed || b.right.len() != needed {
                        return Err(Error::InvalidConfig(format!(
                            "power bracket [{}, {}) needs {} coefficients per side",
                            b.min_power, b.max_power, needed
                        )));
                    }
                    if !(b.min_power <= b.max_power) {
                        return Err(Error::InvalidConfig(format!(
                            "power bracket [{}, {}) is inverted",
                            b.min_power, b.max_power
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Goodness of fit over a set of samples
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitMetrics {
    pub r_squared: f64,
    /// Root-mean-square residual (degrees)
    pub rmse: f64,
    pub samples: usize,
}

impl FitMetrics {
    fn measure(samples: &[ShotSample], predict: impl Fn(&ShotFeatures) -> f64) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mean = samples.iter().map(|s| s.angle_error).sum::<f64>() / samples.len() as f64;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for sample in samples {
            ss_res += (sample.angle_error - predict(&sample.features())).powi(2);
            ss_tot += (sample.angle_error - mean).powi(2);
        }
        Self {
            r_squared: if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 },
            rmse: (ss_res / samples.len() as f64).sqrt(),
            samples: samples.len(),
        }
    }
}

/// Seeded train/test split; small sets train on everything
fn holdout_split(samples: &[ShotSample]) -> (Vec<ShotSample>, Vec<ShotSample>) {
    if samples.len() < MIN_HOLDOUT_SAMPLES {
        return (samples.to_vec(), Vec::new());
    }
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.shuffle(&mut Pcg32::seed_from_u64(HOLDOUT_SEED));
    let held = (samples.len() as f64 * HOLDOUT_FRACTION).round() as usize;
    let test = order[..held].iter().map(|&i| samples[i]).collect();
    let train = order[held..].iter().map(|&i| samples[i]).collect();
    (train, test)
}

fn fit_piecewise(train: &[ShotSample], split: f64, ridge: f64) -> Result<AimModelKind> {
    let (thin, thick): (Vec<ShotSample>, Vec<ShotSample>) = train.iter().partition(|s| s.cut_angle <= split);
    Ok(AimModelKind::Piecewise {
        split,
        low: fit_rows(&thin, thin_cut_row, ridge)?,
        high: fit_rows(&thick, thick_cut_row, ridge)?,
    })
}

/// Best cut split for one bracket, scored on `scored`
fn fit_bracket(
    train: &[ShotSample],
    scored: &[ShotSample],
    degree: u32,
    range: (f64, f64),
    ridge: f64,
) -> Option<(f64, PowerBracket)> {
    let terms = monomials(2, degree).len();
    let mut best: Option<(f64, PowerBracket)> = None;
    for split in SPLIT_SEARCH_MIN_DEG..=SPLIT_SEARCH_MAX_DEG {
        let split = split as f64;
        let (left, right): (Vec<ShotSample>, Vec<ShotSample>) = train.iter().partition(|s| s.cut_angle < split);
        if left.len() < MIN_SAMPLES_PER_SIDE || right.len() < MIN_SAMPLES_PER_SIDE {
            continue;
        }
        let row = |f: &ShotFeatures| bracket_row(degree, f);
        let (Ok(l), Ok(r)) = (
            fit_polynomial_rows(&left, row, terms, ridge),
            fit_polynomial_rows(&right, row, terms, ridge),
        ) else {
            continue;
        };
        let bracket = PowerBracket {
            min_power: range.0,
            max_power: range.1,
            split,
            left: l,
            right: r,
            samples: train.len(),
        };
        let rmse = FitMetrics::measure(scored, |f| bracket.raw(degree, f)).rmse;
        if best.as_ref().is_none_or(|(score, _)| rmse < *score) {
            best = Some((rmse, bracket));
        }
    }
    best
}

fn fit_split(
    train: &[ShotSample],
    test: &[ShotSample],
    degree: u32,
    brackets: usize,
    ridge: f64,
) -> Result<AimModelKind> {
    let lo = train.iter().map(|s| s.power).fold(f64::INFINITY, f64::min);
    let hi = train.iter().map(|s| s.power).fold(f64::NEG_INFINITY, f64::max);
    let count = brackets.max(1);
    let width = if hi > lo { (hi - lo) / count as f64 } else { 0.0 };

    let mut fitted = Vec::new();
    for i in 0..count {
        let min_power = lo + width * i as f64;
        // The last bracket closes over the largest power seen
        let max_power = if i + 1 == count { hi + 1e-9 } else { lo + width * (i + 1) as f64 };
        let inside = |s: &&ShotSample| s.power >= min_power && s.power < max_power;
        let bracket_train: Vec<ShotSample> = train.iter().filter(inside).copied().collect();
        if bracket_train.len() < MIN_SAMPLES_PER_BRACKET {
            log::debug!("Power bracket [{:.1}, {:.1}) skipped: {} samples", min_power, max_power, bracket_train.len());
            continue;
        }
        let bracket_test: Vec<ShotSample> = test.iter().filter(inside).copied().collect();
        let scored = if bracket_test.is_empty() { &bracket_train } else { &bracket_test };

        match fit_bracket(&bracket_train, scored, degree, (min_power, max_power), ridge) {
            Some((rmse, bracket)) => {
                log::debug!(
                    "Power bracket [{:.1}, {:.1}): split at {} deg, RMSE {:.4}",
                    min_power,
                    max_power,
                    bracket.split,
                    rmse
                );
                fitted.push(bracket);
            }
            None => log::debug!("Power bracket [{:.1}, {:.1}): no usable split", min_power, max_power),
        }
    }

    if fitted.is_empty() {
        return Err(Error::NotEnoughSamples {
            needed: MIN_SAMPLES_PER_BRACKET,
            got: train.len(),
        });
    }
    Ok(AimModelKind::Split {
        degree,
        brackets: fitted,
    })
}

/// Fitted aim-error model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AimModel {
    pub model: AimModelKind,
    pub ridge: f64,
    /// Fit on the samples it was trained on
    pub training: FitMetrics,
    /// Fit on the held-back samples, when there were enough to hold some
    pub holdout: Option<FitMetrics>,
}

impl AimModel {
    /// Wrap a model that was not fitted here
    pub fn from_kind(model: AimModelKind) -> Self {
        Self {
            model,
            ridge: 0.0,
            training: FitMetrics::default(),
            holdout: None,
        }
    }

    /// Fit `method` to `samples`
    ///
    /// The ridge penalty is never applied to a constant term.
    pub fn fit(samples: &[ShotSample], method: FitMethod, ridge: f64) -> Result<Self> {
        let ridge = ridge.max(0.0);
        let (train, test) = holdout_split(samples);

        let model = match method {
            FitMethod::Polynomial { degree } => AimModelKind::Polynomial {
                degree,
                coefficients: fit_polynomial_rows(
                    &train,
                    |f| polynomial_row(degree, f),
                    monomials(3, degree).len(),
                    ridge,
                )?,
            },
            FitMethod::Piecewise { split } => fit_piecewise(&train, split, ridge)?,
            FitMethod::Split { degree, brackets } => fit_split(&train, &test, degree, brackets, ridge)?,
        };

        let training = FitMetrics::measure(&train, |f| model.raw(f));
        let holdout = (!test.is_empty()).then(|| FitMetrics::measure(&test, |f| model.raw(f)));

        log::info!(
            "Fitted {} aim model on {} samples: R² {:.4}, RMSE {:.4} deg",
            method.as_str(),
            train.len(),
            training.r_squared,
            training.rmse
        );
        if let Some(h) = &holdout {
            log::info!("Holdout of {} samples: R² {:.4}, RMSE {:.4} deg", h.samples, h.r_squared, h.rmse);
        }

        Ok(Self {
            model,
            ridge,
            training,
            holdout,
        })
    }

    /// Predicted angle error in degrees, limited to ±15°
    pub fn predict(&self, shot: &ShotFeatures) -> f64 {
        let raw = self.model.raw(shot);
        if raw.is_finite() {
            raw.clamp(-MAX_PREDICTION_DEG, MAX_PREDICTION_DEG)
        } else {
            0.0
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.model.validate()?;
        Ok(model)
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}


/// Measure `count` random cut shots on `table`
///
/// Each sample places a cue ball and an object ball at random, aims at a
/// random pocket with the planner's ghost-ball line, and records how far
/// the object ball leaves off the pocket line. Layouts the planner rejects
/// are skipped.
pub fn collect_samples<R: Rng + ?Sized>(
    planner: &ShotPlanner,
    table: &Table,
    count: usize,
    rng: &mut R,
) -> Vec<ShotSample> {
    let sim = ShotSimulator::new(table, planner.physics().clone()).with_max_ticks(600);
    let r = table.ball_radius;
    let margin = 4.0 * r;
    let (min, max) = (table.bounds.min + DVec2::splat(margin), table.bounds.max - DVec2::splat(margin));
    let physics = planner.physics();
    let min_power = physics.min_power.max(10.0).min(physics.max_power);

    let mut samples = Vec::with_capacity(count);
    if table.pockets.is_empty() {
        return samples;
    }
    let mut attempts = 0;
    while samples.len() < count && attempts < count * 50 {
        attempts += 1;

        let cue_pos = DVec2::new(rng.random_range(min.x..=max.x), rng.random_range(min.y..=max.y));
        let target_pos = DVec2::new(rng.random_range(min.x..=max.x), rng.random_range(min.y..=max.y));
        let pocket = PocketId(rng.random_range(0..table.pockets.len()));
        let spin_y = rng.random_range(-1.0..=1.0);
        let power = rng.random_range(min_power..=physics.max_power);
        if cue_pos.distance(target_pos) < 4.0 * r {
            continue;
        }

        let mut balls = BallSet::new();
        balls.spawn(BallKind::Cue, cue_pos, r);
        let target = balls.spawn(BallKind::Numbered(1), target_pos, r);
        let Ok(candidate) = planner.evaluate_pair(&balls, table, target, pocket) else {
            continue;
        };

        let pocket_pos = table.pocket(pocket).position;
        let intended = pocket_pos - target_pos;
        let intent = ShotIntent::new(candidate.aim, power).with_spin(ShotSpin { side: 0.0, vertical: spin_y });
        let Some(error) = sim.measure_throw(&balls, &intent, target, intended) else {
            continue;
        };

        samples.push(ShotSample {
            cut_angle: candidate.cut_angle_deg,
            spin_y,
            power,
            cue_to_target_dist: cue_pos.distance(target_pos),
            angle_error: error * cut_side(cue_pos, target_pos, pocket_pos),
        });
    }
    log::debug!("Collected {} aim samples in {} attempts", samples.len(), attempts);
    samples
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::planner::PlannerConfig;
    use crate::settings::{PhysicsConfig, TablePreset};

    fn synthetic(count: usize, f: impl Fn(&ShotFeatures) -> f64) -> Vec<ShotSample> {
        let mut rng = Pcg32::seed_from_u64(17);
        (0..count)
            .map(|_| {
                let features = ShotFeatures {
                    cut_angle: rng.random_range(0.0..85.0),
                    spin_y: rng.random_range(-1.0..1.0),
                    power: rng.random_range(10.0..100.0),
                    cue_to_target_dist: rng.random_range(50.0..1000.0),
                };
                ShotSample {
                    cut_angle: features.cut_angle,
                    spin_y: features.spin_y,
                    power: features.power,
                    cue_to_target_dist: features.cue_to_target_dist,
                    angle_error: f(&features),
                }
            })
            .collect()
    }

    fn shot(cut_angle: f64, spin_y: f64, power: f64, cue_to_target_dist: f64) -> ShotFeatures {
        ShotFeatures {
            cut_angle,
            spin_y,
            power,
            cue_to_target_dist,
        }
    }

    fn coefficients(model: &AimModel) -> &[f64] {
        match &model.model {
            AimModelKind::Polynomial { coefficients, .. } => coefficients,
            other => panic!("expected a polynomial model, got {other:?}"),
        }
    }

    #[test]
    fn test_monomial_layout() {
        assert_eq!(monomials(3, 0).len(), 1);
        assert_eq!(monomials(3, 1).len(), 4);
        assert_eq!(monomials(3, 2).len(), 10);
        assert_eq!(monomials(3, 3).len(), 20);
        assert_eq!(monomials(2, 3).len(), 10);
        let names = polynomial_terms(2);
        assert_eq!(names[0], "1");
        assert_eq!(names[1], "cut_angle");
        assert_eq!(names[5], "cut_angle*spin_y");
        assert_eq!(names[9], "power*power");
    }

    #[test]
    fn test_fit_recovers_linear_model() {
        let samples = synthetic(200, |f| 0.5 + 0.04 * f.cut_angle - 1.5 * f.spin_y + 0.01 * f.power);
        let model = AimModel::fit(&samples, FitMethod::Polynomial { degree: 1 }, 0.0).unwrap();
        let expected = [0.5, 0.04, -1.5, 0.01];
        for (got, want) in coefficients(&model).iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
        assert!(model.training.r_squared > 0.999_999);
        assert!(model.training.rmse < 1e-6);
        assert!((model.predict(&shot(30.0, 0.2, 50.0, 300.0)) - (0.5 + 1.2 - 0.3 + 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_fit_recovers_interaction_term() {
        let samples = synthetic(200, |f| 0.002 * f.cut_angle * f.cut_angle - 0.03 * f.cut_angle * f.spin_y);
        let model = AimModel::fit(&samples, FitMethod::Polynomial { degree: 2 }, 0.0).unwrap();
        let names = polynomial_terms(2);
        let coef = |name: &str| coefficients(&model)[names.iter().position(|n| n == name).unwrap()];
        assert!((coef("cut_angle*cut_angle") - 0.002).abs() < 1e-5);
        assert!((coef("cut_angle*spin_y") + 0.03).abs() < 1e-5);
        assert!(coef("power").abs() < 1e-4);
        assert!(model.training.r_squared > 0.9999);
    }

    #[test]
    fn test_holdout_scored_separately() {
        let samples = synthetic(200, |f| 0.03 * f.cut_angle);
        let model = AimModel::fit(&samples, FitMethod::Polynomial { degree: 1 }, 0.0).unwrap();
        assert_eq!(model.training.samples, 160);
        let holdout = model.holdout.expect("enough samples to hold some back");
        assert_eq!(holdout.samples, 40);
        assert!(holdout.r_squared > 0.9999);

        let few = AimModel::fit(&samples[..20], FitMethod::Polynomial { degree: 1 }, 0.0).unwrap();
        assert_eq!(few.training.samples, 20);
        assert!(few.holdout.is_none());
    }

    #[test]
    fn test_piecewise_fits_each_side_of_the_break() {
        let thin = |c: f64| 0.1 + 0.01 * c - 0.001 * c * c + 0.00002 * c * c * c;
        let thick = |f: &ShotFeatures| {
            -0.5 + 0.02 * f.cut_angle + 0.01 * f.power + 0.001 * f.cue_to_target_dist
                - 0.00001 * f.cut_angle * f.cue_to_target_dist
        };
        let samples = synthetic(400, |f| if f.cut_angle <= PIECEWISE_SPLIT_DEG { thin(f.cut_angle) } else { thick(f) });
        let method = FitMethod::parse("piecewise").unwrap();
        let model = AimModel::fit(&samples, method, method.default_ridge()).unwrap();
        assert!(matches!(model.model, AimModelKind::Piecewise { split, .. } if split == PIECEWISE_SPLIT_DEG));

        let low = shot(12.0, 0.0, 40.0, 500.0);
        assert!((model.predict(&low) - thin(12.0)).abs() < 1e-4);
        // Distance matters only above the break
        let far = shot(12.0, 0.0, 40.0, 900.0);
        assert!((model.predict(&far) - model.predict(&low)).abs() < 1e-9);
        let high = shot(55.0, 0.0, 70.0, 600.0);
        assert!((model.predict(&high) - thick(&high)).abs() < 1e-4);
        assert!(model.holdout.unwrap().r_squared > 0.9999);
    }

    #[test]
    fn test_piecewise_needs_samples_on_both_sides() {
        let samples: Vec<ShotSample> = synthetic(100, |f| f.cut_angle)
            .into_iter()
            .filter(|s| s.cut_angle > PIECEWISE_SPLIT_DEG)
            .collect();
        let err = AimModel::fit(&samples, FitMethod::Piecewise { split: PIECEWISE_SPLIT_DEG }, 0.0).unwrap_err();
        assert!(matches!(err, Error::NotEnoughSamples { needed: 4, got: 0 }));
    }

    #[test]
    fn test_split_model_finds_the_cut_break() {
        // Continuous, with a change of slope at 40 degrees
        let truth = |f: &ShotFeatures| {
            let c = f.cut_angle;
            let kinked = if c < 40.0 { 0.05 * c } else { 2.0 - 0.1 * (c - 40.0) };
            kinked + 0.01 * f.power
        };
        let samples = synthetic(600, truth);
        let model = AimModel::fit(&samples, FitMethod::Split { degree: 3, brackets: 2 }, 0.0).unwrap();
        let AimModelKind::Split { brackets, .. } = &model.model else {
            panic!("expected a split model");
        };
        assert_eq!(brackets.len(), 2);
        for bracket in brackets {
            assert!((bracket.split - 40.0).abs() <= 2.0, "split at {}", bracket.split);
        }
        assert!(brackets[0].max_power <= brackets[1].min_power + 1e-9);

        for f in [shot(20.0, 0.0, 30.0, 0.0), shot(60.0, 0.0, 80.0, 0.0)] {
            assert!((model.predict(&f) - truth(&f)).abs() < 1e-4);
        }
        // Powers outside the fitted range use the nearest bracket
        let beyond = shot(20.0, 0.0, 150.0, 0.0);
        assert!((model.predict(&beyond) - truth(&beyond)).abs() < 1e-3);
        assert!(model.holdout.unwrap().rmse < 1e-4);
    }

    #[test]
    fn test_prediction_is_clamped() {
        let model = AimModel::from_kind(AimModelKind::Polynomial {
            degree: 1,
            coefficients: vec![0.0, 1.0, 0.0, 0.0],
        });
        assert_eq!(model.predict(&shot(80.0, 0.0, 50.0, 0.0)), MAX_PREDICTION_DEG);
        assert_eq!(model.predict(&shot(-80.0, 0.0, 50.0, 0.0)), -MAX_PREDICTION_DEG);
        assert_eq!(model.predict(&shot(5.0, 0.0, 50.0, 0.0)), 5.0);
    }

    #[test]
    fn test_fit_errors() {
        let samples = synthetic(200, |f| f.cut_angle);
        let method = FitMethod::Polynomial { degree: 2 };
        assert!(matches!(
            AimModel::fit(&samples[..5], method, 0.0),
            Err(Error::NotEnoughSamples { needed: 10, got: 5 })
        ));

        // Spin never varies: its column is all zeros
        let flat: Vec<ShotSample> = samples.iter().map(|s| ShotSample { spin_y: 0.0, ..*s }).collect();
        let linear = FitMethod::Polynomial { degree: 1 };
        assert!(matches!(AimModel::fit(&flat, linear, 0.0), Err(Error::SingularSystem)));
        // Ridge makes it solvable
        assert!(AimModel::fit(&flat, linear, 1e-3).is_ok());
    }

    #[test]
    fn test_model_json() {
        let json = r#"{
            "model": { "kind": "polynomial", "degree": 2, "coefficients": [1.0, 2.0] },
            "ridge": 0.0,
            "training": { "r_squared": 0.0, "rmse": 0.0, "samples": 0 },
            "holdout": null
        }"#;
        assert!(matches!(AimModel::from_json_str(json), Err(Error::InvalidConfig(_))));

        let samples = synthetic(300, |f| 0.02 * f.cut_angle + 0.005 * f.power);
        let model = AimModel::fit(&samples, FitMethod::Split { degree: 1, brackets: 2 }, 1.0).unwrap();
        let text = serde_json::to_string(&model).unwrap();
        assert!(text.contains(r#""kind":"split""#));
        assert_eq!(AimModel::from_json_str(&text).unwrap(), model);
    }

    #[test]
    fn test_fit_method_names() {
        assert_eq!("poly".parse::<FitMethod>().unwrap(), FitMethod::Polynomial { degree: 2 });
        assert_eq!("Split".parse::<FitMethod>().unwrap().as_str(), "split");
        assert!(matches!("neural".parse::<FitMethod>(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_collect_samples_is_seeded() {
        let table = Table::new(TablePreset::Pool9ft);
        let planner = ShotPlanner::new(PlannerConfig::default(), PhysicsConfig::default());
        let a = collect_samples(&planner, &table, 8, &mut Pcg32::seed_from_u64(3));
        let b = collect_samples(&planner, &table, 8, &mut Pcg32::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(!a.is_empty());
        for s in &a {
            assert!(s.cut_angle <= 85.0);
            assert!(s.angle_error.abs() < 90.0);
        }
    }

    #[test]
    fn test_samples_file_round_trip() {
        let samples = synthetic(3, |f| f.power);
        let path = std::env::temp_dir().join(format!("cuesport-samples-{}.json", std::process::id()));
        save_samples(&samples, &path).unwrap();
        assert_eq!(load_samples(&path).unwrap(), samples);
        let _ = std::fs::remove_file(&path);
    }
}
