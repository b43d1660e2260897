//! Shot planning
//!
//! For every legal target and every pocket the planner places a ghost ball,
//! throws out geometry that cannot work, scores the rest and picks one
//! according to the persona. With nothing pottable it plays safe.

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::aim_model::{AimModel, ShotFeatures};
use super::headless::ShotSimulator;
use super::persona::Persona;
use super::rules::LegalTargets;
use crate::settings::PhysicsConfig;
use crate::sim::geom::{angle_between, point_segment_distance, rotate, safe_normalize, signed_angle};
use crate::sim::{Ball, BallId, BallSet, PocketId, PocketKind, ShotIntent, ShotSpin, Table, rack};
use crate::{deg, rad};

/// Planner tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    // === Scoring ===
    pub straightness_weight: f64,
    pub cue_distance_weight: f64,
    pub pocket_distance_weight: f64,
    pub corner_bonus: f64,
    /// Awarded to any candidate with a clear line
    pub base_score: f64,
    /// Cut angle at which the straightness term reaches zero
    pub straightness_falloff_deg: f64,

    // === Geometry limits ===
    pub max_cut_deg: f64,
    pub corner_approach_limit_deg: f64,
    pub side_approach_limit_deg: f64,
    /// Clearance slack that still counts as a clear line
    pub clearance_tolerance: f64,

    // === Power ===
    pub base_power: f64,
    /// Extra power per table unit of cue and object-ball travel
    pub power_per_unit: f64,
    /// Extra power at the largest legal cut, as a fraction
    pub cut_power_factor: f64,
    pub safety_power_min: f64,
    pub safety_power_max: f64,
    /// Aim-noise multiplier on the break
    pub break_aim_scale: f64,

    // === Position play ===
    /// Candidates simulated when the persona looks ahead
    pub lookahead_candidates: usize,
    /// Tick cap for each simulated candidate
    pub lookahead_ticks: u32,
    /// Weight of the best follow-up shot score
    pub position_weight: f64,

    /// Grid spacing when searching ball-in-hand positions
    pub placement_step: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            straightness_weight: 0.35,
            cue_distance_weight: 0.25,
            pocket_distance_weight: 0.20,
            corner_bonus: 0.10,
            base_score: 0.10,
            straightness_falloff_deg: 90.0,

            max_cut_deg: 85.0,
            corner_approach_limit_deg: 80.0,
            side_approach_limit_deg: 60.0,
            clearance_tolerance: 1.0,

            base_power: 12.0,
            power_per_unit: 0.05,
            cut_power_factor: 0.8,
            safety_power_min: 25.0,
            safety_power_max: 45.0,
            break_aim_scale: 0.25,

            lookahead_candidates: 3,
            lookahead_ticks: 1200,
            position_weight: 0.5,

            placement_step: 20.0,
        }
    }
}

/// Why a target/pocket pair was thrown out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Obstructed,
    CutTooSteep,
    ApproachTooSteep,
    /// Missing cue ball, pocketed target or coincident points
    Degenerate,
}

/// A scored way to pot one ball in one pocket
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateShot {
    pub target: BallId,
    pub pocket: PocketId,
    /// Where the cue ball centre must be at contact
    pub ghost_point: DVec2,
    /// Unit direction from the cue ball to the ghost point
    pub aim: DVec2,
    pub cut_angle_deg: f64,
    pub approach_angle_deg: f64,
    /// Straightness term of `score`
    pub straightness: f64,
    pub score: f64,
    pub power: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotKind {
    Pot { target: BallId, pocket: PocketId },
    Safety { target: BallId },
    Break { target: BallId },
}

impl ShotKind {
    pub fn target(&self) -> BallId {
        match *self {
            ShotKind::Pot { target, .. } | ShotKind::Safety { target } | ShotKind::Break { target } => target,
        }
    }
}

/// Planner output
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedShot {
    pub intent: ShotIntent,
    pub kind: ShotKind,
}

/// Where a ball-in-hand cue ball may go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementRegion {
    Anywhere,
    /// Behind the head string
    Kitchen,
    /// Inside the snooker D
    BaulkD,
}

impl PlacementRegion {
    pub fn contains(&self, table: &Table, pos: DVec2, radius: f64) -> bool {
        match self {
            PlacementRegion::Anywhere => table.contains(pos, radius),
            PlacementRegion::Kitchen => table.kitchen_contains(pos, radius),
            PlacementRegion::BaulkD => table.baulk_d_contains(pos, radius),
        }
    }
}

/// +1 if the object ball is cut to the left (counter-clockwise) of the cue
/// ball's line, -1 otherwise
pub fn cut_side(cue: DVec2, target: DVec2, pocket: DVec2) -> f64 {
    if signed_angle(target - cue, pocket - target) < 0.0 { -1.0 } else { 1.0 }
}

/// Cue direction that sends the object ball off the pocket line by the
/// opposite of the model's predicted error
///
/// The object ball leaves along the line from the contact point through its
/// centre, so the correction turns that line and aims at the ghost ball
/// behind the turned line.
fn compensated_aim(
    model: &AimModel,
    cue: &Ball,
    object: &Ball,
    pocket: DVec2,
    candidate: &CandidateShot,
    spin: ShotSpin,
) -> DVec2 {
    let predicted = model.predict(&ShotFeatures {
        cut_angle: candidate.cut_angle_deg,
        spin_y: spin.vertical,
        power: candidate.power,
        cue_to_target_dist: cue.pos.distance(object.pos),
    });
    let side = cut_side(cue.pos, object.pos, pocket);
    let travel = rotate(safe_normalize(pocket - object.pos), -rad(predicted) * side);
    let ghost_point = object.pos - travel * (cue.radius + object.radius);
    let aim = safe_normalize(ghost_point - cue.pos);
    if aim == DVec2::ZERO { candidate.aim } else { aim }
}

/// Computer opponent shot selection
#[derive(Debug, Clone, Default)]
pub struct ShotPlanner {
    pub config: PlannerConfig,
    physics: PhysicsConfig,
    aim_model: Option<AimModel>,
}

impl ShotPlanner {
    pub fn new(config: PlannerConfig, physics: PhysicsConfig) -> Self {
        Self {
            config,
            physics,
            aim_model: None,
        }
    }

    pub fn with_aim_model(mut self, model: AimModel) -> Self {
        self.aim_model = Some(model);
        self
    }

    pub fn physics(&self) -> &PhysicsConfig {
        &self.physics
    }

    pub fn aim_model(&self) -> Option<&AimModel> {
        self.aim_model.as_ref()
    }

    /// True if a ball of `radius` travelling `from` -> `to` would touch any
    /// active ball not in `ignore`
    fn path_blocked(&self, balls: &BallSet, from: DVec2, to: DVec2, radius: f64, ignore: &[BallId]) -> bool {
        balls.active().filter(|b| !ignore.contains(&b.id)).any(|b| {
            point_segment_distance(b.pos, from, to) < b.radius + radius - self.config.clearance_tolerance
        })
    }

    /// Ghost-ball geometry, legality filters and score for one pair
    pub fn evaluate_pair(
        &self,
        balls: &BallSet,
        table: &Table,
        target: BallId,
        pocket: PocketId,
    ) -> Result<CandidateShot, Rejection> {
        let cue = balls.cue().filter(|b| b.is_active()).ok_or(Rejection::Degenerate)?;
        let object = balls.get(target);
        if !object.is_active() || object.kind.is_cue() {
            return Err(Rejection::Degenerate);
        }
        let hole = table.pocket(pocket);

        let to_pocket = hole.position - object.pos;
        let travel = safe_normalize(to_pocket);
        if travel == DVec2::ZERO {
            return Err(Rejection::Degenerate);
        }
        let ghost_point = object.pos - travel * (cue.radius + object.radius);
        let aim = safe_normalize(ghost_point - cue.pos);
        if aim == DVec2::ZERO {
            return Err(Rejection::Degenerate);
        }

        if self.path_blocked(balls, cue.pos, ghost_point, cue.radius, &[cue.id, target])
            || self.path_blocked(balls, object.pos, hole.position, object.radius, &[cue.id, target])
        {
            return Err(Rejection::Obstructed);
        }

        let cut_angle_deg = deg(angle_between(object.pos - cue.pos, to_pocket));
        if cut_angle_deg > self.config.max_cut_deg {
            return Err(Rejection::CutTooSteep);
        }

        let approach_angle_deg = deg(angle_between(to_pocket, hole.entry_direction));
        let approach_limit = match hole.kind {
            PocketKind::Corner => self.config.corner_approach_limit_deg,
            PocketKind::Side => self.config.side_approach_limit_deg,
        };
        if approach_angle_deg > approach_limit {
            return Err(Rejection::ApproachTooSteep);
        }

        let diagonal = table.diagonal();
        let cue_distance = cue.pos.distance(ghost_point);
        let pocket_distance = to_pocket.length();

        let cfg = &self.config;
        let straightness = cfg.straightness_weight * (1.0 - cut_angle_deg / cfg.straightness_falloff_deg).max(0.0);
        let mut score = straightness
            + cfg.cue_distance_weight * (1.0 - (cue_distance / diagonal).min(1.0))
            + cfg.pocket_distance_weight * (1.0 - (pocket_distance / diagonal).min(1.0))
            + cfg.base_score;
        if hole.kind == PocketKind::Corner {
            score += cfg.corner_bonus;
        }

        let travel_power = cfg.base_power + (cue_distance + pocket_distance) * cfg.power_per_unit;
        let cut_boost = 1.0 + cfg.cut_power_factor * (cut_angle_deg / cfg.max_cut_deg).min(1.0);
        let power = self.physics.clamp_power(travel_power * cut_boost);

        Ok(CandidateShot {
            target,
            pocket,
            ghost_point,
            aim,
            cut_angle_deg,
            approach_angle_deg,
            straightness,
            score,
            power,
        })
    }

    /// All surviving candidates for `targets`, best first
    ///
    /// Equal scores keep enumeration order (target order, then pocket order).
    pub fn candidates(&self, balls: &BallSet, table: &Table, targets: &[BallId]) -> Vec<CandidateShot> {
        let mut out: Vec<CandidateShot> = targets
            .iter()
            .flat_map(|&target| table.pocket_ids().map(move |pocket| (target, pocket)))
            .filter_map(|(target, pocket)| self.evaluate_pair(balls, table, target, pocket).ok())
            .collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        out
    }

    /// Legal targets, or every object ball when the rule leaves none
    fn targets(&self, balls: &BallSet, rules: &dyn LegalTargets) -> Vec<BallId> {
        let mut targets = rules.legal_targets(balls);
        targets.retain(|&id| {
            let ball = balls.get(id);
            ball.is_active() && !ball.kind.is_cue()
        });
        if targets.is_empty() {
            log::debug!("No legal targets, considering every object ball");
            targets = balls.object_balls().map(|b| b.id).collect();
        }
        targets
    }

    /// Aim and power noise from a persona
    fn perturb<R: Rng + ?Sized>(
        &self,
        direction: DVec2,
        power: f64,
        aim_error_deg: f64,
        power_error: f64,
        rng: &mut R,
    ) -> (DVec2, f64) {
        let direction = if aim_error_deg > 0.0 {
            rotate(direction, rad(rng.random_range(-aim_error_deg..=aim_error_deg)))
        } else {
            direction
        };
        let power = if power_error > 0.0 {
            power * (1.0 + rng.random_range(-power_error..=power_error))
        } else {
            power
        };
        (direction, self.physics.clamp_power(power))
    }

    /// Plan the next shot for the acting player
    ///
    /// Returns `None` only when there is no cue ball on the table or no
    /// object ball left to hit.
    pub fn plan_shot<R: Rng + ?Sized>(
        &self,
        balls: &BallSet,
        table: &Table,
        rules: &dyn LegalTargets,
        persona: &Persona,
        rng: &mut R,
    ) -> Option<PlannedShot> {
        let cue = balls.cue().filter(|b| b.is_active())?;
        let targets = self.targets(balls, rules);
        if targets.is_empty() {
            return None;
        }

        let candidates = self.candidates(balls, table, &targets);
        log::debug!(
            "{}: {} candidates from {} targets",
            persona.name,
            candidates.len(),
            targets.len()
        );
        if candidates.is_empty() {
            return self.safety_shot(balls, table, &targets, persona, rng);
        }

        let pool = persona.selection.pool_size(candidates.len());
        let (chosen, spin) = if persona.lookahead {
            let considered = pool.max(self.config.lookahead_candidates).min(candidates.len());
            self.choose_with_lookahead(balls, table, rules, &candidates[..considered])
        } else {
            let index = if pool > 1 { rng.random_range(0..pool) } else { 0 };
            (&candidates[index], ShotSpin::NONE)
        };
        log::debug!(
            "{}: ball {:?} into pocket {:?}, cut {:.1} deg, score {:.3}, power {:.1}",
            persona.name,
            chosen.target,
            chosen.pocket,
            chosen.cut_angle_deg,
            chosen.score,
            chosen.power
        );

        let mut direction = chosen.aim;
        if let Some(model) = self.aim_model.as_ref().filter(|_| persona.use_aim_model) {
            let pocket = table.pocket(chosen.pocket).position;
            direction = compensated_aim(model, cue, balls.get(chosen.target), pocket, chosen, spin);
        }

        let (direction, power) =
            self.perturb(direction, chosen.power, persona.aim_error_deg, persona.power_error, rng);
        Some(PlannedShot {
            intent: ShotIntent::new(direction, power).with_spin(spin),
            kind: ShotKind::Pot {
                target: chosen.target,
                pocket: chosen.pocket,
            },
        })
    }

    /// Rank candidates by where the cue ball ends up
    ///
    /// Each candidate is tried with no vertical spin, follow and draw. A pot
    /// scores its own geometric score plus the weighted score of the best
    /// shot left afterwards. Misses and scratches are penalised.
    fn choose_with_lookahead<'c>(
        &self,
        balls: &BallSet,
        table: &Table,
        rules: &dyn LegalTargets,
        candidates: &'c [CandidateShot],
    ) -> (&'c CandidateShot, ShotSpin) {
        let sim = ShotSimulator::new(table, self.physics.clone()).with_max_ticks(self.config.lookahead_ticks);
        let weight = self.config.position_weight;
        let mut best: Option<(f64, usize, ShotSpin)> = None;

        for (i, candidate) in candidates.iter().enumerate() {
            for vertical in [0.0, 0.5, -0.5] {
                let spin = ShotSpin { side: 0.0, vertical };
                let intent = ShotIntent::new(candidate.aim, candidate.power).with_spin(spin);
                let report = sim.simulate(balls, &intent);

                let value = if report.scratched() {
                    candidate.score - 2.0 * weight
                } else if !report.converged() || !report.potted(candidate.target) {
                    candidate.score - weight
                } else {
                    let next = self.targets(&report.final_balls, rules);
                    let follow_up = self
                        .candidates(&report.final_balls, table, &next)
                        .first()
                        .map_or(0.0, |c| c.score);
                    candidate.score + weight * follow_up
                };

                if best.is_none_or(|(v, _, _)| value > v) {
                    best = Some((value, i, spin));
                }
            }
        }

        match best {
            Some((value, i, spin)) => {
                log::debug!("Lookahead picked candidate {} with spin {:?} (value {:.3})", i, spin, value);
                (&candidates[i], spin)
            }
            None => (&candidates[0], ShotSpin::NONE),
        }
    }

    /// Soft shot at the nearest target, preferring one with a clear line
    pub fn safety_shot<R: Rng + ?Sized>(
        &self,
        balls: &BallSet,
        table: &Table,
        targets: &[BallId],
        persona: &Persona,
        rng: &mut R,
    ) -> Option<PlannedShot> {
        let cue = balls.cue().filter(|b| b.is_active())?;
        let mut by_distance: Vec<BallId> = targets
            .iter()
            .copied()
            .filter(|&id| balls.get(id).is_active() && id != cue.id)
            .collect();
        by_distance.sort_by(|&a, &b| {
            cue.pos
                .distance(balls.get(a).pos)
                .total_cmp(&cue.pos.distance(balls.get(b).pos))
        });

        let clear = by_distance
            .iter()
            .copied()
            .find(|&id| !self.path_blocked(balls, cue.pos, balls.get(id).pos, cue.radius, &[cue.id, id]));
        let target = clear.or_else(|| by_distance.first().copied())?;
        log::debug!("{}: playing safe on ball {:?} (clear line: {})", persona.name, target, clear.is_some());

        let cfg = &self.config;
        let to_target = balls.get(target).pos - cue.pos;
        let reach = (to_target.length() / table.diagonal()).min(1.0);
        let base = cfg.safety_power_min + (cfg.safety_power_max - cfg.safety_power_min) * reach;
        let (direction, power) = self.perturb(
            safe_normalize(to_target),
            base,
            persona.aim_error_deg,
            persona.power_error,
            rng,
        );

        Some(PlannedShot {
            intent: ShotIntent::new(direction, power.clamp(cfg.safety_power_min, cfg.safety_power_max)),
            kind: ShotKind::Safety { target },
        })
    }

    /// Full-power break at the object ball nearest the cue ball
    pub fn plan_break<R: Rng + ?Sized>(&self, balls: &BallSet, persona: &Persona, rng: &mut R) -> Option<PlannedShot> {
        let cue = balls.cue().filter(|b| b.is_active())?;
        let target = balls
            .object_balls()
            .min_by(|a, b| cue.pos.distance(a.pos).total_cmp(&cue.pos.distance(b.pos)))?;
        let (direction, power) = self.perturb(
            safe_normalize(target.pos - cue.pos),
            self.physics.max_power,
            persona.aim_error_deg * self.config.break_aim_scale,
            0.0,
            rng,
        );
        log::debug!("{}: breaking at ball {:?}", persona.name, target.id);
        Some(PlannedShot {
            intent: ShotIntent::new(direction, power),
            kind: ShotKind::Break { target: target.id },
        })
    }

    /// Choose a ball-in-hand position
    ///
    /// Scans a grid over `region` and keeps the free spot whose best
    /// candidate scores highest; ties go to the first spot scanned. Falls
    /// back to the first free spot when nothing is pottable anywhere.
    pub fn place_cue_ball(
        &self,
        balls: &BallSet,
        table: &Table,
        region: PlacementRegion,
        rules: &dyn LegalTargets,
    ) -> DVec2 {
        let Some(cue_id) = balls.cue_id() else {
            return rack::cue_start(table);
        };
        let r = balls.get(cue_id).radius;
        let step = self.config.placement_step.max(r * 0.5);
        let targets = self.targets(balls, rules);

        let mut trial = balls.clone();
        let mut best: Option<(f64, DVec2)> = None;
        let mut first_free: Option<DVec2> = None;

        let bounds = table.bounds;
        let mut x = bounds.min.x + r;
        while x <= bounds.max.x - r {
            let mut y = bounds.min.y + r;
            while y <= bounds.max.y - r {
                let p = DVec2::new(x, y);
                y += step;

                if !region.contains(table, p, r) || table.approach_zone(p, r).is_some() {
                    continue;
                }
                let overlaps = balls
                    .active()
                    .any(|b| b.id != cue_id && b.pos.distance(p) < b.radius + r);
                if overlaps {
                    continue;
                }
                first_free.get_or_insert(p);

                trial.get_mut(cue_id).respot(p);
                let top = self.candidates(&trial, table, &targets).first().map(|c| c.score);
                if let Some(score) = top {
                    if best.is_none_or(|(s, _)| score > s) {
                        best = Some((score, p));
                    }
                }
            }
            x += step;
        }

        match (best, first_free) {
            (Some((score, p)), _) => {
                log::debug!("Ball in hand at ({:.1}, {:.1}), best score {:.3}", p.x, p.y, score);
                p
            }
            (None, Some(p)) => p,
            (None, None) => rack::nearest_free_spot(balls, table, rack::cue_start(table), r),
        }
    }
}
