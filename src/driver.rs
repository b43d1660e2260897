//! Synchronous turn driver
//!
//! Plays a whole rack between two personas with no timers and a seeded
//! RNG, so batch evaluation runs are reproducible. Rules are kept to what
//! the targets need: group assignment, the winning ball, snooker points
//! and respotting, and ball in hand after a scratch.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ai::{LegalTargets, Persona, PlacementRegion, ShotPlanner, SnookerOn, TargetRule};
use crate::ai::rules::lowest_colour;
use crate::sim::rack::{self, RackKind};
use crate::sim::{BallId, BallKind, BallSet, CollisionEvent, Physics, PhysicsEngine, PoolGroup, Table};

/// Summary of one rack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackReport {
    pub rack: RackKind,
    pub shots: u32,
    /// Object balls in the order they dropped (respotted balls may repeat)
    pub pocketed: Vec<BallId>,
    /// Shots voided because balls were still moving at the tick cap
    pub non_converged: u32,
    pub scratches: u32,
    /// Legal balls potted (pool) or points (snooker) per player
    pub scores: [u32; 2],
    pub winner: Option<usize>,
}

/// Everything a rule set needs to judge one shot
#[derive(Debug, Clone)]
pub struct ShotContext<'a> {
    pub player: usize,
    pub legal: &'a [BallId],
    /// Object balls pocketed, in order
    pub potted: &'a [BallId],
    pub scratched: bool,
    pub is_break: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotVerdict {
    pub continue_turn: bool,
    pub winner: Option<usize>,
}

/// Per-rack rule state
#[derive(Debug, Clone, PartialEq)]
pub enum RackRules {
    EightBall { groups: [Option<PoolGroup>; 2] },
    NineBall,
    Snooker { on: SnookerOn },
}

fn opponent(player: usize) -> usize {
    1 - player
}

fn other_group(group: PoolGroup) -> PoolGroup {
    match group {
        PoolGroup::Solids => PoolGroup::Stripes,
        PoolGroup::Stripes => PoolGroup::Solids,
    }
}

fn ball_value(kind: BallKind) -> u32 {
    match kind {
        BallKind::Red => 1,
        BallKind::Colour(c) => c.value(),
        _ => 1,
    }
}

/// Put a pocketed ball back on `spot`, or the nearest free point to it
fn respot(balls: &mut BallSet, table: &Table, id: BallId, spot: glam::DVec2) {
    let radius = balls.get(id).radius;
    let pos = rack::nearest_free_spot(balls, table, spot, radius);
    balls.get_mut(id).respot(pos);
}

impl RackRules {
    pub fn new(kind: RackKind) -> Self {
        match kind {
            RackKind::EightBall => RackRules::EightBall { groups: [None, None] },
            RackKind::NineBall => RackRules::NineBall,
            RackKind::Snooker => RackRules::Snooker { on: SnookerOn::Red },
        }
    }

    pub fn target_rule(&self, player: usize) -> TargetRule {
        match self {
            RackRules::EightBall { groups } => TargetRule::EightBall { group: groups[player] },
            RackRules::NineBall => TargetRule::NineBall,
            RackRules::Snooker { on } => TargetRule::Snooker { on: *on },
        }
    }

    pub fn ball_in_hand_region(&self) -> PlacementRegion {
        match self {
            RackRules::Snooker { .. } => PlacementRegion::BaulkD,
            _ => PlacementRegion::Kitchen,
        }
    }

    /// Update rule state and scores after a settled shot
    pub fn resolve(
        &mut self,
        shot: &ShotContext,
        balls: &mut BallSet,
        table: &Table,
        scores: &mut [u32; 2],
    ) -> ShotVerdict {
        let player = shot.player;
        let legal_pots = shot.potted.iter().filter(|&&id| shot.legal.contains(&id)).count() as u32;

        match self {
            RackRules::EightBall { groups } => {
                let eight = shot
                    .potted
                    .iter()
                    .copied()
                    .find(|&id| balls.get(id).kind == BallKind::Numbered(8));
                if let Some(eight) = eight {
                    if shot.is_break {
                        respot(balls, table, eight, table.foot_spot);
                    } else {
                        let on_eight = *shot.legal == [eight];
                        let winner = if on_eight && !shot.scratched { player } else { opponent(player) };
                        return ShotVerdict {
                            continue_turn: false,
                            winner: Some(winner),
                        };
                    }
                }

                if groups[player].is_none() && !shot.scratched && !shot.is_break {
                    let first_group = shot.potted.iter().find_map(|&id| balls.get(id).kind.pool_group());
                    if let Some(group) = first_group {
                        log::debug!("Player {} takes {:?}", player, group);
                        groups[player] = Some(group);
                        groups[opponent(player)] = Some(other_group(group));
                    }
                }

                scores[player] += legal_pots;
                ShotVerdict {
                    continue_turn: !shot.scratched && legal_pots > 0,
                    winner: None,
                }
            }
            RackRules::NineBall => {
                let nine = shot
                    .potted
                    .iter()
                    .copied()
                    .find(|&id| balls.get(id).kind == BallKind::Numbered(9));
                scores[player] += shot.potted.len() as u32;
                match nine {
                    Some(_) if !shot.scratched => {
                        return ShotVerdict {
                            continue_turn: false,
                            winner: Some(player),
                        };
                    }
                    Some(nine) => respot(balls, table, nine, table.foot_spot),
                    None => {}
                }
                ShotVerdict {
                    continue_turn: !shot.scratched && !shot.potted.is_empty(),
                    winner: None,
                }
            }
            RackRules::Snooker { on } => {
                for &id in shot.potted {
                    if shot.legal.contains(&id) && !shot.scratched {
                        scores[player] += ball_value(balls.get(id).kind);
                    }
                }

                let reds_left = balls.object_balls().any(|b| b.kind == BallKind::Red);
                // Colours come back unless they were potted in sequence at the end
                for &id in shot.potted {
                    if let BallKind::Colour(colour) = balls.get(id).kind {
                        let in_sequence =
                            matches!(*on, SnookerOn::Colour(c) if c == colour) && shot.legal.contains(&id);
                        if reds_left || !in_sequence || shot.scratched {
                            respot(balls, table, id, rack::colour_spot(table, colour));
                        }
                    }
                }

                let continue_turn = !shot.scratched && legal_pots > 0;
                let next_colour = || match lowest_colour(balls) {
                    Some(id) => match balls.get(id).kind {
                        BallKind::Colour(c) => SnookerOn::Colour(c),
                        _ => SnookerOn::Red,
                    },
                    None => SnookerOn::Red,
                };
                *on = match (*on, continue_turn) {
                    (SnookerOn::Red, true) => SnookerOn::AnyColour,
                    (_, _) if reds_left => SnookerOn::Red,
                    _ => next_colour(),
                };

                let cleared = balls.object_balls().next().is_none();
                let winner = if cleared {
                    match scores[0].cmp(&scores[1]) {
                        std::cmp::Ordering::Greater => Some(0),
                        std::cmp::Ordering::Less => Some(1),
                        std::cmp::Ordering::Equal => None,
                    }
                } else {
                    None
                };
                ShotVerdict { continue_turn, winner }
            }
        }
    }
}

/// A rack in progress
#[derive(Debug, Clone)]
pub struct Rack {
    pub balls: BallSet,
    pub rules: RackRules,
    /// Seat due to shoot next
    pub player: usize,
    pub ball_in_hand: bool,
    pub report: RackReport,
}

impl Rack {
    pub fn new(kind: RackKind, table: &Table) -> Self {
        Self {
            balls: kind.build(table),
            rules: RackRules::new(kind),
            player: 0,
            ball_in_hand: false,
            report: RackReport {
                rack: kind,
                shots: 0,
                pocketed: Vec::new(),
                non_converged: 0,
                scratches: 0,
                scores: [0, 0],
                winner: None,
            },
        }
    }

    /// Plan, play and judge one shot
    ///
    /// Returns false once the rack is decided or cannot go on. A shot that
    /// is still moving at the tick cap is voided: the layout goes back to
    /// how it was and the turn passes.
    pub fn play_shot<R: Rng + ?Sized>(
        &mut self,
        table: &Table,
        planner: &ShotPlanner,
        engine: &mut PhysicsEngine,
        personas: [&Persona; 2],
        rng: &mut R,
    ) -> bool {
        let Some(cue_id) = self.balls.cue_id() else {
            return false;
        };
        let kind = self.report.rack;
        let persona = personas[self.player];
        let rule = self.rules.target_rule(self.player);

        if self.ball_in_hand || !self.balls.get(cue_id).is_active() {
            let pos = planner.place_cue_ball(&self.balls, table, self.rules.ball_in_hand_region(), &rule);
            self.balls.get_mut(cue_id).respot(pos);
            self.ball_in_hand = false;
        }

        let is_break = self.report.shots == 0 && kind != RackKind::Snooker;
        let legal = rule.legal_targets(&self.balls);
        let planned = if is_break {
            planner.plan_break(&self.balls, persona, rng)
        } else {
            planner.plan_shot(&self.balls, table, &rule, persona, rng)
        };
        let Some(shot) = planned else {
            return false;
        };

        let before = self.balls.clone();
        let max_ticks = engine.config().max_shot_ticks;
        self.balls.get_mut(cue_id).apply_shot(&shot.intent, engine.config());
        let mut potted = Vec::new();
        let outcome = engine.run_to_rest(&mut self.balls, table, max_ticks, &mut |event| {
            if let CollisionEvent::BallPocket { ball, .. } = *event {
                potted.push(ball);
            }
        });
        self.report.shots += 1;

        if !outcome.converged() {
            log::warn!("Shot {} did not settle in {} ticks, voided", self.report.shots, max_ticks);
            self.report.non_converged += 1;
            self.balls = before;
            self.player = opponent(self.player);
            return true;
        }

        let scratched = potted.contains(&cue_id);
        potted.retain(|&id| id != cue_id);
        self.report.pocketed.extend(potted.iter().copied());
        if scratched {
            self.report.scratches += 1;
        }

        let context = ShotContext {
            player: self.player,
            legal: &legal,
            potted: &potted,
            scratched,
            is_break,
        };
        let verdict = self
            .rules
            .resolve(&context, &mut self.balls, table, &mut self.report.scores);
        log::debug!(
            "Shot {}: player {} {:?}, potted {:?}, scratch {}",
            self.report.shots,
            self.player,
            shot.kind,
            potted,
            scratched
        );

        if verdict.winner.is_some() {
            self.report.winner = verdict.winner;
            return false;
        }
        if self.balls.object_balls().next().is_none() {
            return false;
        }
        self.ball_in_hand = scratched;
        if !verdict.continue_turn {
            self.player = opponent(self.player);
        }
        true
    }
}

/// Play one rack to a result or until `max_shots` shots have been taken
pub fn play_rack<R: Rng + ?Sized>(
    kind: RackKind,
    table: &Table,
    planner: &ShotPlanner,
    personas: [&Persona; 2],
    max_shots: u32,
    rng: &mut R,
) -> RackReport {
    let mut rack = Rack::new(kind, table);
    let mut engine = PhysicsEngine::new(planner.physics().clone());
    while rack.report.shots < max_shots && rack.play_shot(table, planner, &mut engine, personas, rng) {}

    let report = rack.report;
    log::info!(
        "{} rack: {} shots, winner {:?}, scores {:?}",
        kind.as_str(),
        report.shots,
        report.winner,
        report.scores
    );
    report
}
