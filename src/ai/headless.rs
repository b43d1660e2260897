//! Headless what-if simulation
//!
//! Runs a shot on a private copy of the balls with a private engine. The
//! table is shared read-only; nothing the simulator does is visible to the
//! caller's `BallSet`.

use glam::DVec2;

use crate::settings::PhysicsConfig;
use crate::sim::geom::signed_angle;
use crate::sim::{BallId, BallSet, CollisionEvent, Physics, PhysicsEngine, SettleOutcome, ShotIntent, Table};

/// What happened during a simulated shot
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Where the cue ball came to rest; `None` if it was pocketed
    pub cue_position: Option<DVec2>,
    /// Balls pocketed during the shot, in capture order
    pub pocketed: Vec<BallId>,
    /// First object ball the cue ball touched
    pub first_contact: Option<BallId>,
    pub rail_contacts: u32,
    pub outcome: SettleOutcome,
    /// Layout after the shot
    pub final_balls: BallSet,
}

impl SimulationReport {
    pub fn converged(&self) -> bool {
        self.outcome.converged()
    }

    pub fn scratched(&self) -> bool {
        self.cue_position.is_none()
    }

    pub fn potted(&self, id: BallId) -> bool {
        self.pocketed.contains(&id)
    }
}

/// Isolated engine for planning
pub struct ShotSimulator<'a> {
    table: &'a Table,
    config: PhysicsConfig,
    max_ticks: u32,
}

impl<'a> ShotSimulator<'a> {
    pub fn new(table: &'a Table, config: PhysicsConfig) -> Self {
        let max_ticks = config.max_shot_ticks;
        Self { table, config, max_ticks }
    }

    /// Override the tick cap (planning usually wants a shorter horizon)
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks.max(1);
        self
    }

    pub fn table(&self) -> &Table {
        self.table
    }

    /// Play `intent` on a clone of `balls` and report the result
    pub fn simulate(&self, balls: &BallSet, intent: &ShotIntent) -> SimulationReport {
        let mut sim_balls = balls.clone();
        let cue = sim_balls.cue_id();
        if let Some(cue) = cue {
            sim_balls.get_mut(cue).apply_shot(intent, &self.config);
        }

        let mut engine = PhysicsEngine::new(self.config.clone());
        let mut pocketed = Vec::new();
        let mut first_contact = None;
        let mut rail_contacts = 0;

        let outcome = engine.run_to_rest(&mut sim_balls, self.table, self.max_ticks, &mut |event| match *event {
            CollisionEvent::BallBall { a, b, .. } => {
                if first_contact.is_none() {
                    if Some(a) == cue {
                        first_contact = Some(b);
                    } else if Some(b) == cue {
                        first_contact = Some(a);
                    }
                }
            }
            CollisionEvent::BallRail { .. } => rail_contacts += 1,
            CollisionEvent::BallPocket { ball, .. } => pocketed.push(ball),
        });

        let cue_position = cue.map(|id| sim_balls.get(id)).filter(|b| b.is_active()).map(|b| b.pos);

        SimulationReport {
            cue_position,
            pocketed,
            first_contact,
            rail_contacts,
            outcome,
            final_balls: sim_balls,
        }
    }

    /// Signed angle (degrees, counter-clockwise positive) between
    /// `intended` and the direction `target` actually leaves in after the
    /// cue ball first strikes it
    ///
    /// `None` if the cue ball never reaches the target within the tick cap.
    pub fn measure_throw(&self, balls: &BallSet, intent: &ShotIntent, target: BallId, intended: DVec2) -> Option<f64> {
        let mut sim_balls = balls.clone();
        let cue = sim_balls.cue_id()?;
        sim_balls.get_mut(cue).apply_shot(intent, &self.config);

        let mut engine = PhysicsEngine::new(self.config.clone());
        for _ in 0..self.max_ticks {
            let events = engine.advance(&mut sim_balls, self.table);
            let struck = events.iter().find_map(|e| match *e {
                CollisionEvent::BallBall { a, b, .. } if (a == cue) != (b == cue) => Some(if a == cue { b } else { a }),
                _ => None,
            });
            match struck {
                Some(id) if id == target => {
                    let ball = sim_balls.get(target);
                    // Pocketed on the same tick: its velocity is gone
                    if !ball.is_active() || ball.vel == DVec2::ZERO {
                        return None;
                    }
                    return Some(signed_angle(intended, ball.vel).to_degrees());
                }
                Some(_) => return None,
                None if sim_balls.is_settled() => return None,
                None => {}
            }
        }
        None
    }
}
