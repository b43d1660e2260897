//! Fixed timestep physics tick
//!
//! One external tick runs `substeps` substeps. Each substep, in order:
//! cloth friction and spin, integration, pocket capture, ball-ball
//! contacts, cushion contacts. After the substeps, balls below both stop
//! thresholds are put to rest and sinking balls progress.

use glam::DVec2;

use super::collision::{advance_sinking, capture_pockets, resolve_ball_collisions, resolve_rail_collisions};
use super::geom::GEOM_EPSILON;
use super::state::{Ball, BallSet, CollisionEvent, Spin};
use super::table::Table;
use crate::settings::PhysicsConfig;

/// Result of running a shot until the balls stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Everything came to rest after `ticks` ticks
    Settled { ticks: u32 },
    /// Still moving when the tick cap was reached; treat the shot as void
    TickLimit { ticks: u32 },
}

impl SettleOutcome {
    pub fn converged(&self) -> bool {
        matches!(self, SettleOutcome::Settled { .. })
    }

    pub fn ticks(&self) -> u32 {
        match *self {
            SettleOutcome::Settled { ticks } | SettleOutcome::TickLimit { ticks } => ticks,
        }
    }
}

/// A physics model that can advance a ball layout by one tick
pub trait Physics {
    fn config(&self) -> &PhysicsConfig;

    /// Advance one external tick and return the events it produced, in order
    fn advance(&mut self, balls: &mut BallSet, table: &Table) -> Vec<CollisionEvent>;

    /// Step until settled or until `max_ticks` ticks have run
    fn run_to_rest(
        &mut self,
        balls: &mut BallSet,
        table: &Table,
        max_ticks: u32,
        on_event: &mut dyn FnMut(&CollisionEvent),
    ) -> SettleOutcome {
        for tick in 0..max_ticks {
            if balls.is_settled() {
                return SettleOutcome::Settled { ticks: tick };
            }
            for event in self.advance(balls, table) {
                on_event(&event);
            }
        }
        if balls.is_settled() {
            SettleOutcome::Settled { ticks: max_ticks }
        } else {
            log::debug!("Balls still moving after {} ticks", max_ticks);
            SettleOutcome::TickLimit { ticks: max_ticks }
        }
    }
}

/// Spin-aware cloth friction engine
#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    /// Ticks advanced since creation
    pub ticks: u64,
}

impl PhysicsEngine {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config, ticks: 0 }
    }

    fn substep(&self, balls: &mut [Ball], table: &Table, dt: f64, events: &mut Vec<CollisionEvent>) {
        for ball in balls.iter_mut() {
            if ball.is_active() && !ball.is_at_rest() {
                apply_cloth_friction(ball, &self.config, dt);
            }
        }

        for ball in balls.iter_mut() {
            if ball.is_active() {
                ball.pos += ball.vel * dt;
            }
        }

        capture_pockets(balls, table, events);
        resolve_ball_collisions(balls, dt, &self.config, events);
        resolve_rail_collisions(balls, table, &self.config, events);
    }
}

impl Physics for PhysicsEngine {
    fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    fn advance(&mut self, balls: &mut BallSet, table: &Table) -> Vec<CollisionEvent> {
        let mut events = Vec::new();
        let dt = self.config.sub_dt();

        for _ in 0..self.config.substeps {
            self.substep(balls.as_mut_slice(), table, dt, &mut events);
        }

        let sink_step = self.config.dt / self.config.sink_duration.max(GEOM_EPSILON);
        for ball in balls.iter_mut() {
            if ball.is_active() {
                settle_if_stopped(ball, &self.config);
            } else {
                advance_sinking(ball, table, sink_step);
            }
        }

        self.ticks += 1;
        for event in &events {
            log::trace!("tick {}: {:?}", self.ticks, event);
        }
        events
    }
}

#[inline]
fn decay_toward_zero(value: f64, amount: f64) -> f64 {
    if value.abs() <= amount { 0.0 } else { value - amount * value.signum() }
}

/// Cloth friction and spin coupling for one substep
///
/// Roll spin is measured against `last_dir`. When travel reverses (draw) the
/// roll is re-expressed in the new frame, and a ball whose speed has dropped
/// to zero keeps being driven along `last_dir` by its leftover spin.
pub fn apply_cloth_friction(ball: &mut Ball, config: &PhysicsConfig, dt: f64) {
    let speed = ball.vel.length();
    if speed > GEOM_EPSILON {
        let dir = ball.vel / speed;
        if dir.dot(ball.last_dir) < 0.0 {
            ball.spin.roll = -ball.spin.roll;
        }
        ball.last_dir = dir;
    }

    let dir = ball.last_dir;
    let r = ball.radius;
    let mut along = ball.vel.dot(dir);
    let forward_slip = along - ball.spin.roll * r;
    let side_slip = ball.spin.side * r;
    let total_slip = forward_slip.hypot(side_slip);

    if total_slip > config.slide_threshold {
        let mu = config.slide_friction;
        // Slip closes at (1 + 5/2) * mu for a solid sphere
        if forward_slip.abs() > 3.5 * mu * dt {
            let s = forward_slip.signum();
            along -= s * mu * dt;
            ball.spin.roll += s * 2.5 * mu / r * dt;
        } else {
            along -= forward_slip * (2.0 / 7.0);
            along = (along - config.roll_friction * dt).max(0.0);
            ball.spin.roll = along / r;
        }

        ball.spin.side = decay_toward_zero(ball.spin.side, config.side_decay_sliding * dt);

        let strength = (speed / config.curve_full_speed).min(1.0);
        let curve = config.curve_factor * mu * (side_slip / total_slip) * strength;
        ball.vel = dir * along - dir.perp() * (curve * dt);
    } else {
        along = (along - config.roll_friction * dt).max(0.0);
        ball.spin.roll = along / r;
        ball.spin.side = decay_toward_zero(ball.spin.side, config.side_decay_rolling * dt);
        ball.vel = dir * along;
    }
}

/// Force a ball to rest only when both its speed and its spin are negligible
pub fn settle_if_stopped(ball: &mut Ball, config: &PhysicsConfig) -> bool {
    if ball.is_at_rest() {
        return false;
    }
    if ball.vel.length() < config.stop_speed && ball.spin.magnitude() < config.stop_spin {
        ball.vel = DVec2::ZERO;
        ball.spin = Spin::ZERO;
        return true;
    }
    false
}
