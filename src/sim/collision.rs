//! Collision detection and response
//!
//! Ball-ball impulses, cushion rebounds and pocket capture. Each resolver
//! walks the balls in id order so results depend only on the layout.

use glam::DVec2;

use super::geom::GEOM_EPSILON;
use super::state::{Ball, BallState, CollisionEvent};
use super::table::{Rail, Table};
use crate::settings::PhysicsConfig;

/// Overlap between two circles
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    /// Unit normal from the first ball toward the second
    pub normal: DVec2,
    /// Penetration depth (for position correction)
    pub penetration: f64,
}

/// Overlap test between two balls
///
/// Coincident centres get an arbitrary +x normal so the pair can still be
/// pushed apart.
pub fn ball_ball_contact(a: &Ball, b: &Ball) -> Option<Contact> {
    let delta = b.pos - a.pos;
    let dist = delta.length();
    let min_dist = a.radius + b.radius;
    if dist >= min_dist {
        return None;
    }
    let normal = if dist < GEOM_EPSILON { DVec2::X } else { delta / dist };
    Some(Contact {
        normal,
        penetration: min_dist - dist,
    })
}

/// Give an object ball the spin of a ball rolling without slip
fn set_natural_roll(ball: &mut Ball) {
    let speed = ball.vel.length();
    if speed > GEOM_EPSILON {
        ball.last_dir = ball.vel / speed;
        ball.spin.roll = speed / ball.radius;
    } else {
        ball.spin.roll = 0.0;
    }
}

/// How far to back a converging pair up to the moment it first touched
///
/// Solves |d - v*s| = ra + rb for the smallest s >= 0, with d and v the
/// relative position and velocity. None when the pair is not converging
/// or first touch lies further back than `limit`.
pub fn time_of_impact(a: &Ball, b: &Ball, limit: f64) -> Option<f64> {
    let d = b.pos - a.pos;
    let v = b.vel - a.vel;
    let approach = d.dot(v);
    let speed_sq = v.length_squared();
    if approach >= 0.0 || speed_sq < GEOM_EPSILON {
        return None;
    }
    let min_dist = a.radius + b.radius;
    let gap = d.length_squared() - min_dist * min_dist;
    let disc = approach * approach - speed_sq * gap;
    if disc < 0.0 {
        return None;
    }
    let s = (approach + disc.sqrt()) / speed_sq;
    (0.0..=limit).contains(&s).then_some(s)
}

/// Equal-mass restitution impulse along `n`, plus side-spin throw
fn apply_contact_impulse(a: &mut Ball, b: &mut Ball, n: DVec2, config: &PhysicsConfig) -> Option<f64> {
    let closing = (b.vel - a.vel).dot(n);
    if closing >= 0.0 {
        return None;
    }

    let a_toward = a.vel.dot(n);
    let b_toward = -b.vel.dot(n);

    let j = -(1.0 + config.ball_restitution) * closing * 0.5;
    a.vel -= n * j;
    b.vel += n * j;

    // Throw: the striker's side spin drags the struck ball along the tangent
    let cap = config.max_throw_ratio * j;
    if a_toward >= b_toward {
        let throw = (config.throw_factor * a.side_slip()).clamp(-cap, cap);
        b.vel += n.perp() * throw;
    } else {
        let throw = (config.throw_factor * b.side_slip()).clamp(-cap, cap);
        a.vel += (-n).perp() * throw;
    }

    for ball in [&mut *a, &mut *b] {
        if !ball.kind.is_cue() {
            set_natural_roll(ball);
        }
    }

    Some(-closing)
}

/// Separate an overlapping pair and apply the restitution impulse
///
/// A pair that touched within the last `rewind_limit` seconds is moved back
/// to first touch, takes the impulse along the line of centres there, then
/// spends the rewound time on its new velocities. Older overlaps are pushed
/// apart instead. Returns the closing speed along the normal if the balls
/// were approaching. Both balls are treated as unit mass.
pub fn resolve_ball_pair(a: &mut Ball, b: &mut Ball, rewind_limit: f64, config: &PhysicsConfig) -> Option<f64> {
    let contact = ball_ball_contact(a, b)?;
    let rewind = time_of_impact(a, b, rewind_limit);

    let n = match rewind {
        Some(s) => {
            a.pos -= a.vel * s;
            b.pos -= b.vel * s;
            (b.pos - a.pos).try_normalize().unwrap_or(contact.normal)
        }
        None => {
            // Equal masses: each ball takes half the correction
            let half = contact.normal * (contact.penetration * 0.5);
            a.pos -= half;
            b.pos += half;
            contact.normal
        }
    };

    let impact = apply_contact_impulse(a, b, n, config);

    if let Some(s) = rewind {
        a.pos += a.vel * s;
        b.pos += b.vel * s;
    }

    impact
}

/// Resolve every overlapping pair of active balls after a step of `dt`
pub fn resolve_ball_collisions(
    balls: &mut [Ball],
    dt: f64,
    config: &PhysicsConfig,
    events: &mut Vec<CollisionEvent>,
) {
    let count = balls.len();
    for i in 0..count {
        if !balls[i].is_active() {
            continue;
        }
        for j in (i + 1)..count {
            if !balls[j].is_active() {
                continue;
            }
            let (left, right) = balls.split_at_mut(j);
            let a = &mut left[i];
            let b = &mut right[0];
            if let Some(impact_speed) = resolve_ball_pair(a, b, dt, config) {
                events.push(CollisionEvent::BallBall {
                    a: a.id,
                    b: b.id,
                    impact_speed,
                });
            }
        }
    }
}

/// How far a ball has pushed into a cushion (positive when in contact)
pub fn rail_penetration(ball: &Ball, table: &Table, rail: Rail) -> f64 {
    let b = &table.bounds;
    let r = ball.radius;
    match rail {
        Rail::Left => b.min.x + r - ball.pos.x,
        Rail::Right => ball.pos.x + r - b.max.x,
        Rail::Top => b.min.y + r - ball.pos.y,
        Rail::Bottom => ball.pos.y + r - b.max.y,
    }
}

/// Rebound one ball off any cushion it touches
///
/// Balls inside a pocket's approach zone pass through the cushion line.
pub fn resolve_rail_contacts(
    ball: &mut Ball,
    table: &Table,
    config: &PhysicsConfig,
    events: &mut Vec<CollisionEvent>,
) {
    if !ball.is_active() || table.approach_zone(ball.pos, ball.radius).is_some() {
        return;
    }

    for rail in Rail::ALL {
        let penetration = rail_penetration(ball, table, rail);
        if penetration <= 0.0 {
            continue;
        }
        let n = rail.inward_normal();
        ball.pos += n * penetration;

        let vn = ball.vel.dot(n);
        if vn >= 0.0 {
            continue; // Already leaving the cushion
        }
        let tangent = n.perp();
        let vt = ball.vel.dot(tangent);

        // Cushion friction turns side spin into drift along the rail
        let max_kick = 0.5 * vn.abs();
        let kick = (config.rail_spin_coupling * ball.side_slip()).clamp(-max_kick, max_kick);

        ball.vel = n * (-vn * config.rail_restitution) + tangent * (vt + kick);
        ball.spin.side *= config.rail_side_retention;

        events.push(CollisionEvent::BallRail {
            ball: ball.id,
            rail,
            impact_speed: -vn,
        });
    }
}

pub fn resolve_rail_collisions(
    balls: &mut [Ball],
    table: &Table,
    config: &PhysicsConfig,
    events: &mut Vec<CollisionEvent>,
) {
    for ball in balls.iter_mut() {
        resolve_rail_contacts(ball, table, config, events);
    }
}

/// True once the centre has crossed a cushion line by more than a radius
fn past_cushion_line(ball: &Ball, table: &Table) -> bool {
    Rail::ALL
        .iter()
        .any(|&rail| rail_penetration(ball, table, rail) > 2.0 * ball.radius)
}

/// Move balls that reached a pocket into the sinking state
pub fn capture_pockets(balls: &mut [Ball], table: &Table, events: &mut Vec<CollisionEvent>) {
    for ball in balls.iter_mut() {
        if !ball.is_active() {
            continue;
        }
        let captured = table.pocket_ids().find(|&id| {
            let pocket = table.pocket(id);
            let dist = ball.pos.distance(pocket.position);
            dist < pocket.capture_distance(ball.radius)
                || (dist < pocket.approach_distance(ball.radius) && past_cushion_line(ball, table))
        });
        if let Some(pocket) = captured {
            ball.start_sinking(pocket);
            events.push(CollisionEvent::BallPocket { ball: ball.id, pocket });
        }
    }
}

/// Advance a sinking ball toward its pocket centre
pub fn advance_sinking(ball: &mut Ball, table: &Table, step: f64) {
    if let BallState::Sinking { progress, pocket, start } = ball.state {
        let progress = (progress + step).min(1.0);
        let target = table.pocket(pocket).position;
        if progress >= 1.0 {
            ball.pos = target;
            ball.state = BallState::Pocketed { pocket };
        } else {
            ball.pos = start.lerp(target, progress);
            ball.state = BallState::Sinking { progress, pocket, start };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TablePreset;
    use crate::sim::state::{BallId, BallKind};
    use crate::sim::table::PocketId;
    use proptest::prelude::*;

    fn ball(id: u16, kind: BallKind, pos: DVec2, vel: DVec2) -> Ball {
        let mut b = Ball::new(BallId(id), kind, pos, 10.0);
        b.vel = vel;
        b
    }

    #[test]
    fn test_head_on_restitution() {
        let config = PhysicsConfig::default();
        let mut a = ball(0, BallKind::Cue, DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0));
        let mut b = ball(1, BallKind::Numbered(1), DVec2::new(19.5, 0.0), DVec2::ZERO);
        let impact = resolve_ball_pair(&mut a, &mut b, config.sub_dt(), &config).expect("approaching pair");
        assert!((impact - 100.0).abs() < 1e-9);
        // Cue nearly stops, object ball takes (1+e)/2 of the speed
        assert!((a.vel.x - 2.0).abs() < 1e-9);
        assert!((b.vel.x - 98.0).abs() < 1e-9);
        // Object ball leaves in natural roll
        assert!((b.spin.roll * b.radius - b.vel.x).abs() < 1e-9);
        // Cue ball keeps its spin untouched (zero here)
        assert_eq!(a.spin.roll, 0.0);
        // Separated
        assert!((b.pos - a.pos).length() >= 20.0 - 1e-9);
    }

    #[test]
    fn test_separating_pair_no_impulse() {
        let config = PhysicsConfig::default();
        let mut a = ball(0, BallKind::Numbered(1), DVec2::ZERO, DVec2::new(-5.0, 0.0));
        let mut b = ball(1, BallKind::Numbered(2), DVec2::new(19.0, 0.0), DVec2::new(5.0, 0.0));
        assert!(resolve_ball_pair(&mut a, &mut b, config.sub_dt(), &config).is_none());
        assert_eq!(a.vel, DVec2::new(-5.0, 0.0));
        assert!((b.pos.x - a.pos.x - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_centres_nudged_apart() {
        let config = PhysicsConfig::default();
        let mut a = ball(0, BallKind::Numbered(1), DVec2::new(50.0, 50.0), DVec2::ZERO);
        let mut b = ball(1, BallKind::Numbered(2), DVec2::new(50.0, 50.0), DVec2::ZERO);
        resolve_ball_pair(&mut a, &mut b, config.sub_dt(), &config);
        assert!(a.pos.is_finite() && b.pos.is_finite());
        assert!((a.pos.distance(b.pos) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_side_spin_throws_object_ball() {
        let config = PhysicsConfig::default();
        let mut a = ball(0, BallKind::Cue, DVec2::ZERO, DVec2::new(500.0, 0.0));
        a.spin.side = 50.0; // right english
        let mut b = ball(1, BallKind::Numbered(1), DVec2::new(19.9, 0.0), DVec2::ZERO);
        resolve_ball_pair(&mut a, &mut b, config.sub_dt(), &config);
        // Right english throws the object ball to the left of the line (+y here)
        assert!(b.vel.y > 0.0);
        assert!(b.vel.y <= config.max_throw_ratio * b.vel.x + 1e-9);
    }

    #[test]
    fn test_cut_contact_uses_line_of_centres_at_touch() {
        let config = PhysicsConfig::default();
        let normal = DVec2::from_angle(40f64.to_radians());
        let target = DVec2::new(100.0, 0.0);
        let touch = target - normal * 20.0;
        let vel = DVec2::new(1000.0, 0.0);
        // One unit past first touch, well inside a substep
        let late = touch + vel * 0.001;

        let mut a = ball(0, BallKind::Cue, late, vel);
        let mut b = ball(1, BallKind::Numbered(1), target, DVec2::ZERO);
        resolve_ball_pair(&mut a, &mut b, config.sub_dt(), &config).expect("approaching pair");
        assert!((b.vel.normalize() - normal).length() < 1e-9);
        assert!(((b.pos - target).normalize() - normal).length() < 1e-9);
        assert!(a.pos.distance(b.pos) >= 20.0 - 1e-9);

        // Resolved where it overlaps, the same pair leaves on a skewed line
        let mut a = ball(0, BallKind::Cue, late, vel);
        let mut b = ball(1, BallKind::Numbered(1), target, DVec2::ZERO);
        resolve_ball_pair(&mut a, &mut b, 0.0, &config).expect("approaching pair");
        assert!((b.vel.normalize() - normal).length() > 0.01);
    }

    #[test]
    fn test_time_of_impact() {
        let a = ball(0, BallKind::Cue, DVec2::ZERO, DVec2::new(100.0, 0.0));
        let b = ball(1, BallKind::Numbered(1), DVec2::new(19.5, 0.0), DVec2::ZERO);
        let s = time_of_impact(&a, &b, 1.0).expect("converging");
        assert!((s - 0.005).abs() < 1e-12);
        assert!(time_of_impact(&a, &b, 0.001).is_none());

        let parked = ball(0, BallKind::Cue, DVec2::ZERO, DVec2::ZERO);
        assert!(time_of_impact(&parked, &b, 1.0).is_none());
    }

    #[test]
    fn test_rail_rebound() {
        let config = PhysicsConfig::default();
        let table = Table::new(TablePreset::Pool9ft);
        let mut b = ball(0, BallKind::Numbered(1), DVec2::new(995.0, 250.0), DVec2::new(200.0, 0.0));
        let mut events = Vec::new();
        resolve_rail_contacts(&mut b, &table, &config, &mut events);
        assert!((b.vel.x + 200.0 * config.rail_restitution).abs() < 1e-9);
        assert!((b.pos.x - (1000.0 - 10.0)).abs() < 1e-9);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            CollisionEvent::BallRail { rail: Rail::Right, impact_speed, .. } if impact_speed == 200.0
        ));
    }

    #[test]
    fn test_rail_side_spin_drift() {
        let config = PhysicsConfig::default();
        let table = Table::new(TablePreset::Pool9ft);
        let mut b = ball(0, BallKind::Cue, DVec2::new(995.0, 250.0), DVec2::new(200.0, 0.0));
        b.spin.side = 20.0;
        let mut events = Vec::new();
        resolve_rail_contacts(&mut b, &table, &config, &mut events);
        // Right english comes off the foot cushion toward -y
        assert!(b.vel.y < 0.0);
        assert!((b.spin.side - 20.0 * config.rail_side_retention).abs() < 1e-9);
    }

    #[test]
    fn test_no_rail_inside_pocket_approach() {
        let config = PhysicsConfig::default();
        let table = Table::new(TablePreset::Pool9ft);
        let mut b = ball(0, BallKind::Numbered(1), DVec2::new(8.0, 8.0), DVec2::new(-100.0, -100.0));
        let mut events = Vec::new();
        resolve_rail_contacts(&mut b, &table, &config, &mut events);
        assert!(events.is_empty());
        assert_eq!(b.vel, DVec2::new(-100.0, -100.0));
    }

    #[test]
    fn test_pocket_capture_and_sinking() {
        let table = Table::new(TablePreset::Pool9ft);
        let mut balls = vec![ball(0, BallKind::Numbered(1), DVec2::new(10.0, 10.0), DVec2::new(-50.0, -50.0))];
        let mut events = Vec::new();
        capture_pockets(&mut balls, &table, &mut events);
        assert_eq!(events, vec![CollisionEvent::BallPocket { ball: BallId(0), pocket: PocketId(0) }]);
        assert_eq!(balls[0].vel, DVec2::ZERO);

        advance_sinking(&mut balls[0], &table, 0.6);
        assert!(matches!(balls[0].state, BallState::Sinking { progress, .. } if (progress - 0.6).abs() < 1e-12));
        advance_sinking(&mut balls[0], &table, 0.6);
        assert!(balls[0].is_pocketed());
        assert_eq!(balls[0].pos, table.pocket(PocketId(0)).position);
    }

    #[test]
    fn test_pocketed_ball_ignored_by_collisions() {
        let config = PhysicsConfig::default();
        let mut balls = vec![
            ball(0, BallKind::Cue, DVec2::new(100.0, 100.0), DVec2::new(100.0, 0.0)),
            ball(1, BallKind::Numbered(1), DVec2::new(110.0, 100.0), DVec2::ZERO),
        ];
        balls[1].state = BallState::Pocketed { pocket: PocketId(0) };
        let mut events = Vec::new();
        resolve_ball_collisions(&mut balls, config.sub_dt(), &config, &mut events);
        assert!(events.is_empty());
        assert_eq!(balls[0].vel, DVec2::new(100.0, 0.0));
    }

    proptest! {
        #[test]
        fn prop_restitution_law(
            angle in 0.0f64..std::f64::consts::TAU,
            va in -500.0f64..500.0, vb in -500.0f64..500.0,
            ta in -200.0f64..200.0,
        ) {
            let config = PhysicsConfig::default();
            let n = DVec2::new(angle.cos(), angle.sin());
            let t = n.perp();
            let mut a = ball(0, BallKind::Numbered(1), DVec2::ZERO, n * va + t * ta);
            let mut b = ball(1, BallKind::Numbered(2), n * 19.0, n * vb);
            let before = (b.vel - a.vel).dot(n);
            let resolved = resolve_ball_pair(&mut a, &mut b, 0.0, &config);
            let after = (b.vel - a.vel).dot(n);
            if before < 0.0 {
                prop_assert!(resolved.is_some());
                prop_assert!((after + config.ball_restitution * before).abs() < 1e-6);
            } else {
                prop_assert!(resolved.is_none());
            }
        }
    }
}
