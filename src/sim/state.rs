//! Ball state and core simulation types
//!
//! Balls live in a `BallSet` arena addressed by `BallId`. The live game,
//! the planner and every headless simulation hold their own `BallSet`;
//! nothing aliases a live ball.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::geom::safe_normalize;
use super::table::{PocketId, Rail};
use crate::settings::PhysicsConfig;

/// Stable handle of a ball within its `BallSet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BallId(pub u16);

impl BallId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pool ball groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolGroup {
    Solids,
    Stripes,
}

/// Snooker colours, in potting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SnookerColour {
    Yellow,
    Green,
    Brown,
    Blue,
    Pink,
    Black,
}

impl SnookerColour {
    pub const ALL: [SnookerColour; 6] = [
        SnookerColour::Yellow,
        SnookerColour::Green,
        SnookerColour::Brown,
        SnookerColour::Blue,
        SnookerColour::Pink,
        SnookerColour::Black,
    ];

    pub fn value(&self) -> u32 {
        match self {
            SnookerColour::Yellow => 2,
            SnookerColour::Green => 3,
            SnookerColour::Brown => 4,
            SnookerColour::Blue => 5,
            SnookerColour::Pink => 6,
            SnookerColour::Black => 7,
        }
    }
}

/// What a ball is, for rules and scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallKind {
    Cue,
    /// Numbered pool ball (1-15)
    Numbered(u8),
    Red,
    Colour(SnookerColour),
}

impl BallKind {
    pub fn is_cue(&self) -> bool {
        matches!(self, BallKind::Cue)
    }

    /// Pool group; the 8 and the cue ball belong to none
    pub fn pool_group(&self) -> Option<PoolGroup> {
        match self {
            BallKind::Numbered(1..=7) => Some(PoolGroup::Solids),
            BallKind::Numbered(9..=15) => Some(PoolGroup::Stripes),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<u8> {
        match self {
            BallKind::Numbered(n) => Some(*n),
            _ => None,
        }
    }
}

/// Spin components (rad/s)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spin {
    /// About the vertical axis; positive is counter-clockwise from above (right english)
    pub side: f64,
    /// About the horizontal axis across the travel direction; positive is topspin
    pub roll: f64,
}

impl Spin {
    pub const ZERO: Spin = Spin { side: 0.0, roll: 0.0 };

    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.side.hypot(self.roll)
    }
}

/// Ball occupancy state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BallState {
    /// On the cloth and simulated
    Active,
    /// Dropping into a pocket; progress runs 0 -> 1
    Sinking { progress: f64, pocket: PocketId, start: DVec2 },
    /// Off the table; kept for rules and scoring only
    Pocketed { pocket: PocketId },
}

/// A ball entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub id: BallId,
    pub kind: BallKind,
    pub pos: DVec2,
    pub vel: DVec2,
    pub spin: Spin,
    pub radius: f64,
    pub state: BallState,
    /// Travel direction the roll spin is measured against (unit)
    pub last_dir: DVec2,
}

impl Ball {
    pub fn new(id: BallId, kind: BallKind, pos: DVec2, radius: f64) -> Self {
        assert!(radius > 0.0, "ball radius must be positive");
        Self {
            id,
            kind,
            pos,
            vel: DVec2::ZERO,
            spin: Spin::ZERO,
            radius,
            state: BallState::Active,
            last_dir: DVec2::X,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, BallState::Active)
    }

    #[inline]
    pub fn is_pocketed(&self) -> bool {
        matches!(self.state, BallState::Pocketed { .. })
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.vel.length()
    }

    /// Forward slip: travel speed minus contact-point surface speed from roll
    #[inline]
    pub fn forward_slip(&self) -> f64 {
        self.vel.dot(self.last_dir) - self.spin.roll * self.radius
    }

    /// Surface speed from side spin
    #[inline]
    pub fn side_slip(&self) -> f64 {
        self.spin.side * self.radius
    }

    #[inline]
    pub fn total_slip(&self) -> f64 {
        self.forward_slip().hypot(self.side_slip())
    }

    #[inline]
    pub fn is_at_rest(&self) -> bool {
        self.vel == DVec2::ZERO && self.spin == Spin::ZERO
    }

    /// Strike this ball with a cue
    pub fn apply_shot(&mut self, intent: &ShotIntent, config: &PhysicsConfig) {
        if !self.is_active() {
            return;
        }
        let dir = safe_normalize(intent.direction);
        let speed = config.clamp_power(intent.power) * config.power_to_speed;
        let natural = speed / self.radius;
        let spin = intent.spin.clamped();

        self.vel = dir * speed;
        self.spin = Spin {
            side: spin.side * config.tip_spin_scale * natural,
            roll: spin.vertical * config.tip_spin_scale * natural,
        };
        if dir != DVec2::ZERO {
            self.last_dir = dir;
        }
    }

    /// Enter the sinking state at the given pocket
    pub fn start_sinking(&mut self, pocket: PocketId) {
        self.state = BallState::Sinking {
            progress: 0.0,
            pocket,
            start: self.pos,
        };
        self.vel = DVec2::ZERO;
        self.spin = Spin::ZERO;
    }

    /// Return a pocketed ball to the cloth at rest
    pub fn respot(&mut self, pos: DVec2) {
        self.pos = pos;
        self.vel = DVec2::ZERO;
        self.spin = Spin::ZERO;
        self.state = BallState::Active;
        self.last_dir = DVec2::X;
    }
}

/// Arena of balls, ordered by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BallSet {
    balls: Vec<Ball>,
}

impl BallSet {
    pub fn new() -> Self {
        Self { balls: Vec::new() }
    }

    /// Add a ball and return its handle
    pub fn spawn(&mut self, kind: BallKind, pos: DVec2, radius: f64) -> BallId {
        let id = BallId(self.balls.len() as u16);
        self.balls.push(Ball::new(id, kind, pos, radius));
        id
    }

    #[inline]
    pub fn get(&self, id: BallId) -> &Ball {
        &self.balls[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: BallId) -> &mut Ball {
        &mut self.balls[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.balls.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ball> {
        self.balls.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ball> {
        self.balls.iter_mut()
    }

    pub fn as_slice(&self) -> &[Ball] {
        &self.balls
    }

    pub fn as_mut_slice(&mut self) -> &mut [Ball] {
        &mut self.balls
    }

    /// Active balls only
    pub fn active(&self) -> impl Iterator<Item = &Ball> {
        self.balls.iter().filter(|b| b.is_active())
    }

    /// The cue ball, whatever its state
    pub fn cue(&self) -> Option<&Ball> {
        self.balls.iter().find(|b| b.kind.is_cue())
    }

    pub fn cue_id(&self) -> Option<BallId> {
        self.cue().map(|b| b.id)
    }

    /// Active object (non-cue) balls
    pub fn object_balls(&self) -> impl Iterator<Item = &Ball> {
        self.active().filter(|b| !b.kind.is_cue())
    }

    pub fn find(&self, kind: BallKind) -> Option<&Ball> {
        self.balls.iter().find(|b| b.kind == kind)
    }

    /// Nothing moving and nothing dropping
    pub fn is_settled(&self) -> bool {
        self.balls.iter().all(|b| match b.state {
            BallState::Active => b.is_at_rest(),
            BallState::Sinking { .. } => false,
            BallState::Pocketed { .. } => true,
        })
    }

    pub fn pocketed_ids(&self) -> Vec<BallId> {
        self.balls.iter().filter(|b| b.is_pocketed()).map(|b| b.id).collect()
    }
}

/// A physical event produced by one engine tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollisionEvent {
    BallBall { a: BallId, b: BallId, impact_speed: f64 },
    BallRail { ball: BallId, rail: Rail, impact_speed: f64 },
    BallPocket { ball: BallId, pocket: PocketId },
}

/// Cue-tip offset, each component in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShotSpin {
    /// Positive is right english
    pub side: f64,
    /// Positive is follow, negative is draw
    pub vertical: f64,
}

impl ShotSpin {
    pub const NONE: ShotSpin = ShotSpin { side: 0.0, vertical: 0.0 };

    pub fn clamped(&self) -> ShotSpin {
        ShotSpin {
            side: self.side.clamp(-1.0, 1.0),
            vertical: self.vertical.clamp(-1.0, 1.0),
        }
    }
}

/// A shot to execute on the cue ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotIntent {
    /// Unit aim direction
    pub direction: DVec2,
    pub power: f64,
    pub spin: ShotSpin,
}

impl ShotIntent {
    pub fn new(direction: DVec2, power: f64) -> Self {
        Self {
            direction: safe_normalize(direction),
            power,
            spin: ShotSpin::NONE,
        }
    }

    pub fn with_spin(mut self, spin: ShotSpin) -> Self {
        self.spin = spin.clamped();
        self
    }
}
