//! Deterministic simulation module
//!
//! Table geometry, ball state and the physics engine. This module must be
//! pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (by ball id)
//! - No I/O and no global state

pub mod collision;
pub mod geom;
pub mod rack;
pub mod state;
pub mod table;
pub mod tick;

pub use collision::{Contact, ball_ball_contact, resolve_ball_pair, time_of_impact};
pub use geom::{angle_between, point_segment_distance, rotate, safe_normalize, signed_angle};
pub use rack::RackKind;
pub use state::{
    Ball, BallId, BallKind, BallSet, BallState, CollisionEvent, PoolGroup, ShotIntent, ShotSpin, SnookerColour,
    Spin,
};
pub use table::{Pocket, PocketId, PocketKind, Rail, Rect, Table};
pub use tick::{Physics, PhysicsEngine, SettleOutcome};
