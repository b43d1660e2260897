//! Computer opponent
//!
//! The planner consumes a ball layout, a table, a legal-target rule and a
//! persona, and returns a `ShotIntent`. Planning is synchronous and never
//! mutates the live layout; what-if runs go through `ShotSimulator`.

pub mod aim_model;
pub mod headless;
pub mod persona;
pub mod planner;
pub mod rules;

pub use aim_model::{AimModel, ShotSample};
pub use headless::{ShotSimulator, SimulationReport};
pub use persona::{Persona, PersonaRoster, SelectionBreadth};
pub use planner::{CandidateShot, PlacementRegion, PlannedShot, PlannerConfig, Rejection, ShotKind, ShotPlanner};
pub use rules::{LegalTargets, SnookerOn, TargetRule};
