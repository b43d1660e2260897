//! Table geometry: playing surface, pockets and placement zones
//!
//! The playing surface is the rectangle between cushion noses. Pockets sit
//! on that rectangle: one at each corner and one in the middle of each long
//! rail. Geometry is fixed once built; switching preset means building a
//! new `Table`.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::geom::safe_normalize;
use crate::consts::UNITS_PER_INCH;
use crate::settings::TablePreset;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        assert!(min.x < max.x && min.y < max.y, "degenerate rectangle");
        Self { min, max }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(DVec2::ZERO, DVec2::new(width, height))
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// True if a circle of `radius` at `p` lies fully inside
    pub fn contains_circle(&self, p: DVec2, radius: f64) -> bool {
        p.x - radius >= self.min.x
            && p.x + radius <= self.max.x
            && p.y - radius >= self.min.y
            && p.y + radius <= self.max.y
    }
}

/// Cushions, named by the side of the playing surface they bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rail {
    /// min x (head of the table)
    Left,
    /// max x (foot of the table)
    Right,
    /// min y
    Top,
    /// max y
    Bottom,
}

impl Rail {
    pub const ALL: [Rail; 4] = [Rail::Left, Rail::Right, Rail::Top, Rail::Bottom];

    /// Unit normal pointing from the cushion into the playing surface
    pub fn inward_normal(&self) -> DVec2 {
        match self {
            Rail::Left => DVec2::X,
            Rail::Right => -DVec2::X,
            Rail::Top => DVec2::Y,
            Rail::Bottom => -DVec2::Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PocketKind {
    Corner,
    Side,
}

/// Index of a pocket within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PocketId(pub usize);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pocket {
    pub position: DVec2,
    pub capture_radius: f64,
    pub kind: PocketKind,
    /// Ideal travel direction of a ball entering this pocket (unit)
    pub entry_direction: DVec2,
}

impl Pocket {
    pub fn new(position: DVec2, capture_radius: f64, kind: PocketKind, entry_direction: DVec2) -> Self {
        assert!(capture_radius > 0.0, "pocket capture radius must be positive");
        Self {
            position,
            capture_radius,
            kind,
            entry_direction: safe_normalize(entry_direction),
        }
    }

    /// Distance from the centre within which a ball of `ball_radius` drops
    #[inline]
    pub fn capture_distance(&self, ball_radius: f64) -> f64 {
        self.capture_radius - ball_radius * 0.5
    }

    /// Distance from the centre within which cushions are not applied
    #[inline]
    pub fn approach_distance(&self, ball_radius: f64) -> f64 {
        self.capture_radius + ball_radius
    }
}

/// Immutable table geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub preset: Option<TablePreset>,
    pub bounds: Rect,
    pub pockets: Vec<Pocket>,
    /// Standard ball radius for this table
    pub ball_radius: f64,
    /// x of the head string (pool) or baulk line (snooker)
    pub kitchen_line: f64,
    pub head_spot: DVec2,
    pub foot_spot: DVec2,
    /// Radius of the snooker "D" (zero on pool tables)
    pub d_radius: f64,
}

impl Table {
    pub fn new(preset: TablePreset) -> Self {
        let (w, h) = preset.surface_size();
        let bounds = Rect::from_size(w, h);
        let corner = preset.corner_capture_radius();
        let side = preset.side_capture_radius();
        let pockets = standard_pockets(&bounds, corner, side);
        let mid_y = bounds.center().y;

        let (kitchen_line, d_radius, foot_x) = match preset {
            TablePreset::Pool9ft | TablePreset::Pool7ft => (bounds.min.x + w * 0.25, 0.0, bounds.min.x + w * 0.75),
            // Baulk line 29", D radius 11.5", black spot 12.75" from the top cushion
            TablePreset::Snooker => (
                bounds.min.x + 29.0 * UNITS_PER_INCH,
                11.5 * UNITS_PER_INCH,
                bounds.max.x - 12.75 * UNITS_PER_INCH,
            ),
        };

        Self {
            preset: Some(preset),
            bounds,
            pockets,
            ball_radius: preset.ball_radius(),
            kitchen_line,
            head_spot: DVec2::new(kitchen_line, mid_y),
            foot_spot: DVec2::new(foot_x, mid_y),
            d_radius,
        }
    }

    /// Table with arbitrary pockets (for tests and custom layouts)
    pub fn custom(bounds: Rect, pockets: Vec<Pocket>, ball_radius: f64) -> Self {
        assert!(ball_radius > 0.0, "ball radius must be positive");
        let mid_y = bounds.center().y;
        let kitchen_line = bounds.min.x + bounds.width() * 0.25;
        Self {
            preset: None,
            bounds,
            pockets,
            ball_radius,
            kitchen_line,
            head_spot: DVec2::new(kitchen_line, mid_y),
            foot_spot: DVec2::new(bounds.min.x + bounds.width() * 0.75, mid_y),
            d_radius: 0.0,
        }
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        self.bounds.center()
    }

    /// Length of the playing-surface diagonal
    #[inline]
    pub fn diagonal(&self) -> f64 {
        (self.bounds.max - self.bounds.min).length()
    }

    #[inline]
    pub fn pocket(&self, id: PocketId) -> &Pocket {
        &self.pockets[id.0]
    }

    pub fn pocket_ids(&self) -> impl Iterator<Item = PocketId> + '_ {
        (0..self.pockets.len()).map(PocketId)
    }

    /// Pocket whose approach zone contains a ball at `pos`, if any
    pub fn approach_zone(&self, pos: DVec2, ball_radius: f64) -> Option<PocketId> {
        self.pockets
            .iter()
            .position(|p| pos.distance(p.position) < p.approach_distance(ball_radius))
            .map(PocketId)
    }

    /// Ball fully on the cloth
    pub fn contains(&self, pos: DVec2, ball_radius: f64) -> bool {
        self.bounds.contains_circle(pos, ball_radius)
    }

    /// Behind the head string (pool ball-in-hand after the break or a scratch)
    pub fn kitchen_contains(&self, pos: DVec2, ball_radius: f64) -> bool {
        self.contains(pos, ball_radius) && pos.x <= self.kitchen_line
    }

    /// Inside the snooker "D"
    pub fn baulk_d_contains(&self, pos: DVec2, ball_radius: f64) -> bool {
        self.contains(pos, ball_radius)
            && pos.x <= self.kitchen_line
            && pos.distance(self.head_spot) <= self.d_radius
    }
}

/// Six pockets: four corners and two middles of the long rails
fn standard_pockets(bounds: &Rect, corner_radius: f64, side_radius: f64) -> Vec<Pocket> {
    let center = bounds.center();
    let corners = [
        bounds.min,
        DVec2::new(bounds.max.x, bounds.min.y),
        DVec2::new(bounds.min.x, bounds.max.y),
        bounds.max,
    ];
    let mut pockets: Vec<Pocket> = corners
        .iter()
        .map(|&c| Pocket::new(c, corner_radius, PocketKind::Corner, c - center))
        .collect();
    pockets.push(Pocket::new(
        DVec2::new(center.x, bounds.min.y),
        side_radius,
        PocketKind::Side,
        -DVec2::Y,
    ));
    pockets.push(Pocket::new(
        DVec2::new(center.x, bounds.max.y),
        side_radius,
        PocketKind::Side,
        DVec2::Y,
    ));
    pockets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_has_six_pockets() {
        let table = Table::new(TablePreset::Pool9ft);
        assert_eq!(table.pockets.len(), 6);
        let corners = table.pockets.iter().filter(|p| p.kind == PocketKind::Corner).count();
        assert_eq!(corners, 4);
        for pocket in &table.pockets {
            assert!((pocket.entry_direction.length() - 1.0).abs() < 1e-12);
            // Entry points away from the table centre
            assert!(pocket.entry_direction.dot(pocket.position - table.center()) > 0.0);
        }
    }

    #[test]
    fn test_side_pocket_entry_is_perpendicular_to_long_rail() {
        let table = Table::new(TablePreset::Pool9ft);
        for pocket in table.pockets.iter().filter(|p| p.kind == PocketKind::Side) {
            assert_eq!(pocket.entry_direction.x, 0.0);
        }
    }

    #[test]
    fn test_kitchen_and_spots() {
        let table = Table::new(TablePreset::Pool9ft);
        let r = table.ball_radius;
        assert!(table.kitchen_contains(DVec2::new(100.0, 250.0), r));
        assert!(!table.kitchen_contains(DVec2::new(600.0, 250.0), r));
        // Not fully on the cloth
        assert!(!table.kitchen_contains(DVec2::new(5.0, 250.0), r));
        assert_eq!(table.head_spot, DVec2::new(250.0, 250.0));
        assert_eq!(table.foot_spot, DVec2::new(750.0, 250.0));
    }

    #[test]
    fn test_snooker_d() {
        let table = Table::new(TablePreset::Snooker);
        let r = table.ball_radius;
        assert!(table.baulk_d_contains(table.head_spot - DVec2::new(50.0, 0.0), r));
        // Behind the baulk line but outside the D
        assert!(!table.baulk_d_contains(DVec2::new(100.0, 100.0), r));
        // In the D's circle but past the baulk line
        assert!(!table.baulk_d_contains(table.head_spot + DVec2::new(20.0, 0.0), r));
    }

    #[test]
    fn test_approach_zone() {
        let table = Table::new(TablePreset::Pool9ft);
        let r = table.ball_radius;
        assert_eq!(table.approach_zone(DVec2::new(15.0, 15.0), r), Some(PocketId(0)));
        assert_eq!(table.approach_zone(table.center(), r), None);
    }
}
