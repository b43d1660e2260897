//! Opening layouts
//!
//! Every rack spawns the cue ball first, so it always has `BallId(0)`.
//! Object balls follow in a fixed order, which keeps racks deterministic.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::state::{BallKind, BallSet, SnookerColour};
use super::table::Table;
use crate::settings::TablePreset;

/// Clearance between neighbouring racked balls
const RACK_GAP: f64 = 0.5;

/// Supported opening layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RackKind {
    #[default]
    EightBall,
    NineBall,
    Snooker,
}

impl RackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RackKind::EightBall => "eight-ball",
            RackKind::NineBall => "nine-ball",
            RackKind::Snooker => "snooker",
        }
    }

    /// Table the rack is normally played on
    pub fn preset(&self) -> TablePreset {
        match self {
            RackKind::EightBall | RackKind::NineBall => TablePreset::Pool9ft,
            RackKind::Snooker => TablePreset::Snooker,
        }
    }

    pub fn build(&self, table: &Table) -> BallSet {
        match self {
            RackKind::EightBall => eight_ball(table),
            RackKind::NineBall => nine_ball(table),
            RackKind::Snooker => snooker(table),
        }
    }
}

/// Position of a ball in a triangle pointing at -x
///
/// `row` counts back from the apex; `offset` is in ball spacings across
/// the table, centred on the apex.
fn rack_slot(apex: DVec2, radius: f64, row: usize, offset: f64) -> DVec2 {
    let spacing = radius * 2.0 + RACK_GAP;
    let row_depth = spacing * 3f64.sqrt() * 0.5;
    DVec2::new(apex.x + row as f64 * row_depth, apex.y + offset * spacing)
}

/// Where the cue ball starts for a fresh rack
pub fn cue_start(table: &Table) -> DVec2 {
    if table.d_radius > 0.0 {
        // Inside the D, left of the brown
        table.head_spot + DVec2::new(-table.d_radius * 0.5, table.d_radius * 0.25)
    } else {
        table.head_spot
    }
}

/// 15-ball triangle with the 8 in the centre and mixed back corners
pub fn eight_ball(table: &Table) -> BallSet {
    let r = table.ball_radius;
    let mut balls = BallSet::new();
    balls.spawn(BallKind::Cue, cue_start(table), r);

    // (number, row, offset)
    let layout: [(u8, usize, f64); 15] = [
        (1, 0, 0.0),
        (9, 1, -0.5),
        (2, 1, 0.5),
        (3, 2, -1.0),
        (8, 2, 0.0),
        (10, 2, 1.0),
        (11, 3, -1.5),
        (4, 3, -0.5),
        (5, 3, 0.5),
        (12, 3, 1.5),
        (6, 4, -2.0),
        (13, 4, -1.0),
        (14, 4, 0.0),
        (7, 4, 1.0),
        (15, 4, 2.0),
    ];
    for (number, row, offset) in layout {
        balls.spawn(BallKind::Numbered(number), rack_slot(table.foot_spot, r, row, offset), r);
    }
    balls
}

/// Nine-ball diamond: 1 on the foot spot, 9 in the middle
pub fn nine_ball(table: &Table) -> BallSet {
    let r = table.ball_radius;
    let mut balls = BallSet::new();
    balls.spawn(BallKind::Cue, cue_start(table), r);

    let layout: [(u8, usize, f64); 9] = [
        (1, 0, 0.0),
        (2, 1, -0.5),
        (3, 1, 0.5),
        (4, 2, -1.0),
        (9, 2, 0.0),
        (5, 2, 1.0),
        (6, 3, -0.5),
        (7, 3, 0.5),
        (8, 4, 0.0),
    ];
    for (number, row, offset) in layout {
        balls.spawn(BallKind::Numbered(number), rack_slot(table.foot_spot, r, row, offset), r);
    }
    balls
}

/// Spot of a snooker colour
pub fn colour_spot(table: &Table, colour: SnookerColour) -> DVec2 {
    let head = table.head_spot;
    let center = table.center();
    match colour {
        SnookerColour::Yellow => head + DVec2::new(0.0, table.d_radius),
        SnookerColour::Green => head - DVec2::new(0.0, table.d_radius),
        SnookerColour::Brown => head,
        SnookerColour::Blue => center,
        SnookerColour::Pink => DVec2::new((center.x + table.bounds.max.x) * 0.5, center.y),
        SnookerColour::Black => table.foot_spot,
    }
}

/// Six colours on their spots and 15 reds packed behind the pink
pub fn snooker(table: &Table) -> BallSet {
    let r = table.ball_radius;
    let mut balls = BallSet::new();
    balls.spawn(BallKind::Cue, cue_start(table), r);

    for colour in SnookerColour::ALL {
        balls.spawn(BallKind::Colour(colour), colour_spot(table, colour), r);
    }

    let apex = colour_spot(table, SnookerColour::Pink) + DVec2::new(r * 2.0 + RACK_GAP, 0.0);
    for row in 0..5 {
        for k in 0..=row {
            let offset = k as f64 - row as f64 * 0.5;
            balls.spawn(BallKind::Red, rack_slot(apex, r, row, offset), r);
        }
    }
    balls
}

/// Free position nearest to `spot` along the table's long axis
///
/// Tries the spot itself, then steps toward the head of the table and
/// finally toward the foot. Returns the spot if nothing is free.
pub fn nearest_free_spot(balls: &BallSet, table: &Table, spot: DVec2, radius: f64) -> DVec2 {
    let free = |p: DVec2| {
        table.contains(p, radius) && balls.active().all(|b| b.pos.distance(p) >= b.radius + radius + RACK_GAP)
    };
    let step = radius * 0.5;
    let reach = table.bounds.width();
    let mut dist = 0.0;
    while dist <= reach {
        for candidate in [spot - DVec2::new(dist, 0.0), spot + DVec2::new(dist, 0.0)] {
            if free(candidate) {
                return candidate;
            }
        }
        dist += step;
    }
    spot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::BallId;

    fn assert_no_overlap(balls: &BallSet) {
        let all: Vec<_> = balls.iter().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(a.pos.distance(b.pos) >= a.radius + b.radius, "{:?} overlaps {:?}", a.kind, b.kind);
            }
        }
    }

    #[test]
    fn test_eight_ball_rack() {
        let table = Table::new(TablePreset::Pool9ft);
        let balls = eight_ball(&table);
        assert_eq!(balls.len(), 16);
        assert_eq!(balls.cue_id(), Some(BallId(0)));
        assert_eq!(balls.find(BallKind::Numbered(1)).map(|b| b.pos), Some(table.foot_spot));

        // The 8 sits in the middle of the third row
        let eight = balls.find(BallKind::Numbered(8)).map(|b| b.pos).unwrap();
        assert!((eight.y - table.foot_spot.y).abs() < 1e-9);
        assert!(eight.x > table.foot_spot.x);

        assert_no_overlap(&balls);
        for ball in balls.iter() {
            assert!(table.contains(ball.pos, ball.radius));
        }
    }

    #[test]
    fn test_nine_ball_diamond() {
        let table = Table::new(TablePreset::Pool9ft);
        let balls = nine_ball(&table);
        assert_eq!(balls.len(), 10);
        let nine = balls.find(BallKind::Numbered(9)).map(|b| b.pos).unwrap();
        let one = balls.find(BallKind::Numbered(1)).map(|b| b.pos).unwrap();
        let eight = balls.find(BallKind::Numbered(8)).map(|b| b.pos).unwrap();
        // 9 halfway between the front and back of the diamond
        assert!(((one.x + eight.x) * 0.5 - nine.x).abs() < 1e-9);
        assert_no_overlap(&balls);
    }

    #[test]
    fn test_snooker_layout() {
        let table = Table::new(TablePreset::Snooker);
        let balls = snooker(&table);
        assert_eq!(balls.len(), 22);
        assert_eq!(balls.iter().filter(|b| b.kind == BallKind::Red).count(), 15);
        let cue = balls.cue().unwrap();
        assert!(table.baulk_d_contains(cue.pos, cue.radius));
        let black = balls.find(BallKind::Colour(SnookerColour::Black)).unwrap();
        assert_eq!(black.pos, table.foot_spot);
        assert_no_overlap(&balls);
        for ball in balls.iter() {
            assert!(table.contains(ball.pos, ball.radius));
        }
    }

    #[test]
    fn test_nearest_free_spot_moves_off_occupied_spot() {
        let table = Table::new(TablePreset::Pool9ft);
        let balls = eight_ball(&table);
        let r = table.ball_radius;
        let spot = nearest_free_spot(&balls, &table, table.foot_spot, r);
        assert_ne!(spot, table.foot_spot);
        assert!(balls.active().all(|b| b.pos.distance(spot) >= b.radius + r));

        let empty = BallSet::new();
        assert_eq!(nearest_free_spot(&empty, &table, table.foot_spot, r), table.foot_spot);
    }
}
