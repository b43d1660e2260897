//! Legal-target selection per game mode
//!
//! The planner never looks at game rules itself. It asks a `LegalTargets`
//! implementation which object balls it may aim at.

use serde::{Deserialize, Serialize};

use crate::sim::{BallId, BallKind, BallSet, PoolGroup, SnookerColour};

/// Which object balls the acting player may hit first
pub trait LegalTargets {
    /// Legal target ids in ball-id order
    fn legal_targets(&self, balls: &BallSet) -> Vec<BallId>;
}

impl<F> LegalTargets for F
where
    F: Fn(&BallSet) -> Vec<BallId>,
{
    fn legal_targets(&self, balls: &BallSet) -> Vec<BallId> {
        self(balls)
    }
}

/// What a snooker player is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnookerOn {
    Red,
    /// Any colour, after potting a red
    AnyColour,
    /// A specific colour, once the reds are gone
    Colour(SnookerColour),
}

/// Built-in rule sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRule {
    /// Own group, or anything but the 8 while the table is open
    EightBall { group: Option<PoolGroup> },
    /// Lowest-numbered ball on the table
    NineBall,
    Snooker { on: SnookerOn },
    /// Every object ball
    Any,
}

impl LegalTargets for TargetRule {
    fn legal_targets(&self, balls: &BallSet) -> Vec<BallId> {
        match *self {
            TargetRule::EightBall { group } => {
                let ids: Vec<BallId> = balls
                    .object_balls()
                    .filter(|b| match group {
                        Some(g) => b.kind.pool_group() == Some(g),
                        None => b.kind.pool_group().is_some(),
                    })
                    .map(|b| b.id)
                    .collect();
                if ids.is_empty() {
                    // Group cleared: the 8 is next
                    balls.object_balls().filter(|b| b.kind == BallKind::Numbered(8)).map(|b| b.id).collect()
                } else {
                    ids
                }
            }
            TargetRule::NineBall => balls
                .object_balls()
                .filter_map(|b| b.kind.number().map(|n| (n, b.id)))
                .min()
                .map(|(_, id)| vec![id])
                .unwrap_or_default(),
            TargetRule::Snooker { on } => snooker_targets(balls, on),
            TargetRule::Any => balls.object_balls().map(|b| b.id).collect(),
        }
    }
}

fn snooker_targets(balls: &BallSet, on: SnookerOn) -> Vec<BallId> {
    match on {
        SnookerOn::Red => {
            let reds: Vec<BallId> = balls.object_balls().filter(|b| b.kind == BallKind::Red).map(|b| b.id).collect();
            if reds.is_empty() {
                lowest_colour(balls).into_iter().collect()
            } else {
                reds
            }
        }
        SnookerOn::AnyColour => balls
            .object_balls()
            .filter(|b| matches!(b.kind, BallKind::Colour(_)))
            .map(|b| b.id)
            .collect(),
        SnookerOn::Colour(colour) => balls
            .object_balls()
            .filter(|b| b.kind == BallKind::Colour(colour))
            .map(|b| b.id)
            .collect(),
    }
}

/// Lowest-value colour still on the table
pub fn lowest_colour(balls: &BallSet) -> Option<BallId> {
    balls
        .object_balls()
        .filter_map(|b| match b.kind {
            BallKind::Colour(c) => Some((c, b.id)),
            _ => None,
        })
        .min()
        .map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TablePreset;
    use crate::sim::rack;
    use crate::sim::{PocketId, Table};

    fn pot(balls: &mut BallSet, kind: BallKind) {
        let id = balls.find(kind).map(|b| b.id).unwrap();
        balls.get_mut(id).start_sinking(PocketId(0));
    }

    #[test]
    fn test_eight_ball_groups() {
        let table = Table::new(TablePreset::Pool9ft);
        let mut balls = rack::eight_ball(&table);

        let open = TargetRule::EightBall { group: None }.legal_targets(&balls);
        assert_eq!(open.len(), 14);
        assert!(open.iter().all(|&id| balls.get(id).kind != BallKind::Numbered(8)));

        let solids = TargetRule::EightBall { group: Some(PoolGroup::Solids) };
        assert_eq!(solids.legal_targets(&balls).len(), 7);

        for n in 1..=7 {
            pot(&mut balls, BallKind::Numbered(n));
        }
        let eight = balls.find(BallKind::Numbered(8)).map(|b| b.id).unwrap();
        assert_eq!(solids.legal_targets(&balls), vec![eight]);
    }

    #[test]
    fn test_nine_ball_lowest() {
        let table = Table::new(TablePreset::Pool9ft);
        let mut balls = rack::nine_ball(&table);
        let one = balls.find(BallKind::Numbered(1)).map(|b| b.id).unwrap();
        assert_eq!(TargetRule::NineBall.legal_targets(&balls), vec![one]);

        pot(&mut balls, BallKind::Numbered(1));
        pot(&mut balls, BallKind::Numbered(2));
        let three = balls.find(BallKind::Numbered(3)).map(|b| b.id).unwrap();
        assert_eq!(TargetRule::NineBall.legal_targets(&balls), vec![three]);
    }

    #[test]
    fn test_snooker_sequence() {
        let table = Table::new(TablePreset::Snooker);
        let mut balls = rack::snooker(&table);
        assert_eq!(TargetRule::Snooker { on: SnookerOn::Red }.legal_targets(&balls).len(), 15);
        assert_eq!(TargetRule::Snooker { on: SnookerOn::AnyColour }.legal_targets(&balls).len(), 6);

        let reds: Vec<BallId> = balls.iter().filter(|b| b.kind == BallKind::Red).map(|b| b.id).collect();
        for id in reds {
            balls.get_mut(id).start_sinking(PocketId(1));
        }
        let yellow = balls.find(BallKind::Colour(SnookerColour::Yellow)).map(|b| b.id).unwrap();
        assert_eq!(TargetRule::Snooker { on: SnookerOn::Red }.legal_targets(&balls), vec![yellow]);
    }

    #[test]
    fn test_closure_rule() {
        let table = Table::new(TablePreset::Pool9ft);
        let balls = rack::nine_ball(&table);
        let only_nine = |b: &BallSet| -> Vec<BallId> {
            b.find(BallKind::Numbered(9)).map(|ball| ball.id).into_iter().collect()
        };
        let rule: &dyn LegalTargets = &only_nine;
        assert_eq!(rule.legal_targets(&balls).len(), 1);
    }
}
