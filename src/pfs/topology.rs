//! Static layout of the fingertip sensors.
//!
//! Each of the two grippers carries two fingertips. A fingertip is made of
//! five boards: the front board (PFS-A) has 8 proximity/force sensor pairs
//! and an IMU, the other four (PFS-B) have 4 pairs each. Sensors are
//! numbered 0..24 across the whole fingertip, front board first.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

/// Number of proximity (and force) sensors on one fingertip.
pub const NUM_SENSORS: usize = 24;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    Display,
    Serialize,
    Deserialize,
)]
pub enum Gripper {
    #[strum(serialize = "l_gripper")]
    #[serde(rename = "l_gripper")]
    Left,
    #[strum(serialize = "r_gripper")]
    #[serde(rename = "r_gripper")]
    Right,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    Display,
    Serialize,
    Deserialize,
)]
pub enum Fingertip {
    #[strum(serialize = "l_fingertip")]
    #[serde(rename = "l_fingertip")]
    Left,
    #[strum(serialize = "r_fingertip")]
    #[serde(rename = "r_fingertip")]
    Right,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    Display,
    Serialize,
    Deserialize,
)]
pub enum Board {
    #[strum(serialize = "pfs_a_front")]
    #[serde(rename = "pfs_a_front")]
    Front,
    #[strum(serialize = "pfs_b_top")]
    #[serde(rename = "pfs_b_top")]
    Top,
    #[strum(serialize = "pfs_b_back")]
    #[serde(rename = "pfs_b_back")]
    Back,
    #[strum(serialize = "pfs_b_left")]
    #[serde(rename = "pfs_b_left")]
    Left,
    #[strum(serialize = "pfs_b_right")]
    #[serde(rename = "pfs_b_right")]
    Right,
}

impl Gripper {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl Fingertip {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl Board {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn sensor_count(&self) -> usize {
        match self {
            Board::Front => 8,
            _ => 4,
        }
    }

    /// Index of the board's first sensor in the fingertip-wide numbering.
    pub fn index_offset(&self) -> usize {
        match self {
            Board::Front => 0,
            Board::Top => 8,
            Board::Back => 12,
            Board::Left => 16,
            Board::Right => 20,
        }
    }

    /// Fingertip-wide index of the `local`-th sensor of this board. `local`
    /// must be below [`Board::sensor_count`].
    pub fn global_index(&self, local: usize) -> usize {
        debug_assert!(local < self.sensor_count());
        self.index_offset() + local
    }

    pub fn has_imu(&self) -> bool {
        *self == Board::Front
    }
}

/// One of the four fingertips of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FingertipId {
    pub gripper: Gripper,
    pub fingertip: Fingertip,
}

impl FingertipId {
    pub fn new(gripper: Gripper, fingertip: Fingertip) -> Self {
        Self { gripper, fingertip }
    }

    pub fn all() -> impl Iterator<Item = FingertipId> + use<> {
        Gripper::iter()
            .flat_map(|g| Fingertip::iter().map(move |f| FingertipId::new(g, f)))
    }

    /// Dense index in 0..4, in the order of [`FingertipId::all`].
    pub fn index(&self) -> usize {
        (self.gripper as usize) * 2 + self.fingertip as usize
    }

    pub fn board(&self, board: Board) -> BoardId {
        BoardId {
            fingertip: *self,
            board,
        }
    }

    pub fn boards(&self) -> impl Iterator<Item = BoardId> + use<> {
        let id = *self;
        Board::iter().map(move |b| id.board(b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoardId {
    pub fingertip: FingertipId,
    pub board: Board,
}

impl BoardId {
    pub fn sensor(&self, local: usize) -> SensorId {
        SensorId { board: *self, local }
    }

    pub fn sensors(&self) -> impl Iterator<Item = SensorId> + use<> {
        let id = *self;
        (0..self.board.sensor_count()).map(move |i| id.sensor(i))
    }

    /// Frame of board-level outputs, e.g. `/l_gripper_l_fingertip_pfs_a_front`.
    pub fn frame_id(&self) -> String {
        format!(
            "/{}_{}_{}",
            self.fingertip.gripper.name(),
            self.fingertip.fingertip.name(),
            self.board.name()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorId {
    pub board: BoardId,
    pub local: usize,
}

impl SensorId {
    pub fn global_index(&self) -> usize {
        self.board.board.global_index(self.local)
    }

    /// Frame of per-sensor outputs, e.g. `/l_gripper_l_fingertip_pfs_b_top_3`.
    pub fn frame_id(&self) -> String {
        format!("{}_{}", self.board.frame_id(), self.local)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_sensor_count() {
        for board in Board::iter() {
            let expected = if board == Board::Front { 8 } else { 4 };
            assert_eq!(board.sensor_count(), expected, "{board}");
        }

        let total: usize = Board::iter().map(|b| b.sensor_count()).sum();
        assert_eq!(total, NUM_SENSORS);
    }

    #[test]
    fn test_global_index_covers_all_sensors() {
        let mut seen = BTreeSet::new();
        for board in Board::iter() {
            for i in 0..board.sensor_count() {
                assert!(seen.insert(board.global_index(i)), "collision on {board} {i}");
            }
        }

        assert_eq!(seen, (0..NUM_SENSORS).collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_global_index_offsets() {
        assert_eq!(Board::Front.global_index(7), 7);
        assert_eq!(Board::Top.global_index(0), 8);
        assert_eq!(Board::Back.global_index(1), 13);
        assert_eq!(Board::Left.global_index(2), 18);
        assert_eq!(Board::Right.global_index(3), 23);
    }

    #[test]
    fn test_only_front_has_imu() {
        let with_imu: Vec<_> = Board::iter().filter(|b| b.has_imu()).collect();
        assert_eq!(with_imu, vec![Board::Front]);
    }

    #[test]
    fn test_names() {
        assert_eq!(Gripper::Left.name(), "l_gripper");
        assert_eq!(Gripper::Right.to_string(), "r_gripper");
        assert_eq!(Fingertip::Right.name(), "r_fingertip");
        assert_eq!(
            Board::iter().map(|b| b.name()).collect::<Vec<_>>(),
            vec![
                "pfs_a_front",
                "pfs_b_top",
                "pfs_b_back",
                "pfs_b_left",
                "pfs_b_right"
            ]
        );
    }

    #[test]
    fn test_fingertip_ids() {
        let all: Vec<_> = FingertipId::all().collect();
        assert_eq!(all.len(), 4);

        for (i, id) in all.iter().enumerate() {
            assert_eq!(id.index(), i);
        }

        let sensors: usize = all[0].boards().map(|b| b.sensors().count()).sum();
        assert_eq!(sensors, NUM_SENSORS);
    }

    #[test]
    fn test_frame_ids() {
        let id = FingertipId::new(Gripper::Right, Fingertip::Left);

        assert_eq!(
            id.board(Board::Front).frame_id(),
            "/r_gripper_l_fingertip_pfs_a_front"
        );
        assert_eq!(
            id.board(Board::Top).sensor(3).frame_id(),
            "/r_gripper_l_fingertip_pfs_b_top_3"
        );
        assert_eq!(id.board(Board::Top).sensor(3).global_index(), 11);
    }

    #[test]
    fn test_serde_names() {
        let g: Gripper = serde_json::from_str("\"r_gripper\"").unwrap();
        assert_eq!(g, Gripper::Right);
        assert_eq!(
            serde_json::to_string(&Board::Left).unwrap(),
            "\"pfs_b_left\""
        );
    }
}
