// 该文件是 Zitai （姿态） 项目的一部分。
// src/model/keypoint.rs - COCO 人体关键点
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::Serialize;

pub const KEYPOINT_COUNT: usize = 17;

/// 绘制关键点和骨架连线的置信度阈值（严格大于）
pub const KEYPOINT_DRAW_THRESHOLD: f32 = 0.5;

/// COCO 17 关键点索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
  Nose = 0,
  LeftEye = 1,
  RightEye = 2,
  LeftEar = 3,
  RightEar = 4,
  LeftShoulder = 5,
  RightShoulder = 6,
  LeftElbow = 7,
  RightElbow = 8,
  LeftWrist = 9,
  RightWrist = 10,
  LeftHip = 11,
  RightHip = 12,
  LeftKnee = 13,
  RightKnee = 14,
  LeftAnkle = 15,
  RightAnkle = 16,
}

impl KeypointIndex {
  pub const ALL: [KeypointIndex; KEYPOINT_COUNT] = [
    Self::Nose,
    Self::LeftEye,
    Self::RightEye,
    Self::LeftEar,
    Self::RightEar,
    Self::LeftShoulder,
    Self::RightShoulder,
    Self::LeftElbow,
    Self::RightElbow,
    Self::LeftWrist,
    Self::RightWrist,
    Self::LeftHip,
    Self::RightHip,
    Self::LeftKnee,
    Self::RightKnee,
    Self::LeftAnkle,
    Self::RightAnkle,
  ];

  pub fn from_index(index: usize) -> Option<Self> {
    Self::ALL.get(index).copied()
  }
}

/// 骨架连线 (起点, 终点)，COCO 人体拓扑
pub const SKELETON: [(usize, usize); 19] = [
  (15, 13),
  (13, 11),
  (16, 14),
  (14, 12),
  (11, 12),
  (5, 11),
  (6, 12),
  (5, 6),
  (5, 7),
  (6, 8),
  (7, 9),
  (8, 10),
  (1, 2),
  (0, 1),
  (0, 2),
  (1, 3),
  (2, 4),
  (3, 5),
  (4, 6),
];

/// 关键点与连线的调色板 (RGB)
pub const POSE_PALETTE: [[u8; 3]; 20] = [
  [255, 128, 0],
  [255, 153, 51],
  [255, 178, 102],
  [230, 230, 0],
  [255, 153, 255],
  [153, 204, 255],
  [255, 102, 255],
  [255, 51, 255],
  [102, 178, 255],
  [51, 153, 255],
  [255, 153, 153],
  [255, 102, 102],
  [255, 51, 51],
  [153, 255, 153],
  [102, 255, 102],
  [51, 255, 51],
  [0, 255, 0],
  [0, 0, 255],
  [255, 0, 0],
  [255, 255, 255],
];

/// 单个关键点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub confidence: f32,
}

impl Keypoint {
  pub fn new(x: f32, y: f32, confidence: f32) -> Self {
    Self { x, y, confidence }
  }

  pub fn is_visible(&self, threshold: f32) -> bool {
    self.confidence > threshold
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keypoint_index_roundtrip() {
    assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
    assert_eq!(
      KeypointIndex::from_index(16),
      Some(KeypointIndex::RightAnkle)
    );
    assert_eq!(KeypointIndex::from_index(17), None);
    assert_eq!(KeypointIndex::LeftHip as usize, 11);
  }

  #[test]
  fn skeleton_edges_stay_in_range() {
    for (a, b) in SKELETON {
      assert!(a < KEYPOINT_COUNT && b < KEYPOINT_COUNT);
    }
  }

  #[test]
  fn visibility_is_strict() {
    assert!(!Keypoint::new(1.0, 1.0, 0.5).is_visible(KEYPOINT_DRAW_THRESHOLD));
    assert!(Keypoint::new(1.0, 1.0, 0.51).is_visible(KEYPOINT_DRAW_THRESHOLD));
  }
}
