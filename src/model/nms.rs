// 该文件是 Zitai （姿态） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

/// 左上角 + 宽高形式的边界框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XywhBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl XywhBox {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 由中心点形式 (cx, cy, w, h) 转换
  pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
    Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
  }

  pub fn area(&self) -> f32 {
    self.width.max(0.0) * self.height.max(0.0)
  }

  /// 转为 [x_min, y_min, x_max, y_max]
  pub fn to_xyxy(&self) -> [f32; 4] {
    [self.x, self.y, self.x + self.width, self.y + self.height]
  }

  /// 计算两个边界框的 IoU
  pub fn iou(&self, other: &XywhBox) -> f32 {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = (self.x + self.width).min(other.x + other.width);
    let y2 = (self.y + self.height).min(other.y + other.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 贪心 NMS，返回保留下来的下标，按置信度降序
///
/// 不区分类别：重叠的高分框会抑制其他类别的低分框。
/// `max_detections` 为 None 时保留全部幸存者。
pub fn non_max_suppression(
  boxes: &[XywhBox],
  scores: &[f32],
  iou_threshold: f32,
  max_detections: Option<usize>,
) -> Vec<usize> {
  debug_assert_eq!(boxes.len(), scores.len());

  let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
  // 稳定排序，同分时保持原始顺序
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let limit = max_detections.unwrap_or(usize::MAX);
  let mut keep: Vec<usize> = Vec::new();

  for idx in order {
    if keep.len() >= limit {
      break;
    }
    let suppressed = keep
      .iter()
      .any(|&kept| boxes[kept].iou(&boxes[idx]) > iou_threshold);
    if !suppressed {
      keep.push(idx);
    }
  }

  keep
}
