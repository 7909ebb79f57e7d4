// 该文件是 Zitai （姿态） 项目的一部分。
// src/model/postprocess.rs - YOLOv8 输出后处理
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

//! 将网络原始输出转换为检测结果。
//!
//! 流程：转置 → 置信度过滤 → 中心框转角点框 → NMS → 关键点解码 → 缩放回原图。
//! 整个过程是纯函数，异常输入一律得到空结果，不会返回错误。

use ndarray::{ArrayView1, ArrayView2};
use tracing::{debug, warn};

use crate::model::{
  DetectResult, Detection, KEYPOINT_COUNT, Keypoint, ModelError, RawOutput, WithLabel,
  nms::{XywhBox, non_max_suppression},
};

const BOX_CHANNELS: usize = 4;
const SCORE_CHANNEL: usize = 4;
const KEYPOINT_STEP: usize = 3;
const POSE_CHANNELS: usize = BOX_CHANNELS + 1 + KEYPOINT_COUNT * KEYPOINT_STEP;

/// 网络输出的通道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// `4 + C`：框 + 各类别分数
  Detect,
  /// `4 + 1 + 17 * 3`：框 + 目标分数 + 关键点
  Pose,
}

impl OutputLayout {
  pub fn min_channels(&self) -> usize {
    match self {
      OutputLayout::Detect => BOX_CHANNELS + 1,
      OutputLayout::Pose => POSE_CHANNELS,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessConfig {
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  /// None 表示不限制数量
  pub max_detections: Option<usize>,
}

impl Default for PostprocessConfig {
  fn default() -> Self {
    Self {
      conf_threshold: 0.5,
      iou_threshold: 0.45,
      max_detections: None,
    }
  }
}

impl PostprocessConfig {
  /// 单人姿态：只保留最优的一个
  pub fn single_subject() -> Self {
    Self {
      max_detections: Some(1),
      ..Self::default()
    }
  }

  pub fn validate(&self) -> Result<(), ModelError> {
    check_threshold("conf", self.conf_threshold)?;
    check_threshold("iou", self.iou_threshold)?;
    if self.max_detections == Some(0) {
      return Err(ModelError::InvalidParameter(
        "max_det 不能为 0".to_string(),
      ));
    }
    Ok(())
  }
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), ModelError> {
  if value > 0.0 && value < 1.0 {
    Ok(())
  } else {
    Err(ModelError::InvalidThreshold { name, value })
  }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
  row: usize,
  score: f32,
  class_id: u32,
  bbox: XywhBox,
}

/// 网络输入坐标到原图坐标的拉伸系数
#[derive(Debug, Clone, Copy)]
struct Rescale {
  x: f32,
  y: f32,
}

impl Rescale {
  fn new(input_size: (u32, u32), original_size: (u32, u32)) -> Self {
    Self {
      x: original_size.0 as f32 / input_size.0 as f32,
      y: original_size.1 as f32 / input_size.1 as f32,
    }
  }

  fn bbox(&self, [x1, y1, x2, y2]: [f32; 4]) -> [f32; 4] {
    [x1 * self.x, y1 * self.y, x2 * self.x, y2 * self.y]
  }

  fn keypoint(&self, x: f32, y: f32, confidence: f32) -> Keypoint {
    Keypoint::new(x * self.x, y * self.y, confidence)
  }
}

/// 后处理入口
///
/// `input_size` 为网络输入分辨率，`original_size` 为原图分辨率，均为 (宽, 高)。
pub fn postprocess<T: WithLabel>(
  raw: &RawOutput,
  layout: OutputLayout,
  config: &PostprocessConfig,
  input_size: (u32, u32),
  original_size: (u32, u32),
) -> DetectResult<T> {
  let Some(channel_major) = raw.channel_major() else {
    warn!("输出张量维度无效: {:?}", raw.shape());
    return DetectResult::empty();
  };

  // channels x candidates -> candidates x channels
  let rows = channel_major.t();
  if rows.ncols() < layout.min_channels() {
    warn!(
      "输出通道数不足: 期望至少 {}, 实际 {}",
      layout.min_channels(),
      rows.ncols()
    );
    return DetectResult::empty();
  }

  let candidates = filter_candidates(rows.view(), layout, config.conf_threshold);
  debug!(
    "候选框 {} 个，超过阈值 {} 的有 {} 个",
    rows.nrows(),
    config.conf_threshold,
    candidates.len()
  );
  if candidates.is_empty() {
    return DetectResult::empty();
  }

  let boxes: Vec<XywhBox> = candidates.iter().map(|c| c.bbox).collect();
  let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
  let keep = non_max_suppression(
    &boxes,
    &scores,
    config.iou_threshold,
    config.max_detections,
  );
  debug!("NMS 后保留 {} 个", keep.len());

  let rescale = Rescale::new(input_size, original_size);
  keep
    .into_iter()
    .map(|idx| {
      let candidate = &candidates[idx];
      Detection {
        kind: T::from_label_id(candidate.class_id),
        score: candidate.score,
        bbox: rescale.bbox(candidate.bbox.to_xyxy()),
        keypoints: match layout {
          OutputLayout::Pose => Some(decode_keypoints(rows.row(candidate.row), &rescale)),
          OutputLayout::Detect => None,
        },
      }
    })
    .collect::<Vec<_>>()
    .into()
}

fn filter_candidates(
  rows: ArrayView2<'_, f32>,
  layout: OutputLayout,
  conf_threshold: f32,
) -> Vec<Candidate> {
  rows
    .outer_iter()
    .enumerate()
    .filter_map(|(row, values)| {
      let (score, class_id) = match layout {
        OutputLayout::Pose => (values[SCORE_CHANNEL], 0),
        OutputLayout::Detect => best_class(values)?,
      };
      if score.is_nan() || score <= conf_threshold {
        return None;
      }
      Some(Candidate {
        row,
        score,
        class_id,
        bbox: XywhBox::from_center(values[0], values[1], values[2], values[3]),
      })
    })
    .collect()
}

/// 类别分数最大值及其下标，同分取第一个
fn best_class(values: ArrayView1<'_, f32>) -> Option<(f32, u32)> {
  values
    .iter()
    .skip(BOX_CHANNELS)
    .enumerate()
    .fold(None, |best: Option<(f32, u32)>, (id, &score)| match best {
      Some((best_score, _)) if score.is_nan() || score <= best_score => best,
      _ => Some((score, id as u32)),
    })
}

fn decode_keypoints(values: ArrayView1<'_, f32>, rescale: &Rescale) -> [Keypoint; KEYPOINT_COUNT] {
  let offset = BOX_CHANNELS + 1;
  std::array::from_fn(|i| {
    let base = offset + i * KEYPOINT_STEP;
    rescale.keypoint(values[base], values[base + 1], values[base + 2])
  })
}
