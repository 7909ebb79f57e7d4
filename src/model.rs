// 该文件是 Zitai （姿态） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测结果，坐标均为原图像素坐标
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
  pub keypoints: Option<[Keypoint; KEYPOINT_COUNT]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult<T> {
  pub items: Box<[Detection<T>]>,
}

impl<T> DetectResult<T> {
  pub fn empty() -> Self {
    Self {
      items: Box::new([]),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// 置信度最高的检测（结果已按置信度降序排列）
  pub fn best(&self) -> Option<&Detection<T>> {
    self.items.first()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection<T>> {
    self.items.iter()
  }
}

impl<T> From<Vec<Detection<T>>> for DetectResult<T> {
  fn from(items: Vec<Detection<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Self;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("推理引擎错误: {0}")]
  EngineError(Box<dyn std::error::Error + Send + Sync>),
  #[error("阈值无效: {name} = {value}，必须位于 (0, 1) 区间")]
  InvalidThreshold { name: &'static str, value: f32 },
  #[error("模型参数无效: {0}")]
  InvalidParameter(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl ModelError {
  pub fn engine<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    ModelError::EngineError(Box::new(err))
  }
}

mod engine;
pub use self::engine::{InferenceEngine, RawOutput};

mod keypoint;
pub use self::keypoint::{
  KEYPOINT_COUNT, KEYPOINT_DRAW_THRESHOLD, Keypoint, KeypointIndex, POSE_PALETTE, SKELETON,
};

mod label;
pub use self::label::{COCO_CLASSES, ClassId, CocoLabel, Person};

pub mod nms;

pub mod postprocess;
pub use self::postprocess::{OutputLayout, PostprocessConfig, postprocess};

#[cfg(feature = "onnxruntime")]
mod onnx;
#[cfg(feature = "onnxruntime")]
pub use self::onnx::{OnnxEngine, OnnxEngineError};

mod yolov8;
pub use self::yolov8::{Yolov8, Yolov8Builder, Yolov8Task};

/// 网络固定输入分辨率
pub const YOLOV8_INPUT_SIZE: u32 = 640;

pub type Yolov8Pose<E> = Yolov8<E, Person, YOLOV8_INPUT_SIZE, YOLOV8_INPUT_SIZE>;
pub type Yolov8Detect<E, T = ClassId> = Yolov8<E, T, YOLOV8_INPUT_SIZE, YOLOV8_INPUT_SIZE>;
