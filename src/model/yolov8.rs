// 该文件是 Zitai （姿态） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 姿态/检测模型
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

use std::marker::PhantomData;

use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  frame::{NchwTensor, RgbFrame},
  model::{
    DetectResult, InferenceEngine, Model, ModelError, OutputLayout, PostprocessConfig,
    WithLabel, postprocess,
  },
  url_file_path, url_query,
};

const YOLOV8_POSE_SCHEME: &str = "yolov8-pose";
const YOLOV8_DETECT_SCHEME: &str = "yolov8-detect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yolov8Task {
  Pose,
  Detect,
}

impl Yolov8Task {
  fn layout(&self) -> OutputLayout {
    match self {
      Yolov8Task::Pose => OutputLayout::Pose,
      Yolov8Task::Detect => OutputLayout::Detect,
    }
  }

  fn default_config(&self) -> PostprocessConfig {
    match self {
      Yolov8Task::Pose => PostprocessConfig::single_subject(),
      Yolov8Task::Detect => PostprocessConfig::default(),
    }
  }
}

/// YOLOv8 模型：预处理 → 引擎推理 → 后处理
///
/// `W`/`H` 为网络固定输入分辨率，`T` 为输出标签类型。
pub struct Yolov8<E, T, const W: u32, const H: u32> {
  engine: E,
  task: Yolov8Task,
  config: PostprocessConfig,
  _phantom: PhantomData<T>,
}

impl<E, T, const W: u32, const H: u32> Yolov8<E, T, W, H> {
  pub fn task(&self) -> Yolov8Task {
    self.task
  }

  pub fn config(&self) -> &PostprocessConfig {
    &self.config
  }
}

#[derive(Debug, Clone)]
pub struct Yolov8Builder {
  model_path: String,
  task: Yolov8Task,
  config: PostprocessConfig,
}

impl FromUrl for Yolov8Builder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let task = match url.scheme() {
      YOLOV8_POSE_SCHEME => Yolov8Task::Pose,
      YOLOV8_DETECT_SCHEME => Yolov8Task::Detect,
      other => {
        return Err(ModelError::ModelPathError(format!(
          "模型路径必须使用 {} 或 {} 方案, 实际为 {}",
          YOLOV8_POSE_SCHEME, YOLOV8_DETECT_SCHEME, other
        )));
      }
    };

    let mut builder = Yolov8Builder::new(url_file_path(url), task);
    if let Some(conf) = url_query(url, "conf") {
      builder = builder.conf_threshold(parse_param("conf", &conf)?);
    }
    if let Some(iou) = url_query(url, "iou") {
      builder = builder.iou_threshold(parse_param("iou", &iou)?);
    }
    if let Some(max_det) = url_query(url, "max_det") {
      let max_det = match max_det.as_str() {
        "all" | "none" => None,
        value => Some(parse_param("max_det", value)?),
      };
      builder = builder.max_detections(max_det);
    }
    Ok(builder)
  }
}

fn parse_param<V: std::str::FromStr>(name: &str, value: &str) -> Result<V, ModelError> {
  value
    .parse()
    .map_err(|_| ModelError::InvalidParameter(format!("{} = {}", name, value)))
}

impl Yolov8Builder {
  pub fn new(model_path: impl Into<String>, task: Yolov8Task) -> Self {
    Self {
      model_path: model_path.into(),
      task,
      config: task.default_config(),
    }
  }

  pub fn conf_threshold(mut self, conf_threshold: f32) -> Self {
    self.config.conf_threshold = conf_threshold;
    self
  }

  pub fn iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.config.iou_threshold = iou_threshold;
    self
  }

  pub fn max_detections(mut self, max_detections: Option<usize>) -> Self {
    self.config.max_detections = max_detections;
    self
  }

  pub fn model_path(&self) -> &str {
    &self.model_path
  }

  pub fn task(&self) -> Yolov8Task {
    self.task
  }

  pub fn config(&self) -> &PostprocessConfig {
    &self.config
  }

  #[cfg(feature = "onnxruntime")]
  pub fn build<T, const W: u32, const H: u32>(
    self,
  ) -> Result<Yolov8<crate::model::OnnxEngine, T, W, H>, ModelError> {
    let engine = crate::model::OnnxEngine::from_file(&self.model_path).map_err(ModelError::engine)?;
    self.build_with_engine(engine)
  }

  /// 使用外部提供的推理引擎构建模型
  pub fn build_with_engine<E, T, const W: u32, const H: u32>(
    self,
    engine: E,
  ) -> Result<Yolov8<E, T, W, H>, ModelError> {
    self.config.validate()?;
    info!(
      "YOLOv8 {:?}: 输入 {}x{}, conf={}, iou={}, max_det={:?}",
      self.task,
      W,
      H,
      self.config.conf_threshold,
      self.config.iou_threshold,
      self.config.max_detections
    );
    Ok(Yolov8 {
      engine,
      task: self.task,
      config: self.config,
      _phantom: PhantomData,
    })
  }
}

impl<E: InferenceEngine, T: WithLabel, const W: u32, const H: u32> Model for Yolov8<E, T, W, H> {
  type Input = RgbFrame;
  type Output = DetectResult<T>;
  type Error = ModelError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理第 {} 帧: {}x{}", input.index(), input.width(), input.height());
    let tensor = NchwTensor::<W, H>::from_rgb_image(input.image());

    let output = self
      .engine
      .forward(tensor.into_array())
      .map_err(ModelError::engine)?;
    debug!("模型输出形状: {:?}", output.shape());

    let result = postprocess(
      &output,
      self.task.layout(),
      &self.config,
      (W, H),
      (input.width(), input.height()),
    );
    debug!("检测到 {} 个目标", result.len());
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pose_url_defaults_to_single_subject() {
    let url = Url::parse("yolov8-pose:///models/yolov8n-pose.onnx").unwrap();
    let builder = Yolov8Builder::from_url(&url).unwrap();
    assert_eq!(builder.task(), Yolov8Task::Pose);
    assert_eq!(builder.model_path(), "/models/yolov8n-pose.onnx");
    assert_eq!(builder.config().max_detections, Some(1));
    assert_eq!(builder.config().conf_threshold, 0.5);
    assert_eq!(builder.config().iou_threshold, 0.45);
  }

  #[test]
  fn detect_url_reads_query() {
    let url = Url::parse("yolov8-detect:///m/sitreach.onnx?conf=0.3&iou=0.6&max_det=5").unwrap();
    let builder = Yolov8Builder::from_url(&url).unwrap();
    assert_eq!(builder.task(), Yolov8Task::Detect);
    assert_eq!(builder.config().conf_threshold, 0.3);
    assert_eq!(builder.config().iou_threshold, 0.6);
    assert_eq!(builder.config().max_detections, Some(5));
  }

  #[test]
  fn pose_can_track_all_subjects() {
    let url = Url::parse("yolov8-pose:///m.onnx?max_det=all").unwrap();
    let builder = Yolov8Builder::from_url(&url).unwrap();
    assert_eq!(builder.config().max_detections, None);
  }

  #[test]
  fn bad_scheme_and_params_are_rejected() {
    let url = Url::parse("yolov5:///m.onnx").unwrap();
    assert!(matches!(
      Yolov8Builder::from_url(&url),
      Err(ModelError::ModelPathError(_))
    ));
    let url = Url::parse("yolov8-pose:///m.onnx?conf=abc").unwrap();
    assert!(matches!(
      Yolov8Builder::from_url(&url),
      Err(ModelError::InvalidParameter(_))
    ));
  }
}
