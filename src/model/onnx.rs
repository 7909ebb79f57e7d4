// 该文件是 Zitai （姿态） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
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

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{InferenceEngine, RawOutput};

#[derive(Error, Debug)]
pub enum OnnxEngineError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("模型没有输出")]
  MissingOutput,
}

impl From<std::io::Error> for OnnxEngineError {
  fn from(err: std::io::Error) -> Self {
    OnnxEngineError::ModelLoadError(err)
  }
}

impl OnnxEngineError {
  fn ort<E: std::fmt::Display>(err: E) -> Self {
    OnnxEngineError::OrtError(err.to_string())
  }
}

/// 基于 ort 会话的推理引擎，取第一个输入与第一个输出
pub struct OnnxEngine {
  session: Session,
}

impl OnnxEngine {
  pub fn from_file<P: AsRef<Path>>(model_path: P) -> Result<Self, OnnxEngineError> {
    let model_path = model_path.as_ref();
    info!("加载模型文件: {}", model_path.display());
    let metadata = std::fs::metadata(model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .map_err(OnnxEngineError::ort)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(OnnxEngineError::ort)?
      .commit_from_file(model_path)
      .map_err(OnnxEngineError::ort)?;

    debug!("模型输入数量: {}", session.inputs.len());
    debug!("模型输出数量: {}", session.outputs.len());
    if session.outputs.is_empty() {
      return Err(OnnxEngineError::MissingOutput);
    }
    info!("模型加载完成");

    Ok(Self { session })
  }
}

impl InferenceEngine for OnnxEngine {
  type Error = OnnxEngineError;

  fn forward(&mut self, input: Array4<f32>) -> Result<RawOutput, Self::Error> {
    debug!("设置模型输入: {:?}", input.shape());
    let input_tensor = Tensor::from_array(input).map_err(OnnxEngineError::ort)?;

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(ort::inputs![input_tensor])
      .map_err(OnnxEngineError::ort)?;

    let output = outputs[0]
      .try_extract_array::<f32>()
      .map_err(OnnxEngineError::ort)?;
    debug!("模型输出形状: {:?}", output.shape());

    Ok(RawOutput::from(output.to_owned()))
  }
}
