// 该文件是 Zitai （姿态） 项目的一部分。
// src/model/engine.rs - 推理引擎接口
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

use ndarray::{Array4, ArrayD, ArrayView2, Axis, IxDyn, ShapeError};

/// 单次前向推理的原始输出
///
/// 形状为 `1 x channels x candidates`（或去掉 batch 维后的 `channels x candidates`），
/// 通道优先排列。
#[derive(Debug, Clone)]
pub struct RawOutput {
  data: ArrayD<f32>,
}

impl From<ArrayD<f32>> for RawOutput {
  fn from(data: ArrayD<f32>) -> Self {
    Self { data }
  }
}

impl RawOutput {
  pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, ShapeError> {
    Ok(Self {
      data: ArrayD::from_shape_vec(IxDyn(shape), data)?,
    })
  }

  pub fn shape(&self) -> &[usize] {
    self.data.shape()
  }

  /// 去掉 batch 维后的 `channels x candidates` 视图，维度不符时返回 None
  pub fn channel_major(&self) -> Option<ArrayView2<'_, f32>> {
    let view = match self.data.ndim() {
      3 if self.data.shape()[0] == 1 => self.data.index_axis(Axis(0), 0),
      2 => self.data.view(),
      _ => return None,
    };
    view.into_dimensionality().ok()
  }
}

/// 不透明的推理引擎：输入 NCHW 张量，输出原始张量
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn forward(&mut self, input: Array4<f32>) -> Result<RawOutput, Self::Error>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn batch_dimension_is_removed() {
    let raw = RawOutput::from_shape_vec(&[1, 56, 10], vec![0.0; 560]).unwrap();
    let view = raw.channel_major().unwrap();
    assert_eq!(view.shape(), &[56, 10]);
  }

  #[test]
  fn two_dimensional_output_is_accepted() {
    let raw = RawOutput::from_shape_vec(&[6, 3], vec![0.0; 18]).unwrap();
    assert_eq!(raw.channel_major().unwrap().shape(), &[6, 3]);
  }

  #[test]
  fn batched_or_flat_output_is_rejected() {
    let batched = RawOutput::from_shape_vec(&[2, 56, 10], vec![0.0; 1120]).unwrap();
    assert!(batched.channel_major().is_none());
    let flat = RawOutput::from_shape_vec(&[56], vec![0.0; 56]).unwrap();
    assert!(flat.channel_major().is_none());
  }
}
