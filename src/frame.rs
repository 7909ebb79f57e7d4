// 该文件是 Zitai （姿态） 项目的一部分。
// src/frame.rs - 帧与网络输入张量定义
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

use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;

const RGB_CHANNELS: usize = 3;

/// 原始分辨率的 RGB 帧
#[derive(Debug, Clone)]
pub struct RgbFrame {
  image: RgbImage,
  index: usize,
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    Self { image, index: 0 }
  }
}

impl RgbFrame {
  pub fn with_index(mut self, index: usize) -> Self {
    self.index = index;
    self
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }
}

/// 网络输入张量：拉伸缩放到 W x H，归一化到 [0, 1]，NCHW，batch 为 1
///
/// 不做 letterbox 填充，后处理中的坐标还原依赖这一点。
#[derive(Debug, Clone)]
pub struct NchwTensor<const W: u32, const H: u32> {
  data: Array4<f32>,
}

impl<const W: u32, const H: u32> NchwTensor<W, H> {
  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let resized = if image.dimensions() == (W, H) {
      image.clone()
    } else {
      image::imageops::resize(image, W, H, FilterType::Triangle)
    };

    let mut data = Array4::<f32>::zeros((1, RGB_CHANNELS, H as usize, W as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
      let (x, y) = (x as usize, y as usize);
      for c in 0..RGB_CHANNELS {
        data[[0, c, y, x]] = pixel[c] as f32 / 255.0;
      }
    }

    Self { data }
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_array(&self) -> &Array4<f32> {
    &self.data
  }

  pub fn into_array(self) -> Array4<f32> {
    self.data
  }
}
