// 该文件是 Zitai （姿态） 项目的一部分。
// src/output/draw.rs - 检测结果与人体骨架可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
  draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
  draw_text_mut,
};
use imageproc::rect::Rect;
use serde::Serialize;
use thiserror::Error;

use crate::{
  frame::RgbFrame,
  model::{DetectResult, KEYPOINT_DRAW_THRESHOLD, Keypoint, POSE_PALETTE, SKELETON, WithLabel},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

// 骨架渲染常量
const KEYPOINT_RADIUS: i32 = 5;
const LIMB_THICKNESS: i32 = 2;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: Option<FontArc>,
  label_color: [u8; 3],
  draw_boxes: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      label_color: LABEL_COLOR,
      font: None,
      draw_boxes: true,
    }
  }
}

impl Draw {
  /// 加载标签字体；未设置字体时只画框不写字
  pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    self.font = Some(FontArc::try_from_vec(data)?);
    Ok(self)
  }

  pub fn with_boxes(mut self, draw_boxes: bool) -> Self {
    self.draw_boxes = draw_boxes;
    self
  }

  // 在图像上绘制一个矩形边框，bbox 为原图像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label<T: WithLabel>(
    &self,
    image: &mut RgbImage,
    bbox: &[f32; 4],
    kind: &T,
    score: f32,
  ) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Rgb(self.label_color);
    // 绘制边框（加粗为2像素）
    for thickness in 0..2 {
      let width = x_max - x_min - 2 * thickness;
      let height = y_max - y_min - 2 * thickness;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + thickness, y_min + thickness).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    // 创建标签文本
    let label = format!("{} {:.2}", kind.to_label_str(), score);
    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]); // 白色文本

    // 估算文本大小（粗略估计）
    let text_width = (label.len() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签背景放在边框上方
    let label_x = x_min;
    let label_y = (y_min - text_height).max(0);
    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = text_height as u32;

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        text_color,
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        font,
        &label,
      );
    }
  }
}

/// 在图像上绘制人体骨架
///
/// 置信度大于 0.5 的关键点画实心圆；两端都大于 0.5 的连线才会绘制。
pub fn draw_skeleton(image: &mut RgbImage, keypoints: &[Keypoint]) {
  for (i, kp) in keypoints.iter().enumerate() {
    if kp.is_visible(KEYPOINT_DRAW_THRESHOLD) {
      draw_filled_circle_mut(
        image,
        (kp.x as i32, kp.y as i32),
        KEYPOINT_RADIUS,
        Rgb(POSE_PALETTE[i % POSE_PALETTE.len()]),
      );
    }
  }

  for (i, &(a, b)) in SKELETON.iter().enumerate() {
    let (Some(p1), Some(p2)) = (keypoints.get(a), keypoints.get(b)) else {
      continue;
    };
    if !p1.is_visible(KEYPOINT_DRAW_THRESHOLD) || !p2.is_visible(KEYPOINT_DRAW_THRESHOLD) {
      continue;
    }
    let color = Rgb(POSE_PALETTE[i % POSE_PALETTE.len()]);
    let (x1, y1) = (p1.x.trunc(), p1.y.trunc());
    let (x2, y2) = (p2.x.trunc(), p2.y.trunc());
    // 陡峭的连线沿 x 方向加粗，平缓的沿 y 方向加粗
    let steep = (y2 - y1).abs() > (x2 - x1).abs();
    for offset in 0..LIMB_THICKNESS {
      let offset = offset as f32;
      let (dx, dy) = if steep { (offset, 0.0) } else { (0.0, offset) };
      draw_line_segment_mut(image, (x1 + dx, y1 + dy), (x2 + dx, y2 + dy), color);
    }
  }
}

pub trait DrawDetectionOnImage<T: WithLabel> {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>);
}

pub trait DrawDetectionOnFrame<T: WithLabel> {
  fn draw_detection(&self, frame: &RgbFrame, result: &DetectResult<T>) -> RgbImage;
}

impl<T: WithLabel, D: DrawDetectionOnImage<T>> DrawDetectionOnFrame<T> for D {
  fn draw_detection(&self, frame: &RgbFrame, result: &DetectResult<T>) -> RgbImage {
    let mut image = frame.image().clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

impl<T: WithLabel> DrawDetectionOnImage<T> for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for item in result.iter() {
      if self.draw_boxes {
        self.draw_bbox_with_label(image, &item.bbox, &item.kind, item.score);
      }
      if let Some(keypoints) = &item.keypoints {
        draw_skeleton(image, keypoints);
      }
    }
  }
}

#[derive(Serialize)]
struct RecordItem {
  label: String,
  score: f32,
  bbox: [f32; 4],
  #[serde(skip_serializing_if = "Option::is_none")]
  keypoints: Option<Vec<Keypoint>>,
}

/// 将检测结果写为与图片同名的 JSON 文件
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn to_json<T: WithLabel>(
    &self,
    result: &DetectResult<T>,
  ) -> Result<serde_json::Value, serde_json::Error> {
    let items: Vec<RecordItem> = result
      .iter()
      .map(|item| RecordItem {
        label: if self.label_with_name {
          item.kind.to_label_str()
        } else {
          format!("{}", item.kind.to_label_id())
        },
        score: item.score,
        bbox: item.bbox,
        keypoints: item.keypoints.map(|kps| kps.to_vec()),
      })
      .collect();
    serde_json::to_value(items)
  }

  pub fn record<T: WithLabel>(
    &self,
    result: &DetectResult<T>,
    path: &Path,
  ) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(&self.to_json(result)?)?;
    std::fs::write(path.with_extension("json"), json)?;
    Ok(())
  }
}
