// 该文件是 Zitai （姿态） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{DetectResult, WithLabel},
  output::{
    Render,
    draw::{Draw, DrawDetectionOnFrame, DrawError, Record},
  },
  url_file_path, url_query,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制配置错误: {0}")]
  DrawError(#[from] DrawError),
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result<T: WithLabel>(
    &self,
    path: &Path,
    frame: &RgbFrame,
    result: &DetectResult<T>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detection(frame, result).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image().save(path)?;
        record.record(result, path)?;
      }
    };

    Ok(())
  }

  pub fn with(kind: Option<&str>) -> Self {
    match kind {
      Some("id") => DrawWrapper::Record(Record {
        label_with_name: false,
      }),
      Some(_) => DrawWrapper::Record(Record {
        label_with_name: true,
      }),
      None => DrawWrapper::Draw(Box::default()),
    }
  }
}

/// 按日期目录保存帧：`<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`
///
/// 默认只保存有检测结果的帧，`always` 时每帧都保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = match (url_query(uri, "record"), url_query(uri, "font")) {
      (None, Some(font)) => DrawWrapper::Draw(Box::new(Draw::default().with_font_file(font)?)),
      (kind, _) => DrawWrapper::with(kind.as_deref()),
    };

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(url_file_path(uri), draw, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, draw: DrawWrapper, always: bool) -> Self {
    Self {
      directory: directory.into(),
      draw,
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  // 计数器回绕后从 0 继续，文件名仍带时间戳
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl<T: WithLabel> Render<RgbFrame, DetectResult<T>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("第 {} 帧无检测结果，跳过保存", frame.index());
      return Ok(());
    }
    let path = self.frame_path(Utc::now())?;
    self.draw.save_result(&path, frame, result)?;
    debug!("保存第 {} 帧到 {}", frame.index(), path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Detection, Person};
  use chrono::TimeZone;
  use image::RgbImage;
  use url::Url;

  fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
      for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
          files.extend(files_under(&path));
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  fn one_person() -> DetectResult<Person> {
    DetectResult::from(vec![Detection {
      kind: Person,
      score: 0.9,
      bbox: [1.0, 1.0, 6.0, 6.0],
      keypoints: None,
    }])
  }

  #[test]
  fn frame_path_is_dated() {
    let dir = std::env::temp_dir().join("zitai-directory-record-path");
    let output = DirectoryRecordOutput::new(&dir, DrawWrapper::with(None), false);
    let now = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
    let first = output.frame_path(now).unwrap();
    let second = output.frame_path(now).unwrap();
    assert_eq!(first, dir.join("2026/03/07/09-05-01-0001.png"));
    assert_eq!(second, dir.join("2026/03/07/09-05-01-0002.png"));
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn empty_results_are_skipped_unless_always() {
    let dir = std::env::temp_dir().join("zitai-directory-record-skip");
    let _ = std::fs::remove_dir_all(&dir);
    let frame = RgbFrame::from(RgbImage::new(8, 8));

    let output = DirectoryRecordOutput::new(&dir, DrawWrapper::with(None), false);
    output
      .render_result(&frame, &DetectResult::<Person>::empty())
      .unwrap();
    assert!(files_under(&dir).is_empty());

    output.render_result(&frame, &one_person()).unwrap();
    assert_eq!(files_under(&dir).len(), 1);

    let always_dir = dir.join("always");
    let output = DirectoryRecordOutput::new(&always_dir, DrawWrapper::with(None), true);
    output
      .render_result(&frame, &DetectResult::<Person>::empty())
      .unwrap();
    assert_eq!(files_under(&always_dir).len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn record_mode_writes_json_next_to_image() {
    let dir = std::env::temp_dir().join("zitai-directory-record-json");
    let _ = std::fs::remove_dir_all(&dir);
    let url = Url::parse(&format!("record://{}?record=id", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let frame = RgbFrame::from(RgbImage::new(8, 8));
    output.render_result(&frame, &one_person()).unwrap();

    let files = files_under(&dir);
    assert_eq!(files.len(), 2);
    let json = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "json"))
      .unwrap();
    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(value[0]["label"], "0");
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("image:///tmp/out.png").unwrap();
    assert!(matches!(
      DirectoryRecordOutput::from_url(&url),
      Err(DirectoryRecordOutputError::SchemeMismatch)
    ));
  }
}
