// 该文件是 Zitai （姿态） 项目的一部分。
// src/input/read_image_directory.rs - 图像目录输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, url_file_path};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Not a directory: {0}")]
  NotADirectory(String),
}

/// 按文件名顺序逐帧读取目录中的图片
///
/// 无法解码的文件会被跳过。
pub struct ImageDirectoryInput {
  files: std::vec::IntoIter<PathBuf>,
  index: usize,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirectoryInputError::SchemaMismatch);
    }
    Self::open(url_file_path(url))
  }
}

impl ImageDirectoryInput {
  pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self, ImageDirectoryInputError> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
      return Err(ImageDirectoryInputError::NotADirectory(
        directory.display().to_string(),
      ));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图片", directory.display(), files.len());

    Ok(Self {
      files: files.into_iter(),
      index: 0,
    })
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_ascii_lowercase();
      IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
    .unwrap_or(false)
}

impl Iterator for ImageDirectoryInput {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      let decoded = ImageReader::open(&path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());
      match decoded {
        Ok(image) => {
          debug!("读取图像: {}", path.display());
          let frame = RgbFrame::from(image.into_rgb8()).with_index(self.index);
          self.index += 1;
          return Some(frame);
        }
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn iterates_images_in_name_order() {
    let dir = std::env::temp_dir().join("zitai-read-image-directory");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
      .save(dir.join("b.png"))
      .unwrap();
    RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]))
      .save(dir.join("a.png"))
      .unwrap();
    std::fs::write(dir.join("c.png"), b"not an image").unwrap();
    std::fs::write(dir.join("notes.txt"), b"skip me").unwrap();

    let frames: Vec<RgbFrame> = ImageDirectoryInput::open(&dir).unwrap().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].width(), 8);
    assert_eq!(frames[0].index(), 0);
    assert_eq!(frames[1].width(), 4);
    assert_eq!(frames[1].index(), 1);

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn decodes_by_content_not_extension() {
    let dir = std::env::temp_dir().join("zitai-read-image-directory-mislabeled");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    // PNG 内容但扩展名为 jpg
    RgbImage::from_pixel(6, 3, Rgb([0, 0, 0]))
      .save_with_format(dir.join("frame.jpg"), image::ImageFormat::Png)
      .unwrap();

    let frames: Vec<RgbFrame> = ImageDirectoryInput::open(&dir).unwrap().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].width(), frames[0].height()), (6, 3));

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn missing_directory_is_an_error() {
    let dir = std::env::temp_dir().join("zitai-does-not-exist");
    assert!(matches!(
      ImageDirectoryInput::open(dir),
      Err(ImageDirectoryInputError::NotADirectory(_))
    ));
  }
}
