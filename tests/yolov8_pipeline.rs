// 该文件是 Zitai （姿态） 项目的一部分。
// tests/yolov8_pipeline.rs - 预处理、推理与后处理整体流程测试
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

use std::convert::Infallible;

use image::{Rgb, RgbImage};
use ndarray::{Array3, Array4};
use url::Url;

use zitai::{
  FromUrl,
  frame::RgbFrame,
  input::ImageFileInput,
  model::{
    ClassId, InferenceEngine, KEYPOINT_COUNT, Model, ModelError, Person, RawOutput,
    Yolov8Builder, Yolov8Task,
  },
  output::{DirectoryRecordOutput, DrawWrapper},
  task::{OneShotTask, Task},
};

const CANDIDATES: usize = 8400;

/// 返回固定张量的推理引擎，并检查输入形状
struct FixedEngine {
  output: Array3<f32>,
}

impl InferenceEngine for FixedEngine {
  type Error = Infallible;

  fn forward(&mut self, input: Array4<f32>) -> Result<RawOutput, Self::Error> {
    assert_eq!(input.shape(), &[1, 3, 640, 640]);
    assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
    Ok(RawOutput::from(self.output.clone().into_dyn()))
  }
}

fn set_box(output: &mut Array3<f32>, candidate: usize, cxcywh: [f32; 4]) {
  for (c, v) in cxcywh.into_iter().enumerate() {
    output[[0, c, candidate]] = v;
  }
}

/// 候选 42 为一个人，候选 43 为与其重叠、分数更低的重复框
fn pose_output() -> Array3<f32> {
  let mut output = Array3::<f32>::zeros((1, 56, CANDIDATES));
  for candidate in [42, 43] {
    set_box(&mut output, candidate, [320.0, 320.0, 64.0, 128.0]);
    for k in 0..KEYPOINT_COUNT {
      output[[0, 5 + 3 * k, candidate]] = 100.0 + 10.0 * k as f32;
      output[[0, 6 + 3 * k, candidate]] = 200.0;
      output[[0, 7 + 3 * k, candidate]] = 0.9;
    }
  }
  output[[0, 4, 42]] = 0.8;
  output[[0, 4, 43]] = 0.7;
  output
}

fn close(a: f32, b: f32) -> bool {
  (a - b).abs() < 1e-3
}

#[test]
fn pose_detection_is_scaled_back_to_frame() {
  let engine = FixedEngine {
    output: pose_output(),
  };
  let mut model = Yolov8Builder::new("unused.onnx", Yolov8Task::Pose)
    .build_with_engine::<_, Person, 640, 640>(engine)
    .unwrap();

  let frame = RgbFrame::from(RgbImage::from_pixel(1280, 720, Rgb([128, 64, 32])));
  let result = model.infer(&frame).unwrap();

  assert_eq!(result.len(), 1);
  let det = result.best().unwrap();
  assert!(close(det.score, 0.8));
  let expected = [576.0, 288.0, 704.0, 432.0];
  for (got, want) in det.bbox.iter().zip(expected) {
    assert!(close(*got, want), "bbox {:?}", det.bbox);
  }

  let keypoints = det.keypoints.unwrap();
  for (k, kp) in keypoints.iter().enumerate() {
    assert!(close(kp.x, (100.0 + 10.0 * k as f32) * 2.0));
    assert!(close(kp.y, 225.0));
    assert!(close(kp.confidence, 0.9));
  }
}

#[test]
fn pose_without_confident_candidates_is_empty() {
  let mut output = pose_output();
  output[[0, 4, 42]] = 0.5;
  output[[0, 4, 43]] = 0.2;
  let mut model = Yolov8Builder::new("unused.onnx", Yolov8Task::Pose)
    .build_with_engine::<_, Person, 640, 640>(FixedEngine { output })
    .unwrap();

  let frame = RgbFrame::from(RgbImage::new(640, 640));
  assert!(model.infer(&frame).unwrap().is_empty());
}

#[test]
fn detect_keeps_disjoint_objects_of_each_class() {
  let mut output = Array3::<f32>::zeros((1, 4 + 3, 100));
  set_box(&mut output, 3, [100.0, 100.0, 40.0, 40.0]);
  output[[0, 4 + 2, 3]] = 0.9;
  set_box(&mut output, 7, [400.0, 400.0, 40.0, 40.0]);
  output[[0, 4 + 1, 7]] = 0.6;

  let url = Url::parse("yolov8-detect:///models/custom.onnx?conf=0.25").unwrap();
  let mut model = Yolov8Builder::from_url(&url)
    .unwrap()
    .build_with_engine::<_, ClassId, 640, 640>(FixedEngine { output })
    .unwrap();

  let frame = RgbFrame::from(RgbImage::new(640, 640));
  let result = model.infer(&frame).unwrap();
  let kinds: Vec<ClassId> = result.iter().map(|d| d.kind).collect();
  assert_eq!(kinds, vec![ClassId(2), ClassId(1)]);
  assert!(result.iter().all(|d| d.keypoints.is_none()));
}

#[test]
fn invalid_thresholds_are_rejected_before_inference() {
  let result = Yolov8Builder::new("unused.onnx", Yolov8Task::Pose)
    .conf_threshold(1.5)
    .build_with_engine::<_, Person, 640, 640>(FixedEngine {
      output: pose_output(),
    });
  assert!(matches!(result, Err(ModelError::InvalidThreshold { .. })));
}

#[test]
fn one_shot_task_records_pose_to_directory() {
  let dir = std::env::temp_dir().join("zitai-pipeline-record");
  let _ = std::fs::remove_dir_all(&dir);

  let input = ImageFileInput::from(RgbImage::new(1280, 720));
  let model = Yolov8Builder::new("unused.onnx", Yolov8Task::Pose)
    .build_with_engine::<_, Person, 640, 640>(FixedEngine {
      output: pose_output(),
    })
    .unwrap();
  let output = DirectoryRecordOutput::new(&dir, DrawWrapper::with(Some("name")), false);

  OneShotTask.run_task(input, model, output).unwrap();

  let mut json_files = Vec::new();
  let mut pending = vec![dir.clone()];
  while let Some(path) = pending.pop() {
    for entry in std::fs::read_dir(&path).unwrap().flatten() {
      let path = entry.path();
      if path.is_dir() {
        pending.push(path);
      } else if path.extension().is_some_and(|e| e == "json") {
        json_files.push(path);
      }
    }
  }
  assert_eq!(json_files.len(), 1);
  let value: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(&json_files[0]).unwrap()).unwrap();
  assert_eq!(value[0]["label"], "person");
  assert_eq!(
    value[0]["keypoints"].as_array().unwrap().len(),
    KEYPOINT_COUNT
  );

  let _ = std::fs::remove_dir_all(&dir);
}
