// 该文件是 Zitai （姿态） 项目的一部分。
// src/task.rs - 推理任务编排
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

use std::{
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理输入的第一帧
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    let infer_elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", infer_elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed() - infer_elapsed);

    Ok(())
  }
}

/// 对同一帧反复推理，统计平均耗时
///
/// 前 `warmup` 次不计入平均值。
#[derive(Debug, Clone)]
pub struct RepeatShotTask {
  repeat_times: usize,
  warmup: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      repeat_times: 1000,
      warmup: 2,
    }
  }
}

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times;
    self
  }

  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }
}

fn average_after_warmup(times: &[Duration], warmup: usize) -> Option<Duration> {
  let measured = times.get(warmup..)?;
  if measured.is_empty() {
    return None;
  }
  Some(measured.iter().sum::<Duration>() / measured.len() as u32)
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务，重复 {} 次...", self.repeat_times);
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    match average_after_warmup(&times, self.warmup) {
      Some(average) => warn!("平均推理时间: {:.2?}", average),
      None => warn!("重复次数不足 {} 次预热，无法统计平均推理时间", self.warmup),
    }

    Ok(())
  }
}

/// 逐帧处理输入，直到输入耗尽、达到指定帧数或收到 Ctrl-C
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理器；进程内只能安装一次
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let mut frame_count: usize = 0;
    let mut now = Instant::now();
    for frame in input {
      frame_count = frame_count.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_count);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_count >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_count);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_count);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;

  #[derive(Debug, thiserror::Error)]
  #[error("fake failure")]
  struct FakeError;

  /// 把输入数字翻倍，遇到负数时报错
  struct Doubler;

  impl Model for Doubler {
    type Input = i32;
    type Output = i32;
    type Error = FakeError;

    fn infer(&mut self, input: &i32) -> Result<i32, FakeError> {
      if *input < 0 {
        return Err(FakeError);
      }
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(i32, i32)>>,
  }

  impl Render<i32, i32> for &Collect {
    type Error = FakeError;

    fn render_result(&self, frame: &i32, result: &i32) -> Result<(), FakeError> {
      self.seen.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn one_shot_uses_first_frame_only() {
    let sink = Collect::default();
    OneShotTask
      .run_task(vec![3, 4].into_iter(), Doubler, &sink)
      .unwrap();
    assert_eq!(*sink.seen.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let sink = Collect::default();
    assert!(
      OneShotTask
        .run_task(Vec::<i32>::new().into_iter(), Doubler, &sink)
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_renders_every_iteration() {
    let sink = Collect::default();
    RepeatShotTask::default()
      .with_repeat_times(5)
      .run_task(vec![1].into_iter(), Doubler, &sink)
      .unwrap();
    assert_eq!(sink.seen.borrow().len(), 5);
  }

  #[test]
  fn average_skips_warmup() {
    let times = [
      Duration::from_millis(100),
      Duration::from_millis(10),
      Duration::from_millis(20),
    ];
    assert_eq!(
      average_after_warmup(&times, 1),
      Some(Duration::from_millis(15))
    );
    assert_eq!(average_after_warmup(&times, 3), None);
    assert_eq!(average_after_warmup(&times, 5), None);
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let sink = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(vec![1, 2, 3].into_iter(), Doubler, &sink)
      .unwrap();
    assert_eq!(*sink.seen.borrow(), vec![(1, 2), (2, 4)]);
  }

  #[test]
  fn continuous_propagates_model_errors() {
    let sink = Collect::default();
    let result = ContinuousTask::default().run_task(
      vec![1, -1, 3].into_iter(),
      Doubler,
      &sink,
    );
    assert!(result.is_err());
    assert_eq!(*sink.seen.borrow(), vec![(1, 2)]);
  }
}
