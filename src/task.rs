// 该文件是 Zhijian （质检） 项目的一部分。
// src/task.rs - 检验任务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Zhijian Contributors

use std::{thread, time::Duration};

use image::RgbImage;
use tracing::{error, info, warn};

use crate::{
  model::Model,
  output::Render,
  station::{InspectionOutcome, InspectionReport},
  tally::SessionTally,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<SessionTally, Self::Error>;
}

/// 记录并输出一次检验结果；推理出错的检验显示为 FAIL 但不计入统计
fn render_outcome<O, RE>(
  frame: &RgbImage,
  outcome: InspectionOutcome,
  output: &O,
  tally: &mut SessionTally,
) -> Result<(), RE>
where
  O: Render<RgbImage, InspectionReport, Error = RE>,
{
  match outcome.error() {
    Some(e) => warn!("API Error: {}", e),
    None => tally.record(outcome.verdict),
  }
  info!("{}: {}", outcome.status, tally);

  let report = InspectionReport {
    outcome,
    tally: *tally,
  };
  output.render_result(frame, &report)
}

pub struct OneShotTask;

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = InspectionOutcome, Error = ME>,
  O: Render<RgbImage, InspectionReport, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<SessionTally, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始检验...");
    let now = std::time::Instant::now();
    let mut tally = SessionTally::default();
    let outcome = model.infer(&frame)?;
    render_outcome(&frame, outcome, &output, &mut tally)?;
    info!("检验与输出完成，耗时: {:.2?}", now.elapsed());

    Ok(tally)
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = InspectionOutcome, Error = ME>,
  O: Render<RgbImage, InspectionReport, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<SessionTally, Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    output.render_standby()?;

    let mut tally = SessionTally::default();
    let mut frame_index = 0;
    for frame in input {
      frame_index += 1;
      info!("检验第 {} 张图像", frame_index);
      let now = std::time::Instant::now();
      // 单张图像检验失败不影响后续图像，输出端失败则结束任务
      match model.infer(&frame) {
        Ok(outcome) => {
          render_outcome(&frame, outcome, &output, &mut tally)?;
          info!("检验与输出完成，耗时: {:.2?}", now.elapsed());
        }
        Err(e) => error!("第 {} 张图像检验失败，跳过: {}", frame_index, e),
      }
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定数量 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成: {}", tally);
    Ok(tally)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::{Detection, DetectionResult},
    station::{Station, tests::FixedModel},
    verdict::ClassVocabulary,
  };
  use image::Rgb;
  use std::cell::RefCell;

  #[derive(Default)]
  struct Collect {
    reports: RefCell<Vec<InspectionReport>>,
  }

  impl Render<RgbImage, InspectionReport> for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, _frame: &RgbImage, result: &InspectionReport) -> Result<(), Self::Error> {
      self.reports.borrow_mut().push(result.clone());
      Ok(())
    }
  }

  fn frames(n: usize) -> std::vec::IntoIter<RgbImage> {
    vec![RgbImage::from_pixel(64, 64, Rgb([1, 1, 1])); n].into_iter()
  }

  #[test]
  fn one_shot_records_pass() {
    let result = DetectionResult::from(vec![
      Detection::new("circlip", (10.0, 10.0), (4.0, 4.0), 0.9),
      Detection::new("black", (10.0, 10.0), (20.0, 20.0), 0.9),
    ]);
    let station = Station::new(FixedModel(result), ClassVocabulary::default());
    let collect = Collect::default();

    let tally = OneShotTask.run_task(frames(3), station, &collect).unwrap();
    assert_eq!((tally.ok(), tally.nok()), (1, 0));

    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].tally, tally);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let station = Station::new(FixedModel(DetectionResult::empty()), ClassVocabulary::default());
    let collect = Collect::default();
    assert!(OneShotTask.run_task(frames(0), station, &collect).is_err());
  }

  #[test]
  fn inference_errors_are_rendered_but_not_counted() {
    let station = Station::new(
      FixedModel(DetectionResult::transport_error("dns failure")),
      ClassVocabulary::default(),
    );
    let collect = Collect::default();
    let mut tally = SessionTally::default();
    for frame in frames(2) {
      let outcome = station.infer(&frame).unwrap();
      render_outcome(&frame, outcome, &&collect, &mut tally).unwrap();
    }
    assert_eq!(tally.total(), 0);

    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 2);
    assert!(reports[1].outcome.error().is_some());
    assert_eq!(reports[1].outcome.status.to_string(), "FAIL");
  }

  // 整个测试进程只能注册一次 Ctrl-C 处理器，连续任务只在这里运行
  #[test]
  fn continuous_task_skips_frames_that_cannot_be_inspected() {
    let result = DetectionResult::from(vec![
      Detection::new("circlip", (4.0, 4.0), (2.0, 2.0), 0.9),
      Detection::new("white", (4.0, 4.0), (6.0, 6.0), 0.9),
    ]);
    let station = Station::new(FixedModel(result), ClassVocabulary::default());
    let collect = Collect::default();
    // JPEG 单边不超过 65535 像素，第一张无法编码
    let frames = vec![
      RgbImage::new(70000, 1),
      RgbImage::from_pixel(8, 8, Rgb([1, 1, 1])),
    ];

    let tally = ContinuousTask::default()
      .run_task(frames.into_iter(), station, &collect)
      .unwrap();
    assert_eq!((tally.ok(), tally.nok()), (1, 0));

    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome.raw.dimensions(), (8, 8));
  }

  #[test]
  fn failing_output_aborts_the_task() {
    struct Broken;
    impl Render<RgbImage, InspectionReport> for Broken {
      type Error = std::io::Error;
      fn render_result(&self, _: &RgbImage, _: &InspectionReport) -> Result<(), Self::Error> {
        Err(std::io::Error::other("disk full"))
      }
    }
    let station = Station::new(FixedModel(DetectionResult::empty()), ClassVocabulary::default());
    let error = OneShotTask.run_task(frames(1), station, Broken).unwrap_err();
    assert!(error.to_string().contains("disk full"));
  }
}
