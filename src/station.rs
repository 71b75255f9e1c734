// 该文件是 Zhijian （质检） 项目的一部分。
// src/station.rs - 检验工位
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

use std::fmt;

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  codec::{self, CodecError},
  model::{DetectionResult, InferenceError, Model},
  output::draw::Annotator,
  tally::SessionTally,
  verdict::{ClassVocabulary, Verdict},
};

/// 一次检验的全部产物，由调用方持有
#[derive(Debug, Clone)]
pub struct InspectionOutcome {
  pub raw: RgbImage,
  pub annotated: RgbImage,
  pub result: DetectionResult,
  pub verdict: Verdict,
  pub status: StationStatus,
}

impl InspectionOutcome {
  pub fn error(&self) -> Option<&InferenceError> {
    self.result.error()
  }
}

/// 交给输出端的检验报告：检验结果加上调用方的计数快照
#[derive(Debug, Clone)]
pub struct InspectionReport {
  pub outcome: InspectionOutcome,
  pub tally: SessionTally,
}

/// 工位状态指示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationStatus {
  Standby,
  Pass,
  Fail { target: String, error: Option<String> },
}

impl StationStatus {
  pub fn after_inspection(
    verdict: Verdict,
    result: &DetectionResult,
    vocabulary: &ClassVocabulary,
  ) -> Self {
    match verdict {
      Verdict::Pass => StationStatus::Pass,
      Verdict::Fail => StationStatus::Fail {
        target: vocabulary.target().to_string(),
        error: result.error().map(InferenceError::message),
      },
    }
  }

  pub fn caption(&self) -> String {
    match self {
      StationStatus::Standby => "WAITING FOR INPUT".to_string(),
      StationStatus::Pass => "COMPONENT OK".to_string(),
      StationStatus::Fail { target, .. } => format!("{} MISSING / ERROR", target.to_uppercase()),
    }
  }
}

impl fmt::Display for StationStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StationStatus::Standby => write!(f, "STANDBY"),
      StationStatus::Pass => write!(f, "PASS"),
      StationStatus::Fail { .. } => write!(f, "FAIL"),
    }
  }
}

/// 检验工位：编码、远程推理、判定、标注
pub struct Station<M> {
  model: M,
  vocabulary: ClassVocabulary,
  annotator: Annotator,
}

impl<M> Station<M>
where
  M: Model<Input = RgbImage, Output = DetectionResult, Error = CodecError>,
{
  pub fn new(model: M, vocabulary: ClassVocabulary) -> Self {
    let annotator = Annotator::new(vocabulary.target());
    Station {
      model,
      vocabulary,
      annotator,
    }
  }

  pub fn with_annotator(mut self, annotator: Annotator) -> Self {
    self.annotator = annotator;
    self
  }

  pub fn vocabulary(&self) -> &ClassVocabulary {
    &self.vocabulary
  }

  /// 检验已编码的图像（上传文件或相机采集）
  pub fn inspect_bytes(&self, bytes: &[u8]) -> Result<InspectionOutcome, CodecError> {
    let image = codec::decode_bytes(bytes)?;
    self.inspect(&image)
  }

  pub fn inspect(&self, image: &RgbImage) -> Result<InspectionOutcome, CodecError> {
    let now = std::time::Instant::now();
    let result = self.model.infer(image)?;
    let verdict = self.vocabulary.evaluate(&result);
    let annotated = self.annotator.annotate(image, &result);
    let status = StationStatus::after_inspection(verdict, &result, &self.vocabulary);

    match result.error() {
      Some(e) => warn!("检验失败: {}", e),
      None => info!(
        "检验完成: {} ({} 个检测, 耗时 {:.2?})",
        verdict,
        result.detections().len(),
        now.elapsed()
      ),
    }

    Ok(InspectionOutcome {
      raw: image.clone(),
      annotated,
      result,
      verdict,
      status,
    })
  }
}

impl<M> Model for Station<M>
where
  M: Model<Input = RgbImage, Output = DetectionResult, Error = CodecError>,
{
  type Input = RgbImage;
  type Output = InspectionOutcome;
  type Error = CodecError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.inspect(input)
  }
}
