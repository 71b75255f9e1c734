// 该文件是 Zhijian （质检） 项目的一部分。
// src/model.rs - 检测模型与检测结果
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Zhijian Contributors

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测目标，框以中心点加宽高表示（像素坐标）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  #[serde(rename = "class")]
  pub class_label: String,
  #[serde(rename = "x")]
  pub center_x: f32,
  #[serde(rename = "y")]
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
  pub confidence: f32,
}

impl Detection {
  pub fn new(
    class_label: impl Into<String>,
    center: (f32, f32),
    size: (f32, f32),
    confidence: f32,
  ) -> Self {
    Detection {
      class_label: class_label.into(),
      center_x: center.0,
      center_y: center.1,
      width: size.0,
      height: size.1,
      confidence,
    }
  }

  /// 整数像素角点 [x1, y1, x2, y2]，先截断中心与宽高再截断角点
  pub fn pixel_corners(&self) -> [i32; 4] {
    let (x, y) = (self.center_x as i32, self.center_y as i32);
    let (w, h) = (self.width as i32, self.height as i32);
    let half_w = w as f32 / 2.0;
    let half_h = h as f32 / 2.0;
    [
      (x as f32 - half_w) as i32,
      (y as f32 - half_h) as i32,
      (x as f32 + half_w) as i32,
      (y as f32 + half_h) as i32,
    ]
  }

  pub fn is_valid(&self) -> bool {
    self.center_x.is_finite()
      && self.center_y.is_finite()
      && self.width.is_finite()
      && self.height.is_finite()
      && self.width > 0.0
      && self.height > 0.0
      && (0.0..=1.0).contains(&self.confidence)
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
  #[error("{message}")]
  Transport { message: String },
  #[error("Status {status}: {body}")]
  Service { status: u16, body: String },
}

impl InferenceError {
  pub fn status(&self) -> Option<u16> {
    match self {
      InferenceError::Transport { .. } => None,
      InferenceError::Service { status, .. } => Some(*status),
    }
  }

  pub fn message(&self) -> String {
    self.to_string()
  }
}

/// 一次推理调用的结果：按服务返回顺序排列的检测列表，或错误
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
  Detections(Box<[Detection]>),
  Error(InferenceError),
}

impl DetectionResult {
  pub fn empty() -> Self {
    DetectionResult::Detections(Box::new([]))
  }

  pub fn transport_error(message: impl Into<String>) -> Self {
    DetectionResult::Error(InferenceError::Transport {
      message: message.into(),
    })
  }

  pub fn service_error(status: u16, body: impl Into<String>) -> Self {
    DetectionResult::Error(InferenceError::Service {
      status,
      body: body.into(),
    })
  }

  /// 错误结果视为零个检测
  pub fn detections(&self) -> &[Detection] {
    match self {
      DetectionResult::Detections(items) => items,
      DetectionResult::Error(_) => &[],
    }
  }

  pub fn error(&self) -> Option<&InferenceError> {
    match self {
      DetectionResult::Detections(_) => None,
      DetectionResult::Error(e) => Some(e),
    }
  }

  pub fn is_error(&self) -> bool {
    self.error().is_some()
  }

  pub fn has_label(&self, label: &str) -> bool {
    self.detections().iter().any(|d| d.class_label == label)
  }
}

impl From<Vec<Detection>> for DetectionResult {
  fn from(items: Vec<Detection>) -> Self {
    DetectionResult::Detections(items.into_boxed_slice())
  }
}

mod roboflow;
pub use self::roboflow::{
  CONFIDENCE_PERCENT, DEFAULT_ENDPOINT, OVERLAP_PERCENT, RoboflowBuilder, RoboflowClient,
  RoboflowError,
};
