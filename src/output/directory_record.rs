// 该文件是 Zhijian （质检） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Zhijian Contributors

use chrono::{DateTime, Datelike, Utc};
use image::RgbImage;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Render,
  station::InspectionReport,
  verdict::Verdict,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分目录保存检验记录：原图、标注图和 JSON 记录
///
/// 默认只记录 FAIL，`?always` 记录每一次检验。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// 返回本次记录的文件名前缀（不含后缀）
  fn record_stem(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn save_record(
    &self,
    stem: &Path,
    report: &InspectionReport,
    now: DateTime<Utc>,
  ) -> Result<(), DirectoryRecordOutputError> {
    let outcome = &report.outcome;
    let raw_path = with_suffix(stem, "-raw.png");
    let annotated_path = with_suffix(stem, "-annotated.png");
    outcome.raw.save(&raw_path)?;
    outcome.annotated.save(&annotated_path)?;

    let error = outcome.error().map(|e| {
      json!({
        "status": e.status(),
        "message": e.message(),
      })
    });
    let record = json!({
      "timestamp": now.to_rfc3339(),
      "verdict": outcome.verdict.to_string(),
      "status": outcome.status.to_string(),
      "caption": outcome.status.caption(),
      "error": error,
      "detections": outcome.result.detections(),
      "tally": report.tally,
      "raw_image": file_name(&raw_path),
      "annotated_image": file_name(&annotated_path),
    });
    let record_path = with_suffix(stem, ".json");
    std::fs::write(&record_path, serde_json::to_string_pretty(&record)?)?;
    debug!("检验记录: {}", record_path.display());

    Ok(())
  }
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
  let mut path = stem.as_os_str().to_owned();
  path.push(suffix);
  PathBuf::from(path)
}

fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default()
}

impl Render<RgbImage, InspectionReport> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    _frame: &RgbImage,
    result: &InspectionReport,
  ) -> Result<(), Self::Error> {
    if !self.always && result.outcome.verdict == Verdict::Pass {
      return Ok(());
    }
    let now = Utc::now();
    let stem = self.record_stem(now)?;
    self.save_record(&stem, result, now)?;
    info!("已记录检验结果: {}", stem.display());
    Ok(())
  }
}
