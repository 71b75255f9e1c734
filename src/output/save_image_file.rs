// 该文件是 Zhijian （质检） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像文件
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

use std::path::Path;

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, station::InspectionReport};

pub struct SaveImageFileOutput {
  path: String,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
    })
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    info!("保存标注图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<RgbImage, InspectionReport> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    _frame: &RgbImage,
    result: &InspectionReport,
  ) -> Result<(), Self::Error> {
    self.save_image(&result.outcome.annotated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::DetectionResult,
    station::{InspectionOutcome, StationStatus},
    tally::SessionTally,
    verdict::Verdict,
  };
  use image::Rgb;

  fn report() -> InspectionReport {
    InspectionReport {
      outcome: InspectionOutcome {
        raw: RgbImage::from_pixel(12, 10, Rgb([1, 1, 1])),
        annotated: RgbImage::from_pixel(12, 10, Rgb([0, 255, 0])),
        result: DetectionResult::empty(),
        verdict: Verdict::Fail,
        status: StationStatus::Fail {
          target: "circlip".to_string(),
          error: None,
        },
      },
      tally: SessionTally::default(),
    }
  }

  #[test]
  fn writes_annotated_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("annotated.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let report = report();
    output.render_result(&report.outcome.raw, &report).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved, report.outcome.annotated);
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("folder:///tmp/records").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
