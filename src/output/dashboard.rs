// 该文件是 Zhijian （质检） 项目的一部分。
// src/output/dashboard.rs - 检验看板输出
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

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage, imageops};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{
    Render,
    draw::{Annotator, DrawError, load_font},
  },
  station::{InspectionReport, StationStatus},
  tally::SessionTally,
};

const MARGIN: u32 = 16;
const PANEL_HEIGHT: u32 = 120;
const BADGE_WIDTH: u32 = 280;
const BAR_HEIGHT: u32 = 28;
const STANDBY_SLOT: (u32, u32) = (640, 480);

const BACKGROUND: Rgb<u8> = Rgb([0x0b, 0x0c, 0x10]);
const CARD: Rgb<u8> = Rgb([0x1f, 0x28, 0x33]);
const TEXT: Rgb<u8> = Rgb([0xc5, 0xc6, 0xc7]);
pub const PASS_COLOR: Rgb<u8> = Rgb([0x00, 0xff, 0x00]);
pub const FAIL_COLOR: Rgb<u8> = Rgb([0xff, 0x00, 0x00]);
pub const STANDBY_COLOR: Rgb<u8> = Rgb([0x45, 0xa2, 0x9e]);
const EMPTY_BAR: Rgb<u8> = Rgb([0x33, 0x33, 0x33]);

#[derive(Error, Debug)]
pub enum DashboardOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("字体错误: {0}")]
  FontError(#[from] DrawError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 看板：原图与标注图并排，下方为状态徽章、计数和合格比例条
///
/// `dashboard:///path/panel.png[?font=/path/font.ttf]`
pub struct DashboardOutput {
  path: PathBuf,
  font: Option<FontArc>,
}

impl FromUrlWithScheme for DashboardOutput {
  const SCHEME: &'static str = "dashboard";
}

impl FromUrl for DashboardOutput {
  type Error = DashboardOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DashboardOutputError::SchemeMismatch);
    }

    let font = match url.query_pairs().find(|(k, _)| k == "font") {
      Some((_, path)) => Some(load_font(Path::new(path.as_ref()))?),
      None => system_font(),
    };

    let output = DashboardOutput::new(url.path());
    Ok(match font {
      Some(font) => output.with_font(font),
      None => output,
    })
  }
}

fn system_font() -> Option<FontArc> {
  // 复用标注器的系统字体查找
  let annotator = Annotator::new("").with_system_font();
  annotator.font().cloned()
}

impl DashboardOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    DashboardOutput {
      path: path.into(),
      font: None,
    }
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  fn save(&self, panel: &RgbImage) -> Result<(), DashboardOutputError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    panel.save(&self.path)?;
    info!("看板已更新: {}", self.path.display());
    Ok(())
  }
}

impl Render<RgbImage, InspectionReport> for DashboardOutput {
  type Error = DashboardOutputError;

  fn render_result(
    &self,
    _frame: &RgbImage,
    result: &InspectionReport,
  ) -> Result<(), Self::Error> {
    let outcome = &result.outcome;
    let panel = render_panel(
      Some((&outcome.raw, &outcome.annotated)),
      &outcome.status,
      &result.tally,
      self.font.as_ref(),
    );
    self.save(&panel)
  }

  fn render_standby(&self) -> Result<(), Self::Error> {
    let panel = render_panel(
      None,
      &StationStatus::Standby,
      &SessionTally::default(),
      self.font.as_ref(),
    );
    self.save(&panel)
  }
}

pub fn status_color(status: &StationStatus) -> Rgb<u8> {
  match status {
    StationStatus::Standby => STANDBY_COLOR,
    StationStatus::Pass => PASS_COLOR,
    StationStatus::Fail { .. } => FAIL_COLOR,
  }
}

/// 绘制看板图像；`images` 为 (原图, 标注图)，待机时为 None
pub fn render_panel(
  images: Option<(&RgbImage, &RgbImage)>,
  status: &StationStatus,
  tally: &SessionTally,
  font: Option<&FontArc>,
) -> RgbImage {
  let (slot_w, slot_h) = match images {
    Some((raw, annotated)) => (
      raw.width().max(annotated.width()),
      raw.height().max(annotated.height()),
    ),
    None => STANDBY_SLOT,
  };

  let width = slot_w * 2 + MARGIN * 3;
  let height = slot_h + PANEL_HEIGHT + MARGIN * 3;
  let mut panel = RgbImage::from_pixel(width, height, BACKGROUND);

  // 图像区域
  let left = Rect::at(MARGIN as i32, MARGIN as i32).of_size(slot_w, slot_h);
  let right = Rect::at((MARGIN * 2 + slot_w) as i32, MARGIN as i32).of_size(slot_w, slot_h);
  match images {
    Some((raw, annotated)) => {
      imageops::replace(&mut panel, raw, left.left() as i64, left.top() as i64);
      imageops::replace(&mut panel, annotated, right.left() as i64, right.top() as i64);
    }
    None => {
      draw_filled_rect_mut(&mut panel, left, CARD);
      draw_filled_rect_mut(&mut panel, right, CARD);
    }
  }

  // 状态徽章
  let card_top = (slot_h + MARGIN * 2) as i32;
  let color = status_color(status);
  let badge = Rect::at(MARGIN as i32, card_top).of_size(BADGE_WIDTH, PANEL_HEIGHT);
  draw_filled_rect_mut(&mut panel, badge, CARD);
  for inset in 0..2 {
    let border = Rect::at(badge.left() + inset, badge.top() + inset)
      .of_size(BADGE_WIDTH - 2 * inset as u32, PANEL_HEIGHT - 2 * inset as u32);
    draw_hollow_rect_mut(&mut panel, border, color);
  }

  // 合格比例条
  let bar_left = (MARGIN * 2 + BADGE_WIDTH) as i32;
  let bar_width = width.saturating_sub(BADGE_WIDTH + MARGIN * 3).max(1);
  let bar_top = card_top + (PANEL_HEIGHT - BAR_HEIGHT) as i32;
  draw_filled_rect_mut(
    &mut panel,
    Rect::at(bar_left, bar_top).of_size(bar_width, BAR_HEIGHT),
    EMPTY_BAR,
  );
  if let Some(ratio) = tally.pass_ratio() {
    let ok_width = (bar_width as f64 * ratio).round() as u32;
    if ok_width > 0 {
      draw_filled_rect_mut(
        &mut panel,
        Rect::at(bar_left, bar_top).of_size(ok_width, BAR_HEIGHT),
        PASS_COLOR,
      );
    }
    if ok_width < bar_width {
      draw_filled_rect_mut(
        &mut panel,
        Rect::at(bar_left + ok_width as i32, bar_top).of_size(bar_width - ok_width, BAR_HEIGHT),
        FAIL_COLOR,
      );
    }
  }

  if let Some(font) = font {
    let title = PxScale::from(40.0);
    let small = PxScale::from(18.0);
    let x = badge.left() + 16;
    draw_text_mut(&mut panel, color, x, card_top + 20, title, font, &status.to_string());
    draw_text_mut(&mut panel, color, x, card_top + 72, small, font, &status.caption());

    let counters = format!(
      "TOTAL {}    OK {}    NOK {}",
      tally.total(),
      tally.ok(),
      tally.nok()
    );
    draw_text_mut(&mut panel, TEXT, bar_left, card_top + 20, small, font, &counters);
    if let StationStatus::Fail { error: Some(message), .. } = status {
      let message = format!("API Error: {}", message);
      draw_text_mut(&mut panel, FAIL_COLOR, bar_left, card_top + 48, small, font, &message);
    }
  }

  panel
}
