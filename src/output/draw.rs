// 该文件是 Zhijian （质检） 项目的一部分。
// src/output/draw.rs - 检测结果标注
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Zhijian Contributors

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  codec::{self, ChannelOrder, PixelBuffer},
  model::{Detection, DetectionResult},
};

// 绘制常量
const LABEL_FONT_SIZE: f32 = 24.0;
const LABEL_GAP: i32 = 4;
const STROKE_WIDTH: i32 = 3;
// 角点夹紧到画布外的余量，超出部分不可见
const CANVAS_MARGIN: i32 = 4096;
/// 目标类别颜色（绿色）
pub const TARGET_COLOR: [u8; 3] = [0, 255, 0];
/// 其余类别共用颜色（青色）
pub const OTHER_COLOR: [u8; 3] = [0, 255, 255];

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/usr/share/fonts/noto/NotoSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  FontIo(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  FontInvalid(String),
}

pub fn load_font(path: &Path) -> Result<FontArc, DrawError> {
  let data = std::fs::read(path)?;
  FontArc::try_from_vec(data).map_err(|e| DrawError::FontInvalid(e.to_string()))
}

/// 标注器：按类别角色着色绘制检测框和标签
#[derive(Clone)]
pub struct Annotator {
  target_label: String,
  order: ChannelOrder,
  font: Option<FontArc>,
  font_size: f32,
}

impl Annotator {
  /// 不带字体的标注器只绘制检测框
  pub fn new(target_label: impl Into<String>) -> Self {
    Annotator {
      target_label: target_label.into(),
      order: ChannelOrder::default(),
      font: None,
      font_size: LABEL_FONT_SIZE,
    }
  }

  pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
    self.order = order;
    self
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: &Path) -> Result<Self, DrawError> {
    let font = load_font(path)?;
    debug!("已加载字体: {}", path.display());
    Ok(self.with_font(font))
  }

  /// 依次尝试常见系统字体，全部不可用时只绘制检测框
  pub fn with_system_font(self) -> Self {
    for candidate in SYSTEM_FONT_CANDIDATES {
      let path = Path::new(candidate);
      if !path.is_file() {
        continue;
      }
      match load_font(path) {
        Ok(font) => {
          debug!("使用系统字体: {}", candidate);
          return self.with_font(font);
        }
        Err(e) => warn!("无法加载系统字体 {}: {}", candidate, e),
      }
    }
    warn!("未找到可用字体，标注将不包含文字标签");
    self
  }

  pub fn font(&self) -> Option<&FontArc> {
    self.font.as_ref()
  }

  pub fn color_for(&self, label: &str) -> [u8; 3] {
    if label == self.target_label {
      TARGET_COLOR
    } else {
      OTHER_COLOR
    }
  }

  /// 返回绘制了检测结果的新图像；错误结果返回原图副本
  pub fn annotate(&self, image: &RgbImage, result: &DetectionResult) -> RgbImage {
    let mut buffer = codec::decode(image, self.order);
    self.draw_on(&mut buffer, result);
    buffer.into_rgb()
  }

  /// 按检测顺序在缓冲区上绘制，颜色按缓冲区的通道顺序映射
  pub fn draw_on(&self, buffer: &mut PixelBuffer, result: &DetectionResult) {
    let order = buffer.order();
    for detection in result.detections() {
      let color = order.pixel(self.color_for(&detection.class_label));
      let image = buffer.as_image_mut();
      let [x1, y1, x2, y2] = clamp_corners(detection.pixel_corners(), image.dimensions());

      draw_outline(image, [x1, y1, x2, y2], color);

      if let Some(font) = &self.font {
        let label = label_text(detection);
        let scale = PxScale::from(self.font_size);
        let (_, text_height) = text_size(scale, font, &label);
        let label_x = x1;
        let label_y = (y1 - STROKE_WIDTH / 2 - LABEL_GAP - text_height as i32).max(0);
        // 偏移一个像素重复绘制以加粗
        for dx in 0..2 {
          draw_text_mut(image, color, label_x + dx, label_y, scale, font, &label);
        }
      }
    }
  }
}

/// 标签文本，形如 `circlip 92.0%`
pub fn label_text(detection: &Detection) -> String {
  format!(
    "{} {:.1}%",
    detection.class_label,
    detection.confidence * 100.0
  )
}

/// 将角点限制在画布周围的有限范围内，避免超大检测框在后续运算中溢出
fn clamp_corners(corners: [i32; 4], (width, height): (u32, u32)) -> [i32; 4] {
  let max_x = i32::try_from(width).unwrap_or(i32::MAX).saturating_add(CANVAS_MARGIN);
  let max_y = i32::try_from(height).unwrap_or(i32::MAX).saturating_add(CANVAS_MARGIN);
  let [x1, y1, x2, y2] = corners;
  [
    x1.clamp(-CANVAS_MARGIN, max_x),
    y1.clamp(-CANVAS_MARGIN, max_y),
    x2.clamp(-CANVAS_MARGIN, max_x),
    y2.clamp(-CANVAS_MARGIN, max_y),
  ]
}

/// 以角点为中心线绘制固定宽度的矩形边框
fn draw_outline(image: &mut RgbImage, corners: [i32; 4], color: Rgb<u8>) {
  let [x1, y1, x2, y2] = corners;
  let half = STROKE_WIDTH / 2;
  for offset in -half..=(STROKE_WIDTH - 1 - half) {
    let width = x2 - x1 + 1 + 2 * offset;
    let height = y2 - y1 + 1 + 2 * offset;
    if width <= 0 || height <= 0 {
      continue;
    }
    let rect = Rect::at(x1 - offset, y1 - offset).of_size(width as u32, height as u32);
    draw_hollow_rect_mut(image, rect, color);
  }
}
