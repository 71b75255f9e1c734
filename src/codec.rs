// 该文件是 Zhijian （质检） 项目的一部分。
// src/codec.rs - 图像编解码适配
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

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;

/// 上传用 JPEG 质量，固定不可调
pub const JPEG_QUALITY: u8 = 75;

#[derive(Error, Debug)]
pub enum CodecError {
  #[error("图像编码错误: {0}")]
  Encode(image::ImageError),
  #[error("图像解码错误: {0}")]
  Decode(image::ImageError),
}

/// 像素缓冲区的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

impl ChannelOrder {
  /// 将 RGB 语义下的颜色映射为该通道顺序下的像素值
  pub fn pixel(self, rgb: [u8; 3]) -> Rgb<u8> {
    match self {
      ChannelOrder::Rgb => Rgb(rgb),
      ChannelOrder::Bgr => Rgb([rgb[2], rgb[1], rgb[0]]),
    }
  }

  fn convert(self, image: &mut RgbImage) {
    if self == ChannelOrder::Bgr {
      for pixel in image.pixels_mut() {
        pixel.0.swap(0, 2);
      }
    }
  }
}

/// 可编辑的像素缓冲区，记录自身的通道顺序
#[derive(Debug, Clone)]
pub struct PixelBuffer {
  image: RgbImage,
  order: ChannelOrder,
}

impl PixelBuffer {
  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn as_image_mut(&mut self) -> &mut RgbImage {
    &mut self.image
  }

  /// 还原为 RGB 顺序的图像
  pub fn into_rgb(self) -> RgbImage {
    let mut image = self.image;
    self.order.convert(&mut image);
    image
  }
}

/// 将图像编码为 JPEG 字节流
pub fn encode(image: &RgbImage) -> Result<Vec<u8>, CodecError> {
  let mut bytes = Vec::new();
  let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
  image.write_with_encoder(encoder).map_err(CodecError::Encode)?;
  Ok(bytes)
}

/// 将图像复制为指定通道顺序的像素缓冲区
pub fn decode(image: &RgbImage, order: ChannelOrder) -> PixelBuffer {
  let mut image = image.clone();
  order.convert(&mut image);
  PixelBuffer { image, order }
}

/// 解码上传或采集得到的图像字节流
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbImage, CodecError> {
  let reader = image::ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()
    .map_err(|e| CodecError::Decode(image::ImageError::IoError(e)))?;
  let image = reader.decode().map_err(CodecError::Decode)?;
  Ok(image.to_rgb8())
}

/// 将 YUYV (YUV 4:2:2) 采集帧转换为 RGB 图像，数据不足或宽度为奇数时返回 None
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Option<RgbImage> {
  if width % 2 != 0 {
    return None;
  }
  let expected = (width as usize) * (height as usize) * 2;
  if data.len() < expected {
    return None;
  }

  let mut rgb = Vec::with_capacity(expected / 2 * 3);
  for chunk in data[..expected].chunks_exact(4) {
    let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
    rgb.extend_from_slice(&yuv_pixel(y0, u, v));
    rgb.extend_from_slice(&yuv_pixel(y1, u, v));
  }
  RgbImage::from_raw(width, height, rgb)
}

// BT.601 有限范围
fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
  let c = (y as i32 - 16) * 298;
  let d = u as i32 - 128;
  let e = v as i32 - 128;
  let clamp = |value: i32| ((value + 128) >> 8).clamp(0, 255) as u8;
  [
    clamp(c + 409 * e),
    clamp(c - 100 * d - 208 * e),
    clamp(c + 516 * d),
  ]
}

/// 按扩展名判断是否为支持的图像文件
pub fn is_supported_image(path: &std::path::Path) -> bool {
  ImageFormat::from_path(path)
    .map(|format| {
      matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp | ImageFormat::WebP
      )
    })
    .unwrap_or(false)
}
