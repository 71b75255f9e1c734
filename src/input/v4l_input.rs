// 该文件是 Zhijian （质检） 项目的一部分。
// src/input/v4l_input.rs - V4L 相机采集输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Zhijian Contributors

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC, Format,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{FromUrl, FromUrlWithScheme, codec};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_SKIP: usize = 2;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的相机参数 {key}: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
}

/// 采集帧的像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Yuyv,
  Mjpeg,
  Rgb24,
}

impl PixelFormat {
  fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
    match fourcc {
      b"YUYV" => Some(PixelFormat::Yuyv),
      b"MJPG" => Some(PixelFormat::Mjpeg),
      b"RGB3" => Some(PixelFormat::Rgb24),
      _ => None,
    }
  }

  fn fourcc(self) -> FourCC {
    match self {
      PixelFormat::Yuyv => FourCC::new(b"YUYV"),
      PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
      PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
    }
  }
}

/// `v4l:///dev/video0?width=1280&height=720&format=MJPG&skip=2`
///
/// 未指定的参数沿用设备当前设置；`skip` 为每次采集前丢弃的帧数，用于等待曝光稳定。
#[derive(Debug, Clone)]
pub struct V4lInputBuilder {
  device_path: String,
  size: Option<(u32, u32)>,
  format: Option<PixelFormat>,
  skip: usize,
}

impl FromUrlWithScheme for V4lInputBuilder {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInputBuilder {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemeMismatch);
    }

    let device_path = match url.path() {
      "" | "/" => DEFAULT_DEVICE.to_string(),
      path => path.to_string(),
    };

    let mut width = None;
    let mut height = None;
    let mut format = None;
    let mut skip = DEFAULT_SKIP;
    for (key, value) in url.query_pairs() {
      let invalid = || V4lInputError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
      };
      match key.as_ref() {
        "width" => width = Some(value.parse::<u32>().map_err(|_| invalid())?),
        "height" => height = Some(value.parse::<u32>().map_err(|_| invalid())?),
        "skip" => skip = value.parse().map_err(|_| invalid())?,
        "format" => {
          let fourcc: [u8; 4] = value
            .to_ascii_uppercase()
            .as_bytes()
            .try_into()
            .map_err(|_| invalid())?;
          let parsed = PixelFormat::from_fourcc(&fourcc)
            .ok_or_else(|| V4lInputError::UnsupportedPixelFormat(value.to_string()))?;
          format = Some(parsed);
        }
        other => warn!("忽略未知的相机参数: {}", other),
      }
    }

    let size = match (width, height) {
      (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
      (None, None) => None,
      _ => {
        return Err(V4lInputError::InvalidParameter {
          key: "width/height".to_string(),
          value: format!("{:?}x{:?}", width, height),
        });
      }
    };

    Ok(V4lInputBuilder {
      device_path,
      size,
      format,
      skip,
    })
  }
}

impl V4lInputBuilder {
  /// 打开设备并协商采集格式
  pub fn build(self) -> Result<V4lInput, V4lInputError> {
    let device = Device::with_path(&self.device_path)?;
    let mut format = device.format()?;

    if self.size.is_some() || self.format.is_some() {
      let (width, height) = self.size.unwrap_or((format.width, format.height));
      let fourcc = self.format.map(PixelFormat::fourcc).unwrap_or(format.fourcc);
      format = device.set_format(&Format::new(width, height, fourcc))?;
    }

    let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr)
      .ok_or_else(|| V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()))?;
    info!(
      "相机 {}: {}x{} {}",
      self.device_path, format.width, format.height, format.fourcc
    );

    Ok(V4lInput {
      device,
      width: format.width,
      height: format.height,
      format: pixel_format,
      skip: self.skip,
    })
  }
}

/// 每次迭代触发一次采集，返回一张 RGB 图像
pub struct V4lInput {
  device: Device,
  width: u32,
  height: u32,
  format: PixelFormat,
  skip: usize,
}

impl V4lInput {
  pub fn capture(&mut self) -> Result<RgbImage, V4lInputError> {
    let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, STREAM_BUFFERS)?;
    for _ in 0..self.skip {
      stream.next()?;
    }
    let (buffer, meta) = stream.next()?;
    let used = (meta.bytesused as usize).min(buffer.len());
    let data = if used > 0 { &buffer[..used] } else { buffer };
    debug!("采集到 {} 字节", data.len());

    let (width, height) = (self.width, self.height);
    let size_mismatch = || {
      V4lInputError::UnsupportedPixelFormat(format!(
        "{:?} 帧大小 {} 与 {}x{} 不符",
        self.format,
        data.len(),
        width,
        height
      ))
    };
    match self.format {
      PixelFormat::Yuyv => codec::yuyv_to_rgb(data, width, height).ok_or_else(size_mismatch),
      PixelFormat::Rgb24 => {
        let expected = width as usize * height as usize * 3;
        data
          .get(..expected)
          .and_then(|pixels| RgbImage::from_raw(width, height, pixels.to_vec()))
          .ok_or_else(size_mismatch)
      }
      PixelFormat::Mjpeg => codec::decode_bytes(data)
        .map_err(|e| V4lInputError::UnsupportedPixelFormat(e.to_string())),
    }
  }
}

impl Iterator for V4lInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self.capture() {
      Ok(image) => Some(image),
      Err(e) => {
        error!("相机采集失败: {}", e);
        None
      }
    }
  }
}
