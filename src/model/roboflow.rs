// 该文件是 Zhijian （质检） 项目的一部分。
// src/model/roboflow.rs - Roboflow 托管推理客户端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Zhijian Contributors

use std::time::Duration;

use image::RgbImage;
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  codec::{self, CodecError},
  model::{Detection, DetectionResult, Model},
};

pub const DEFAULT_ENDPOINT: &str = "https://detect.roboflow.com";
/// 最低置信度（百分比）
pub const CONFIDENCE_PERCENT: u8 = 40;
/// 服务端重复框抑制的最大重叠度（百分比）
pub const OVERLAP_PERCENT: u8 = 30;

const ROBOFLOW_SCHEME: &str = "roboflow";
const UPLOAD_FIELD: &str = "file";
const UPLOAD_FILE_NAME: &str = "image.jpg";

#[derive(Error, Debug)]
pub enum RoboflowError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: &'static str, found: String },
  #[error("缺少模型标识")]
  MissingModelId,
  #[error("缺少 API 密钥")]
  MissingApiKey,
  #[error("无效的推理服务地址: {0}")]
  InvalidEndpoint(String),
  #[error("无效的超时设置: {0}")]
  InvalidTimeout(String),
  #[error("HTTP 客户端创建失败: {0}")]
  Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
  #[serde(default)]
  predictions: Vec<Detection>,
  #[serde(default)]
  time: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RoboflowBuilder {
  endpoint: Option<Url>,
  model_id: String,
  api_key: Option<String>,
  timeout: Option<Duration>,
}

impl FromUrlWithScheme for RoboflowBuilder {
  const SCHEME: &'static str = ROBOFLOW_SCHEME;
}

impl FromUrl for RoboflowBuilder {
  type Error = RoboflowError;

  /// `roboflow://<project>/<version>?api_key=...&endpoint=...&timeout=<秒>`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RoboflowError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    let model_id = format!("{}{}", url.host_str().unwrap_or(""), url.path());
    let mut builder = RoboflowBuilder::new(model_id.trim_matches('/'));

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "api_key" => builder = builder.api_key(value.as_ref()),
        "endpoint" => {
          let endpoint =
            Url::parse(&value).map_err(|e| RoboflowError::InvalidEndpoint(e.to_string()))?;
          builder = builder.endpoint(endpoint);
        }
        "timeout" => {
          let secs: f64 = value
            .parse()
            .map_err(|_| RoboflowError::InvalidTimeout(value.to_string()))?;
          let timeout = Duration::try_from_secs_f64(secs)
            .map_err(|_| RoboflowError::InvalidTimeout(value.to_string()))?;
          builder = builder.timeout(timeout);
        }
        other => warn!("忽略未知的模型参数: {}", other),
      }
    }

    Ok(builder)
  }
}

impl RoboflowBuilder {
  pub fn new(model_id: impl Into<String>) -> Self {
    RoboflowBuilder {
      endpoint: None,
      model_id: model_id.into(),
      api_key: None,
      timeout: None,
    }
  }

  pub fn endpoint(mut self, endpoint: Url) -> Self {
    self.endpoint = Some(endpoint);
    self
  }

  pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  pub fn build(self) -> Result<RoboflowClient, RoboflowError> {
    if self.model_id.is_empty() {
      return Err(RoboflowError::MissingModelId);
    }
    let api_key = self
      .api_key
      .filter(|key| !key.is_empty())
      .ok_or(RoboflowError::MissingApiKey)?;

    let endpoint = match self.endpoint {
      Some(endpoint) => endpoint,
      None => {
        Url::parse(DEFAULT_ENDPOINT).map_err(|e| RoboflowError::InvalidEndpoint(e.to_string()))?
      }
    };

    let mut url = endpoint.clone();
    url
      .path_segments_mut()
      .map_err(|_| RoboflowError::InvalidEndpoint(endpoint.to_string()))?
      .pop_if_empty()
      .extend(self.model_id.split('/').filter(|s| !s.is_empty()));
    url
      .query_pairs_mut()
      .append_pair("api_key", &api_key)
      .append_pair("confidence", &CONFIDENCE_PERCENT.to_string())
      .append_pair("overlap", &OVERLAP_PERCENT.to_string());

    let mut client = Client::builder();
    if let Some(timeout) = self.timeout {
      client = client.timeout(timeout);
    }
    let client = client.build()?;

    info!(
      "推理服务: {}/{} (confidence={}%, overlap={}%)",
      endpoint.as_str().trim_end_matches('/'),
      self.model_id,
      CONFIDENCE_PERCENT,
      OVERLAP_PERCENT
    );

    Ok(RoboflowClient { client, url })
  }
}

/// Roboflow 托管推理客户端，每次调用只发出一次请求
pub struct RoboflowClient {
  client: Client,
  url: Url,
}

impl RoboflowClient {
  pub fn request_url(&self) -> &Url {
    &self.url
  }

  /// 以 multipart 二进制字段上传 JPEG，不使用 base64 查询参数
  pub fn infer_bytes(&self, image_bytes: &[u8]) -> DetectionResult {
    debug!(
      "POST {} ({} 字节)",
      redacted(&self.url),
      image_bytes.len()
    );

    let part = multipart::Part::bytes(image_bytes.to_vec()).file_name(UPLOAD_FILE_NAME);
    let form = multipart::Form::new().part(UPLOAD_FIELD, part);

    let response = match self.client.post(self.url.clone()).multipart(form).send() {
      Ok(response) => response,
      Err(e) => {
        warn!("推理请求失败: {}", e);
        return DetectionResult::transport_error(e.to_string());
      }
    };

    let status = response.status();
    let body = match response.text() {
      Ok(body) => body,
      Err(e) => {
        warn!("读取推理响应失败: {}", e);
        return DetectionResult::transport_error(e.to_string());
      }
    };

    if !status.is_success() {
      warn!("推理服务返回错误状态 {}: {}", status.as_u16(), body);
      return DetectionResult::service_error(status.as_u16(), body);
    }

    parse_predictions(&body)
  }
}

impl Model for RoboflowClient {
  type Input = RgbImage;
  type Output = DetectionResult;
  type Error = CodecError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let bytes = codec::encode(input)?;
    Ok(self.infer_bytes(&bytes))
  }
}

/// 解析成功响应；无法解析或缺少 predictions 字段均视为零个检测
pub(crate) fn parse_predictions(body: &str) -> DetectionResult {
  let response: PredictionResponse = match serde_json::from_str(body) {
    Ok(response) => response,
    Err(e) => {
      warn!("推理响应格式错误，按零个检测处理: {}", e);
      return DetectionResult::empty();
    }
  };

  if let Some(time) = response.time {
    debug!("服务端推理耗时: {:.3}s", time);
  }

  let total = response.predictions.len();
  let items: Vec<Detection> = response
    .predictions
    .into_iter()
    .filter(|d| {
      let valid = d.is_valid();
      if !valid {
        warn!("丢弃无效检测: {:?}", d);
      }
      valid
    })
    .collect();
  debug!("检测数量: {} (有效 {})", total, items.len());

  DetectionResult::from(items)
}

fn redacted(url: &Url) -> Url {
  let mut url = url.clone();
  let pairs: Vec<(String, String)> = url
    .query_pairs()
    .map(|(k, v)| {
      let v = if k == "api_key" { "***".to_string() } else { v.into_owned() };
      (k.into_owned(), v)
    })
    .collect();
  url.query_pairs_mut().clear().extend_pairs(pairs);
  url
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_from_url_collects_model_and_key() {
    let url = Url::parse("roboflow://pl_co/1?api_key=secret").unwrap();
    let client = RoboflowBuilder::from_url(&url).unwrap().build().unwrap();
    assert_eq!(
      client.request_url().as_str(),
      "https://detect.roboflow.com/pl_co/1?api_key=secret&confidence=40&overlap=30"
    );
  }

  #[test]
  fn builder_honours_endpoint_override() {
    let url =
      Url::parse("roboflow://pl_co/1?api_key=k&endpoint=http%3A%2F%2F127.0.0.1%3A9001%2F").unwrap();
    let client = RoboflowBuilder::from_url(&url).unwrap().build().unwrap();
    assert_eq!(
      client.request_url().as_str(),
      "http://127.0.0.1:9001/pl_co/1?api_key=k&confidence=40&overlap=30"
    );
  }

  #[test]
  fn builder_rejects_wrong_scheme_and_missing_key() {
    let url = Url::parse("file:///srv/models/pl_co.onnx").unwrap();
    assert!(matches!(
      RoboflowBuilder::from_url(&url),
      Err(RoboflowError::SchemeMismatch { .. })
    ));

    let url = Url::parse("roboflow://pl_co/1").unwrap();
    assert!(matches!(
      RoboflowBuilder::from_url(&url).unwrap().build(),
      Err(RoboflowError::MissingApiKey)
    ));

    assert!(matches!(
      RoboflowBuilder::new("").api_key("k").build(),
      Err(RoboflowError::MissingModelId)
    ));
  }

  #[test]
  fn builder_rejects_bad_timeout() {
    let url = Url::parse("roboflow://pl_co/1?api_key=k&timeout=soon").unwrap();
    assert!(matches!(
      RoboflowBuilder::from_url(&url),
      Err(RoboflowError::InvalidTimeout(_))
    ));
  }

  #[test]
  fn missing_predictions_is_empty() {
    assert_eq!(parse_predictions("{}"), DetectionResult::empty());
  }

  #[test]
  fn malformed_body_is_empty() {
    assert_eq!(parse_predictions("<html>oops</html>"), DetectionResult::empty());
    assert_eq!(
      parse_predictions(r#"{"predictions": "nope"}"#),
      DetectionResult::empty()
    );
  }

  #[test]
  fn predictions_keep_service_order_and_drop_invalid() {
    let body = r#"{
      "time": 0.05,
      "image": {"width": 640, "height": 480},
      "predictions": [
        {"x": 100, "y": 100, "width": 200, "height": 200, "class": "white", "confidence": 0.81},
        {"x": 5, "y": 5, "width": 0, "height": 3, "class": "black", "confidence": 0.5},
        {"x": 100, "y": 100, "width": 20, "height": 20, "class": "circlip", "confidence": 0.92}
      ]
    }"#;
    let result = parse_predictions(body);
    let labels: Vec<&str> = result
      .detections()
      .iter()
      .map(|d| d.class_label.as_str())
      .collect();
    assert_eq!(labels, ["white", "circlip"]);
  }

  #[test]
  fn redacted_hides_api_key() {
    let url = Url::parse("https://h/m/1?api_key=secret&confidence=40").unwrap();
    let redacted = redacted(&url);
    assert!(!redacted.as_str().contains("secret"));
    assert!(redacted.as_str().contains("confidence=40"));
  }
}
