// 该文件是 Zhijian （质检） 项目的一部分。
// src/config.rs - 工位启动配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Zhijian Contributors

use std::{path::PathBuf, time::Duration};

use clap::Args;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  model::{RoboflowBuilder, RoboflowClient, RoboflowError},
  output::draw::{Annotator, DrawError},
  station::Station,
  verdict::{ClassVocabulary, DEFAULT_CARRIER_A, DEFAULT_CARRIER_B, DEFAULT_TARGET},
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("模型配置错误: {0}")]
  Model(#[from] RoboflowError),
  #[error("字体配置错误: {0}")]
  Font(#[from] DrawError),
  #[error("类别配置错误: {0}")]
  Vocabulary(String),
}

/// 工位参数，供各可执行程序展开使用
#[derive(Args, Debug, Clone)]
pub struct StationArgs {
  /// 推理模型地址，例如 roboflow://pl_co/1
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 推理服务 API 密钥（优先于模型地址中的 api_key）
  #[arg(long, env = "ROBOFLOW_API_KEY", hide_env_values = true)]
  pub api_key: Option<String>,

  /// 第一个载体类别名称
  #[arg(long, default_value = DEFAULT_CARRIER_A)]
  pub carrier_a: String,

  /// 第二个载体类别名称
  #[arg(long, default_value = DEFAULT_CARRIER_B)]
  pub carrier_b: String,

  /// 目标类别名称
  #[arg(long, default_value = DEFAULT_TARGET)]
  pub target: String,

  /// 标注字体文件（TTF/OTF），缺省时查找系统字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 推理请求超时（秒），缺省时不设超时
  #[arg(long, value_name = "SECONDS")]
  pub timeout: Option<u64>,
}

impl StationArgs {
  pub fn vocabulary(&self) -> Result<ClassVocabulary, ConfigError> {
    let labels = [&self.carrier_a, &self.carrier_b, &self.target];
    if labels.iter().any(|label| label.trim().is_empty()) {
      return Err(ConfigError::Vocabulary("类别名称不能为空".to_string()));
    }
    if self.target == self.carrier_a || self.target == self.carrier_b {
      return Err(ConfigError::Vocabulary(format!(
        "目标类别 '{}' 不能同时作为载体类别",
        self.target
      )));
    }
    Ok(ClassVocabulary::new(
      &self.carrier_a,
      &self.carrier_b,
      &self.target,
    ))
  }

  pub fn model_builder(&self) -> Result<RoboflowBuilder, ConfigError> {
    let mut builder = RoboflowBuilder::from_url(&self.model)?;
    if let Some(api_key) = &self.api_key {
      builder = builder.api_key(api_key);
    }
    if let Some(timeout) = self.timeout {
      builder = builder.timeout(Duration::from_secs(timeout));
    }
    Ok(builder)
  }

  pub fn annotator(&self) -> Result<Annotator, ConfigError> {
    let annotator = Annotator::new(&self.target);
    match &self.font {
      Some(path) => Ok(annotator.with_font_file(path)?),
      None => Ok(annotator.with_system_font()),
    }
  }

  pub fn build_station(&self) -> Result<Station<RoboflowClient>, ConfigError> {
    let vocabulary = self.vocabulary()?;
    info!(
      "类别: 载体 {:?}, 目标 '{}'",
      vocabulary.carriers(),
      vocabulary.target()
    );
    let client = self.model_builder()?.build()?;
    let annotator = self.annotator()?;
    Ok(Station::new(client, vocabulary).with_annotator(annotator))
  }
}
