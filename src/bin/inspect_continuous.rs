// 该文件是 Zhijian （质检） 项目的一部分。
// src/bin/inspect_continuous.rs - 连续检验
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Zhijian Contributors

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use zhijian::{
  FromUrl,
  config::StationArgs,
  input::InputWrapper,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

/// 质检工位：依次检验输入中的每张图像，Ctrl-C 退出
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub station: StationArgs,
  /// 输入来源，例如 folder:///srv/line1/incoming 或 v4l:///dev/video0（需启用 v4l_input）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 dashboard:///tmp/station.png 或 folder:///srv/line1/records
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 检验数量上限，缺省时处理全部输入
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let model = &args.station.model;
  info!(
    "模型地址: {}://{}{}",
    model.scheme(),
    model.host_str().unwrap_or_default(),
    model.path()
  );
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let station = args.station.build_station()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let tally = ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .run_task(input, station, output)?;
  info!("本次会话统计: {}", tally);

  Ok(())
}
