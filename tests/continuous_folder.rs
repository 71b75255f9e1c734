// 该文件是 Zhijian （质检） 项目的一部分。
// tests/continuous_folder.rs - 目录输入到检验记录的连续检验
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

mod common;

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use serde_json::Value;
use tempfile::tempdir;
use url::Url;
use zhijian::{
  FromUrl,
  input::InputWrapper,
  model::RoboflowBuilder,
  output::OutputWrapper,
  station::Station,
  task::{ContinuousTask, Task},
  verdict::ClassVocabulary,
};

const PASSING: &str = r#"{"predictions": [
  {"x": 20, "y": 20, "width": 6, "height": 6, "confidence": 0.9, "class": "circlip"},
  {"x": 20, "y": 20, "width": 30, "height": 30, "confidence": 0.8, "class": "black"}
]}"#;
const MISSING_TARGET: &str = r#"{"predictions": [
  {"x": 20, "y": 20, "width": 30, "height": 30, "confidence": 0.8, "class": "white"}
]}"#;

fn json_records(dir: &Path) -> Vec<PathBuf> {
  let mut found = Vec::new();
  for entry in std::fs::read_dir(dir).unwrap() {
    let path = entry.unwrap().path();
    if path.is_dir() {
      found.extend(json_records(&path));
    } else if path.extension().is_some_and(|e| e == "json") {
      found.push(path);
    }
  }
  found.sort();
  found
}

#[test]
fn folder_session_records_every_inspection() {
  let incoming = tempdir().unwrap();
  let records = tempdir().unwrap();
  for name in ["a.png", "b.png", "c.png"] {
    RgbImage::from_pixel(48, 48, Rgb([60, 60, 60]))
      .save(incoming.path().join(name))
      .unwrap();
  }
  std::fs::write(incoming.path().join("notes.txt"), "not an image").unwrap();

  let (endpoint, server) = common::serve(vec![
    (200, PASSING.to_string()),
    (200, MISSING_TARGET.to_string()),
    (500, "model timeout".to_string()),
  ]);
  let client = RoboflowBuilder::new("pl_co/1")
    .endpoint(endpoint)
    .api_key("secret")
    .build()
    .unwrap();
  let station = Station::new(client, ClassVocabulary::default());

  let input_url = Url::parse(&format!("folder://{}", incoming.path().display())).unwrap();
  let output_url = Url::parse(&format!("folder://{}?always", records.path().display())).unwrap();
  let input = InputWrapper::from_url(&input_url).unwrap();
  let output = OutputWrapper::from_url(&output_url).unwrap();

  let tally = ContinuousTask::default()
    .with_frame_number(Some(3))
    .run_task(input, station, output)
    .unwrap();
  server.join().unwrap();

  // 推理出错的一次不计入统计
  assert_eq!((tally.ok(), tally.nok(), tally.total()), (1, 1, 2));

  let records = json_records(records.path());
  assert_eq!(records.len(), 3);
  let verdicts: Vec<String> = records
    .iter()
    .map(|path| {
      let value: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
      value["verdict"].as_str().unwrap_or_default().to_string()
    })
    .collect();
  assert_eq!(verdicts.iter().filter(|v| v.as_str() == "PASS").count(), 1);
  assert_eq!(verdicts.iter().filter(|v| v.as_str() == "FAIL").count(), 2);
}
