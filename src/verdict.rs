// 该文件是 Zhijian （质检） 项目的一部分。
// src/verdict.rs - 合格判定
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

use std::fmt;

use crate::model::DetectionResult;

pub const DEFAULT_CARRIER_A: &str = "white";
pub const DEFAULT_CARRIER_B: &str = "black";
pub const DEFAULT_TARGET: &str = "circlip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Pass,
  Fail,
}

impl Verdict {
  pub fn is_pass(self) -> bool {
    self == Verdict::Pass
  }
}

impl From<Verdict> for bool {
  fn from(verdict: Verdict) -> Self {
    verdict.is_pass()
  }
}

impl From<bool> for Verdict {
  fn from(pass: bool) -> Self {
    if pass { Verdict::Pass } else { Verdict::Fail }
  }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Verdict::Pass => write!(f, "PASS"),
      Verdict::Fail => write!(f, "FAIL"),
    }
  }
}

/// 类别词表：两个可互换的载体类别和一个目标类别，启动时给定后不再改变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVocabulary {
  carriers: [String; 2],
  target: String,
}

impl Default for ClassVocabulary {
  fn default() -> Self {
    ClassVocabulary::new(DEFAULT_CARRIER_A, DEFAULT_CARRIER_B, DEFAULT_TARGET)
  }
}

impl ClassVocabulary {
  pub fn new(
    carrier_a: impl Into<String>,
    carrier_b: impl Into<String>,
    target: impl Into<String>,
  ) -> Self {
    ClassVocabulary {
      carriers: [carrier_a.into(), carrier_b.into()],
      target: target.into(),
    }
  }

  pub fn carriers(&self) -> &[String; 2] {
    &self.carriers
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn is_target(&self, label: &str) -> bool {
    label == self.target
  }

  /// 目标类别存在且至少存在一个载体类别时为 PASS；错误结果一律 FAIL
  pub fn evaluate(&self, result: &DetectionResult) -> Verdict {
    if result.is_error() {
      return Verdict::Fail;
    }
    let has_target = result.has_label(&self.target);
    let has_carrier = self.carriers.iter().any(|c| result.has_label(c));
    Verdict::from(has_target && has_carrier)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detection;

  fn result(labels: &[&str]) -> DetectionResult {
    labels
      .iter()
      .enumerate()
      .map(|(i, label)| Detection::new(*label, (10.0 * i as f32, 10.0), (5.0, 5.0), 0.5))
      .collect::<Vec<_>>()
      .into()
  }

  #[test]
  fn truth_table() {
    let vocab = ClassVocabulary::default();
    // (carrier-a, carrier-b, target) -> PASS?
    let cases = [
      (false, false, false, false),
      (true, false, false, false),
      (false, true, false, false),
      (true, true, false, false),
      (false, false, true, false),
      (true, false, true, true),
      (false, true, true, true),
      (true, true, true, true),
    ];
    for (a, b, t, expected) in cases {
      let mut labels = Vec::new();
      if a {
        labels.push("white");
      }
      if b {
        labels.push("black");
      }
      if t {
        labels.push("circlip");
      }
      assert_eq!(
        vocab.evaluate(&result(&labels)).is_pass(),
        expected,
        "a={a} b={b} t={t}"
      );
      let error = DetectionResult::service_error(500, "x");
      assert_eq!(vocab.evaluate(&error), Verdict::Fail);
    }
  }

  #[test]
  fn target_with_first_carrier_passes_regardless_of_extras() {
    let vocab = ClassVocabulary::default();
    let r = result(&["circlip", "white", "black", "circlip", "gear"]);
    assert_eq!(vocab.evaluate(&r), Verdict::Pass);
  }

  #[test]
  fn many_carriers_without_target_fail() {
    let vocab = ClassVocabulary::default();
    let r = result(&["white", "white", "black", "black", "white"]);
    assert_eq!(vocab.evaluate(&r), Verdict::Fail);
  }

  #[test]
  fn confidence_and_geometry_are_ignored() {
    let vocab = ClassVocabulary::default();
    let r = DetectionResult::from(vec![
      Detection::new("circlip", (0.0, 0.0), (0.1, 0.1), 0.0),
      Detection::new("black", (-50.0, 9000.0), (1.0, 1.0), 0.01),
    ]);
    assert_eq!(vocab.evaluate(&r), Verdict::Pass);
  }

  #[test]
  fn custom_vocabulary() {
    let vocab = ClassVocabulary::new("red", "blue", "pin");
    assert_eq!(vocab.evaluate(&result(&["pin", "blue"])), Verdict::Pass);
    assert_eq!(vocab.evaluate(&result(&["circlip", "white"])), Verdict::Fail);
    assert!(vocab.is_target("pin"));
    assert!(!vocab.is_target("red"));
  }

  #[test]
  fn empty_result_fails() {
    assert_eq!(
      ClassVocabulary::default().evaluate(&DetectionResult::empty()),
      Verdict::Fail
    );
  }

  #[test]
  fn verdict_converts_to_bool() {
    assert!(bool::from(Verdict::Pass));
    assert!(!bool::from(Verdict::Fail));
    assert_eq!(Verdict::from(true).to_string(), "PASS");
  }
}
