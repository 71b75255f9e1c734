// 该文件是 Zhijian （质检） 项目的一部分。
// src/tally.rs - 会话计数
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

use serde::Serialize;

use crate::verdict::Verdict;

/// PASS/FAIL 计数，由调用方持有并在每次检验后显式记录
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionTally {
  ok: u64,
  nok: u64,
}

impl SessionTally {
  pub fn record(&mut self, verdict: Verdict) {
    match verdict {
      Verdict::Pass => self.ok += 1,
      Verdict::Fail => self.nok += 1,
    }
  }

  pub fn ok(&self) -> u64 {
    self.ok
  }

  pub fn nok(&self) -> u64 {
    self.nok
  }

  pub fn total(&self) -> u64 {
    self.ok + self.nok
  }

  /// 尚无记录时返回 None
  pub fn pass_ratio(&self) -> Option<f64> {
    match self.total() {
      0 => None,
      total => Some(self.ok as f64 / total as f64),
    }
  }
}

impl fmt::Display for SessionTally {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TOTAL {} | OK {} | NOK {}", self.total(), self.ok, self.nok)?;
    if let Some(ratio) = self.pass_ratio() {
      write!(f, " | PASS {:.1}%", ratio * 100.0)?;
    }
    Ok(())
  }
}
