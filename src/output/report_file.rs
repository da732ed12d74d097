// 该文件是 Lujian （路检） 项目的一部分。
// src/output/report_file.rs - 保存 JSON 报告
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, report, scene::SceneReport};

#[derive(Error, Debug)]
pub enum ReportFileOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// `report:///path.json[?pretty]`
pub struct ReportFileOutput {
  path: PathBuf,
  pretty: bool,
}

impl FromUrlWithScheme for ReportFileOutput {
  const SCHEME: &'static str = "report";
}

impl FromUrl for ReportFileOutput {
  type Error = ReportFileOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ReportFileOutputError::SchemeMismatch(uri.scheme().to_string()));
    }

    Ok(ReportFileOutput {
      path: PathBuf::from(uri.path()),
      pretty: uri.query_pairs().any(|(k, _)| k == "pretty"),
    })
  }
}

impl Render<RgbImage, SceneReport> for ReportFileOutput {
  type Error = ReportFileOutputError;

  fn render_result(&self, _frame: &RgbImage, result: &SceneReport) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.path, report::to_json_string(result, self.pretty)?)?;
    info!("保存检测报告到文件: {}", self.path.display());
    Ok(())
  }
}
