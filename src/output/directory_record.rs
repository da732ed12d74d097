// 该文件是 Lujian （路检） 项目的一部分。
// src/output/directory_record.rs - 按日期归档的目录记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, draw::Draw},
  report,
  scene::SceneReport,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 保存标注图像，或保存原图并附带 JSON 报告
pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record,
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &RgbImage,
    result: &SceneReport,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.annotate(frame, result).save(path)?;
      }
      DrawWrapper::Record => {
        frame.save(path)?;
        let json = report::to_json_string(result, true)?;
        std::fs::write(path.with_extension("json"), json)?;
      }
    };

    Ok(())
  }
}

/// `folder:///dir[?record][&always]`
///
/// 图像写入 `dir/YYYY/MM/DD/HH-MM-SS-XXXX.png`。默认只在检测到目标时保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: if record {
        DrawWrapper::Record
      } else {
        DrawWrapper::Draw(Box::default())
      },
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  /// 记录模式下不绘制，传入的标注器被忽略
  pub fn with_draw(mut self, draw: Draw) -> Self {
    if let DrawWrapper::Draw(_) = self.draw {
      self.draw = DrawWrapper::Draw(Box::new(draw));
    }
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RgbImage, SceneReport> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &SceneReport) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("没有检测到目标，跳过记录");
      return Ok(());
    }

    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, result)?;
    info!("记录检测结果: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::severity::{Domain, GREEN, Priority};

  fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        files.extend(files_under(&path));
      } else {
        files.push(path);
      }
    }
    files.sort();
    files
  }

  fn empty_report() -> SceneReport {
    SceneReport {
      domain: Domain::Garbage,
      image_size: (8, 8),
      objects: vec![],
      overall_priority: Priority::Low,
      overall_color: GREEN,
      clusters: None,
    }
  }

  #[test]
  fn records_image_and_report_when_always_set() {
    let root = std::env::temp_dir().join(format!("lujian-record-{}", std::process::id()));
    let url = url::Url::parse(&format!("folder://{}?record&always", root.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output
      .render_result(&RgbImage::new(8, 8), &empty_report())
      .unwrap();

    let files = files_under(&root);
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|p| p.extension().is_some_and(|e| e == "png")));
    let json = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "json"))
      .unwrap();
    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(value["garbage_priority"], "low");

    std::fs::remove_dir_all(&root).unwrap();
  }

  #[test]
  fn skips_empty_scenes_by_default() {
    let root = std::env::temp_dir().join(format!("lujian-skip-{}", std::process::id()));
    let url = url::Url::parse(&format!("folder://{}", root.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output
      .render_result(&RgbImage::new(8, 8), &empty_report())
      .unwrap();
    assert!(!root.exists());
  }

  #[test]
  fn frame_ids_increase() {
    let url = url::Url::parse("folder:///tmp/unused").unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.frame_id(), 1);
    assert_eq!(output.frame_id(), 2);
  }
}
