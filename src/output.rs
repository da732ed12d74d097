// 该文件是 Lujian （路检） 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(any(feature = "save_image_file", feature = "directory_record", feature = "report_file"))]
use crate::FromUrlWithScheme;
use crate::scene::SceneReport;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;
pub use self::draw::{Draw, DrawError};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[cfg(feature = "report_file")]
mod report_file;
#[cfg(feature = "report_file")]
pub use self::report_file::{ReportFileOutput, ReportFileOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[cfg(feature = "report_file")]
  #[error("报告文件输出错误: {0}")]
  ReportFileOutputError(#[from] ReportFileOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
  #[cfg(feature = "report_file")]
  ReportFileOutput(ReportFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      #[cfg(feature = "report_file")]
      ReportFileOutput::SCHEME => {
        let output = ReportFileOutput::from_url(url)?;
        Ok(OutputWrapper::ReportFileOutput(output))
      }
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl OutputWrapper {
  /// 为需要绘制的输出替换标注器
  pub fn with_draw(self, draw: &Draw) -> Self {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_draw(draw.clone()))
      }
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => {
        OutputWrapper::DirectoryRecordOutput(output.with_draw(draw.clone()))
      }
      #[allow(unreachable_patterns)]
      other => other,
    }
  }
}

impl Render<RgbImage, SceneReport> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbImage, result: &SceneReport) -> Result<(), Self::Error> {
    match *self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(ref output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(ref output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "report_file")]
      OutputWrapper::ReportFileOutput(ref output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

/// 依次渲染到多个输出，遇到第一个错误即返回
#[derive(Default)]
pub struct OutputSet {
  outputs: Vec<OutputWrapper>,
}

impl OutputSet {
  pub fn push(&mut self, output: OutputWrapper) {
    self.outputs.push(output);
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}

impl FromIterator<OutputWrapper> for OutputSet {
  fn from_iter<I: IntoIterator<Item = OutputWrapper>>(iter: I) -> Self {
    Self {
      outputs: iter.into_iter().collect(),
    }
  }
}

impl Render<RgbImage, SceneReport> for OutputSet {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbImage, result: &SceneReport) -> Result<(), Self::Error> {
    for output in self.outputs.iter() {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[cfg(feature = "report_file")]
  #[test]
  fn dispatches_report_scheme() {
    let url = Url::parse("report:///tmp/lujian.json").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::ReportFileOutput(_))
    ));
  }

  #[cfg(feature = "save_image_file")]
  #[test]
  fn dispatches_image_scheme() {
    let url = Url::parse("image:///tmp/lujian.png").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::SaveImageFileOutput(_))
    ));
  }

  #[test]
  fn rejects_unknown_scheme() {
    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(scheme)) if scheme == "rtsp"
    ));
  }
}
