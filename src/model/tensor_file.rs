// 该文件是 Lujian （路检） 项目的一部分。
// src/model/tensor_file.rs - 回放已记录的推理输出
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

use std::convert::Infallible;

use image::RgbImage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::Contour,
  model::{DecodedOutput, InferenceBackend, ModelOutput},
  tensor::{RawTensor, TensorError},
};

#[derive(Error, Debug)]
pub enum TensorFileBackendError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: &'static str, found: String },
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("张量错误: {0}")]
  Tensor(#[from] TensorError),
}

#[derive(Deserialize)]
struct RecordedTensor {
  shape: Vec<usize>,
  data: Vec<f32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordedOutput {
  Raw {
    outputs: Vec<RecordedTensor>,
    #[serde(default)]
    contours: Option<Vec<Contour>>,
  },
  Decoded(DecodedOutput),
}

impl TryFrom<RecordedOutput> for ModelOutput {
  type Error = TensorError;

  fn try_from(recorded: RecordedOutput) -> Result<Self, Self::Error> {
    match recorded {
      RecordedOutput::Raw { outputs, contours } => {
        let tensors = outputs
          .into_iter()
          .map(|t| RawTensor::from_shape_vec(t.shape, t.data))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(ModelOutput::Raw { tensors, contours })
      }
      RecordedOutput::Decoded(decoded) => Ok(ModelOutput::Decoded(decoded)),
    }
  }
}

/// 从 JSON 文件读取一次推理输出，之后每次推理都返回同一结果
///
/// 用于离线复现设备端的后处理，地址形如 `tensor:///path/to/output.json`。
#[derive(Debug, Clone)]
pub struct TensorFileBackend {
  output: ModelOutput,
}

impl FromUrlWithScheme for TensorFileBackend {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileBackend {
  type Error = TensorFileBackendError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileBackendError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    info!("加载推理输出文件: {}", url.path());
    let content = std::fs::read_to_string(url.path())?;
    Self::from_json_str(&content)
  }
}

impl TensorFileBackend {
  pub fn from_json_str(content: &str) -> Result<Self, TensorFileBackendError> {
    let recorded: RecordedOutput = serde_json::from_str(content)?;
    let output = ModelOutput::try_from(recorded)?;
    match &output {
      ModelOutput::Raw { tensors, contours } => debug!(
        "原始输出 {} 个张量, 轮廓 {}",
        tensors.len(),
        contours.as_ref().map_or(0, Vec::len)
      ),
      ModelOutput::Decoded(decoded) => debug!("已解码输出 {} 个边界框", decoded.boxes.len()),
    }
    Ok(Self { output })
  }

  pub fn output(&self) -> &ModelOutput {
    &self.output
  }
}

impl InferenceBackend for TensorFileBackend {
  type Error = Infallible;

  fn infer(&self, _image: &RgbImage) -> Result<ModelOutput, Self::Error> {
    Ok(self.output.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_raw_outputs_with_contours() {
    let backend = TensorFileBackend::from_json_str(
      r#"{
        "outputs": [{"shape": [1, 5, 2], "data": [0.5, 0.2, 0.5, 0.2, 0.1, 0.1, 0.1, 0.1, 0.9, 0.1]}],
        "contours": [[[1, 1], [5, 1], [5, 5]]]
      }"#,
    )
    .unwrap();

    let ModelOutput::Raw { tensors, contours } = backend.output() else {
      panic!("expected raw output");
    };
    assert_eq!(tensors[0].shape(), &[1, 5, 2]);
    assert_eq!(contours.as_ref().map(Vec::len), Some(1));
  }

  #[test]
  fn reads_decoded_outputs() {
    let backend = TensorFileBackend::from_json_str(
      r#"{"boxes": [[1, 2, 30, 40]], "scores": [0.8], "class_indices": [0]}"#,
    )
    .unwrap();

    let ModelOutput::Decoded(decoded) = backend.output() else {
      panic!("expected decoded output");
    };
    assert_eq!(decoded.boxes, vec![[1.0, 2.0, 30.0, 40.0]]);
    assert_eq!(decoded.contours, None);
  }

  #[test]
  fn rejects_mismatched_tensor_data() {
    let err =
      TensorFileBackend::from_json_str(r#"{"outputs": [{"shape": [1, 5, 2], "data": [0.5]}]}"#)
        .unwrap_err();
    assert!(matches!(err, TensorFileBackendError::Tensor(_)));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("image:///tmp/a.json").unwrap();
    let err = TensorFileBackend::from_url(&url).unwrap_err();
    assert!(matches!(
      err,
      TensorFileBackendError::SchemeMismatch { found, .. } if found == "image"
    ));
  }
}
