// 该文件是 Lujian （路检） 项目的一部分。
// src/model.rs - 模型与推理后端
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
use serde::Deserialize;
use thiserror::Error;

use crate::{
  engine::{Engine, EngineError},
  geometry::Contour,
  scene::SceneReport,
  tensor::RawTensor,
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理后端，负责加载模型并给出原始输出
pub trait InferenceBackend {
  type Error;

  fn infer(&self, image: &RgbImage) -> Result<ModelOutput, Self::Error>;
}

/// 推理后端的一次输出
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
  /// 原始输出张量，可附带按检测序号排列的分割轮廓
  Raw {
    tensors: Vec<RawTensor>,
    contours: Option<Vec<Contour>>,
  },
  /// 已解码为像素角点的检测结果
  Decoded(DecodedOutput),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecodedOutput {
  /// `[x1, y1, x2, y2]` 像素坐标
  pub boxes: Vec<[f32; 4]>,
  pub scores: Vec<f32>,
  pub class_indices: Vec<usize>,
  #[serde(default)]
  pub contours: Option<Vec<Contour>>,
}

impl DecodedOutput {
  pub fn validate(&self) -> Result<(), EngineError> {
    let (boxes, scores, class_indices) = (
      self.boxes.len(),
      self.scores.len(),
      self.class_indices.len(),
    );
    if boxes != scores || boxes != class_indices {
      return Err(EngineError::LengthMismatch {
        boxes,
        scores,
        class_indices,
      });
    }
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum DetectorError<E: std::error::Error + 'static> {
  #[error("推理后端错误: {0}")]
  Backend(#[source] E),
  #[error("后处理错误: {0}")]
  Engine(#[from] EngineError),
}

/// 推理后端与后处理引擎的组合
pub struct Detector<B> {
  backend: B,
  engine: Engine,
}

impl<B: InferenceBackend> Detector<B> {
  pub fn new(backend: B, engine: Engine) -> Self {
    Self { backend, engine }
  }

  pub fn process(&self, image: &RgbImage) -> Result<SceneReport, DetectorError<B::Error>>
  where
    B::Error: std::error::Error + 'static,
  {
    let output = self.backend.infer(image).map_err(DetectorError::Backend)?;
    Ok(self.engine.process(image, &output)?)
  }
}

impl<B> Model for Detector<B>
where
  B: InferenceBackend,
  B::Error: std::error::Error + 'static,
{
  type Input = RgbImage;
  type Output = SceneReport;
  type Error = DetectorError<B::Error>;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.process(input)
  }
}

#[cfg(feature = "tensor_file")]
mod tensor_file;
#[cfg(feature = "tensor_file")]
pub use self::tensor_file::{TensorFileBackend, TensorFileBackendError};
