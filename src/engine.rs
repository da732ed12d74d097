// 该文件是 Lujian （路检） 项目的一部分。
// src/engine.rs - 后处理引擎
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
use tracing::{debug, info};

use crate::{
  geometry::{Contour, clamp_corners, decode_detections},
  model::{DecodedOutput, ModelOutput},
  scene::SceneReport,
  severity::{Candidate, Domain, ObjectRecord, Policy, SceneContext, SeverityPolicy},
  tensor::{DEFAULT_CONFIDENCE_THRESHOLD, RawTensor, normalize_outputs},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
  #[error("输入图像尺寸为空: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
  #[error(
    "推理输出数组长度不一致: boxes={boxes}, scores={scores}, class_indices={class_indices}"
  )]
  LengthMismatch {
    boxes: usize,
    scores: usize,
    class_indices: usize,
  },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
  pub confidence_threshold: f32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
    }
  }
}

/// 将推理后端输出转换为场景报告
///
/// 引擎本身不持有可变状态，可在多个线程间共享。
#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
  policy: Policy,
  config: EngineConfig,
}

impl Engine {
  pub fn new(policy: Policy) -> Self {
    Self {
      policy,
      config: EngineConfig::default(),
    }
  }

  pub fn for_domain(domain: Domain) -> Self {
    Self::new(Policy::for_domain(domain))
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn domain(&self) -> Domain {
    self.policy.domain()
  }

  pub fn process(&self, image: &RgbImage, output: &ModelOutput) -> Result<SceneReport, EngineError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(EngineError::EmptyImage { width, height });
    }

    let candidates = match output {
      ModelOutput::Raw { tensors, contours } => {
        self.raw_candidates(tensors, contours.as_deref(), width, height)
      }
      ModelOutput::Decoded(decoded) => self.decoded_candidates(decoded, width, height)?,
    };
    debug!("{} 个目标进入分级", candidates.len());

    let context = SceneContext::new(image);
    let objects: Vec<ObjectRecord> = candidates
      .iter()
      .map(|candidate| self.policy.classify(candidate, &context))
      .collect();
    let verdict = self.policy.aggregate(&objects);

    info!(
      "{} 检测完成: {} 个目标, 场景优先级 {}",
      self.domain(),
      objects.len(),
      verdict.priority
    );

    Ok(SceneReport {
      domain: self.domain(),
      image_size: (width, height),
      objects,
      overall_priority: verdict.priority,
      overall_color: self.policy.color(verdict.priority),
      clusters: verdict.clusters,
    })
  }

  fn raw_candidates<'a>(
    &self,
    tensors: &[RawTensor],
    contours: Option<&'a [Contour]>,
    width: u32,
    height: u32,
  ) -> Vec<Candidate<'a>> {
    let detections = normalize_outputs(tensors, self.config.confidence_threshold);
    decode_detections(&detections, width, height)
      .into_iter()
      .map(|detection| Candidate {
        id: detection.index,
        class_index: detection.class_index,
        score: detection.score,
        bbox: detection.bbox,
        contour: contours.and_then(|c| c.get(detection.index)),
      })
      .collect()
  }

  /// 后端已给出像素角点时只做裁剪与阈值过滤
  ///
  /// `id` 为阈值过滤后的序号，轮廓按后端数组中的原始位置配对。
  fn decoded_candidates<'a>(
    &self,
    output: &'a DecodedOutput,
    width: u32,
    height: u32,
  ) -> Result<Vec<Candidate<'a>>, EngineError> {
    output.validate()?;
    let threshold = self.config.confidence_threshold;
    let contours = output.contours.as_deref();

    Ok(
      output
        .boxes
        .iter()
        .zip(&output.scores)
        .zip(&output.class_indices)
        .enumerate()
        .filter(|(_, ((_, score), _))| **score > threshold)
        .enumerate()
        .filter_map(|(id, (position, ((corners, &score), &class_index)))| {
          clamp_corners(corners.map(f64::from), width, height).map(|bbox| Candidate {
            id,
            class_index,
            score,
            bbox,
            contour: contours.and_then(|c| c.get(position)),
          })
        })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;
  use crate::{report, severity::Priority};

  fn single_class_output(columns: &[[f32; 5]]) -> ModelOutput {
    let n = columns.len();
    let mut data = vec![0.0; 5 * n];
    for (i, column) in columns.iter().enumerate() {
      for (row, value) in column.iter().enumerate() {
        data[row * n + i] = *value;
      }
    }
    ModelOutput::Raw {
      tensors: vec![RawTensor::from_shape_vec(vec![1, 5, n], data).unwrap()],
      contours: None,
    }
  }

  #[test]
  fn unsupported_tensor_yields_empty_low_scene() {
    let image = RgbImage::new(64, 64);
    let output = ModelOutput::Raw {
      tensors: vec![RawTensor::from_shape_vec(vec![1, 1, 5, 2], vec![0.9; 10]).unwrap()],
      contours: None,
    };

    for domain in Domain::ALL {
      let report = Engine::for_domain(domain).process(&image, &output).unwrap();
      assert!(report.is_empty());
      assert_eq!(report.overall_priority, Priority::Low);
      assert_eq!(report.image_size, (64, 64));
    }
  }

  #[test]
  fn zero_sized_image_is_rejected() {
    let output = single_class_output(&[[0.5, 0.5, 0.2, 0.2, 0.9]]);
    let err = Engine::for_domain(Domain::Garbage)
      .process(&RgbImage::new(0, 10), &output)
      .unwrap_err();
    assert_eq!(
      err,
      EngineError::EmptyImage {
        width: 0,
        height: 10
      }
    );
  }

  #[test]
  fn confidence_threshold_is_configurable() {
    let image = RgbImage::new(100, 100);
    let output = single_class_output(&[[0.5, 0.5, 0.2, 0.2, 0.3], [0.2, 0.2, 0.1, 0.1, 0.6]]);

    let default = Engine::for_domain(Domain::FallenTree);
    assert_eq!(default.process(&image, &output).unwrap().len(), 2);

    let strict = Engine::for_domain(Domain::FallenTree).with_config(EngineConfig {
      confidence_threshold: 0.5,
    });
    let report = strict.process(&image, &output).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.objects[0].id, 0);
    assert_eq!(report.overall_priority, Priority::High);
  }

  #[test]
  fn ids_survive_dropped_boxes() {
    let image = RgbImage::new(100, 100);
    // 第一个框宽度为 0，被丢弃
    let output = single_class_output(&[[0.5, 0.5, 0.0, 0.2, 0.9], [0.5, 0.5, 0.2, 0.2, 0.9]]);
    let report = Engine::for_domain(Domain::BrokenSignage)
      .process(&image, &output)
      .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.objects[0].id, 1);
    assert_eq!(report.overall_priority, Priority::Medium);
  }

  #[test]
  fn decoded_output_length_mismatch_is_an_error() {
    let image = RgbImage::new(10, 10);
    let output = ModelOutput::Decoded(DecodedOutput {
      boxes: vec![[0.0, 0.0, 5.0, 5.0]],
      scores: vec![0.9, 0.8],
      class_indices: vec![0],
      contours: None,
    });
    let err = Engine::for_domain(Domain::Pothole)
      .process(&image, &output)
      .unwrap_err();
    assert_eq!(
      err,
      EngineError::LengthMismatch {
        boxes: 1,
        scores: 2,
        class_indices: 1
      }
    );
  }

  #[test]
  fn decoded_output_is_clamped_and_paired_with_contours() {
    let image = RgbImage::from_pixel(100, 100, Rgb([200, 200, 200]));
    let output = ModelOutput::Decoded(DecodedOutput {
      boxes: vec![
        [10.0, 10.0, 30.0, 30.0],
        [-20.0, 50.0, 20.0, 150.0],
        [60.0, 60.0, 60.0, 80.0],
      ],
      scores: vec![0.1, 0.8, 0.9],
      class_indices: vec![0, 0, 0],
      contours: Some(vec![
        Contour(vec![]),
        Contour(vec![[0, 50], [20, 50], [20, 100], [0, 100]]),
        Contour(vec![]),
      ]),
    });

    let report = Engine::for_domain(Domain::Pothole)
      .process(&image, &output)
      .unwrap();
    assert_eq!(report.len(), 1);
    let object = &report.objects[0];
    assert_eq!(object.id, 0);
    assert_eq!(object.bbox.corners(), [0, 50, 20, 100]);
    assert_eq!(object.contour.as_ref().map(Contour::len), Some(4));
    assert_eq!(object.area_ratio, 0.1);
  }

  #[test]
  fn boxes_beyond_the_contour_list_use_their_own_outline() {
    let image = RgbImage::from_pixel(100, 100, Rgb([200, 200, 200]));
    let output = ModelOutput::Decoded(DecodedOutput {
      boxes: vec![[0.0, 0.0, 10.0, 10.0], [20.0, 20.0, 40.0, 40.0]],
      scores: vec![0.9, 0.9],
      class_indices: vec![0, 0],
      contours: Some(vec![Contour(vec![[0, 0], [5, 0], [5, 5], [0, 5]])]),
    });

    let report = Engine::for_domain(Domain::Pothole)
      .process(&image, &output)
      .unwrap();
    assert_eq!(report.len(), 2);
    assert!(report.objects[0].contour.is_some());
    assert_eq!(report.objects[0].area_ratio, 0.0025);
    assert_eq!(report.objects[1].contour, None);
    assert_eq!(report.objects[1].area_ratio, 0.04);
  }

  #[test]
  fn identical_input_gives_identical_report() {
    let image = RgbImage::from_pixel(200, 200, Rgb([30, 30, 30]));
    let output = single_class_output(&[
      [0.2, 0.2, 0.1, 0.1, 0.8],
      [0.3, 0.25, 0.1, 0.1, 0.7],
      [0.8, 0.8, 0.05, 0.05, 0.6],
    ]);
    let engine = Engine::for_domain(Domain::Pothole);

    let first = engine.process(&image, &output).unwrap();
    let second = engine.process(&image, &output).unwrap();
    assert_eq!(first, second);
    assert_eq!(
      report::to_json_string(&first, false).unwrap(),
      report::to_json_string(&second, false).unwrap()
    );
  }

  #[test]
  fn engine_is_shareable_between_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
    assert_send_sync::<SceneReport>();
  }
}
