// 该文件是 Lujian （路检） 项目的一部分。
// src/tensor.rs - 原始输出张量布局归一化
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

//! 推理后端输出张量的布局识别与归一化。
//!
//! 不同导出方式得到的检测头形状各不相同，这里统一整理为
//! `(box_normalized, score, class_index)` 列表。无法识别的形状不是错误，
//! 只记录日志并返回空列表。

use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis, CowArray, Ix2, IxDyn, s};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

const BOX_ROWS: usize = 4;
const SINGLE_CLASS_ROWS: usize = 5;
const COCO_ROWS: usize = 84;
const LEGACY_ANCHORS: usize = 8400;
const LEGACY_MULTI_CLASS_ROWS: usize = 14;

#[derive(Error, Debug)]
pub enum TensorError {
  #[error("张量数据长度不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual} 个")]
  ShapeMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
}

/// 推理后端返回的原始输出张量（只读）
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
  data: ArrayD<f32>,
}

impl RawTensor {
  pub fn from_shape_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, TensorError> {
    let expected: usize = shape.iter().product();
    let actual = data.len();
    let data = ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| TensorError::ShapeMismatch {
      shape: shape.clone(),
      expected,
      actual,
    })?;
    Ok(Self { data })
  }

  pub fn shape(&self) -> &[usize] {
    self.data.shape()
  }

  pub fn view(&self) -> ArrayViewD<'_, f32> {
    self.data.view()
  }
}

impl From<ArrayD<f32>> for RawTensor {
  fn from(data: ArrayD<f32>) -> Self {
    Self { data }
  }
}

/// 归一化后的单个检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  /// 中心点形式 (cx, cy, w, h)，相对图像尺寸归一化
  pub box_normalized: [f32; 4],
  pub score: f32,
  pub class_index: usize,
}

/// 已支持的检测头布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
  /// (1, 5, N): [x, y, w, h, conf]
  SingleClass,
  /// (1, 84, N): [x, y, w, h] + 80 个类别分数
  MultiClass,
  /// (1, 1, 5M): 按行优先重塑为 (5, M)
  FlattenedSingleClass,
  /// (5, 8400)
  LegacySingleClass,
  /// (14, 8400): [x, y, w, h] + 10 个类别分数
  LegacyMultiClass,
}

impl TensorLayout {
  /// 按顺序尝试匹配，第一个命中的布局生效
  pub fn detect(shape: &[usize]) -> Option<Self> {
    match *shape {
      [0, _, _] => None,
      [_, SINGLE_CLASS_ROWS, _] => Some(Self::SingleClass),
      [_, COCO_ROWS, _] => Some(Self::MultiClass),
      [_, rows, cols] if cols % SINGLE_CLASS_ROWS == 0 => {
        if rows == 1 {
          Some(Self::FlattenedSingleClass)
        } else {
          warn!(
            "重塑后的输出形状 ({}, {}, {}) 不是单行，无法解析",
            rows,
            SINGLE_CLASS_ROWS,
            cols / SINGLE_CLASS_ROWS
          );
          None
        }
      }
      [SINGLE_CLASS_ROWS, LEGACY_ANCHORS] => Some(Self::LegacySingleClass),
      [LEGACY_MULTI_CLASS_ROWS, LEGACY_ANCHORS] => Some(Self::LegacyMultiClass),
      _ => None,
    }
  }

  // 取出 (特征行, 检测列) 的二维矩阵
  fn head_matrix(self, tensor: &RawTensor) -> Option<CowArray<'_, f32, Ix2>> {
    let view = tensor.view();
    match self {
      Self::SingleClass | Self::MultiClass => view
        .index_axis_move(Axis(0), 0)
        .into_dimensionality::<Ix2>()
        .ok()
        .map(CowArray::from),
      Self::FlattenedSingleClass => {
        let row = view.index_axis_move(Axis(0), 0).index_axis_move(Axis(0), 0);
        let count = row.len() / SINGLE_CLASS_ROWS;
        let flat: Vec<f32> = row.iter().copied().collect();
        Array2::from_shape_vec((SINGLE_CLASS_ROWS, count), flat)
          .ok()
          .map(CowArray::from)
      }
      Self::LegacySingleClass | Self::LegacyMultiClass => {
        view.into_dimensionality::<Ix2>().ok().map(CowArray::from)
      }
    }
  }
}

/// 将单个输出张量归一化为检测列表
///
/// 仅按 `score > confidence_threshold` 过滤，不做任何重叠抑制。
pub fn normalize(tensor: &RawTensor, confidence_threshold: f32) -> Vec<Detection> {
  let Some(layout) = TensorLayout::detect(tensor.shape()) else {
    warn!("不支持的输出形状: {:?}", tensor.shape());
    return Vec::new();
  };
  debug!("输出形状 {:?} 识别为 {:?}", tensor.shape(), layout);

  let Some(head) = layout.head_matrix(tensor) else {
    warn!("无法按 {:?} 布局读取输出张量 {:?}", layout, tensor.shape());
    return Vec::new();
  };

  let detections = extract(head.view(), confidence_threshold);
  debug!(
    "置信度阈值 {} 过滤后保留 {}/{} 个检测",
    confidence_threshold,
    detections.len(),
    head.ncols()
  );
  detections
}

/// 后端可能返回多个张量，检测头为第一个
pub fn normalize_outputs(tensors: &[RawTensor], confidence_threshold: f32) -> Vec<Detection> {
  match tensors.split_first() {
    Some((head, rest)) => {
      if !rest.is_empty() {
        debug!("忽略其余 {} 个输出张量", rest.len());
      }
      normalize(head, confidence_threshold)
    }
    None => {
      debug!("推理后端没有返回输出张量");
      Vec::new()
    }
  }
}

fn extract(head: ArrayView2<'_, f32>, confidence_threshold: f32) -> Vec<Detection> {
  let single_class = head.nrows() == SINGLE_CLASS_ROWS;

  head
    .columns()
    .into_iter()
    .filter_map(|column| {
      let (score, class_index) = if single_class {
        (column[BOX_ROWS], 0)
      } else {
        arg_max(column.slice(s![BOX_ROWS..]))
      };

      (score > confidence_threshold).then(|| Detection {
        box_normalized: [column[0], column[1], column[2], column[3]],
        score,
        class_index,
      })
    })
    .collect()
}

// 相同最大值取第一个
fn arg_max(scores: ArrayView1<'_, f32>) -> (f32, usize) {
  scores
    .iter()
    .enumerate()
    .fold((f32::NEG_INFINITY, 0), |(best, best_idx), (idx, &value)| {
      if value > best {
        (value, idx)
      } else {
        (best, best_idx)
      }
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tensor(shape: &[usize], data: Vec<f32>) -> RawTensor {
    RawTensor::from_shape_vec(shape.to_vec(), data).expect("shape matches data")
  }

  // 列主序地填充 (rows, cols) 矩阵
  fn columns_to_rows(columns: &[Vec<f32>]) -> Vec<f32> {
    let rows = columns[0].len();
    (0..rows)
      .flat_map(|r| columns.iter().map(move |c| c[r]))
      .collect()
  }

  #[test]
  fn rejects_buffer_of_wrong_length() {
    let err = RawTensor::from_shape_vec(vec![1, 5, 2], vec![0.0; 9]).unwrap_err();
    assert!(matches!(
      err,
      TensorError::ShapeMismatch {
        expected: 10,
        actual: 9,
        ..
      }
    ));
  }

  #[test]
  fn single_class_layout_filters_strictly_above_threshold() {
    let data = columns_to_rows(&[
      vec![0.5, 0.5, 0.2, 0.2, 0.9],
      vec![0.1, 0.1, 0.1, 0.1, 0.25],
      vec![0.3, 0.3, 0.1, 0.1, 0.1],
    ]);
    let detections = normalize(&tensor(&[1, 5, 3], data), 0.25);

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].box_normalized, [0.5, 0.5, 0.2, 0.2]);
    assert_eq!(detections[0].score, 0.9);
    assert_eq!(detections[0].class_index, 0);
  }

  #[test]
  fn coco_layout_uses_arg_max_class() {
    let mut first = vec![0.0; COCO_ROWS];
    first[..4].copy_from_slice(&[0.5, 0.5, 0.25, 0.25]);
    first[4 + 7] = 0.8;
    first[4 + 3] = 0.5;
    let mut second = vec![0.0; COCO_ROWS];
    second[..4].copy_from_slice(&[0.25, 0.25, 0.125, 0.125]);
    second[4] = 0.3;
    second[4 + 79] = 0.3;

    let detections = normalize(&tensor(&[1, 84, 2], columns_to_rows(&[first, second])), 0.25);

    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].class_index, 7);
    assert_eq!(detections[0].score, 0.8);
    // 并列最大值取第一个
    assert_eq!(detections[1].class_index, 0);
    assert_eq!(detections[1].score, 0.3);
  }

  #[test]
  fn coco_layout_score_and_class_match_class_block_maximum() {
    let count = 16;
    let mut seed = 0x2545_f491_u32;
    let mut next = move || {
      seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
      (seed >> 8) as f32 / (1u32 << 24) as f32
    };
    let columns: Vec<Vec<f32>> = (0..count)
      .map(|_| (0..COCO_ROWS).map(|_| next()).collect())
      .collect();

    let detections = normalize(&tensor(&[1, 84, count], columns_to_rows(&columns)), -1.0);
    assert_eq!(detections.len(), count);

    for (detection, column) in detections.iter().zip(&columns) {
      let block = &column[4..];
      let max = block.iter().copied().fold(f32::NEG_INFINITY, f32::max);
      let arg = block.iter().position(|&v| v == max).unwrap();
      assert_eq!(detection.score, max);
      assert_eq!(detection.class_index, arg);
      assert_eq!(detection.box_normalized, [column[0], column[1], column[2], column[3]]);
    }
  }

  #[test]
  fn flattened_single_row_is_reshaped_row_major() {
    // (1, 1, 10) -> (5, 2)
    let data = vec![0.5, 0.25, 0.5, 0.75, 0.1, 0.2, 0.1, 0.2, 0.9, 0.1];
    let shape = [1, 1, 10];
    assert_eq!(TensorLayout::detect(&shape), Some(TensorLayout::FlattenedSingleClass));

    let detections = normalize(&tensor(&shape, data), 0.25);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].box_normalized, [0.5, 0.5, 0.1, 0.1]);
    assert_eq!(detections[0].score, 0.9);
  }

  #[test]
  fn flattened_multi_row_is_unsupported() {
    for rows in [2, 3, 7] {
      let shape = [1, rows, 10];
      assert_eq!(TensorLayout::detect(&shape), None);
      assert!(normalize(&tensor(&shape, vec![0.9; rows * 10]), 0.25).is_empty());
    }
  }

  #[test]
  fn rank_three_with_columns_not_divisible_by_five_is_unsupported() {
    assert_eq!(TensorLayout::detect(&[1, 7, 9]), None);
    assert!(normalize(&tensor(&[1, 7, 9], vec![0.9; 63]), 0.25).is_empty());
  }

  #[test]
  fn legacy_single_class_layout() {
    let mut data = vec![0.0; 5 * LEGACY_ANCHORS];
    let column = 10;
    for (row, value) in [0.5, 0.5, 0.25, 0.25, 0.7].into_iter().enumerate() {
      data[row * LEGACY_ANCHORS + column] = value;
    }

    let detections = normalize(&tensor(&[5, LEGACY_ANCHORS], data), 0.25);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].score, 0.7);
    assert_eq!(detections[0].class_index, 0);
  }

  #[test]
  fn legacy_multi_class_layout() {
    let mut data = vec![0.0; LEGACY_MULTI_CLASS_ROWS * LEGACY_ANCHORS];
    let column = 42;
    for (row, value) in [0.5, 0.5, 0.25, 0.25].into_iter().enumerate() {
      data[row * LEGACY_ANCHORS + column] = value;
    }
    data[(4 + 6) * LEGACY_ANCHORS + column] = 0.6;
    data[(4 + 2) * LEGACY_ANCHORS + column] = 0.4;

    let detections = normalize(&tensor(&[LEGACY_MULTI_CLASS_ROWS, LEGACY_ANCHORS], data), 0.25);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_index, 6);
    assert_eq!(detections[0].score, 0.6);
  }

  #[test]
  fn other_shapes_are_unsupported() {
    assert_eq!(TensorLayout::detect(&[6, LEGACY_ANCHORS]), None);
    assert_eq!(TensorLayout::detect(&[5, 100]), None);
    assert_eq!(TensorLayout::detect(&[1, 5, 2, 2]), None);
    assert_eq!(TensorLayout::detect(&[0, 5, 3]), None);
    assert_eq!(TensorLayout::detect(&[25]), None);

    let rank_four = tensor(&[1, 1, 5, 2], vec![0.9; 10]);
    assert!(normalize(&rank_four, 0.25).is_empty());
  }

  #[test]
  fn empty_detection_axis_yields_nothing() {
    assert!(normalize(&tensor(&[1, 5, 0], Vec::new()), 0.25).is_empty());
  }

  #[test]
  fn non_finite_scores_never_pass() {
    let data = columns_to_rows(&[vec![0.5, 0.5, 0.2, 0.2, f32::NAN]]);
    assert!(normalize(&tensor(&[1, 5, 1], data), 0.25).is_empty());
  }

  #[test]
  fn only_first_output_is_read() {
    let head = tensor(&[1, 5, 1], vec![0.5, 0.5, 0.2, 0.2, 0.9]);
    let extra = tensor(&[1, 5, 1], vec![0.1, 0.1, 0.1, 0.1, 0.9]);
    let detections = normalize_outputs(&[head, extra], 0.25);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].box_normalized[0], 0.5);

    assert!(normalize_outputs(&[], 0.25).is_empty());
  }
}
