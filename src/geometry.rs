// 该文件是 Lujian （路检） 项目的一部分。
// src/geometry.rs - 边界框解码与轮廓几何
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

use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::tensor::Detection;

/// 像素坐标下的角点形式边界框
///
/// 保证 `0 <= x1 < x2 <= width` 且 `0 <= y1 < y2 <= height`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "[u32; 4]")]
pub struct DecodedBox {
  pub x1: u32,
  pub y1: u32,
  pub x2: u32,
  pub y2: u32,
}

impl DecodedBox {
  pub fn width(&self) -> u32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> u32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f64 {
    f64::from(self.width()) * f64::from(self.height())
  }

  pub fn top_left(&self) -> (f64, f64) {
    (f64::from(self.x1), f64::from(self.y1))
  }

  pub fn corners(&self) -> [u32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }

  /// 边界框退化为四边形轮廓（无分割掩码时使用）
  pub fn to_contour(&self) -> Contour {
    let [x1, y1, x2, y2] = self.corners().map(|v| v as i32);
    Contour(vec![[x1, y1], [x2, y1], [x2, y2], [x1, y2]])
  }
}

impl From<DecodedBox> for [u32; 4] {
  fn from(bbox: DecodedBox) -> Self {
    bbox.corners()
  }
}

/// 归一化中心点形式 (cx, cy, w, h) 转为像素角点形式
pub fn decode_center_box(box_normalized: [f32; 4], width: u32, height: u32) -> Option<DecodedBox> {
  let [cx, cy, bw, bh] = box_normalized.map(f64::from);
  let (w, h) = (f64::from(width), f64::from(height));

  let (x_center, y_center) = (cx * w, cy * h);
  let (half_w, half_h) = (bw * w / 2.0, bh * h / 2.0);

  clamp_corners(
    [
      x_center - half_w,
      y_center - half_h,
      x_center + half_w,
      y_center + half_h,
    ],
    width,
    height,
  )
}

/// 将像素角点裁剪到图像范围内并向下取整，退化的边界框返回 None
pub fn clamp_corners(corners: [f64; 4], width: u32, height: u32) -> Option<DecodedBox> {
  if corners.iter().any(|v| !v.is_finite()) {
    trace!("丢弃非有限坐标的边界框: {:?}", corners);
    return None;
  }

  let (w, h) = (f64::from(width), f64::from(height));
  let [x1, y1, x2, y2] = corners;
  let x1 = x1.clamp(0.0, w).floor() as u32;
  let y1 = y1.clamp(0.0, h).floor() as u32;
  let x2 = x2.clamp(0.0, w).floor() as u32;
  let y2 = y2.clamp(0.0, h).floor() as u32;

  if x1 >= x2 || y1 >= y2 {
    trace!("丢弃退化边界框: [{}, {}, {}, {}]", x1, y1, x2, y2);
    return None;
  }

  Some(DecodedBox { x1, y1, x2, y2 })
}

/// 解码后的检测，`index` 为其在归一化检测列表中的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedDetection {
  pub index: usize,
  pub bbox: DecodedBox,
  pub score: f32,
  pub class_index: usize,
}

pub fn decode_detections(detections: &[Detection], width: u32, height: u32) -> Vec<DecodedDetection> {
  detections
    .iter()
    .enumerate()
    .filter_map(|(index, detection)| {
      decode_center_box(detection.box_normalized, width, height).map(|bbox| DecodedDetection {
        index,
        bbox,
        score: detection.score,
        class_index: detection.class_index,
      })
    })
    .collect()
}

/// 实例分割轮廓，像素坐标 `[x, y]` 序列
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Contour(pub Vec<[i32; 2]>);

impl Contour {
  pub fn points(&self) -> &[[i32; 2]] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// 多边形面积（鞋带公式），与方向无关
  pub fn area(&self) -> f64 {
    let points = &self.0;
    if points.len() < 3 {
      return 0.0;
    }

    let twice_area: i64 = points
      .iter()
      .zip(points.iter().cycle().skip(1))
      .map(|(&[x0, y0], &[x1, y1])| i64::from(x0) * i64::from(y1) - i64::from(x1) * i64::from(y0))
      .sum();

    twice_area.abs() as f64 / 2.0
  }

  /// 轮廓外接矩形 (min_x, min_y, max_x, max_y)，包含边界
  pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
    let (&[x, y], rest) = self.0.split_first()?;
    Some(rest.iter().fold((x, y, x, y), |(x0, y0, x1, y1), &[px, py]| {
      (x0.min(px), y0.min(py), x1.max(px), y1.max(py))
    }))
  }

  /// 去除相邻重复点及闭合重复点后的多边形顶点，平移 `(dx, dy)`
  pub fn polygon(&self, dx: i32, dy: i32) -> Vec<Point<i32>> {
    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(self.0.len());
    for &[x, y] in &self.0 {
      let point = Point::new(x + dx, y + dy);
      if polygon.last() != Some(&point) {
        polygon.push(point);
      }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
      polygon.pop();
    }
    polygon
  }
}

impl From<Vec<[i32; 2]>> for Contour {
  fn from(points: Vec<[i32; 2]>) -> Self {
    Self(points)
  }
}
