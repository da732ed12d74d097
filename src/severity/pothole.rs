// 该文件是 Lujian （路检） 项目的一部分。
// src/severity/pothole.rs - 坑洼严重程度与道路优先级
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

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use tracing::debug;

use crate::{
  geometry::Contour,
  scene::{SceneVerdict, TierCounts, cluster_by_proximity},
  severity::{
    Candidate, Color, Domain, GREEN, ORANGE, ObjectRecord, Priority, RED, SceneContext,
    SeverityPolicy,
  },
};

pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 150.0;

// 深度估计权重
const DARKNESS_WEIGHT: f64 = 0.7;
const CONTRAST_WEIGHT: f64 = 0.3;
const CONTRAST_SCALE: f64 = 50.0;

// 单个坑洼: combined = 0.6 * area_ratio * 100 + 0.4 * depth
const AREA_WEIGHT: f64 = 0.6;
const DEPTH_WEIGHT: f64 = 0.4;
const HIGH_COMBINED: f64 = 0.6;
const HIGH_AREA: f64 = 0.01;
const HIGH_DEPTH: f64 = 0.6;
const MEDIUM_COMBINED: f64 = 0.3;
const MEDIUM_AREA: f64 = 0.005;
const MEDIUM_DEPTH: f64 = 0.4;

// 整条道路
const ROAD_HIGH_TOTAL_AREA: f64 = 0.05;
const ROAD_MEDIUM_TOTAL_AREA: f64 = 0.02;
const ROAD_HIGH_CLUSTER: usize = 3;
const ROAD_MEDIUM_CLUSTER: usize = 2;

const MASK_ON: Luma<u8> = Luma([255]);

/// 基于阴影的深度估计，返回 [0, 1]
///
/// 掩码内灰度越暗、对比越强，视为越深。掩码为空时返回 0。
pub fn estimate_depth(gray: &GrayImage, contour: &Contour) -> f64 {
  let Some((min_x, min_y, max_x, max_y)) = contour.bounds() else {
    return 0.0;
  };
  let (width, height) = gray.dimensions();
  if width == 0 || height == 0 {
    return 0.0;
  }

  // 掩码只覆盖轮廓外接矩形与图像的交集
  let x0 = min_x.max(0);
  let y0 = min_y.max(0);
  let x1 = max_x.min(width as i32 - 1);
  let y1 = max_y.min(height as i32 - 1);
  if x0 > x1 || y0 > y1 {
    return 0.0;
  }

  let mut mask = GrayImage::new((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
  let polygon = contour.polygon(-x0, -y0);
  match polygon.as_slice() {
    [] => return 0.0,
    [p] => {
      if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
        mask.put_pixel(p.x as u32, p.y as u32, MASK_ON);
      }
    }
    [a, b] => draw_line_segment_mut(
      &mut mask,
      (a.x as f32, a.y as f32),
      (b.x as f32, b.y as f32),
      MASK_ON,
    ),
    _ => draw_polygon_mut(&mut mask, &polygon, MASK_ON),
  }

  let values: Vec<f64> = mask
    .enumerate_pixels()
    .filter(|(_, _, pixel)| *pixel == &MASK_ON)
    .map(|(mx, my, _)| f64::from(gray.get_pixel(mx + x0 as u32, my + y0 as u32)[0]))
    .collect();
  if values.is_empty() {
    return 0.0;
  }

  let count = values.len() as f64;
  let mean = values.iter().sum::<f64>() / count;
  let darkness = 1.0 - mean / 255.0;
  let contrast = if values.len() > 1 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    (variance.sqrt() / CONTRAST_SCALE).min(1.0)
  } else {
    0.0
  };

  (DARKNESS_WEIGHT * darkness + CONTRAST_WEIGHT * contrast).clamp(0.0, 1.0)
}

/// 单个坑洼的优先级
///
/// 大而浅或小而深的坑洼都能进入较高等级。
pub fn pothole_priority(area_ratio: f64, depth_score: f64) -> Priority {
  let combined = AREA_WEIGHT * area_ratio * 100.0 + DEPTH_WEIGHT * depth_score;
  if combined > HIGH_COMBINED || (area_ratio > HIGH_AREA && depth_score > HIGH_DEPTH) {
    Priority::High
  } else if combined > MEDIUM_COMBINED || (area_ratio > MEDIUM_AREA && depth_score > MEDIUM_DEPTH)
  {
    Priority::Medium
  } else {
    Priority::Low
  }
}

/// 根据全部坑洼及其空间分组得到道路优先级
pub fn road_priority(objects: &[ObjectRecord], clusters: &[Vec<usize>]) -> Priority {
  let counts = TierCounts::tally(objects.iter().map(|o| o.priority));
  let total_area: f64 = objects.iter().map(|o| o.area_ratio).sum();
  let largest_cluster = clusters.iter().map(Vec::len).max().unwrap_or(0);

  if counts.high >= 2
    || (counts.high >= 1 && counts.medium >= 2)
    || total_area > ROAD_HIGH_TOTAL_AREA
    || largest_cluster >= ROAD_HIGH_CLUSTER
  {
    Priority::High
  } else if counts.high >= 1
    || counts.medium >= 2
    || total_area > ROAD_MEDIUM_TOTAL_AREA
    || largest_cluster >= ROAD_MEDIUM_CLUSTER
  {
    Priority::Medium
  } else {
    Priority::Low
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PotholePolicy {
  /// 左上角距离小于该值（像素）的坑洼视为相邻
  pub proximity_threshold: f64,
}

impl Default for PotholePolicy {
  fn default() -> Self {
    Self {
      proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
    }
  }
}

impl PotholePolicy {
  pub fn with_proximity_threshold(mut self, proximity_threshold: f64) -> Self {
    self.proximity_threshold = proximity_threshold;
    self
  }
}

impl SeverityPolicy for PotholePolicy {
  fn domain(&self) -> Domain {
    Domain::Pothole
  }

  fn color(&self, priority: Priority) -> Color {
    match priority {
      Priority::High => RED,
      Priority::Medium => ORANGE,
      Priority::Low => GREEN,
    }
  }

  fn classify(&self, candidate: &Candidate<'_>, context: &SceneContext<'_>) -> ObjectRecord {
    let mask = candidate.contour.filter(|c| !c.is_empty());
    let outline = match mask {
      Some(contour) => contour.clone(),
      None => candidate.bbox.to_contour(),
    };

    let area_ratio = context.area_ratio(outline.area());
    let depth_score = estimate_depth(context.gray(), &outline);
    let priority = pothole_priority(area_ratio, depth_score);
    debug!(
      "坑洼 {}: 面积占比 {:.4}, 深度 {:.3}, 优先级 {}",
      candidate.id, area_ratio, depth_score, priority
    );

    ObjectRecord {
      id: candidate.id,
      class_index: candidate.class_index,
      class_name: Domain::Pothole.class_name(candidate.class_index),
      score: candidate.score,
      bbox: candidate.bbox,
      contour: mask.cloned(),
      area_ratio,
      depth_score: Some(depth_score),
      size_category: None,
      priority,
      color: self.color(priority),
    }
  }

  fn aggregate(&self, objects: &[ObjectRecord]) -> SceneVerdict {
    let corners: Vec<(f64, f64)> = objects.iter().map(|o| o.bbox.top_left()).collect();
    let clusters = cluster_by_proximity(&corners, self.proximity_threshold);
    SceneVerdict {
      priority: road_priority(objects, &clusters),
      clusters: Some(clusters),
    }
  }
}
