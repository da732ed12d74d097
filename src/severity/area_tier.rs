// 该文件是 Lujian （路检） 项目的一部分。
// src/severity/area_tier.rs - 按面积分级的领域（垃圾、路灯）
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

use crate::{
  scene::{SceneVerdict, TierCounts},
  severity::{
    Candidate, Color, Domain, GREEN, ObjectRecord, Priority, RED, SceneContext, SeverityPolicy,
    YELLOW,
  },
};

/// 目标尺寸即目标优先级，场景优先级只看各级数量
#[derive(Debug, Clone, PartialEq)]
pub struct AreaTierPolicy {
  pub domain: Domain,
  /// 面积占比超过该值为 high
  pub high_ratio: f64,
  /// 面积占比超过该值为 medium
  pub medium_ratio: f64,
  /// low 数量超过该值时场景至少为 medium
  pub low_count_threshold: usize,
}

impl AreaTierPolicy {
  pub fn garbage() -> Self {
    Self {
      domain: Domain::Garbage,
      high_ratio: 0.17,
      medium_ratio: 0.07,
      low_count_threshold: 2,
    }
  }

  pub fn streetlight() -> Self {
    Self {
      domain: Domain::Streetlight,
      high_ratio: 0.20,
      medium_ratio: 0.08,
      low_count_threshold: 3,
    }
  }

  pub fn size_category(&self, area_ratio: f64) -> Priority {
    if area_ratio > self.high_ratio {
      Priority::High
    } else if area_ratio > self.medium_ratio {
      Priority::Medium
    } else {
      Priority::Low
    }
  }

  pub fn scene_priority(&self, counts: TierCounts) -> Priority {
    if counts.high > 0 || counts.medium >= 2 {
      Priority::High
    } else if counts.medium >= 1 || counts.low > self.low_count_threshold {
      Priority::Medium
    } else {
      Priority::Low
    }
  }
}

impl SeverityPolicy for AreaTierPolicy {
  fn domain(&self) -> Domain {
    self.domain
  }

  fn color(&self, priority: Priority) -> Color {
    match priority {
      Priority::High => RED,
      Priority::Medium => YELLOW,
      Priority::Low => GREEN,
    }
  }

  fn classify(&self, candidate: &Candidate<'_>, context: &SceneContext<'_>) -> ObjectRecord {
    let area_ratio = context.area_ratio(candidate.bbox.area());
    let size_category = self.size_category(area_ratio);

    ObjectRecord {
      id: candidate.id,
      class_index: candidate.class_index,
      class_name: self.domain.class_name(candidate.class_index),
      score: candidate.score,
      bbox: candidate.bbox,
      contour: None,
      area_ratio,
      depth_score: None,
      size_category: Some(size_category),
      priority: size_category,
      color: self.color(size_category),
    }
  }

  fn aggregate(&self, objects: &[ObjectRecord]) -> SceneVerdict {
    let counts = TierCounts::tally(objects.iter().map(|o| o.priority));
    SceneVerdict::new(self.scene_priority(counts))
  }

  fn colors_by_scene(&self) -> bool {
    true
  }
}
