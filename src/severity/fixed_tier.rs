// 该文件是 Lujian （路检） 项目的一部分。
// src/severity/fixed_tier.rs - 固定优先级的领域（倒伏树木、损坏标识）
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
  scene::SceneVerdict,
  severity::{
    Candidate, Color, Domain, GREEN, ORANGE, ObjectRecord, Priority, RED, SceneContext,
    SeverityPolicy,
  },
};

#[derive(Debug, Clone, PartialEq)]
pub struct FixedTierPolicy {
  pub domain: Domain,
  pub tier: Priority,
}

impl FixedTierPolicy {
  pub fn fallen_tree() -> Self {
    Self {
      domain: Domain::FallenTree,
      tier: Priority::High,
    }
  }

  pub fn broken_signage() -> Self {
    Self {
      domain: Domain::BrokenSignage,
      tier: Priority::Medium,
    }
  }
}

impl SeverityPolicy for FixedTierPolicy {
  fn domain(&self) -> Domain {
    self.domain
  }

  fn color(&self, priority: Priority) -> Color {
    match priority {
      Priority::High => RED,
      Priority::Medium => ORANGE,
      Priority::Low => GREEN,
    }
  }

  fn classify(&self, candidate: &Candidate<'_>, context: &SceneContext<'_>) -> ObjectRecord {
    ObjectRecord {
      id: candidate.id,
      class_index: candidate.class_index,
      class_name: self.domain.class_name(candidate.class_index),
      score: candidate.score,
      bbox: candidate.bbox,
      contour: None,
      area_ratio: context.area_ratio(candidate.bbox.area()),
      depth_score: None,
      size_category: None,
      priority: self.tier,
      color: self.color(self.tier),
    }
  }

  fn aggregate(&self, objects: &[ObjectRecord]) -> SceneVerdict {
    if objects.is_empty() {
      SceneVerdict::new(Priority::Low)
    } else {
      SceneVerdict::new(self.tier)
    }
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;
  use crate::geometry::DecodedBox;

  fn classify(policy: &FixedTierPolicy, class_index: usize) -> ObjectRecord {
    let image = RgbImage::new(50, 50);
    policy.classify(
      &Candidate {
        id: 0,
        class_index,
        score: 0.7,
        bbox: DecodedBox {
          x1: 0,
          y1: 0,
          x2: 25,
          y2: 10,
        },
        contour: None,
      },
      &SceneContext::new(&image),
    )
  }

  #[test]
  fn fallen_trees_are_always_high() {
    let policy = FixedTierPolicy::fallen_tree();
    let object = classify(&policy, 0);
    assert_eq!(object.priority, Priority::High);
    assert_eq!(object.color, RED);
    assert_eq!(object.class_name, "fallen_tree");
    assert_eq!(object.area_ratio, 0.1);
    assert_eq!(policy.aggregate(&[object]).priority, Priority::High);
    assert_eq!(policy.aggregate(&[]).priority, Priority::Low);
  }

  #[test]
  fn broken_signage_is_always_medium() {
    let policy = FixedTierPolicy::broken_signage();
    let objects = vec![classify(&policy, 0), classify(&policy, 2)];
    assert!(objects.iter().all(|o| o.priority == Priority::Medium));
    assert_eq!(objects[1].class_name, "class_2");
    assert_eq!(policy.aggregate(&objects).priority, Priority::Medium);
    assert_eq!(policy.aggregate(&[]).priority, Priority::Low);
  }
}
