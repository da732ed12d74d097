// 该文件是 Lujian （路检） 项目的一部分。
// src/severity.rs - 各检测领域的严重程度分级
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

use std::{cell::OnceCell, fmt, str::FromStr};

use image::{GrayImage, RgbImage};
use serde::Serialize;
use thiserror::Error;

use crate::{
  geometry::{Contour, DecodedBox},
  scene::SceneVerdict,
};

mod area_tier;
mod fixed_tier;
mod pothole;

pub use self::area_tier::AreaTierPolicy;
pub use self::fixed_tier::FixedTierPolicy;
pub use self::pothole::{
  DEFAULT_PROXIMITY_THRESHOLD, PotholePolicy, estimate_depth, pothole_priority, road_priority,
};

/// RGB 显示颜色
pub type Color = [u8; 3];

pub const RED: Color = [255, 0, 0];
pub const ORANGE: Color = [255, 165, 0];
pub const YELLOW: Color = [255, 255, 0];
pub const GREEN: Color = [0, 255, 0];

/// 三级优先级，`Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  Medium,
  High,
}

impl Priority {
  pub fn as_str(&self) -> &'static str {
    match self {
      Priority::Low => "low",
      Priority::Medium => "medium",
      Priority::High => "high",
    }
  }

  pub fn title(&self) -> &'static str {
    match self {
      Priority::Low => "Low",
      Priority::Medium => "Medium",
      Priority::High => "High",
    }
  }

  pub fn upper(&self) -> &'static str {
    match self {
      Priority::Low => "LOW",
      Priority::Medium => "MEDIUM",
      Priority::High => "HIGH",
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 检测领域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
  Pothole,
  Garbage,
  Streetlight,
  FallenTree,
  BrokenSignage,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知的检测领域: {0}")]
pub struct UnknownDomain(pub String);

impl Domain {
  pub const ALL: [Domain; 5] = [
    Domain::Pothole,
    Domain::Garbage,
    Domain::Streetlight,
    Domain::FallenTree,
    Domain::BrokenSignage,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Domain::Pothole => "pothole",
      Domain::Garbage => "garbage",
      Domain::Streetlight => "streetlight",
      Domain::FallenTree => "fallen_tree",
      Domain::BrokenSignage => "broken_signage",
    }
  }

  pub fn class_name(&self, class_index: usize) -> String {
    let known = |name: &str| {
      if class_index == 0 {
        name.to_string()
      } else {
        "unknown".to_string()
      }
    };

    match self {
      Domain::Pothole => "pothole".to_string(),
      Domain::Garbage => known("garbage"),
      Domain::Streetlight => known("broken_streetlight"),
      Domain::FallenTree => known("fallen_tree"),
      Domain::BrokenSignage if class_index == 0 => "broken_signage".to_string(),
      Domain::BrokenSignage => format!("class_{}", class_index),
    }
  }
}

impl fmt::Display for Domain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Domain {
  type Err = UnknownDomain;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "pothole" => Ok(Domain::Pothole),
      "garbage" => Ok(Domain::Garbage),
      "streetlight" => Ok(Domain::Streetlight),
      "fallen_tree" | "fallentree" | "fallen-tree" => Ok(Domain::FallenTree),
      "broken_signage" | "brokensignage" | "broken-signage" => Ok(Domain::BrokenSignage),
      _ => Err(UnknownDomain(s.to_string())),
    }
  }
}

/// 单个目标的严重程度记录
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
  /// 在归一化检测列表中的序号
  pub id: usize,
  pub class_index: usize,
  pub class_name: String,
  pub score: f32,
  pub bbox: DecodedBox,
  /// 仅在分割掩码参与计算时存在
  pub contour: Option<Contour>,
  pub area_ratio: f64,
  pub depth_score: Option<f64>,
  pub size_category: Option<Priority>,
  pub priority: Priority,
  pub color: Color,
}

/// 待分级的目标
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
  pub id: usize,
  pub class_index: usize,
  pub score: f32,
  pub bbox: DecodedBox,
  pub contour: Option<&'a Contour>,
}

/// 单次请求内共享的图像信息，灰度图按需生成
pub struct SceneContext<'a> {
  image: &'a RgbImage,
  gray: OnceCell<GrayImage>,
}

impl<'a> SceneContext<'a> {
  pub fn new(image: &'a RgbImage) -> Self {
    Self {
      image,
      gray: OnceCell::new(),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn area(&self) -> f64 {
    f64::from(self.width()) * f64::from(self.height())
  }

  /// 面积占比，限制在 [0, 1]
  pub fn area_ratio(&self, area: f64) -> f64 {
    (area / self.area()).clamp(0.0, 1.0)
  }

  pub fn gray(&self) -> &GrayImage {
    self
      .gray
      .get_or_init(|| image::imageops::grayscale(self.image))
  }
}

pub trait SeverityPolicy {
  fn domain(&self) -> Domain;

  fn color(&self, priority: Priority) -> Color;

  fn classify(&self, candidate: &Candidate<'_>, context: &SceneContext<'_>) -> ObjectRecord;

  fn aggregate(&self, objects: &[ObjectRecord]) -> SceneVerdict;

  /// 标注时是否统一使用场景优先级的颜色
  fn colors_by_scene(&self) -> bool {
    false
  }
}

/// 构造时即确定的领域策略
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
  Pothole(PotholePolicy),
  AreaTier(AreaTierPolicy),
  FixedTier(FixedTierPolicy),
}

impl Policy {
  pub fn for_domain(domain: Domain) -> Self {
    match domain {
      Domain::Pothole => Policy::Pothole(PotholePolicy::default()),
      Domain::Garbage => Policy::AreaTier(AreaTierPolicy::garbage()),
      Domain::Streetlight => Policy::AreaTier(AreaTierPolicy::streetlight()),
      Domain::FallenTree => Policy::FixedTier(FixedTierPolicy::fallen_tree()),
      Domain::BrokenSignage => Policy::FixedTier(FixedTierPolicy::broken_signage()),
    }
  }

  fn inner(&self) -> &dyn SeverityPolicy {
    match self {
      Policy::Pothole(policy) => policy,
      Policy::AreaTier(policy) => policy,
      Policy::FixedTier(policy) => policy,
    }
  }
}

impl From<Domain> for Policy {
  fn from(domain: Domain) -> Self {
    Policy::for_domain(domain)
  }
}

impl SeverityPolicy for Policy {
  fn domain(&self) -> Domain {
    self.inner().domain()
  }

  fn color(&self, priority: Priority) -> Color {
    self.inner().color(priority)
  }

  fn classify(&self, candidate: &Candidate<'_>, context: &SceneContext<'_>) -> ObjectRecord {
    self.inner().classify(candidate, context)
  }

  fn aggregate(&self, objects: &[ObjectRecord]) -> SceneVerdict {
    self.inner().aggregate(objects)
  }

  fn colors_by_scene(&self) -> bool {
    self.inner().colors_by_scene()
  }
}
