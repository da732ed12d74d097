// 该文件是 Lujian （路检） 项目的一部分。
// src/scene.rs - 空间聚类与场景级汇总
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

use crate::severity::{Color, Domain, ObjectRecord, Priority};

/// 一张图像的处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct SceneReport {
  pub domain: Domain,
  /// (width, height)
  pub image_size: (u32, u32),
  pub objects: Vec<ObjectRecord>,
  pub overall_priority: Priority,
  pub overall_color: Color,
  /// 以 `objects` 下标表示的空间分组，仅坑洼领域提供
  pub clusters: Option<Vec<Vec<usize>>>,
}

impl SceneReport {
  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.is_empty()
  }
}

/// 领域策略的汇总结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneVerdict {
  pub priority: Priority,
  pub clusters: Option<Vec<Vec<usize>>>,
}

impl SceneVerdict {
  pub fn new(priority: Priority) -> Self {
    Self {
      priority,
      clusters: None,
    }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TierCounts {
  pub low: usize,
  pub medium: usize,
  pub high: usize,
}

impl TierCounts {
  pub fn tally<I: IntoIterator<Item = Priority>>(tiers: I) -> Self {
    tiers.into_iter().fold(Self::default(), |mut counts, tier| {
      match tier {
        Priority::Low => counts.low += 1,
        Priority::Medium => counts.medium += 1,
        Priority::High => counts.high += 1,
      }
      counts
    })
  }
}

struct DisjointSet {
  parent: Vec<usize>,
  rank: Vec<u8>,
}

impl DisjointSet {
  fn new(size: usize) -> Self {
    Self {
      parent: (0..size).collect(),
      rank: vec![0; size],
    }
  }

  fn find(&mut self, mut node: usize) -> usize {
    while self.parent[node] != node {
      self.parent[node] = self.parent[self.parent[node]];
      node = self.parent[node];
    }
    node
  }

  fn union(&mut self, a: usize, b: usize) {
    let (ra, rb) = (self.find(a), self.find(b));
    if ra == rb {
      return;
    }
    match self.rank[ra].cmp(&self.rank[rb]) {
      std::cmp::Ordering::Less => self.parent[ra] = rb,
      std::cmp::Ordering::Greater => self.parent[rb] = ra,
      std::cmp::Ordering::Equal => {
        self.parent[rb] = ra;
        self.rank[ra] += 1;
      }
    }
  }
}

/// 按距离阈值做传递闭包分组
///
/// 两点距离严格小于 `threshold` 即相连。结果按最小成员排序，成员升序，
/// 包含单点分组。
pub fn cluster_by_proximity(points: &[(f64, f64)], threshold: f64) -> Vec<Vec<usize>> {
  let mut set = DisjointSet::new(points.len());
  for (i, &(xi, yi)) in points.iter().enumerate() {
    for (j, &(xj, yj)) in points.iter().enumerate().skip(i + 1) {
      if (xi - xj).hypot(yi - yj) < threshold {
        set.union(i, j);
      }
    }
  }

  let mut slot_of_root: Vec<Option<usize>> = vec![None; points.len()];
  let mut clusters: Vec<Vec<usize>> = Vec::new();
  for i in 0..points.len() {
    let root = set.find(i);
    match slot_of_root[root] {
      Some(slot) => clusters[slot].push(i),
      None => {
        slot_of_root[root] = Some(clusters.len());
        clusters.push(vec![i]);
      }
    }
  }
  clusters
}
