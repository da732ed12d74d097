// 该文件是 Lujian （路检） 项目的一部分。
// src/report.rs - 场景报告的 JSON 表示
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

//! 各领域的检测接口字段名与优先级写法不同，这里按领域投影为统一的 JSON。

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
  geometry::DecodedBox,
  scene::SceneReport,
  severity::{Domain, ObjectRecord, Priority},
};

#[derive(Serialize)]
struct DetectionEntry<'a> {
  id: usize,
  class: &'a str,
  bbox: DecodedBox,
  confidence: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  class_index: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  area_ratio: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  depth_score: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  size_category: Option<Priority>,
  #[serde(skip_serializing_if = "Option::is_none")]
  priority: Option<&'static str>,
}

/// 场景优先级在报告中的键名
pub fn priority_key(domain: Domain) -> &'static str {
  match domain {
    Domain::Pothole => "road_priority",
    Domain::Garbage => "garbage_priority",
    Domain::Streetlight => "streetlight_priority",
    Domain::FallenTree => "fallentree_priority",
    Domain::BrokenSignage => "brokensignage_priority",
  }
}

/// 坑洼领域使用首字母大写，其余领域使用小写
pub fn tier_label(domain: Domain, priority: Priority) -> &'static str {
  match domain {
    Domain::Pothole => priority.title(),
    _ => priority.as_str(),
  }
}

fn entry(domain: Domain, object: &ObjectRecord) -> DetectionEntry<'_> {
  let mut entry = DetectionEntry {
    id: object.id,
    class: &object.class_name,
    bbox: object.bbox,
    confidence: object.score,
    class_index: None,
    area_ratio: None,
    depth_score: None,
    size_category: None,
    priority: None,
  };

  match domain {
    Domain::Pothole => {
      entry.area_ratio = Some(object.area_ratio);
      entry.depth_score = object.depth_score;
      entry.priority = Some(tier_label(domain, object.priority));
    }
    Domain::Garbage | Domain::Streetlight => {
      entry.area_ratio = Some(object.area_ratio);
      entry.size_category = object.size_category;
    }
    Domain::FallenTree => {
      entry.priority = Some(tier_label(domain, object.priority));
    }
    Domain::BrokenSignage => {
      entry.priority = Some(tier_label(domain, object.priority));
      entry.class_index = Some(object.class_index);
    }
  }
  entry
}

/// 聚类成员在报告中以检测 id 表示
fn cluster_ids(report: &SceneReport, clusters: &[Vec<usize>]) -> Vec<Vec<usize>> {
  clusters
    .iter()
    .map(|members| {
      members
        .iter()
        .filter_map(|&position| report.objects.get(position).map(|object| object.id))
        .collect()
    })
    .collect()
}

pub fn project(report: &SceneReport) -> Result<Value, serde_json::Error> {
  let detections = report
    .objects
    .iter()
    .map(|object| serde_json::to_value(entry(report.domain, object)))
    .collect::<Result<Vec<_>, _>>()?;

  let mut map = Map::new();
  map.insert("detections".to_string(), Value::Array(detections));
  map.insert(
    priority_key(report.domain).to_string(),
    Value::from(tier_label(report.domain, report.overall_priority)),
  );
  map.insert("total_detections".to_string(), Value::from(report.len()));
  if let Some(clusters) = &report.clusters {
    let clusters = cluster_ids(report, clusters);
    map.insert("clusters".to_string(), serde_json::to_value(clusters)?);
  }
  Ok(Value::Object(map))
}

pub fn to_json_string(report: &SceneReport, pretty: bool) -> Result<String, serde_json::Error> {
  let value = project(report)?;
  if pretty {
    serde_json::to_string_pretty(&value)
  } else {
    serde_json::to_string(&value)
  }
}
