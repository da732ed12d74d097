// 该文件是 Lujian （路检） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use lujian::{Domain, severity::DEFAULT_PROXIMITY_THRESHOLD, tensor::DEFAULT_CONFIDENCE_THRESHOLD};

/// Lujian 路况检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测领域: pothole, garbage, streetlight, fallen_tree, broken_signage
  #[arg(long, value_name = "DOMAIN")]
  pub domain: Domain,

  /// 输入图像，例如 image:///data/road.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 记录的推理输出，例如 tensor:///data/road.json
  #[arg(long, value_name = "TENSORS")]
  pub tensors: Url,

  /// 输出路径，可重复:
  /// - image:///out/annotated.png
  /// - folder:///out/records[?record][&always]
  /// - report:///out/report.json[?pretty]
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 坑洼聚类距离阈值（像素）
  #[arg(long, default_value_t = DEFAULT_PROXIMITY_THRESHOLD, value_name = "PIXELS")]
  pub proximity: f64,

  /// 标注字体文件（TTF），不提供时只绘制边框
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  /// 以缩进格式输出 JSON 报告
  #[arg(long)]
  pub pretty: bool,
}
