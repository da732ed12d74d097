// 该文件是 Lujian （路检） 项目的一部分。
// src/main.rs - 单张图像检测主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use lujian::{
  Engine, EngineConfig, FromUrl, Policy,
  input::InputWrapper,
  model::{Detector, TensorFileBackend},
  output::{Draw, OutputSet, OutputWrapper},
  report,
  severity::PotholePolicy,
  task::{OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("检测领域: {}", args.domain);
  info!("输入来源: {}", args.input);
  info!("推理输出: {}", args.tensors);
  info!("置信度阈值: {}", args.confidence);

  let policy = match Policy::for_domain(args.domain) {
    Policy::Pothole(_) => {
      Policy::Pothole(PotholePolicy::default().with_proximity_threshold(args.proximity))
    }
    other => other,
  };
  let engine = Engine::new(policy).with_config(EngineConfig {
    confidence_threshold: args.confidence,
  });

  let draw = match &args.font {
    Some(path) => Draw::default().with_font_file(path)?,
    None => Draw::default(),
  };

  let input = InputWrapper::from_url(&args.input)?;
  let backend = TensorFileBackend::from_url(&args.tensors)?;
  let outputs = args
    .output
    .iter()
    .map(|url| OutputWrapper::from_url(url).map(|output| output.with_draw(&draw)))
    .collect::<Result<OutputSet, _>>()?;
  info!("输出数量: {}", outputs.len());

  let detector = Detector::new(backend, engine);
  let scene = OneShotTask.run_task(input, detector, outputs)?;

  println!("{}", report::to_json_string(&scene, args.pretty)?);

  Ok(())
}
