// 该文件是 Lujian （路检） 项目的一部分。
// src/output/draw.rs - 检测结果标注
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::debug;

use crate::{
  geometry::{Contour, DecodedBox},
  scene::SceneReport,
  severity::{Color, Domain, ObjectRecord, Policy, SeverityPolicy},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 10.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 3;
const LABEL_TEXT_COLOR: Color = [255, 255, 255];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 标注器，未提供字体时只画框不写字
#[derive(Clone)]
pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: Option<FontArc>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      font: None,
    }
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file<P: AsRef<Path>>(self, path: P) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontArc::try_from_vec(data)?;
    debug!("加载标注字体: {}", path.as_ref().display());
    Ok(self.with_font(font))
  }

  /// 在输入图像的副本上绘制所有目标
  pub fn annotate(&self, image: &RgbImage, report: &SceneReport) -> RgbImage {
    let mut canvas = image.clone();
    let by_scene = Policy::for_domain(report.domain).colors_by_scene();
    let thickness = if by_scene { 3 } else { 2 };

    for object in report.objects.iter() {
      let color = if by_scene {
        report.overall_color
      } else {
        object.color
      };

      match &object.contour {
        Some(contour) if !contour.is_empty() => draw_contour(&mut canvas, contour, color),
        _ => draw_box(&mut canvas, &object.bbox, color, thickness),
      }

      if let Some(font) = &self.font {
        let label = label_text(report.domain, object);
        self.draw_label(&mut canvas, &object.bbox, &label, color, font);
      }
    }
    canvas
  }

  fn draw_label(
    &self,
    image: &mut RgbImage,
    bbox: &DecodedBox,
    label: &str,
    color: Color,
    font: &FontArc,
  ) {
    let text_width = (label.chars().count() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签放在边框上方，空间不足时放在框内
    let label_x = bbox.x1 as i32;
    let label_y = (bbox.y1 as i32 - text_height).max(0);

    let max_width = (image.width() as i32 - label_x).max(0);
    let label_width = text_width.min(max_width) as u32;
    if label_width == 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width, text_height as u32);
    draw_filled_rect_mut(image, rect, Rgb(color));
    draw_text_mut(
      image,
      Rgb(LABEL_TEXT_COLOR),
      label_x,
      label_y + self.label_text_vertical_padding,
      PxScale::from(self.font_size),
      font,
      label,
    );
  }
}

fn draw_box(image: &mut RgbImage, bbox: &DecodedBox, color: Color, thickness: u32) {
  // 右下角为开区间
  for inset in 0..thickness {
    let (width, height) = (bbox.width(), bbox.height());
    if width <= 2 * inset || height <= 2 * inset {
      break;
    }
    let rect = Rect::at((bbox.x1 + inset) as i32, (bbox.y1 + inset) as i32)
      .of_size(width - 2 * inset, height - 2 * inset);
    draw_hollow_rect_mut(image, rect, Rgb(color));
  }
}

fn draw_contour(image: &mut RgbImage, contour: &Contour, color: Color) {
  let points = contour.points();
  for (i, start) in points.iter().enumerate() {
    let end = points[(i + 1) % points.len()];
    for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
      draw_line_segment_mut(
        image,
        (start[0] as f32 + dx, start[1] as f32 + dy),
        (end[0] as f32 + dx, end[1] as f32 + dy),
        Rgb(color),
      );
    }
  }
}

fn display_name(class_name: &str) -> String {
  class_name
    .split('_')
    .filter(|word| !word.is_empty())
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

/// 标签文本，例如 `Pothole (HIGH) (0.87)`、`Garbage (LOW) 0.55`
pub fn label_text(domain: Domain, object: &ObjectRecord) -> String {
  let name = display_name(&object.class_name);
  match domain {
    Domain::Garbage | Domain::Streetlight => {
      let tier = object.size_category.unwrap_or(object.priority);
      format!("{} ({}) {:.2}", name, tier.upper(), object.score)
    }
    _ => format!("{} ({}) ({:.2})", name, object.priority.upper(), object.score),
  }
}
