//! OCR Adapter: turns a rasterized PDF page into OCR `Line`s with
//! page-pixel geometry.
//!
//! Backed by Tesseract 5.x via `leptess`, the same OCR stack used elsewhere
//! in the pack for scanned-document text extraction. Characters below the
//! configured confidence threshold are discarded before grouping; the
//! remaining word boxes are clustered into lines by y-coordinate proximity
//! and, within a line, sorted by x.

pub mod pdf;

use catalogue_common::{Line, PageImage};
use image::{GenericImageView, RgbImage};
use leptess::{LepTess, Variable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language code(s), e.g. "hin", "guj", "eng", "hin+eng".
    pub language: String,
    /// Minimum per-word confidence (0-100) to keep a word.
    pub min_confidence: i32,
    /// Tesseract page segmentation mode.
    pub page_segmentation_mode: u32,
    /// Percentage of page height to crop from the top before OCR, to
    /// suppress running headers.
    pub top_crop_percent: f32,
    /// Percentage of page height to crop from the bottom before OCR, to
    /// suppress running footers.
    pub bottom_crop_percent: f32,
    /// Words whose vertical centers fall within this many pixels are
    /// considered the same OCR line.
    pub y_cluster_tolerance: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "hin".to_string(),
            min_confidence: 60,
            page_segmentation_mode: 3,
            top_crop_percent: 0.0,
            bottom_crop_percent: 0.0,
            y_cluster_tolerance: 8.0,
        }
    }
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("page {page}: failed to initialize Tesseract: {reason}")]
    Init { page: u32, reason: String },

    #[error("page {page}: OCR failed: {reason}")]
    Recognition { page: u32, reason: String },

    #[error("page {page}: invalid image dimensions")]
    InvalidDimensions { page: u32 },
}

struct WordBox {
    text: String,
    x_start: f32,
    x_end: f32,
    y_start: f32,
    y_end: f32,
}

/// Crop the configured top/bottom margin percentages from `img`.
fn apply_margin_crop(img: &RgbImage, config: &OcrConfig) -> RgbImage {
    let (width, height) = img.dimensions();
    let top = ((height as f32) * config.top_crop_percent / 100.0).round() as u32;
    let bottom = ((height as f32) * config.bottom_crop_percent / 100.0).round() as u32;
    let cropped_height = height.saturating_sub(top).saturating_sub(bottom);
    if top == 0 && bottom == 0 {
        return img.clone();
    }
    image::imageops::crop_imm(img, 0, top, width, cropped_height.max(1)).to_image()
}

fn run_tesseract(img: &RgbImage, config: &OcrConfig, page_num: u32) -> Result<Vec<WordBox>, OcrError> {
    let mut lt = LepTess::new(None, &config.language).map_err(|e| OcrError::Init {
        page: page_num,
        reason: e.to_string(),
    })?;

    lt.set_variable(
        Variable::TesseditPagesegMode,
        &config.page_segmentation_mode.to_string(),
    )
    .map_err(|e| OcrError::Init {
        page: page_num,
        reason: e.to_string(),
    })?;

    let mut png_buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut png_buf, image::ImageFormat::Png)
        .map_err(|e| OcrError::Recognition {
            page: page_num,
            reason: e.to_string(),
        })?;

    lt.set_image_from_mem(png_buf.get_ref())
        .map_err(|e| OcrError::Recognition {
            page: page_num,
            reason: e.to_string(),
        })?;

    let boxes = match lt.get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_WORD, true) {
        Some(boxes) => boxes,
        None => return Ok(Vec::new()),
    };

    let mut words = Vec::new();
    for bbox in &boxes {
        let geom = bbox.get_geometry();
        lt.set_rectangle(geom.x, geom.y, geom.w, geom.h);
        let text = lt.get_utf8_text().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            continue;
        }
        if lt.mean_text_conf() < config.min_confidence {
            continue;
        }
        words.push(WordBox {
            text,
            x_start: geom.x as f32,
            x_end: (geom.x + geom.w) as f32,
            y_start: geom.y as f32,
            y_end: (geom.y + geom.h) as f32,
        });
    }
    Ok(words)
}

/// Group word boxes into lines by y-coordinate proximity, sorting words
/// within a line by x.
fn group_into_lines(mut words: Vec<WordBox>, page_num: u32, config: &OcrConfig) -> Vec<Line> {
    words.sort_by(|a, b| {
        let ay = (a.y_start + a.y_end) / 2.0;
        let by = (b.y_start + b.y_end) / 2.0;
        ay.partial_cmp(&by).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut lines: Vec<Vec<WordBox>> = Vec::new();
    for word in words {
        let word_y = (word.y_start + word.y_end) / 2.0;
        let fits_last = lines.last().is_some_and(|line| {
            let last_y = line.iter().map(|w| (w.y_start + w.y_end) / 2.0).sum::<f32>()
                / line.len() as f32;
            (word_y - last_y).abs() <= config.y_cluster_tolerance
        });
        if fits_last {
            lines.last_mut().unwrap().push(word);
        } else {
            lines.push(vec![word]);
        }
    }

    lines
        .into_iter()
        .enumerate()
        .map(|(idx, mut words)| {
            words.sort_by(|a, b| a.x_start.partial_cmp(&b.x_start).unwrap_or(std::cmp::Ordering::Equal));
            let text = words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let x_start = words.iter().map(|w| w.x_start).fold(f32::MAX, f32::min);
            let x_end = words.iter().map(|w| w.x_end).fold(f32::MIN, f32::max);
            let y_start = words.iter().map(|w| w.y_start).fold(f32::MAX, f32::min);
            let y_end = words.iter().map(|w| w.y_end).fold(f32::MIN, f32::max);
            Line {
                text,
                x_start,
                x_end,
                y_start,
                y_end,
                page_num,
                original_line_index: idx,
                tags: Vec::new(),
            }
        })
        .collect()
}

/// Run OCR on one page, returning lines in top-to-bottom, left-to-right
/// order. `original_line_index` is local to this page (0-based); the caller
/// renumbers lines globally across a document's pages before classification.
pub fn ocr(page: &PageImage, config: &OcrConfig) -> Result<Vec<Line>, OcrError> {
    if page.width == 0 || page.height == 0 {
        return Err(OcrError::InvalidDimensions {
            page: page.page_num,
        });
    }
    let img = RgbImage::from_raw(page.width, page.height, page.rgb.clone())
        .ok_or(OcrError::InvalidDimensions {
            page: page.page_num,
        })?;
    let cropped = apply_margin_crop(&img, config);

    let words = run_tesseract(&cropped, config, page.page_num)?;
    debug!(page = page.page_num, words = words.len(), "ocr word boxes");
    if words.is_empty() {
        warn!(page = page.page_num, "no text detected on page");
    }
    Ok(group_into_lines(words, page.page_num, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_sane() {
        let config = OcrConfig::default();
        assert_eq!(config.language, "hin");
        assert!(config.min_confidence > 0);
    }

    #[test]
    fn empty_page_is_invalid() {
        let page = PageImage {
            page_num: 1,
            width: 0,
            height: 0,
            rgb: Vec::new(),
        };
        let err = ocr(&page, &OcrConfig::default()).unwrap_err();
        assert!(matches!(err, OcrError::InvalidDimensions { page: 1 }));
    }

    #[test]
    fn group_into_lines_clusters_by_y_and_sorts_by_x() {
        let words = vec![
            WordBox {
                text: "world".to_string(),
                x_start: 50.0,
                x_end: 90.0,
                y_start: 10.0,
                y_end: 20.0,
            },
            WordBox {
                text: "hello".to_string(),
                x_start: 0.0,
                x_end: 40.0,
                y_start: 11.0,
                y_end: 21.0,
            },
            WordBox {
                text: "second".to_string(),
                x_start: 0.0,
                x_end: 40.0,
                y_start: 100.0,
                y_end: 110.0,
            },
        ];
        let lines = group_into_lines(words, 1, &OcrConfig::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "hello world");
        assert_eq!(lines[1].text, "second");
    }
}
