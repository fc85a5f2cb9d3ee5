//! PDF-level helpers that sit upstream of OCR: page rasterization and
//! bookmark/outline extraction.
//!
//! Rasterization uses `pdfium-render` (PDF -> bitmap); `lopdf` alone only
//! parses PDF structure and cannot render pages, so it is kept for the
//! outline walk here while `pdfium-render` handles the page -> `PageImage`
//! step.

use catalogue_common::{sha256_hex, PageImage};
use lopdf::Document as LoDocument;
use pdfium_render::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("failed to read PDF file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to load pdfium: {0}")]
    Pdfium(String),

    #[error("failed to parse PDF structure: {0}")]
    Lopdf(#[from] lopdf::Error),

    #[error("failed to rasterize page {page}: {reason}")]
    Rasterize { page: u32, reason: String },
}

/// SHA-256 of the raw PDF bytes — the content fingerprint the Discovery
/// Engine compares across scans.
pub fn content_fingerprint(path: &std::path::Path) -> Result<String, PdfError> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_hex(&bytes))
}

/// Rasterize every page of the PDF at `path` into an RGB bitmap at the given
/// target width (height follows the page's aspect ratio).
pub fn rasterize_pages(path: &std::path::Path, target_width: u32) -> Result<Vec<PageImage>, PdfError> {
    let pdfium = Pdfium::new(
        Pdfium::bind_to_system_library().map_err(|e| PdfError::Pdfium(e.to_string()))?,
    );
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| PdfError::Pdfium(e.to_string()))?;

    let render_config = PdfRenderConfig::new().set_target_width(target_width as i32);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PdfError::Rasterize {
                page: index as u32 + 1,
                reason: e.to_string(),
            })?;
        let image = bitmap.as_image().to_rgb8();
        let (width, height) = (image.width(), image.height());
        pages.push(PageImage {
            page_num: index as u32 + 1,
            width,
            height,
            rgb: image.into_raw(),
        });
    }
    Ok(pages)
}

/// Walk the PDF's outline/bookmark tree and return the flattened,
/// depth-first list of bookmark titles.
///
/// Bookmarks live in the document catalog's `/Outlines` dictionary as a
/// linked list of `/First` -> `/Next` nodes, each with a `/Title` string;
/// there is no single convenience accessor for this in `lopdf`; we walk the
/// dictionary structure directly.
pub fn extract_bookmarks(path: &std::path::Path) -> Result<Vec<String>, PdfError> {
    let document = LoDocument::load(path)?;
    let mut titles = Vec::new();

    let Ok(catalog) = document.catalog() else {
        return Ok(titles);
    };
    let Ok(outlines_ref) = catalog.get(b"Outlines") else {
        return Ok(titles);
    };
    let Ok(outlines_dict) = document.get_object(outlines_ref.as_reference()?) else {
        return Ok(titles);
    };
    let Ok(outlines_dict) = outlines_dict.as_dict() else {
        return Ok(titles);
    };

    let mut next = outlines_dict.get(b"First").ok().cloned();
    let mut guard = 0usize;
    while let Some(obj) = next {
        guard += 1;
        if guard > 10_000 {
            break; // defend against a cyclic outline tree in a malformed PDF
        }
        let Ok(node_ref) = obj.as_reference() else {
            break;
        };
        let Ok(node) = document.get_object(node_ref) else {
            break;
        };
        let Ok(node) = node.as_dict() else {
            break;
        };
        if let Ok(title) = node.get(b"Title").and_then(|t| t.as_str()) {
            titles.push(String::from_utf8_lossy(title).into_owned());
        }
        next = node.get(b"Next").ok().cloned();
    }

    Ok(titles)
}
