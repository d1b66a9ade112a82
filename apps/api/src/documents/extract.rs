use std::collections::BTreeMap;

use anyhow::anyhow;
use lopdf::{content::Operation, Document, Encoding, Object, ObjectId};
use thiserror::Error;
use tracing::{debug, warn};

/// Pages beyond this are ignored; longer documents are truncated, not rejected.
pub const MAX_PAGES: usize = 50;

/// TJ adjustments below this (thousandths of an em) are rendered as a space.
const TJ_SPACE_THRESHOLD: f32 = -100.0;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to extract text from PDF: {0}")]
    Open(String),

    #[error("Failed to extract text from PDF: No text could be extracted from the PDF")]
    NoText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub total_pages: usize,
    pub pages_read: usize,
    pub pages_skipped: usize,
    pub truncated: bool,
}

/// A paginated document whose pages can be read one at a time.
pub trait PageSource {
    /// Page numbers in reading order.
    fn page_numbers(&self) -> Vec<u32>;

    /// Text runs of one page, in content-stream order.
    fn page_runs(&self, page: u32) -> anyhow::Result<Vec<String>>;
}

impl PageSource for Document {
    fn page_numbers(&self) -> Vec<u32> {
        self.get_pages().keys().copied().collect()
    }

    fn page_runs(&self, page: u32) -> anyhow::Result<Vec<String>> {
        let page_id = *self
            .get_pages()
            .get(&page)
            .ok_or_else(|| anyhow!("page {page} not found"))?;
        decode_page_runs(self, page_id).map_err(|e| anyhow!("{e}"))
    }
}

/// Walks the page's content stream and decodes every text-showing operator
/// (`Tj`, `TJ`, `'`, `"`) as one run, using the font selected by `Tf`.
fn decode_page_runs(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<String>> {
    let encodings = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .map(|(name, font)| font.get_font_encoding(doc).map(|enc| (name, enc)))
        .collect::<lopdf::Result<BTreeMap<Vec<u8>, Encoding>>>()?;
    let content = doc.get_and_decode_page_content(page_id)?;

    let mut runs = Vec::new();
    let mut current: Option<&Encoding> = None;
    for Operation { operator, operands } in &content.operations {
        let shown = match operator.as_str() {
            "Tf" => {
                let font = operands
                    .first()
                    .ok_or_else(|| lopdf::Error::Syntax("missing font operand".to_string()))?
                    .as_name()?;
                current = encodings.get(font);
                continue;
            }
            "Tj" | "'" => operands.first(),
            "\"" => operands.get(2),
            "TJ" => operands.first(),
            _ => continue,
        };

        let (Some(shown), Some(encoding)) = (shown, current) else {
            debug!(operator = operator.as_str(), "Text operator without a usable font");
            continue;
        };
        runs.push(decode_shown(encoding, shown)?);
    }
    Ok(runs)
}

fn decode_shown(encoding: &Encoding, shown: &Object) -> lopdf::Result<String> {
    match shown {
        Object::String(bytes, _) => Document::decode_text(encoding, bytes),
        Object::Array(parts) => {
            let mut run = String::new();
            for part in parts {
                match part {
                    Object::String(bytes, _) => run.push_str(&Document::decode_text(encoding, bytes)?),
                    Object::Integer(_) | Object::Real(_) => {
                        if part.as_float()? < TJ_SPACE_THRESHOLD {
                            run.push(' ');
                        }
                    }
                    _ => {}
                }
            }
            Ok(run)
        }
        _ => Err(lopdf::Error::Type),
    }
}

/// Opens PDF bytes and extracts their text layer.
pub fn extract_text(bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|e| ExtractionError::Open(e.to_string()))?;
    extract_pages(&document)
}

/// Reads up to [`MAX_PAGES`] pages, skipping pages that fail to decode.
/// Runs within a page are joined with single spaces, pages with newlines.
pub fn extract_pages<S: PageSource + ?Sized>(source: &S) -> Result<ExtractedText, ExtractionError> {
    let pages = source.page_numbers();
    let total_pages = pages.len();

    let (texts, pages_skipped) = pages.into_iter().take(MAX_PAGES).fold(
        (Vec::new(), 0usize),
        |(mut texts, skipped), page| match source.page_runs(page) {
            Ok(runs) => {
                texts.push(join_runs(&runs));
                (texts, skipped)
            }
            Err(e) => {
                warn!(page, "Skipping unreadable page: {e}");
                (texts, skipped + 1)
            }
        },
    );

    let pages_read = texts.len();
    let text = texts.join("\n").trim().to_string();
    if text.is_empty() {
        return Err(ExtractionError::NoText);
    }

    debug!(total_pages, pages_read, pages_skipped, "Extracted document text");

    Ok(ExtractedText {
        text,
        total_pages,
        pages_read,
        pages_skipped,
        truncated: total_pages > MAX_PAGES,
    })
}

fn join_runs(runs: &[String]) -> String {
    runs.iter()
        .map(|run| run.trim())
        .filter(|run| !run.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
