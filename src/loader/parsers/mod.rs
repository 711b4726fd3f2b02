
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use fancy_regex::Regex;
use itertools::Itertools;
use tracing::{debug, warn};

use super::{Document, DocumentMetadata};

static HORIZONTAL_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("whitespace pattern is valid"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank line pattern is valid"));

/// A format-specific parser turning one file into documents.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Vec<Document>>;
}

/// Plain text and markdown files, read as a single document.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

/// PDF files, one document per page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

/// Word (.docx) files.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordParser;

/// CSV files, one document per data row.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvParser;

/// Excel / OpenDocument spreadsheets, one document per worksheet.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetParser;

fn source_of(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl DocumentParser for TextParser {
    #[inline]
    fn parse(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "{} is not valid UTF-8, replacing invalid sequences",
                    path.display()
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        Ok(vec![Document::new(
            content,
            DocumentMetadata::for_source(source_of(path)),
        )])
    }
}

impl DocumentParser for PdfParser {
    #[inline]
    fn parse(&self, path: &Path) -> Result<Vec<Document>> {
        let pages = extract_pdf_pages(path)?;
        let source = source_of(path);

        debug!("Extracted {} pages from {}", pages.len(), path.display());

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(page, text)| {
                Document::new(
                    normalize_whitespace(&text),
                    DocumentMetadata {
                        page: Some(page as u32),
                        ..DocumentMetadata::for_source(source.clone())
                    },
                )
            })
            .collect())
    }
}

/// Extract text per page. pdf-extract handles font encodings better, but it
/// can fail or panic on malformed files, in which case lopdf is used instead.
fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let attempt = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    match attempt {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => {
            warn!(
                "pdf-extract failed for {}, trying lopdf fallback: {}",
                path.display(),
                e
            );
            extract_pdf_pages_via_lopdf(path)
        }
        Err(_) => {
            warn!(
                "pdf-extract panicked for {}, trying lopdf fallback",
                path.display()
            );
            extract_pdf_pages_via_lopdf(path)
        }
    }
}

fn extract_pdf_pages_via_lopdf(path: &Path) -> Result<Vec<String>> {
    let document = lopdf::Document::load(path)
        .map_err(|e| anyhow!("Failed to load PDF {}: {}", path.display(), e))?;

    document
        .get_pages()
        .keys()
        .map(|page_number| {
            document
                .extract_text(&[*page_number])
                .map_err(|e| anyhow!("Failed to extract page {}: {}", page_number, e))
        })
        .collect()
}

impl DocumentParser for WordParser {
    #[inline]
    fn parse(&self, path: &Path) -> Result<Vec<Document>> {
        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(file).context("Invalid DOCX archive")?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .context("No word/document.xml found in DOCX")?
            .read_to_string(&mut xml)
            .context("Failed to read word/document.xml")?;

        Ok(vec![Document::new(
            extract_plaintext_from_docx_xml(&xml),
            DocumentMetadata::for_source(source_of(path)),
        )])
    }
}

/// Pull the text runs out of a WordprocessingML body. Paragraphs and breaks
/// become newlines, tabs are kept.
pub fn extract_plaintext_from_docx_xml(xml: &str) -> String {
    let mut result = String::new();
    let mut in_text = false;
    let mut chars = xml.chars();

    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::new();
            for tc in chars.by_ref() {
                if tc == '>' {
                    break;
                }
                tag.push(tc);
            }

            let name = tag.split_whitespace().next().unwrap_or_default();
            match name {
                "w:t" => in_text = !tag.ends_with('/'),
                "/w:t" => in_text = false,
                "w:tab" | "w:tab/" => result.push('\t'),
                "w:br" | "w:br/" | "w:cr" | "w:cr/" => result.push('\n'),
                "w:p" if !tag.ends_with('/') => {
                    if !result.is_empty() && !result.ends_with('\n') {
                        result.push('\n');
                    }
                }
                _ => {}
            }
        } else if in_text {
            result.push(c);
        }
    }

    decode_xml_entities(&result)
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

impl DocumentParser for CsvParser {
    #[inline]
    fn parse(&self, path: &Path) -> Result<Vec<Document>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let source = source_of(path);
        let mut documents = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", row))?;
            let content = render_row(&headers, record.iter().map(str::to_string), "\n");

            documents.push(Document::new(
                content,
                DocumentMetadata {
                    row: Some(row as u32),
                    ..DocumentMetadata::for_source(source.clone())
                },
            ));
        }

        Ok(documents)
    }
}

impl DocumentParser for SpreadsheetParser {
    #[inline]
    fn parse(&self, path: &Path) -> Result<Vec<Document>> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| anyhow!("Failed to open spreadsheet {}: {}", path.display(), e))?;

        let source = source_of(path);
        let mut documents = Vec::new();

        for sheet in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&sheet)
                .map_err(|e| anyhow!("Failed to read worksheet '{}': {}", sheet, e))?;

            let mut rows = range.rows();
            let headers: Vec<String> = rows
                .next()
                .map(|row| row.iter().map(cell_to_string).collect())
                .unwrap_or_default();

            let lines: Vec<String> = rows
                .filter(|row| !row.iter().all(|cell| matches!(cell, Data::Empty)))
                .map(|row| render_row(&headers, row.iter().map(cell_to_string), "; "))
                .collect();

            if lines.is_empty() && headers.is_empty() {
                debug!("Worksheet '{}' is empty, skipping", sheet);
                continue;
            }

            let content = if lines.is_empty() {
                headers.join("; ")
            } else {
                lines.join("\n")
            };

            documents.push(Document::new(
                content,
                DocumentMetadata {
                    sheet: Some(sheet.clone()),
                    ..DocumentMetadata::for_source(source.clone())
                },
            ));
        }

        Ok(documents)
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Render a row as `header: value` pairs. Columns beyond the header row are
/// labelled by position.
fn render_row<I>(headers: &[String], values: I, separator: &str) -> String
where
    I: Iterator<Item = String>,
{
    values
        .enumerate()
        .map(|(i, value)| {
            let header = headers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i + 1));
            format!("{}: {}", header, value.trim())
        })
        .join(separator)
}

/// Collapse runs of horizontal whitespace and squeeze blank line runs down
/// to a single blank line.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = HORIZONTAL_WHITESPACE.replace_all(text, " ");
    let squeezed = BLANK_LINES.replace_all(&collapsed, "\n\n");
    squeezed.trim().to_string()
}
