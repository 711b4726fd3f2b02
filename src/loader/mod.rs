
pub mod parsers;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{RagError, Result};
use parsers::{CsvParser, DocumentParser, PdfParser, SpreadsheetParser, TextParser, WordParser};

/// Provenance attached to a document and to every chunk derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// Character offset of a chunk inside its parent document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
}

impl DocumentMetadata {
    #[inline]
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[inline]
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// File categories the loader knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Pdf,
    Text,
    Word,
    Csv,
    Spreadsheet,
    Unsupported,
}

impl FileKind {
    /// Classify a path by its (case-insensitive) extension.
    #[inline]
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("txt" | "md") => Self::Text,
            Some("docx") => Self::Word,
            Some("csv") => Self::Csv,
            Some("xlsx" | "xls" | "xlsm" | "xlsb" | "ods") => Self::Spreadsheet,
            _ => Self::Unsupported,
        }
    }
}

/// Outcome of loading a whole directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub loaded: Vec<PathBuf>,
    pub unsupported: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadReport {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub struct DocumentLoader {
    parsers: HashMap<FileKind, Box<dyn DocumentParser>>,
}

impl std::fmt::Debug for DocumentLoader {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.parsers.keys().collect();
        kinds.sort_by_key(|kind| format!("{:?}", kind));
        f.debug_struct("DocumentLoader")
            .field("parsers", &kinds)
            .finish()
    }
}

impl Default for DocumentLoader {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader {
    /// A loader with the built-in parser for every supported kind.
    #[inline]
    pub fn new() -> Self {
        let mut loader = Self {
            parsers: HashMap::new(),
        };
        loader.register(FileKind::Pdf, Box::new(PdfParser));
        loader.register(FileKind::Text, Box::new(TextParser));
        loader.register(FileKind::Word, Box::new(WordParser));
        loader.register(FileKind::Csv, Box::new(CsvParser));
        loader.register(FileKind::Spreadsheet, Box::new(SpreadsheetParser));
        loader
    }

    /// Replace the parser used for a file kind.
    #[inline]
    pub fn register(&mut self, kind: FileKind, parser: Box<dyn DocumentParser>) {
        self.parsers.insert(kind, parser);
    }

    #[inline]
    pub fn is_supported(&self, path: &Path) -> bool {
        self.parsers.contains_key(&FileKind::from_path(path))
    }

    /// Load a single file with the parser for its kind.
    #[inline]
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let kind = FileKind::from_path(path);
        let parser = self
            .parsers
            .get(&kind)
            .ok_or_else(|| RagError::UnsupportedFile(path.to_path_buf()))?;

        debug!("Parsing {} as {:?}", path.display(), kind);

        parser
            .parse(path)
            .map_err(|e| RagError::Loader(format!("{}: {:#}", path.display(), e)))
    }

    /// Load every supported file directly inside `dir`, in file name order.
    ///
    /// A missing directory yields an empty report. Unsupported files and files
    /// that fail to parse are recorded and skipped.
    #[inline]
    pub fn load_directory(&self, dir: &Path) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        if !dir.exists() {
            warn!("Document directory {} does not exist", dir.display());
            return Ok(report);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            match self.load_file(&path) {
                Ok(documents) => {
                    debug!("Loaded {} documents from {}", documents.len(), path.display());
                    report.documents.extend(documents);
                    report.loaded.push(path);
                }
                Err(RagError::UnsupportedFile(_)) => {
                    info!("Skipping unsupported file {}", path.display());
                    report.unsupported.push(path);
                }
                Err(e) => {
                    error!("Failed to load {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        info!(
            "Loaded {} documents from {} files in {} ({} unsupported, {} failed)",
            report.documents.len(),
            report.loaded.len(),
            dir.display(),
            report.unsupported.len(),
            report.failed.len()
        );

        Ok(report)
    }
}
