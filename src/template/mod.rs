//! Template module - `.docx` templates with `!name!` placeholders.
//!
//! - `placeholder` - discovery pattern and literal substitution
//! - `docx` - paragraph-level XML rewriting
//! - `routes` - HTTP inspection endpoint

pub mod docx;
pub mod placeholder;
pub mod routes;

use log::info;
use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::dataset::Record;
use crate::generator::Renderer;
use docx::XmlError;
use placeholder::{collect_placeholders, replacements};

/// File extension of generated documents.
pub const DOCUMENT_EXTENSION: &str = "docx";

const DOCUMENT_PART: &str = "word/document.xml";

/// Errors raised while opening a template. Fatal for the operation.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a .docx archive: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("{path} has no {part} part")]
    MissingPart { path: PathBuf, part: &'static str },
    #[error("{path}: cannot parse {part}: {source}")]
    Xml {
        path: PathBuf,
        part: String,
        #[source]
        source: XmlError,
    },
}

/// Why a single document could not be produced.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template archive error: {0}")]
    Archive(#[from] ZipError),
    #[error("failed to rewrite {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: XmlError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A loaded template. Read-only after `open`, so one instance can serve any
/// number of renders.
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    bytes: Vec<u8>,
    parts: Vec<String>,
    placeholders: Vec<String>,
}

impl Template {
    /// Load a template and discover its placeholders.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let (parts, placeholders) = {
            let mut archive =
                ZipArchive::new(Cursor::new(bytes.as_slice())).map_err(|source| {
                    TemplateError::Archive {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;

            let mut parts: Vec<String> = archive
                .file_names()
                .filter(|name| is_text_part(name))
                .map(String::from)
                .collect();
            parts.sort();

            if !parts.iter().any(|part| part == DOCUMENT_PART) {
                return Err(TemplateError::MissingPart {
                    path: path.to_path_buf(),
                    part: DOCUMENT_PART,
                });
            }

            let mut found = BTreeSet::new();
            for part in &parts {
                let xml = read_part(&mut archive, part).map_err(|source| {
                    TemplateError::Archive {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                let texts = docx::paragraph_texts(&xml).map_err(|source| TemplateError::Xml {
                    path: path.to_path_buf(),
                    part: part.clone(),
                    source,
                })?;
                for text in &texts {
                    collect_placeholders(text, &mut found);
                }
            }

            (parts, found.into_iter().collect::<Vec<_>>())
        };

        info!(
            "Opened template {} ({} placeholders)",
            path.display(),
            placeholders.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            parts,
            placeholders,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Distinct placeholder names, sorted.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Produce the document for `record` in memory.
    pub fn render_to_vec(&self, record: &Record) -> Result<Vec<u8>, RenderError> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.bytes.len())));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if !self.parts.iter().any(|part| part == entry.name()) {
                writer.raw_copy_file(entry)?;
                continue;
            }

            let name = entry.name().to_string();
            let mut xml = String::new();
            entry.read_to_string(&mut xml)?;

            let rewritten = docx::rewrite_paragraphs(&xml, |text| replacements(text, record))
                .map_err(|source| RenderError::Xml {
                    part: name.clone(),
                    source,
                })?;

            writer.start_file(name, options)?;
            writer.write_all(rewritten.as_deref().unwrap_or(&xml).as_bytes())?;
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Render `record` and write the document to `output`, replacing any
    /// existing file.
    pub fn render(&self, record: &Record, output: &Path) -> Result<(), RenderError> {
        let document = self.render_to_vec(record)?;
        fs::write(output, document).map_err(|source| RenderError::Write {
            path: output.to_path_buf(),
            source,
        })
    }
}

impl Renderer for Template {
    fn extension(&self) -> &str {
        DOCUMENT_EXTENSION
    }

    fn render(&self, record: &Record, output: &Path) -> Result<(), RenderError> {
        Template::render(self, record, output)
    }
}

fn is_text_part(name: &str) -> bool {
    if name == DOCUMENT_PART {
        return true;
    }
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    (file.starts_with("header") || file.starts_with("footer"))
        && file.ends_with(".xml")
        && !file.contains('/')
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, ZipError> {
    let mut entry = archive.by_name(name)?;
    let mut xml = String::with_capacity(entry.size() as usize);
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}
