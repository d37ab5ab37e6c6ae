//! Dataset module - reads shapefile attribute tables as string records.
//!
//! Only the `.dbf` attribute table is decoded. The `.shp` file is checked for
//! its magic number and otherwise left alone; geometry never becomes a field.
//!
//! - `dbf` - dBASE table parsing
//! - `value` - one-shot stringification of cell values
//! - `routes` - HTTP inspection endpoint

pub mod dbf;
pub mod routes;
pub mod value;

use encoding_rs::{Encoding, BIG5, EUC_KR, GBK, SHIFT_JIS, UTF_8};
use log::{info, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use utoipa::ToSchema;

use crate::generator::RecordSource;
pub use dbf::TableError;
pub use value::FieldKind;

const SHAPEFILE_FILE_CODE: i32 = 9994;

/// Errors raised while opening a dataset. All of them are fatal for the
/// dataset in question.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported dataset format: {0} (expected a .shp or .dbf file)")]
    UnsupportedFormat(PathBuf),
    #[error("{path} is not a shapefile (file code {code}, expected {SHAPEFILE_FILE_CODE})")]
    NotAShapefile { path: PathBuf, code: i32 },
    #[error("no .dbf attribute table found next to {0}")]
    MissingTable(PathBuf),
    #[error("unknown text encoding '{0}'")]
    UnknownEncoding(String),
    #[error("{path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },
    #[error("cannot decode {path} as {primary} or as {fallback}: {source}")]
    Undecodable {
        path: PathBuf,
        primary: &'static str,
        fallback: &'static str,
        #[source]
        source: TableError,
    },
}

/// Primary and fallback encodings tried when opening a table.
#[derive(Debug, Clone, Copy)]
pub struct EncodingPolicy {
    pub default: &'static Encoding,
    pub fallback: &'static Encoding,
}

impl Default for EncodingPolicy {
    fn default() -> Self {
        Self {
            default: GBK,
            fallback: UTF_8,
        }
    }
}

/// Resolve an encoding label such as `gbk`, `utf-8` or a Windows code page
/// number like `936`.
pub fn lookup_encoding(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    let label = label
        .strip_prefix("ANSI ")
        .or_else(|| label.strip_prefix("ansi "))
        .unwrap_or(label)
        .trim();

    if let Ok(code_page) = label.parse::<u32>() {
        return match code_page {
            936 => Some(GBK),
            65001 => Some(UTF_8),
            950 => Some(BIG5),
            932 => Some(SHIFT_JIS),
            949 => Some(EUC_KR),
            874 | 1250..=1258 => Encoding::for_label(format!("windows-{code_page}").as_bytes()),
            _ => None,
        };
    }

    Encoding::for_label(label.as_bytes())
}

/// Descriptor of one attribute column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Field {
    pub name: String,
    /// Declared column type, e.g. `Character(50)`.
    pub field_type: String,
    /// First record's value, `None` when the table is empty or the value is null.
    pub sample: Option<String>,
}

/// One row of attributes, every value already normalized to a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    entries: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value, keeping first-insertion order.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

/// An opened dataset. The whole attribute table is decoded up front so an
/// encoding problem surfaces at open time, never halfway through a batch.
#[derive(Debug)]
pub struct DatasetReader {
    path: PathBuf,
    encoding: &'static Encoding,
    fields: Vec<Field>,
    rows: Vec<Vec<String>>,
}

impl DatasetReader {
    /// Open with the default `gbk` → `utf-8` policy.
    pub fn open(path: impl AsRef<Path>, encoding_hint: Option<&str>) -> Result<Self, DatasetError> {
        Self::open_with(path, encoding_hint, EncodingPolicy::default())
    }

    /// Open a `.shp` or `.dbf` path.
    ///
    /// The primary encoding is the explicit hint, else the `.cpg` sidecar, else
    /// `policy.default`. A decoding failure is retried once with
    /// `policy.fallback`.
    pub fn open_with(
        path: impl AsRef<Path>,
        encoding_hint: Option<&str>,
        policy: EncodingPolicy,
    ) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let table_path = locate_table(path)?;
        let bytes = fs::read(&table_path).map_err(|source| DatasetError::Io {
            path: table_path.clone(),
            source,
        })?;

        let primary = match encoding_hint {
            Some(label) => lookup_encoding(label)
                .ok_or_else(|| DatasetError::UnknownEncoding(label.to_string()))?,
            None => read_code_page(&table_path)?.unwrap_or(policy.default),
        };

        let (encoding, table) = match dbf::parse(&bytes, primary) {
            Ok(table) => (primary, table),
            Err(TableError::Undecodable { .. }) if primary != policy.fallback => {
                warn!(
                    "{} is not valid {}, retrying as {}",
                    table_path.display(),
                    primary.name(),
                    policy.fallback.name()
                );
                let table = dbf::parse(&bytes, policy.fallback).map_err(|source| {
                    DatasetError::Undecodable {
                        path: table_path.clone(),
                        primary: primary.name(),
                        fallback: policy.fallback.name(),
                        source,
                    }
                })?;
                (policy.fallback, table)
            }
            Err(source @ TableError::Undecodable { .. }) => {
                return Err(DatasetError::Undecodable {
                    path: table_path,
                    primary: primary.name(),
                    fallback: policy.fallback.name(),
                    source,
                })
            }
            Err(source) => {
                return Err(DatasetError::Table {
                    path: table_path,
                    source,
                })
            }
        };

        let fields = table
            .fields
            .iter()
            .enumerate()
            .map(|(column, descriptor)| Field {
                name: descriptor.name.clone(),
                field_type: value::describe_type(
                    descriptor.kind,
                    descriptor.length,
                    descriptor.decimals,
                ),
                sample: table
                    .rows
                    .first()
                    .map(|row| row[column].clone())
                    .filter(|sample| !sample.is_empty()),
            })
            .collect::<Vec<_>>();

        info!(
            "Opened dataset {} ({} records, {} fields, {})",
            path.display(),
            table.rows.len(),
            fields.len(),
            encoding.name()
        );

        Ok(Self {
            path: path.to_path_buf(),
            encoding,
            fields,
            rows: table.rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the encoding the table was actually decoded with.
    pub fn encoding(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn record_count(&self) -> usize {
        self.rows.len()
    }

    /// Records in file order. Each call starts a fresh pass.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows.iter().map(move |row| {
            self.fields
                .iter()
                .zip(row)
                .map(|(field, value)| (field.name.clone(), value.clone()))
                .collect()
        })
    }
}

impl RecordSource for DatasetReader {
    fn fields(&self) -> &[Field] {
        DatasetReader::fields(self)
    }

    fn record_count(&self) -> usize {
        DatasetReader::record_count(self)
    }

    fn records(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        Box::new(DatasetReader::records(self))
    }
}

fn locate_table(path: &Path) -> Result<PathBuf, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("dbf") => Ok(path.to_path_buf()),
        Some("shp") => {
            check_shapefile_header(path)?;
            sibling(path, "dbf").ok_or_else(|| DatasetError::MissingTable(path.to_path_buf()))
        }
        _ => Err(DatasetError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn check_shapefile_header(path: &Path) -> Result<(), DatasetError> {
    let io_error = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut code = [0u8; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut code))
        .map_err(io_error)?;

    let code = i32::from_be_bytes(code);
    if code != SHAPEFILE_FILE_CODE {
        return Err(DatasetError::NotAShapefile {
            path: path.to_path_buf(),
            code,
        });
    }
    Ok(())
}

/// Find `path` with another extension, trying lower then upper case.
fn sibling(path: &Path, extension: &str) -> Option<PathBuf> {
    [extension.to_ascii_lowercase(), extension.to_ascii_uppercase()]
        .into_iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn read_code_page(table_path: &Path) -> Result<Option<&'static Encoding>, DatasetError> {
    let Some(cpg) = sibling(table_path, "cpg") else {
        return Ok(None);
    };

    let label = fs::read_to_string(&cpg).map_err(|source| DatasetError::Io {
        path: cpg.clone(),
        source,
    })?;

    let encoding = lookup_encoding(&label);
    if encoding.is_none() {
        warn!(
            "Ignoring unrecognized code page '{}' in {}",
            label.trim(),
            cpg.display()
        );
    }
    Ok(encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_encoding_labels() {
        assert_eq!(lookup_encoding("gbk"), Some(GBK));
        assert_eq!(lookup_encoding("UTF-8"), Some(UTF_8));
        assert_eq!(lookup_encoding("936"), Some(GBK));
        assert_eq!(lookup_encoding("ANSI 1252").map(|e| e.name()), Some("windows-1252"));
        assert_eq!(lookup_encoding("klingon"), None);
    }

    #[test]
    fn test_record_insert_keeps_order_and_overwrites() {
        let mut record = Record::new();
        record.insert("name", "Alice");
        record.insert("city", "NY");
        record.insert("name", "Alicia");

        let pairs: Vec<_> = record.iter().collect();
        assert_eq!(pairs, vec![("name", "Alicia"), ("city", "NY")]);
        assert_eq!(record.get("city"), Some("NY"));
        assert_eq!(record.get("zip"), None);
    }

    #[test]
    fn test_missing_dataset_is_not_found() {
        let err = DatasetReader::open("/definitely/not/here.shp", None).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound(_)));
    }
}
