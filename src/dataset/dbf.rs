//! dBASE III attribute table reader.
//!
//! Layout: a 32-byte header, one 32-byte descriptor per field terminated by
//! `0x0D`, then fixed-width records each starting with a deletion flag.

use encoding_rs::Encoding;
use std::collections::HashSet;
use thiserror::Error;

use super::value::{normalize_value, FieldKind};

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const NAME_LEN: usize = 11;
const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const END_OF_FILE: u8 = 0x1A;
const DELETED_FLAG: u8 = b'*';

#[derive(Debug, Error)]
pub enum TableError {
    #[error("malformed attribute table: {0}")]
    Malformed(String),
    #[error("{location} is not valid {encoding}")]
    Undecodable {
        encoding: &'static str,
        location: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub length: u8,
    pub decimals: u8,
}

/// Fully decoded table: descriptors plus normalized rows in file order.
#[derive(Debug)]
pub(crate) struct DbfTable {
    pub fields: Vec<FieldDescriptor>,
    pub rows: Vec<Vec<String>>,
}

pub(crate) fn parse(bytes: &[u8], encoding: &'static Encoding) -> Result<DbfTable, TableError> {
    if bytes.len() < HEADER_LEN {
        return Err(TableError::Malformed(format!(
            "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }

    let record_count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_len = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;

    if header_len <= HEADER_LEN || header_len > bytes.len() {
        return Err(TableError::Malformed(format!(
            "header length {header_len} is out of range"
        )));
    }

    let fields = parse_descriptors(&bytes[HEADER_LEN..header_len], encoding)?;

    let width = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();
    if record_len < width {
        return Err(TableError::Malformed(format!(
            "record length {record_len} is smaller than the declared field widths ({width})"
        )));
    }

    // The header count is untrusted; never reserve more rows than the bytes can hold.
    let available = (bytes.len() - header_len) / record_len;
    let mut rows = Vec::with_capacity(record_count.min(available));
    for index in 0..record_count {
        let start = header_len + index * record_len;
        let Some(raw) = bytes.get(start..start + record_len) else {
            if bytes.get(start) == Some(&END_OF_FILE) {
                break;
            }
            return Err(TableError::Malformed(format!(
                "record {} is truncated",
                index + 1
            )));
        };

        if raw[0] == DELETED_FLAG {
            continue;
        }

        let mut offset = 1;
        let mut row = Vec::with_capacity(fields.len());
        for field in &fields {
            let cell = &raw[offset..offset + field.length as usize];
            offset += field.length as usize;

            let text = decode(cell, encoding).ok_or_else(|| TableError::Undecodable {
                encoding: encoding.name(),
                location: format!("record {} field '{}'", index + 1, field.name),
            })?;
            row.push(normalize_value(field.kind, field.decimals, &text));
        }
        rows.push(row);
    }

    Ok(DbfTable { fields, rows })
}

fn parse_descriptors(
    bytes: &[u8],
    encoding: &'static Encoding,
) -> Result<Vec<FieldDescriptor>, TableError> {
    let mut fields = Vec::new();
    let mut seen = HashSet::new();

    for chunk in bytes.chunks(DESCRIPTOR_LEN) {
        if chunk[0] == DESCRIPTOR_TERMINATOR {
            break;
        }
        if chunk.len() < DESCRIPTOR_LEN {
            return Err(TableError::Malformed(
                "field descriptor array is truncated".to_string(),
            ));
        }

        let raw_name = &chunk[..NAME_LEN];
        let name_end = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        let name = decode(&raw_name[..name_end], encoding)
            .ok_or_else(|| TableError::Undecodable {
                encoding: encoding.name(),
                location: format!("field name #{}", fields.len() + 1),
            })?
            .trim()
            .to_string();

        if name.is_empty() {
            return Err(TableError::Malformed(format!(
                "field #{} has an empty name",
                fields.len() + 1
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(TableError::Malformed(format!("duplicate field name '{name}'")));
        }

        fields.push(FieldDescriptor {
            name,
            kind: FieldKind::from_code(chunk[11]),
            length: chunk[16],
            decimals: chunk[17],
        });
    }

    if fields.is_empty() {
        return Err(TableError::Malformed(
            "attribute table declares no fields".to_string(),
        ));
    }

    Ok(fields)
}

fn decode(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}
