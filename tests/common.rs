//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use regex::Regex;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub struct DbfField {
    pub name: &'static str,
    pub kind: u8,
    pub length: u8,
    pub decimals: u8,
}

pub fn character(name: &'static str, length: u8) -> DbfField {
    DbfField { name, kind: b'C', length, decimals: 0 }
}

pub fn numeric(name: &'static str, length: u8, decimals: u8) -> DbfField {
    DbfField { name, kind: b'N', length, decimals }
}

pub fn date(name: &'static str) -> DbfField {
    DbfField { name, kind: b'D', length: 8, decimals: 0 }
}

pub fn logical(name: &'static str) -> DbfField {
    DbfField { name, kind: b'L', length: 1, decimals: 0 }
}

/// Rows of UTF-8 text cells.
pub fn text_rows(rows: &[&[&str]]) -> Vec<Vec<Vec<u8>>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.as_bytes().to_vec()).collect())
        .collect()
}

/// Encode a dBASE III table. Cells are space padded to the field width.
pub fn dbf_bytes(fields: &[DbfField], rows: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let record_len = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();
    let header_len = 32 + fields.len() * 32 + 1;

    let mut out = vec![0u8; 32];
    out[0] = 0x03;
    out[4..8].copy_from_slice(&(rows.len() as u32).to_le_bytes());
    out[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
    out[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());

    for field in fields {
        let mut descriptor = [0u8; 32];
        descriptor[..field.name.len()].copy_from_slice(field.name.as_bytes());
        descriptor[11] = field.kind;
        descriptor[16] = field.length;
        descriptor[17] = field.decimals;
        out.extend_from_slice(&descriptor);
    }
    out.push(0x0D);

    for row in rows {
        out.push(b' ');
        for (field, cell) in fields.iter().zip(row) {
            let mut padded = cell.clone();
            padded.resize(field.length as usize, b' ');
            out.extend_from_slice(&padded);
        }
    }
    out.push(0x1A);
    out
}

pub fn write_dbf(path: &Path, fields: &[DbfField], rows: &[Vec<Vec<u8>>]) {
    fs::write(path, dbf_bytes(fields, rows)).unwrap();
}

/// Write `<stem>.shp` (header only) and `<stem>.dbf` into `dir`; returns the `.shp` path.
pub fn write_shapefile(dir: &Path, stem: &str, fields: &[DbfField], rows: &[Vec<Vec<u8>>]) -> PathBuf {
    let mut header = vec![0u8; 100];
    header[0..4].copy_from_slice(&9994i32.to_be_bytes());
    header[24..28].copy_from_slice(&50i32.to_be_bytes());
    header[28..32].copy_from_slice(&1000i32.to_le_bytes());
    header[32..36].copy_from_slice(&1i32.to_le_bytes());

    let shp = dir.join(format!("{}.shp", stem));
    fs::write(&shp, header).unwrap();
    write_dbf(&dir.join(format!("{}.dbf", stem)), fields, rows);
    shp
}

/// Wrap body XML in a WordprocessingML document element.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// A paragraph with one run per text fragment.
pub fn paragraph(runs: &[&str]) -> String {
    let runs: String = runs
        .iter()
        .map(|text| format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, text))
        .collect();
    format!("<w:p>{}</w:p>", runs)
}

/// A one-row table with one paragraph per cell.
pub fn table(cells: &[&str]) -> String {
    let cells: String = cells
        .iter()
        .map(|text| format!("<w:tc>{}</w:tc>", paragraph(&[text])))
        .collect();
    format!("<w:tbl><w:tr>{}</w:tr></w:tbl>", cells)
}

/// Write a minimal `.docx` with `body` as the document body plus any extra
/// parts given as `(name, xml)`.
pub fn write_docx(path: &Path, body: &str, extra_parts: &[(&str, String)]) {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer
        .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#)
        .unwrap();

    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document_xml(body).as_bytes()).unwrap();

    for (name, xml) in extra_parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
    }

    let bytes = writer.finish().unwrap().into_inner();
    fs::write(path, bytes).unwrap();
}

pub fn read_part(docx: &Path, part: &str) -> String {
    let bytes = fs::read(docx).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entry = archive.by_name(part).unwrap();
    let mut xml = String::new();
    entry.read_to_string(&mut xml).unwrap();
    xml
}

/// Visible text of a part, one line per paragraph.
pub fn part_text(docx: &Path, part: &str) -> Vec<String> {
    let xml = read_part(docx, part);
    let tags = Regex::new(r"<[^>]+>").unwrap();
    xml.split("</w:p>")
        .map(|chunk| tags.replace_all(chunk, "").to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn document_text(docx: &Path) -> Vec<String> {
    part_text(docx, "word/document.xml")
}
