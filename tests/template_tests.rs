mod common;

use common::{document_text, paragraph, part_text, read_part, table, write_docx};
use std::fs;
use survey_generator::dataset::Record;
use survey_generator::template::{Template, TemplateError};
use tempfile::tempdir;

fn record(pairs: &[(&str, &str)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn test_placeholders_are_distinct_and_sorted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("form.docx");
    let body = [
        paragraph(&["Owner: !name! (!city!)"]),
        paragraph(&["Again !name!"]),
        table(&["!area!", "!编号!"]),
    ]
    .concat();
    write_docx(&path, &body, &[]);

    let template = Template::open(&path).unwrap();
    assert_eq!(template.placeholders(), ["area", "city", "name", "编号"]);

    // Discovery does not depend on how often it runs.
    let again = Template::open(&path).unwrap();
    assert_eq!(template.placeholders(), again.placeholders());
}

#[test]
fn test_placeholder_split_across_runs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("split.docx");
    write_docx(&path, &paragraph(&["Dear !na", "me!, welcome"]), &[]);

    let template = Template::open(&path).unwrap();
    assert_eq!(template.placeholders(), ["name"]);

    let output = dir.path().join("out.docx");
    template.render(&record(&[("name", "Alice")]), &output).unwrap();
    assert_eq!(document_text(&output), vec!["Dear Alice, welcome"]);
}

#[test]
fn test_line_breaks_and_tabs_stay_before_the_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("form.docx");
    let body = concat!(
        "<w:p><w:r><w:t>Owner:</w:t></w:r><w:r><w:br/></w:r>",
        "<w:r><w:t>!name!</w:t></w:r><w:r><w:tab/></w:r>",
        "<w:r><w:t>City: !city!</w:t></w:r></w:p>",
    );
    write_docx(&path, body, &[]);

    let template = Template::open(&path).unwrap();
    let output = dir.path().join("out.docx");
    template
        .render(&record(&[("name", "Alice"), ("city", "NY")]), &output)
        .unwrap();

    let xml = read_part(&output, "word/document.xml");
    let br = xml.find("<w:br/>").unwrap();
    let alice = xml.find("Alice").unwrap();
    let tab = xml.find("<w:tab/>").unwrap();
    let city = xml.find("City: NY").unwrap();
    assert!(xml.find("Owner:").unwrap() < br);
    assert!(br < alice && alice < tab && tab < city);
}

#[test]
fn test_render_replaces_body_and_table_cells() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("survey.docx");
    let body = [
        paragraph(&["Name: !name!"]),
        table(&["City", "!city!"]),
    ]
    .concat();
    write_docx(&path, &body, &[]);

    let template = Template::open(&path).unwrap();
    let output = dir.path().join("Alice.docx");
    template
        .render(&record(&[("name", "Alice"), ("city", "NY")]), &output)
        .unwrap();

    assert_eq!(document_text(&output), vec!["Name: Alice", "City", "NY"]);
}

#[test]
fn test_unknown_placeholders_stay_verbatim() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.docx");
    write_docx(&path, &paragraph(&["!name! lives at !address!"]), &[]);

    let template = Template::open(&path).unwrap();
    let output = dir.path().join("out.docx");
    template.render(&record(&[("name", "Bob")]), &output).unwrap();

    assert_eq!(document_text(&output), vec!["Bob lives at !address!"]);
}

#[test]
fn test_values_are_not_rescanned() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("literal.docx");
    write_docx(&path, &paragraph(&["!a! / !b!"]), &[]);

    let template = Template::open(&path).unwrap();
    let output = dir.path().join("out.docx");
    template
        .render(&record(&[("a", "!b!"), ("b", "two")]), &output)
        .unwrap();

    assert_eq!(document_text(&output), vec!["!b! / two"]);
}

#[test]
fn test_values_are_xml_escaped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("escape.docx");
    write_docx(&path, &paragraph(&["Firm: !firm!"]), &[]);

    let template = Template::open(&path).unwrap();
    let output = dir.path().join("out.docx");
    template
        .render(&record(&[("firm", "Smith & <Sons>")]), &output)
        .unwrap();

    let xml = read_part(&output, "word/document.xml");
    assert!(xml.contains("Smith &amp; &lt;Sons&gt;"));
    // The rendered document opens again as a template.
    assert!(Template::open(&output).unwrap().placeholders().is_empty());
}

#[test]
fn test_headers_and_footers_are_substituted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("framed.docx");
    let header = format!(
        r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:hdr>"#,
        paragraph(&["Case !case_id!"])
    );
    let footer = format!(
        r#"<w:ftr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:ftr>"#,
        paragraph(&["Page for !name!"])
    );
    write_docx(
        &path,
        &paragraph(&["Body"]),
        &[("word/header1.xml", header), ("word/footer1.xml", footer)],
    );

    let template = Template::open(&path).unwrap();
    assert_eq!(template.placeholders(), ["case_id", "name"]);

    let output = dir.path().join("out.docx");
    template
        .render(&record(&[("case_id", "7"), ("name", "Ann")]), &output)
        .unwrap();
    assert_eq!(part_text(&output, "word/header1.xml"), vec!["Case 7"]);
    assert_eq!(part_text(&output, "word/footer1.xml"), vec!["Page for Ann"]);
}

#[test]
fn test_render_leaves_template_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("source.docx");
    write_docx(&path, &paragraph(&["!name!"]), &[]);
    let before = fs::read(&path).unwrap();

    let template = Template::open(&path).unwrap();
    for name in ["Ann", "Ben"] {
        let output = dir.path().join(format!("{}.docx", name));
        template.render(&record(&[("name", name)]), &output).unwrap();
        assert_eq!(document_text(&output), vec![name.to_string()]);
    }

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_render_into_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.docx");
    write_docx(&path, &paragraph(&["!name!"]), &[]);

    let template = Template::open(&path).unwrap();
    let output = dir.path().join("no-such-dir").join("out.docx");
    assert!(template.render(&record(&[("name", "Ann")]), &output).is_err());
}

#[test]
fn test_open_errors() {
    let dir = tempdir().unwrap();

    let not_zip = dir.path().join("plain.docx");
    fs::write(&not_zip, "just text").unwrap();
    assert!(matches!(
        Template::open(&not_zip).unwrap_err(),
        TemplateError::Archive { .. }
    ));

    let missing = dir.path().join("missing.docx");
    assert!(matches!(
        Template::open(&missing).unwrap_err(),
        TemplateError::Io { .. }
    ));
}
