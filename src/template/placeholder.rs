//! Placeholder discovery and substitution.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::dataset::Record;

const DELIMITER: char = '!';

lazy_static! {
    /// `!name!` where name is ASCII word characters or CJK unified ideographs.
    static ref PLACEHOLDER: Regex =
        Regex::new(r"!([A-Za-z0-9_\x{4e00}-\x{9fa5}]+)!").expect("placeholder pattern is valid");
}

/// Add every placeholder name found in `text` to `found`.
pub fn collect_placeholders(text: &str, found: &mut BTreeSet<String>) {
    for captures in PLACEHOLDER.captures_iter(text) {
        found.insert(captures[1].to_string());
    }
}

/// A token to replace: byte range of `!name!` in the scanned text and the
/// value that takes its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

/// Find each `!name!` whose name is a key of `record`, left to right.
///
/// Matches never overlap, and a token only matches when the text between the
/// two delimiters is exactly a record key, so `!id!` never touches `!id_2!`.
/// Unknown tokens are skipped.
pub fn replacements(text: &str, record: &Record) -> Vec<Replacement> {
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(open) = text[offset..].find(DELIMITER) {
        let open = offset + open;
        let name_start = open + DELIMITER.len_utf8();

        let matched = text[name_start..].find(DELIMITER).and_then(|close| {
            let name_end = name_start + close;
            record
                .get(&text[name_start..name_end])
                .map(|value| (name_end + DELIMITER.len_utf8(), value))
        });

        match matched {
            Some((end, value)) => {
                found.push(Replacement {
                    start: open,
                    end,
                    value: value.to_string(),
                });
                offset = end;
            }
            None => offset = name_start,
        }
    }
    found
}

/// Replace each `!name!` whose name is a key of `record` with its value.
///
/// Single pass: substituted values are never rescanned. Unknown tokens stay
/// verbatim.
pub fn substitute<'a>(text: &'a str, record: &Record) -> Cow<'a, str> {
    let found = replacements(text, record);
    if found.is_empty() {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut position = 0;
    for replacement in &found {
        out.push_str(&text[position..replacement.start]);
        out.push_str(&replacement.value);
        position = replacement.end;
    }
    out.push_str(&text[position..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn discover(text: &str) -> Vec<String> {
        let mut found = BTreeSet::new();
        collect_placeholders(text, &mut found);
        found.into_iter().collect()
    }

    #[test]
    fn test_discovery_ascii_and_cjk() {
        assert_eq!(
            discover("!name! lives in !city!; owner !权利人! (!name!)"),
            vec!["city", "name", "权利人"]
        );
    }

    #[test]
    fn test_discovery_ignores_invalid_tokens() {
        assert!(discover("hello! world! and !two words!").is_empty());
        assert!(discover("!!").is_empty());
    }

    #[test]
    fn test_substitute_all_known() {
        let rec = record(&[("name", "Alice"), ("city", "NY")]);
        assert_eq!(substitute("!name! lives in !city!.", &rec), "Alice lives in NY.");
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let rec = record(&[("name", "Bob")]);
        assert_eq!(substitute("!name! from !zip!", &rec), "Bob from !zip!");
    }

    #[test]
    fn test_prefix_names_do_not_collide() {
        let rec = record(&[("id", "7"), ("id_2", "8")]);
        assert_eq!(substitute("!id! / !id_2!", &rec), "7 / 8");

        let only_id = record(&[("id", "7")]);
        assert_eq!(substitute("!id_2!", &only_id), "!id_2!");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let rec = record(&[("a", "!b!"), ("b", "boom")]);
        assert_eq!(substitute("!a!", &rec), "!b!");
    }

    #[test]
    fn test_case_sensitive() {
        let rec = record(&[("Name", "Alice")]);
        assert_eq!(substitute("!name!", &rec), "!name!");
    }

    #[test]
    fn test_unchanged_text_is_borrowed() {
        let rec = record(&[("name", "Alice")]);
        assert!(matches!(substitute("no tokens here", &rec), Cow::Borrowed(_)));
        assert!(matches!(substitute("wow! !other!", &rec), Cow::Borrowed(_)));
    }

    #[test]
    fn test_replacement_ranges() {
        let rec = record(&[("name", "Alice")]);
        let text = "Hi !name!, !zip! and !name!";
        let found = replacements(text, &rec);

        assert_eq!(found.len(), 2);
        assert_eq!(&text[found[0].start..found[0].end], "!name!");
        assert_eq!((found[1].start, found[1].end), (21, 27));
        assert_eq!(found[1].value, "Alice");
    }

    #[test]
    fn test_stray_delimiters() {
        let rec = record(&[("a", "X")]);
        assert_eq!(substitute("!!a!", &rec), "!X");
        assert_eq!(substitute("end!", &rec), "end!");
    }
}
