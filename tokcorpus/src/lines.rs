//! Reading training texts out of line-delimited text and CSV files.
use crate::error::{CsvSnafu, FileIoSnafu};
use crate::Result;
use snafu::ResultExt;
use std::path::Path;
use tracing::*;

/// Read the texts in a line-delimited file, one text per line.
///
/// If `header` is set, the first line is thrown away before anything else happens, whatever kind
/// of file this is.
///
/// `\r\n` and bare `\r` line endings are treated as `\n` throughout.
///
/// Files with a `.csv` extension are parsed as CSV, and each record becomes one text.  The text is
/// the whole record written out as a list, like `['first field', 'second field']`; the fields are
/// not pulled apart.  An empty line is a record with no fields and becomes `[]`.
///
/// Every other file is split into lines at any Unicode line boundary (vertical tab, form feed,
/// the file/group/record separators, NEL, and the line and paragraph separators all count), and
/// blank or whitespace-only lines are dropped.
///
/// The whole file is read into memory.
#[instrument(skip_all, fields(path = %path.as_ref().display(), header = header))]
pub fn read_lines(path: impl AsRef<Path>, header: bool) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).context(FileIoSnafu { path })?;
    let contents = normalize_newlines(&contents);

    let body = if header {
        skip_first_line(&contents)
    } else {
        contents.as_str()
    };

    let texts = if is_csv(path) {
        csv_records(body)
            .into_iter()
            .map(|record| parse_record(record).context(CsvSnafu { path }))
            .collect::<Result<Vec<_>>>()?
    } else {
        body.split(is_line_boundary)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    };

    debug!(count = texts.len(), "Read texts from file");

    Ok(texts)
}

fn is_csv(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "csv")
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Characters that end a line when splitting a plain text file, once `\r` is gone
fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split CSV text into the raw text of each record.
///
/// A newline inside a quoted field doesn't end the record.  Escaped quotes (`""`) toggle the
/// quoting state twice, so they need no special handling.  Empty lines come back as empty records.
fn csv_records(body: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (index, c) in body.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '\n' if !quoted => {
                records.push(&body[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if start < body.len() {
        records.push(&body[start..]);
    }

    records
}

fn parse_record(record: &str) -> std::result::Result<String, csv::Error> {
    if record.is_empty() {
        return Ok("[]".to_string());
    }

    let mut fields = csv::StringRecord::new();
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(record.as_bytes())
        .read_record(&mut fields)?;

    Ok(record_repr(&fields))
}

fn skip_first_line(text: &str) -> &str {
    match text.find('\n') {
        Some(newline) => &text[newline + 1..],
        None => "",
    }
}

/// Render a CSV record the way a Python list of strings prints
fn record_repr(record: &csv::StringRecord) -> String {
    let fields: Vec<String> = record.iter().map(quote_field).collect();
    format!("[{}]", fields.join(", "))
}

fn quote_field(field: &str) -> String {
    // Single quotes unless that would mean escaping a quote that double quotes avoid
    let quote = if field.contains('\'') && !field.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push(quote);
    for c in field.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == quote => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if !is_printable(c) => quoted.push_str(&escape_unprintable(c)),
            c => quoted.push(c),
        }
    }
    quoted.push(quote);

    quoted
}

/// Whether Python would print `c` as-is inside a string literal.
///
/// Covers control, separator, format and private use characters.  Unassigned code points are
/// treated as printable.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }

    let format = matches!(
        c,
        '\u{ad}'
            | '\u{600}'..='\u{605}'
            | '\u{61c}'
            | '\u{6dd}'
            | '\u{70f}'
            | '\u{180e}'
            | '\u{200b}'..='\u{200f}'
            | '\u{202a}'..='\u{202e}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206f}'
            | '\u{feff}'
            | '\u{fff9}'..='\u{fffb}'
            | '\u{e0001}'
            | '\u{e0020}'..='\u{e007f}'
    );
    let private_use = matches!(
        c,
        '\u{e000}'..='\u{f8ff}' | '\u{f0000}'..='\u{ffffd}' | '\u{100000}'..='\u{10fffd}'
    );

    !(c.is_control() || c.is_whitespace() || format || private_use)
}

fn escape_unprintable(c: char) -> String {
    let code = c as u32;
    if code <= 0xff {
        format!("\\x{code:02x}")
    } else if code <= 0xffff {
        format!("\\u{code:04x}")
    } else {
        format!("\\U{code:08x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::init_test_logging;
    use crate::CorpusError;
    use assert_matches::assert_matches;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn header_line_is_skipped() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.txt", "title\nfirst\nsecond\n");

        assert_eq!(read_lines(&path, true).unwrap(), vec!["first", "second"]);
        assert_eq!(
            read_lines(&path, false).unwrap(),
            vec!["title", "first", "second"]
        );
    }

    #[test]
    fn header_is_skipped_even_when_it_looks_like_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.txt", "first\nsecond");

        assert_eq!(read_lines(&path, true).unwrap(), vec!["second"]);
    }

    #[test]
    fn blank_and_whitespace_lines_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.txt", "one\n\n   \ntwo\r\n\t\nthree\n");

        assert_eq!(read_lines(&path, false).unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.txt", "just a header");

        assert!(read_lines(&path, true).unwrap().is_empty());
    }

    #[test]
    fn csv_rows_are_stringified_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "texts.csv",
            "text,label\nhello,1\n\"a, quoted\",2\nit's,3\nsingle\n",
        );

        assert_eq!(
            read_lines(&path, true).unwrap(),
            vec![
                "['hello', '1']",
                "['a, quoted', '2']",
                "[\"it's\", '3']",
                "['single']",
            ]
        );
    }

    #[test]
    fn csv_without_header_keeps_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.csv", "a,b\nc,d\n");

        assert_eq!(
            read_lines(&path, false).unwrap(),
            vec!["['a', 'b']", "['c', 'd']"]
        );
    }

    #[test]
    fn quote_field_escapes_like_python() {
        assert_eq!(quote_field("plain"), "'plain'");
        assert_eq!(quote_field("both ' and \""), "'both \\' and \"'");
        assert_eq!(quote_field("line\nbreak"), "'line\\nbreak'");
        assert_eq!(quote_field("back\\slash"), "'back\\\\slash'");
    }

    #[test]
    fn blank_csv_row_is_an_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.csv", "h\na,b\n\nc\n");

        assert_eq!(
            read_lines(&path, true).unwrap(),
            vec!["['a', 'b']", "[]", "['c']"]
        );
    }

    #[test]
    fn quoted_csv_field_can_span_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.csv", "\"two\nlines\",x\r\n\"say \"\"hi\"\"\"\r\n");

        assert_eq!(
            read_lines(&path, false).unwrap(),
            vec!["['two\\nlines', 'x']", "['say \"hi\"']"]
        );
    }

    #[test]
    fn carriage_return_only_file_splits_into_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.txt", "h\rone\rtwo\x0cthree\n");

        assert_eq!(read_lines(&path, true).unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn every_unicode_line_boundary_splits() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "texts.txt",
            "a\x0bb\x1cc\x1dd\x1ee\u{85}f\u{2028}g\u{2029}h",
        );

        assert_eq!(
            read_lines(&path, false).unwrap(),
            vec!["a", "b", "c", "d", "e", "f", "g", "h"]
        );
    }

    #[test]
    fn carriage_return_csv_keeps_rows_apart() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "texts.csv", "text\rfirst\rsecond,2\r");

        assert_eq!(
            read_lines(&path, true).unwrap(),
            vec!["['first']", "['second', '2']"]
        );
    }

    #[test]
    fn unprintable_characters_are_escaped_like_python() {
        assert_eq!(quote_field("no\u{a0}break"), "'no\\xa0break'");
        assert_eq!(quote_field("next\u{85}line"), "'next\\x85line'");
        assert_eq!(quote_field("bell\x07"), "'bell\\x07'");
        assert_eq!(quote_field("zero\u{200b}width"), "'zero\\u200bwidth'");
        assert_eq!(quote_field("para\u{2029}"), "'para\\u2029'");
        assert_eq!(quote_field("private\u{f0000}"), "'private\\U000f0000'");
        assert_eq!(quote_field("café ☕"), "'café ☕'");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");

        assert_matches!(read_lines(&path, true), Err(CorpusError::FileIo { .. }));
    }
}
