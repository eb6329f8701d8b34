//! Text-span edits on the raw config.
//!
//! Mutations never round-trip through the parsed model: the parser drops
//! comments and formatting, so edits operate on line ranges of the original
//! text and leave everything outside the touched section byte-for-byte intact.
//! Section boundaries come from the parser's own line classifier.

use crate::haproxy::model::SectionKind;
use crate::haproxy::parser::{classify_line, LineClass};

/// Line indices of one section inside the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Header line.
    pub start: usize,
    /// One past the last directive; trailing blank and comment lines are excluded.
    pub content_end: usize,
    /// Next section header, or the line count.
    pub end: usize,
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

fn is_blank(line: &str) -> bool {
    classify_line(line) == LineClass::Blank
}

fn locate(lines: &[&str], kind: SectionKind, name: &str) -> Option<SectionSpan> {
    let start = lines.iter().position(|line| {
        matches!(
            classify_line(line),
            LineClass::Header { kind: k, name: Some(n) } if k == kind && n == name
        )
    })?;

    let end = lines[start + 1..]
        .iter()
        .position(|line| classify_line(line).is_header())
        .map_or(lines.len(), |offset| start + 1 + offset);

    let mut content_end = end;
    while content_end > start + 1 && classify_line(lines[content_end - 1]).is_filler() {
        content_end -= 1;
    }

    Some(SectionSpan {
        start,
        content_end,
        end,
    })
}

/// Locate the first section of `kind` named `name`.
pub fn find_section(text: &str, kind: SectionKind, name: &str) -> Option<SectionSpan> {
    locate(&split_lines(text), kind, name)
}

/// Cheap pre-write existence check: plain substring containment of
/// `"<kind> <name>"`. May report false positives, never false negatives.
pub fn mentions_section(text: &str, kind: SectionKind, name: &str) -> bool {
    text.contains(&format!("{} {}", kind.keyword(), name))
}

/// Whether any line of `text` would be read as a section header.
pub fn contains_header(text: &str) -> bool {
    text.lines().any(|line| classify_line(line).is_header())
}

/// Remove every section of `kind` named `name`.
///
/// The removed span is the header, its directives and the blank lines that
/// follow them; a comment block directly above the next header stays with
/// that header. A section running to end-of-file also takes the blank
/// separator line above it. Returns `None` when no such section exists.
pub fn remove_section(text: &str, kind: SectionKind, name: &str) -> Option<String> {
    let mut current = text.to_string();
    let mut removed = false;

    loop {
        let lines = split_lines(&current);
        let Some(span) = locate(&lines, kind, name) else {
            break;
        };

        let mut to = span.content_end;
        while to < span.end && is_blank(lines[to]) {
            to += 1;
        }
        let mut from = span.start;
        if to == lines.len() && from > 0 && is_blank(lines[from - 1]) {
            from -= 1;
        }

        let next = [&lines[..from], &lines[to..]].concat().concat();
        current = next;
        removed = true;
    }

    removed.then_some(current)
}

/// Directive lines of a section, as written (indentation kept).
pub fn section_body(text: &str, kind: SectionKind, name: &str) -> Option<String> {
    let lines = split_lines(text);
    let span = locate(&lines, kind, name)?;
    Some(lines[span.start + 1..span.content_end].concat())
}

/// Replace the header and directives of a section, optionally renaming it.
///
/// Anything after the name on the original header line (a legacy listen
/// bind address, for instance) is kept. Trailing blank and comment lines
/// are untouched.
pub fn replace_section(
    text: &str,
    kind: SectionKind,
    name: &str,
    new_name: &str,
    body: &str,
) -> Option<String> {
    let lines = split_lines(text);
    let span = locate(&lines, kind, name)?;

    let header = rename_header(lines[span.start], kind, name, new_name);
    let mut replacement = header;
    if !replacement.ends_with('\n') {
        replacement.push('\n');
    }
    replacement.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        replacement.push('\n');
    }

    let mut out = lines[..span.start].concat();
    out.push_str(&replacement);
    out.push_str(&lines[span.content_end..].concat());
    Some(out)
}

fn rename_header(line: &str, kind: SectionKind, name: &str, new_name: &str) -> String {
    if name == new_name {
        return line.to_string();
    }
    let keyword = kind.keyword();
    let Some(keyword_at) = line.find(keyword) else {
        return format!("{keyword} {new_name}\n");
    };
    let after = keyword_at + keyword.len();
    match line[after..].find(name) {
        Some(offset) => {
            let name_at = after + offset;
            format!(
                "{}{}{}",
                &line[..name_at],
                new_name,
                &line[name_at + name.len()..]
            )
        }
        None => format!("{keyword} {new_name}\n"),
    }
}
