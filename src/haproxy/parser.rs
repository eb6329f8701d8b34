//! Line-oriented HAProxy config parser.
//!
//! # Responsibilities
//! - Classify each line (blank, comment, section header, directive)
//! - Populate typed fields for the directives the panel displays
//! - Keep every other directive verbatim in `options`
//!
//! # Design Decisions
//! - Never fails: malformed input degrades to raw `options` entries
//! - Comments are dropped; callers needing exact text use the raw file
//! - The same classifier drives section surgery, so the parser and the
//!   editor always agree on where a section starts and ends

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::haproxy::model::{ConfigDocument, Section, SectionKind, ServerEntry, UseBackendRule};

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(global|defaults|frontend|backend|listen)(?:\s+(\S+).*)?$")
        .expect("static header regex")
});

static SERVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^server\s+(\S+)\s+(\S+)(.*)$").expect("static server regex"));

static USE_BACKEND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^use_backend\s+(\S+)\s+if\s+(.+)$").expect("static use_backend regex")
});

/// Classification of a single raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass<'a> {
    Blank,
    Comment,
    Header {
        kind: SectionKind,
        name: Option<&'a str>,
    },
    /// A trimmed directive inside a section.
    Directive(&'a str),
}

impl LineClass<'_> {
    pub fn is_header(&self) -> bool {
        matches!(self, LineClass::Header { .. })
    }

    /// Blank lines and comments carry no configuration.
    pub fn is_filler(&self) -> bool {
        matches!(self, LineClass::Blank | LineClass::Comment)
    }
}

pub fn classify_line(line: &str) -> LineClass<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineClass::Blank;
    }
    if trimmed.starts_with('#') {
        return LineClass::Comment;
    }
    if let Some(caps) = HEADER_RE.captures(trimmed) {
        if let Some(kind) = caps.get(1).and_then(|m| SectionKind::from_keyword(m.as_str())) {
            return LineClass::Header {
                kind,
                name: caps.get(2).map(|m| m.as_str()),
            };
        }
    }
    LineClass::Directive(trimmed)
}

struct OpenSection {
    kind: SectionKind,
    name: Option<String>,
    section: Section,
}

/// Parse raw config text into a [`ConfigDocument`].
pub fn parse(text: &str) -> ConfigDocument {
    let mut doc = ConfigDocument::default();
    let mut current: Option<OpenSection> = None;

    for line in text.lines() {
        match classify_line(line) {
            LineClass::Blank | LineClass::Comment => continue,
            LineClass::Header { kind, name } => {
                flush(&mut doc, current.take());
                current = Some(OpenSection {
                    kind,
                    name: name.map(str::to_string),
                    section: Section::default(),
                });
            }
            LineClass::Directive(directive) => {
                let Some(open) = current.as_mut() else {
                    // Directives before the first section belong to nothing.
                    continue;
                };
                match open.kind {
                    SectionKind::Global => insert_setting(&mut doc.global, directive),
                    SectionKind::Defaults => insert_setting(&mut doc.defaults, directive),
                    _ => apply_directive(&mut open.section, directive),
                }
            }
        }
    }
    flush(&mut doc, current);

    doc
}

fn flush(doc: &mut ConfigDocument, open: Option<OpenSection>) {
    let Some(OpenSection {
        kind,
        name: Some(name),
        section,
    }) = open
    else {
        return;
    };

    let target = match kind {
        SectionKind::Frontend => &mut doc.frontends,
        SectionKind::Backend => &mut doc.backends,
        SectionKind::Listen => &mut doc.listens,
        SectionKind::Global | SectionKind::Defaults => return,
    };
    target.insert(name, section);
}

fn split_keyword(directive: &str) -> (&str, &str) {
    match directive.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (directive, ""),
    }
}

fn insert_setting(map: &mut IndexMap<String, String>, directive: &str) {
    let (keyword, rest) = split_keyword(directive);
    map.entry(keyword.to_string())
        .and_modify(|existing| {
            existing.push('\n');
            existing.push_str(rest);
        })
        .or_insert_with(|| rest.to_string());
}

fn apply_directive(section: &mut Section, directive: &str) {
    let (keyword, rest) = split_keyword(directive);
    if rest.is_empty() {
        section.options.push(directive.to_string());
        return;
    }

    match keyword {
        "bind" => section.bind.push(rest.to_string()),
        "mode" => section.mode = Some(rest.to_string()),
        "balance" => section.balance = Some(rest.to_string()),
        "default_backend" => section.default_backend = Some(rest.to_string()),
        "acl" => section.acls.push(rest.to_string()),
        "server" => match parse_server(directive) {
            Some(server) => section.servers.push(server),
            None => section.options.push(directive.to_string()),
        },
        "use_backend" => section.use_backends.push(parse_use_backend(directive, rest)),
        "stats" => apply_stats(section, directive, rest),
        _ => section.options.push(directive.to_string()),
    }
}

fn parse_server(directive: &str) -> Option<ServerEntry> {
    let caps = SERVER_RE.captures(directive)?;
    Some(ServerEntry {
        name: caps[1].to_string(),
        address: caps[2].to_string(),
        options: caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default().to_string(),
    })
}

fn parse_use_backend(directive: &str, rest: &str) -> UseBackendRule {
    match USE_BACKEND_RE.captures(directive) {
        Some(caps) => UseBackendRule {
            backend: caps[1].to_string(),
            condition: caps[2].to_string(),
        },
        None => UseBackendRule {
            backend: rest.to_string(),
            condition: String::new(),
        },
    }
}

fn apply_stats(section: &mut Section, directive: &str, rest: &str) {
    let (sub, value) = split_keyword(rest);
    match (sub, value.is_empty()) {
        ("uri", false) => section.stats_uri = Some(value.to_string()),
        ("auth", false) => section.stats_auth = Some(value.to_string()),
        ("enable", true) => section.stats_enabled = true,
        _ => section.options.push(directive.to_string()),
    }
}
