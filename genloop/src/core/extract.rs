//! Block extractor: finds fenced regions in a response and the names around them.
//!
//! [`Extractor::extract`] returns a lazy iterator. It borrows the blob and keeps
//! only a byte cursor, so calling `extract` again (or cloning the iterator)
//! replays the same sequence.

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::core::language::{extension_for_language, has_recognizable_name, infer_extension_from_content};
use crate::core::sanitize::{DEFAULT_LABELS, Sanitizer, label_alternation};
use crate::core::types::{ExtractedFile, ResponseBlob};

/// Default number of non-blank lines searched above a fence for a name.
pub const DEFAULT_HINT_WINDOW: usize = 3;

const QUOTES_OPEN: &[char] = &['`', '"', '\'', '“', '‘', '「', '『', '*'];
const QUOTES_CLOSE: &[char] = &['`', '"', '\'', '”', '’', '」', '』', '*'];

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").unwrap());

#[derive(Debug, Clone)]
pub struct Extractor {
    hint_window_lines: usize,
    labeled_re: Option<Regex>,
    names: Sanitizer,
}

impl Extractor {
    /// `labels` and `default_extension` must be the ones the round's
    /// [`Sanitizer`] uses, so a hint is accepted here exactly when the
    /// sanitizer can keep a name from it.
    pub fn new<S: AsRef<str>>(
        labels: &[S],
        hint_window_lines: usize,
        default_extension: &str,
    ) -> Result<Self> {
        let labeled_re = match label_alternation(labels) {
            Some(alternation) => {
                let pattern = format!(
                    r"(?i)(?:^|[\s*#>=`_-])((?:{alternation})\s*[*_]*\s*[:：]\s*\S.*)$"
                );
                Some(Regex::new(&pattern).map_err(|err| anyhow!("invalid label pattern: {err}"))?)
            }
            None => None,
        };
        Ok(Self {
            hint_window_lines,
            labeled_re,
            names: Sanitizer::new(labels, default_extension)?,
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_LABELS, DEFAULT_HINT_WINDOW, "txt").unwrap_or_else(|_| Self {
            hint_window_lines: DEFAULT_HINT_WINDOW,
            labeled_re: None,
            names: Sanitizer::with_defaults(),
        })
    }

    /// Iterate over the fenced regions of `blob` in document order.
    pub fn extract<'a>(&'a self, blob: &'a ResponseBlob) -> Blocks<'a> {
        Blocks {
            extractor: self,
            text: &blob.text,
            pos: 0,
            ordinal: 0,
        }
    }

    /// Search the lines between `floor` and `fence_start` for a name hint,
    /// nearest line first.
    fn hint_before(&self, text: &str, floor: usize, fence_start: usize) -> Option<String> {
        text[floor..fence_start]
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .take(self.hint_window_lines)
            .find_map(|line| self.hint_from_line(line))
    }

    fn hint_from_line(&self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        let candidate = if is_quoted_token(trimmed) {
            Some(trimmed.to_string())
        } else if let Some(caps) = self.labeled_re.as_ref().and_then(|re| re.captures(trimmed)) {
            Some(caps[1].to_string())
        } else {
            HEADING_RE.captures(trimmed).map(|caps| caps[1].to_string())
        };
        candidate.filter(|candidate| self.names.has_usable_name(candidate))
    }
}

/// Lazy sequence of fenced regions in one blob.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    extractor: &'a Extractor,
    text: &'a str,
    pos: usize,
    ordinal: usize,
}

impl Iterator for Blocks<'_> {
    type Item = ExtractedFile;

    fn next(&mut self) -> Option<ExtractedFile> {
        let text = self.text;
        let floor = self.pos;
        let mut line_start = self.pos;

        while line_start < text.len() {
            let line_end = next_line_end(text, line_start);
            let Some(open) = parse_fence(&text[line_start..line_end]) else {
                line_start = line_end;
                continue;
            };

            let (body_end, region_end) = find_close(text, line_end, &open);
            self.pos = region_end;
            self.ordinal += 1;

            let content = &text[line_end..body_end];
            let (language, info_name) = parse_info(open.info);
            let candidate_name = self
                .extractor
                .hint_before(text, floor, line_start)
                .or(info_name)
                .unwrap_or_default();
            let extension = language
                .as_deref()
                .and_then(extension_for_language)
                .or_else(|| infer_extension_from_content(content))
                .map(str::to_string);

            return Some(ExtractedFile {
                ordinal: self.ordinal,
                candidate_name,
                language,
                extension,
                content: content.to_string(),
                span: line_start..region_end,
            });
        }

        self.pos = text.len();
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Fence<'a> {
    marker: char,
    len: usize,
    info: &'a str,
}

/// Byte offset just past the line starting at `start` (newline included).
fn next_line_end(text: &str, start: usize) -> usize {
    text[start..]
        .find('\n')
        .map(|idx| start + idx + 1)
        .unwrap_or(text.len())
}

/// Parse a fence line: up to three spaces of indent, three or more backticks
/// or tildes, then an optional info string.
fn parse_fence(line: &str) -> Option<Fence<'_>> {
    let line = line.trim_end_matches(['\n', '\r']);
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    let info = rest[len..].trim();
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some(Fence { marker, len, info })
}

/// Find where the region opened by `open` ends.
///
/// Returns `(body_end, region_end)`. A fence line with an info string opens a
/// nested region that must close first; anything left open runs to the end of
/// the document.
fn find_close(text: &str, body_start: usize, open: &Fence<'_>) -> (usize, usize) {
    let mut depth = 0usize;
    let mut line_start = body_start;
    while line_start < text.len() {
        let line_end = next_line_end(text, line_start);
        if let Some(fence) = parse_fence(&text[line_start..line_end])
            && fence.marker == open.marker
        {
            if !fence.info.is_empty() {
                depth += 1;
            } else if depth > 0 {
                depth -= 1;
            } else if fence.len >= open.len {
                return (line_start, line_end);
            }
        }
        line_start = line_end;
    }
    (text.len(), text.len())
}

/// Split an info string into a language tag and an optional file name
/// (```` ```python main.py ````, ```` ```python:main.py ````, ```` ```main.py ````).
fn parse_info(info: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = info
        .split(|c: char| c.is_whitespace() || c == ':')
        .map(|token| token.trim_matches(|c: char| matches!(c, '{' | '}' | '"' | '\'')))
        .filter(|token| !token.is_empty())
        .collect();
    let name = tokens
        .iter()
        .find(|token| has_recognizable_name(token))
        .map(|token| token.to_string());
    let language = tokens
        .first()
        .filter(|first| !has_recognizable_name(first))
        .map(|first| first.to_ascii_lowercase());
    (language, name)
}

/// A line that is a single quoted or backticked token, optionally followed by a colon.
fn is_quoted_token(line: &str) -> bool {
    let line = line.trim_end_matches([':', '：']).trim_end();
    let (Some(first), Some(last)) = (line.chars().next(), line.chars().last()) else {
        return false;
    };
    if !QUOTES_OPEN.contains(&first) || !QUOTES_CLOSE.contains(&last) {
        return false;
    }
    let inner = line.trim_matches(|c: char| QUOTES_OPEN.contains(&c) || QUOTES_CLOSE.contains(&c));
    !inner.is_empty() && !inner.chars().any(char::is_whitespace)
}
