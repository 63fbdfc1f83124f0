//! Streaming reconciliation of citation markers.
//!
//! The model is asked to cite passages as `[n]` and to finish with a
//! `References:` section. Its output arrives in arbitrary fragments, so the
//! reconciler buffers just enough text to see whole markers and whole
//! heading lines, and rewrites them against the retrieved set.

use crate::types::RetrievalResult;
use std::collections::HashSet;

const REFERENCES: &str = "references";

/// Canonical heading line.
const HEADING: &str = "References:\n";

/// Longer ids are never rank-local ids, so such brackets are plain text.
const MAX_ID_DIGITS: usize = 4;

#[derive(Debug, Clone)]
struct Source {
    id: u32,
    filename: String,
    page: u32,
}

impl Source {
    fn reference_line(&self) -> String {
        format!("[{}] {}, Page {}", self.id, self.filename, self.page)
    }
}

/// Result of looking for a marker at the start of a buffer.
#[derive(Debug, PartialEq, Eq)]
enum Marker {
    Complete { len: usize, ids: Vec<u32> },
    Incomplete,
    NotMarker,
}

/// Rewrites streamed answer text so every citation refers to a retrieved
/// passage.
#[derive(Debug)]
pub struct CitationReconciler {
    sources: Vec<Source>,
    pending: String,
    at_line_start: bool,
    in_references: bool,
    saw_heading: bool,
    referenced: HashSet<u32>,
    last_emitted: Option<char>,
}

impl CitationReconciler {
    pub fn new(retrieval: &RetrievalResult) -> Self {
        Self {
            sources: retrieval
                .passages
                .iter()
                .map(|p| Source {
                    id: p.citation_id,
                    filename: p.source_filename.clone(),
                    page: p.source_page,
                })
                .collect(),
            pending: String::new(),
            at_line_start: true,
            in_references: false,
            saw_heading: false,
            referenced: HashSet::new(),
            last_emitted: None,
        }
    }

    /// Feed one upstream fragment and take whatever text is ready.
    ///
    /// The returned text may be empty while a marker or heading is
    /// incomplete.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        let out = self.drain(false);
        self.remember_tail(&out);
        out
    }

    /// Flush held text once upstream has ended.
    ///
    /// Appends a references section listing every retrieved passage when the
    /// answer did not produce a usable one.
    pub fn finish(&mut self) -> String {
        let mut out = self.drain(true);
        self.remember_tail(&out);

        if self.referenced.is_empty() && !self.sources.is_empty() {
            if !self.saw_heading {
                match self.last_emitted {
                    None => {}
                    Some('\n') => out.push('\n'),
                    Some(_) => out.push_str("\n\n"),
                }
                out.push_str(HEADING);
            }
            let lines: Vec<String> = self.sources.iter().map(Source::reference_line).collect();
            out.push_str(&lines.join("\n"));
            out.push('\n');
            self.referenced.extend(self.sources.iter().map(|s| s.id));
        }

        out
    }

    /// Release held text without completing the references section.
    ///
    /// Used when upstream fails, so text the model already produced still
    /// reaches the caller.
    pub fn flush_partial(&mut self) -> String {
        let out = self.drain(true);
        self.remember_tail(&out);
        out
    }

    fn remember_tail(&mut self, out: &str) {
        if let Some(c) = out.chars().last() {
            self.last_emitted = Some(c);
        }
    }

    fn source(&self, id: u32) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    fn drain(&mut self, at_end: bool) -> String {
        let mut out = String::new();

        while !self.pending.is_empty() {
            if self.in_references {
                match self.pending.find('\n') {
                    Some(idx) => {
                        let line: String = self.pending.drain(..=idx).collect();
                        self.reference_line(&line, &mut out);
                    }
                    None if at_end => {
                        let line = std::mem::take(&mut self.pending);
                        self.reference_line(&line, &mut out);
                    }
                    None => break,
                }
                continue;
            }

            if self.at_line_start {
                let line_end = self.pending.find('\n');
                let line = &self.pending[..line_end.unwrap_or(self.pending.len())];

                if line_end.is_some() || at_end {
                    if let Some(rest) = heading_remainder(line) {
                        let rest = rest.trim().to_string();
                        let after = line_end
                            .map(|idx| self.pending[idx + 1..].to_string())
                            .unwrap_or_default();

                        out.push_str(HEADING);
                        self.in_references = true;
                        self.saw_heading = true;
                        self.pending = if rest.is_empty() {
                            after
                        } else {
                            format!("{}\n{}", rest, after)
                        };
                        continue;
                    }
                } else if could_be_heading(line) {
                    break;
                }
            }

            match self.pending.find(|c: char| c == '[' || c == '\n') {
                None => {
                    out.push_str(&self.pending);
                    self.pending.clear();
                    self.at_line_start = false;
                }
                Some(0) if self.pending.starts_with('\n') => {
                    out.push('\n');
                    self.pending.drain(..1);
                    self.at_line_start = true;
                }
                Some(0) => match parse_marker(&self.pending) {
                    Marker::Complete { len, ids } => {
                        let valid = self.valid_ids(ids);
                        if valid.is_empty() {
                            if out.ends_with(' ') {
                                out.pop();
                            }
                        } else {
                            out.push_str(&render_marker(&valid));
                        }
                        self.pending.drain(..len);
                        self.at_line_start = false;
                    }
                    Marker::Incomplete if !at_end => {
                        // Keep the space before a split marker so it can go
                        // with the marker if the marker is dropped
                        let kept = out.len() - out.trim_end_matches(' ').len();
                        let spaces = out.split_off(out.len() - kept);
                        self.pending.insert_str(0, &spaces);
                        break;
                    }
                    Marker::Incomplete | Marker::NotMarker => {
                        out.push('[');
                        self.pending.drain(..1);
                        self.at_line_start = false;
                    }
                },
                Some(idx) => {
                    out.extend(self.pending.drain(..idx));
                    self.at_line_start = false;
                }
            }
        }

        out
    }

    /// Ids within the retrieved set, first occurrence only.
    fn valid_ids(&self, ids: Vec<u32>) -> Vec<u32> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .filter(|id| self.source(*id).is_some() && seen.insert(*id))
            .collect()
    }

    /// Rewrite one line of the references section, or drop it.
    fn reference_line(&mut self, line: &str, out: &mut String) {
        let line = line
            .trim()
            .trim_start_matches(&['-', '*', '\u{2022}'][..])
            .trim_start();
        if !line.starts_with('[') {
            return;
        }

        let ids = match parse_marker(line) {
            Marker::Complete { ids, .. } => ids,
            _ => return,
        };

        for id in ids {
            let Some(source) = self.source(id) else {
                continue;
            };
            let rendered = source.reference_line();
            if self.referenced.insert(id) {
                out.push_str(&rendered);
                out.push('\n');
            }
        }
    }
}

fn render_marker(ids: &[u32]) -> String {
    let ids: Vec<String> = ids.iter().map(u32::to_string).collect();
    format!("[{}]", ids.join(", "))
}

/// Parse `[ n (, m)* ]` at the start of `s`.
fn parse_marker(s: &str) -> Marker {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'[') {
        return Marker::NotMarker;
    }

    let skip_spaces = |mut i: usize| {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        i
    };

    let mut ids = Vec::new();
    let mut i = 1;
    loop {
        i = skip_spaces(i);
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - start > MAX_ID_DIGITS {
            return Marker::NotMarker;
        }
        if i == bytes.len() {
            return Marker::Incomplete;
        }
        if i == start {
            return Marker::NotMarker;
        }
        // At most four ASCII digits
        ids.push(s[start..i].parse().unwrap_or(0));

        i = skip_spaces(i);
        if i == bytes.len() {
            return Marker::Incomplete;
        }
        match bytes[i] {
            b',' => i += 1,
            b']' => return Marker::Complete { len: i + 1, ids },
            _ => return Marker::NotMarker,
        }
    }
}

/// Leading markdown decoration allowed before a heading.
fn strip_decoration(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '*' | '_'))
}

/// Text following a `References:` heading on the same line, if `line` is one.
fn heading_remainder(line: &str) -> Option<&str> {
    let body = strip_decoration(line);
    let head = body.get(..REFERENCES.len())?;
    if !head.eq_ignore_ascii_case(REFERENCES) {
        return None;
    }

    let rest = &body[REFERENCES.len()..];
    if rest.chars().next().is_some_and(char::is_alphanumeric) {
        return None;
    }

    let rest = rest.trim_start_matches(&['*', '_'][..]);
    match rest.strip_prefix(':') {
        Some(after) => Some(after.trim_start_matches(&['*', '_'][..])),
        None if rest.trim().is_empty() => Some(""),
        None => None,
    }
}

/// Whether an unfinished line may still turn out to be a heading.
fn could_be_heading(partial: &str) -> bool {
    let body = strip_decoration(partial).as_bytes();
    let word = REFERENCES.as_bytes();
    if body.len() <= word.len() {
        word[..body.len()].eq_ignore_ascii_case(body)
    } else {
        body[..word.len()].eq_ignore_ascii_case(word)
    }
}
