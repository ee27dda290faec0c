//! Tokenized definition sources
//!
//! Definition files are read as a sequence of token lines: `#` comments and
//! blank lines are dropped, text is upper-cased and split on whitespace and
//! commas. `$INCLUDE <path>` splices another file in place.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Result, SynthError};

pub const MAX_INCLUDE_DEPTH: usize = 16;

/// One non-blank, comment-free line
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    /// 1-based line number in the file the line came from
    pub number: usize,
    /// Original text, for error messages
    pub text: String,
    pub tokens: Vec<String>,
}

impl SourceLine {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }
}

/// Tokenized contents of a definition file
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionSource {
    name: String,
    lines: Vec<SourceLine>,
}

fn strip_comment(raw: &str) -> &str {
    match raw.find('#') {
        Some(at) => &raw[..at],
        None => raw,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

fn parse_line(number: usize, raw: &str) -> Option<SourceLine> {
    let body = strip_comment(raw);
    let tokens = tokenize(body);
    if tokens.is_empty() {
        return None;
    }
    Some(SourceLine {
        number,
        text: raw.trim_end().to_string(),
        tokens,
    })
}

/// Path named by an `$INCLUDE` line, with its original case.
fn include_target(raw: &str) -> Option<&str> {
    let mut words = strip_comment(raw).split_whitespace();
    let keyword = words.next()?;
    if !keyword.eq_ignore_ascii_case("$INCLUDE") {
        return None;
    }
    words.next()
}

struct OpenFile {
    path: PathBuf,
    lines: std::vec::IntoIter<(usize, String)>,
}

impl OpenFile {
    fn read(path: PathBuf) -> Result<Self> {
        let raw = fs::read_to_string(&path)?;
        let lines: Vec<(usize, String)> = raw
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.to_string()))
            .collect();
        Ok(Self {
            path,
            lines: lines.into_iter(),
        })
    }
}

impl DefinitionSource {
    /// Tokenize in-memory text. `$INCLUDE` lines are kept as ordinary lines.
    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .filter_map(|(i, raw)| parse_line(i + 1, raw))
            .collect();
        Self {
            name: name.into(),
            lines,
        }
    }

    /// Read and tokenize a file, expanding `$INCLUDE` lines relative to the
    /// including file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let mut stack = vec![OpenFile::read(path.to_path_buf())?];
        let mut lines = Vec::new();

        while let Some(top) = stack.last_mut() {
            let current = top.path.clone();
            let Some((number, raw)) = top.lines.next() else {
                stack.pop();
                continue;
            };

            if let Some(target) = include_target(&raw) {
                let base = current.parent().unwrap_or_else(|| Path::new("."));
                let included = base.join(target);
                let format_error = |reason: String| SynthError::Format {
                    source_name: current.display().to_string(),
                    line: number,
                    text: raw.trim_end().to_string(),
                    reason,
                };
                if stack.len() >= MAX_INCLUDE_DEPTH {
                    return Err(format_error(format!(
                        "includes nested deeper than {MAX_INCLUDE_DEPTH}"
                    )));
                }
                if stack.iter().any(|open| open.path == included) {
                    return Err(format_error("include cycle".to_string()));
                }
                debug!(file = %included.display(), "including definition file");
                stack.push(OpenFile::read(included)?);
                continue;
            }

            if let Some(line) = parse_line(number, &raw) {
                lines.push(line);
            }
        }

        Ok(Self { name, lines })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[SourceLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the first line at or after `from` whose first token is
    /// `keyword`.
    pub fn find_keyword(&self, keyword: &str, from: usize) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, line)| line.token(0) == Some(keyword))
            .map(|(i, _)| i)
    }

    /// Finite number in field `index` of `line`.
    pub fn number(&self, line: &SourceLine, index: usize) -> Result<f64> {
        line.token(index)
            .and_then(|token| token.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .ok_or_else(|| self.format_error(line, format!("field {} is not a number", index + 1)))
    }

    /// Format error pointing at `line`.
    pub fn format_error(&self, line: &SourceLine, reason: impl Into<String>) -> SynthError {
        SynthError::Format {
            source_name: self.name.clone(),
            line: line.number,
            text: line.text.clone(),
            reason: reason.into(),
        }
    }
}
