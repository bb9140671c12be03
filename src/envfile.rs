// Environment file handling: a tiny reader/writer for `KEY=value` files.
//
// The file is treated as a list of raw lines so that rewriting one key keeps
// every other line (comments, blank lines, unrelated keys) untouched.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// In-memory copy of an environment file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<RawLine>,
}

/// One line of the file and the terminator it had (`""` on a last line with
/// no newline), so unchanged lines render back exactly as read.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawLine {
    text: String,
    ending: &'static str,
}

impl EnvFile {
    /// Parse file contents. Never fails: lines that are not assignments are
    /// kept verbatim and ignored by lookups.
    pub fn parse(contents: &str) -> Self {
        let lines = contents
            .split_inclusive('\n')
            .map(|chunk| {
                if let Some(text) = chunk.strip_suffix("\r\n") {
                    RawLine {
                        text: text.to_string(),
                        ending: "\r\n",
                    }
                } else if let Some(text) = chunk.strip_suffix('\n') {
                    RawLine {
                        text: text.to_string(),
                        ending: "\n",
                    }
                } else {
                    RawLine {
                        text: chunk.to_string(),
                        ending: "",
                    }
                }
            })
            .collect();
        EnvFile { lines }
    }

    /// Read `path`, returning an empty file when it does not exist yet.
    pub fn load(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }

    /// Value of `key`. When a key is assigned more than once the last
    /// assignment wins, matching how the file is loaded into an environment.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lines
            .iter()
            .filter_map(|line| parse_assignment(&line.text))
            .filter(|(name, _)| *name == key)
            .last()
            .map(|(_, value)| value)
    }

    /// Assign `key`, replacing its existing line in place or appending a new
    /// one. Duplicate assignments of the same key are dropped. Every other
    /// line keeps its text and terminator.
    pub fn set(&mut self, key: &str, value: &str) {
        let rendered = format!("{key}={}", quote_value(value));
        let newline = self.newline();
        let mut replaced = false;
        self.lines.retain_mut(|line| {
            let matches = parse_assignment(&line.text).is_some_and(|(name, _)| name == key);
            if !matches {
                return true;
            }
            if replaced {
                return false;
            }
            line.text = rendered.clone();
            replaced = true;
            true
        });
        if replaced {
            return;
        }
        if let Some(last) = self.lines.last_mut() {
            if last.ending.is_empty() {
                last.ending = newline;
            }
        }
        self.lines.push(RawLine {
            text: rendered,
            ending: newline,
        });
    }

    /// Serialized file contents.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(line.ending);
        }
        out
    }

    /// Line terminator used for appended lines: whatever the file already
    /// uses first, `\n` for a file without any.
    fn newline(&self) -> &'static str {
        self.lines
            .iter()
            .map(|line| line.ending)
            .find(|ending| !ending.is_empty())
            .unwrap_or("\n")
    }

    /// Write the file to `path` atomically: contents go to a temporary file in
    /// the same directory, which is then renamed over the target.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(self.render().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

/// Split an assignment line into its key and unquoted value.
fn parse_assignment(line: &str) -> Option<(&str, String)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, raw) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(raw.trim())))
}

fn unquote(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix('\'') {
        if let Some((inner, tail)) = rest.split_once('\'') {
            if is_comment_or_blank(tail) {
                return inner.to_string();
            }
        }
    }
    if let Some(rest) = raw.strip_prefix('"') {
        if let Some((inner, tail)) = split_double_quoted(rest) {
            if is_comment_or_blank(tail) {
                return inner;
            }
        }
    }
    // Unquoted values may carry a trailing ` # comment`.
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// Unescape a double-quoted value up to its closing quote, returning the
/// value and whatever follows the quote.
fn split_double_quoted(rest: &str) -> Option<(String, &str)> {
    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => return Some((out, &rest[idx + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, other)) => out.push(other),
                None => out.push('\\'),
            },
            _ => out.push(ch),
        }
    }
    None
}

fn is_comment_or_blank(tail: &str) -> bool {
    let tail = tail.trim_start();
    tail.is_empty() || tail.starts_with('#')
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|ch| ch.is_whitespace() || matches!(ch, '#' | '"' | '\'' | '\\'));
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}
