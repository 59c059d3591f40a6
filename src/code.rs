use nom_locate::LocatedSpan;
use serde::Serialize;
use std::{fs::File, io::Read, path::Path, sync::Arc};

/// In‑memory source buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub file_path: Option<String>,
    pub text: Arc<String>,
}

impl Code {
    /// Load a whole file of expressions
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Ok(Self {
            file_path: Some(path.to_string_lossy().into()),
            text: Arc::new(buf),
        })
    }

    /// Create from raw snippet (REPL, command line, tests)
    pub fn from_snippet(src: &str) -> Self {
        Self {
            file_path: None,
            text: Arc::new(src.to_owned()),
        }
    }

    /// `path:line` for file buffers, `line N` for snippets.
    pub fn location(&self, line_no: usize) -> String {
        match &self.file_path {
            Some(path) => format!("{path}:{line_no}"),
            None => format!("line {line_no}"),
        }
    }

    /// Non-empty lines paired with their 1-based line number.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.trim().is_empty())
    }

    /// Render the line holding `span` with a caret underline beneath it.
    pub fn caret(&self, span: &CodeSpan) -> String {
        let text = self.text.as_str();
        let start = span.start.min(text.len());
        let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = text[start..].find('\n').map_or(text.len(), |i| start + i);
        let line = &text[line_start..line_end];

        let column = text[line_start..start].chars().count();
        let end = span.end.clamp(start, line_end);
        let width = text[start..end].chars().count().max(1);

        format!("{line}\n{}{}", " ".repeat(column), "^".repeat(width))
    }
}

pub type ParserSpan<'a> = LocatedSpan<&'a str>;

/// Byte range into the scanned input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct CodeSpan {
    pub start: usize,
    pub end: usize,
}

impl CodeSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `offset`.
    pub fn point(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    /// Span from the start of `self` to the end of `other`.
    pub fn to(self, other: CodeSpan) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: CodeSpan,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: CodeSpan) -> Self {
        Self { value, span }
    }
}
