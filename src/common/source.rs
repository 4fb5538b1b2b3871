//! Source files and spans.
//!
//! The frontend hands the builder a typed AST whose nodes carry byte-offset
//! spans into registered source files. The `SourceManager` resolves spans
//! back to `file:line:column` for diagnostics.

/// A byte-offset span in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub file_id: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, file_id: u32) -> Self {
        Self { start, end, file_id }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0, file_id: 0 }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            file_id: self.file_id,
        }
    }
}

/// A human-readable source location.
#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug)]
struct SourceFile {
    name: String,
    content: String,
    /// Byte offset of the start of each line, for binary-search resolution.
    line_offsets: Vec<u32>,
}

/// Manages source files and provides span-to-location resolution.
#[derive(Debug, Default)]
pub struct SourceManager {
    files: Vec<SourceFile>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Register a source file, returning its file id.
    pub fn add_file(&mut self, name: &str, content: String) -> u32 {
        let mut line_offsets = vec![0u32];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line_offsets.push(i as u32 + 1);
            }
        }
        let id = self.files.len() as u32;
        self.files.push(SourceFile {
            name: name.to_string(),
            content,
            line_offsets,
        });
        id
    }

    pub fn file_name(&self, file_id: u32) -> &str {
        &self.files[file_id as usize].name
    }

    pub fn file_content(&self, file_id: u32) -> &str {
        &self.files[file_id as usize].content
    }

    /// Resolve a span to a 1-based line/column location.
    pub fn resolve(&self, span: Span) -> SourceLocation {
        let Some(file) = self.files.get(span.file_id as usize) else {
            return SourceLocation { file: "<unknown>".to_string(), line: 0, column: 0 };
        };

        let line_idx = match file.line_offsets.binary_search(&span.start) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let column = span.start - file.line_offsets[line_idx] + 1;

        SourceLocation {
            file: file.name.clone(),
            line: line_idx as u32 + 1,
            column,
        }
    }

    /// The source text of the line containing `span`, for snippet rendering.
    pub fn line_text(&self, span: Span) -> Option<&str> {
        let file = self.files.get(span.file_id as usize)?;
        let line_idx = match file.line_offsets.binary_search(&span.start) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let start = file.line_offsets[line_idx] as usize;
        let end = file
            .line_offsets
            .get(line_idx + 1)
            .map(|&o| o as usize - 1)
            .unwrap_or(file.content.len());
        file.content.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_line_and_column() {
        let mut sm = SourceManager::new();
        let id = sm.add_file("test.c", "int main(void) {\n  return 0;\n}\n".to_string());

        // `return` starts at byte 19: line 2, column 3
        let loc = sm.resolve(Span::new(19, 25, id));
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.file, "test.c");
    }

    #[test]
    fn line_text_snippet() {
        let mut sm = SourceManager::new();
        let id = sm.add_file("t.c", "a\nbb\nccc\n".to_string());
        assert_eq!(sm.line_text(Span::new(2, 3, id)), Some("bb"));
    }
}
