use std::fmt;
use std::sync::Arc;

/// A source location: file name plus 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loc {
    pub file: Arc<str>,
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn new(file: Arc<str>, line: u32, col: u32) -> Self {
        Self { file, line, col }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// One input file, split into lines so diagnostics and the `-c` comment
/// emitter can quote the original text.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: Arc<str>,
    pub lines: Vec<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<Arc<str>>, text: &str) -> Self {
        Self {
            name: name.into(),
            lines: text.lines().map(str::to_owned).collect(),
        }
    }
}

/// The ordered set of input files forming one translation unit.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<Arc<str>>, text: &str) -> &SourceFile {
        self.files.push(SourceFile::new(name, text));
        self.files.last().unwrap()
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn has_file(&self, basename: &str) -> bool {
        self.files
            .iter()
            .any(|f| f.name.rsplit(['/', '\\']).next() == Some(basename))
    }

    /// The source text of the line a location points at, if still in range.
    pub fn line_text(&self, loc: &Loc) -> Option<&str> {
        let file = self.files.iter().find(|f| f.name == loc.file)?;
        file.lines.get(loc.line.checked_sub(1)? as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_lookup() {
        let mut map = SourceMap::new();
        map.add("a.c", "int x;\nint y;\n");
        let loc = Loc::new("a.c".into(), 2, 1);
        assert_eq!(map.line_text(&loc), Some("int y;"));
        assert_eq!(loc.to_string(), "a.c:2:1");
    }

    #[test]
    fn basename_match() {
        let mut map = SourceMap::new();
        map.add("include/vm_api.h", "");
        assert!(map.has_file("vm_api.h"));
        assert!(!map.has_file("api.h"));
    }
}
