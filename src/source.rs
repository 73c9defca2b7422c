// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: source  —  translation units and their object paths
// ─────────────────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cpp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path:     PathBuf,
    /// File name up to the first `.` (`foo.ino.cpp` → `foo`).
    pub name:     String,
    pub language: Language,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let name = short_name(&path);
        let language = if path.extension().and_then(|e| e.to_str()) == Some("c") {
            Language::C
        } else {
            Language::Cpp
        };
        Self { path, name, language }
    }

    /// `<out_dir>/<name>.o`
    pub fn object_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(format!("{}.o", self.name))
    }

    /// File name for progress messages.
    pub fn display_name(&self) -> String {
        self.path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// File name without any extension.
pub fn short_name(path: &Path) -> String {
    let fname = path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    fname.split('.').next().unwrap_or_default().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_name_and_language() {
        let c = SourceFile::new("/src/blink.c");
        assert_eq!(c.name, "blink");
        assert_eq!(c.language, Language::C);

        let cpp = SourceFile::new("/src/sketch.ino.cpp");
        assert_eq!(cpp.name, "sketch");
        assert_eq!(cpp.language, Language::Cpp);
        assert_eq!(cpp.display_name(), "sketch.ino.cpp");
    }

    #[test]
    fn object_path_uses_short_name() {
        let src = SourceFile::new("/some dir/Wire.cpp");
        assert_eq!(src.object_path(Path::new("/out")), PathBuf::from("/out/Wire.o"));
    }
}
