//! Textual `#include` expansion for shader sources
//!
//! A line of the form `#include "name"` is replaced by the contents of `name`,
//! resolved against the shader root and expanded recursively. There is no
//! include guard: a file included twice is inlined twice. Recursion is bounded
//! so that a self-including file fails instead of overflowing the stack.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static INCLUDE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^\s*#include\s+"(?P<path>[^"]*)"\s*$"#).expect("include directive pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("{origin}:{line}: unable to open include file {path}: {source}")]
    UnableToOpenIncludeFile {
        origin: String,
        line: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin}:{line}: include depth limit of {limit} exceeded by \"{name}\"")]
    DepthExceeded { origin: String, line: usize, name: String, limit: usize },
}

/// Include expander bound to one shader root
#[derive(Debug, Clone)]
pub struct Preprocessor<'a> {
    root: &'a Path,
    max_depth: usize,
}

impl<'a> Preprocessor<'a> {
    pub fn new(root: &'a Path, max_depth: usize) -> Self {
        Self { root, max_depth }
    }

    /// Expands every include directive in `source`
    ///
    /// # Arguments
    /// * `source` - Shader text
    /// * `origin` - Name of the text's file, used in error messages
    ///
    /// # Returns
    /// The assembled source with each directive line replaced by the included text
    pub fn expand(&self, source: &str, origin: &str) -> Result<String, PreprocessError> {
        let mut output = String::with_capacity(source.len());
        self.expand_into(source, origin, 0, &mut output)?;
        Ok(output)
    }

    fn expand_into(&self, source: &str, origin: &str, depth: usize, output: &mut String) -> Result<(), PreprocessError> {
        for (index, line) in source.lines().enumerate() {
            let Some(captures) = INCLUDE_DIRECTIVE.captures(line) else {
                output.push_str(line);
                output.push('\n');
                continue;
            };

            let name = &captures["path"];
            if depth >= self.max_depth {
                return Err(PreprocessError::DepthExceeded {
                    origin: origin.to_string(),
                    line: index + 1,
                    name: name.to_string(),
                    limit: self.max_depth,
                });
            }

            let path = self.root.join(name);
            let included = std::fs::read_to_string(&path).map_err(|source| PreprocessError::UnableToOpenIncludeFile {
                origin: origin.to_string(),
                line: index + 1,
                path: path.clone(),
                source,
            })?;
            tracing::trace!(origin, name, depth, "inlining include");
            self.expand_into(&included, name, depth + 1, output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_include_is_inlined() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("util.glsl"), "float twice(float x) { return 2.0 * x; }\n").unwrap();

        let source = "#version 450\n#include \"util.glsl\"\nvoid main() {}\n";
        let expanded = Preprocessor::new(dir.path(), 8).expand(source, "main.comp").unwrap();
        assert_eq!(expanded, "#version 450\nfloat twice(float x) { return 2.0 * x; }\nvoid main() {}\n");
    }

    #[test]
    fn test_nested_and_repeated_includes() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/a.glsl"), "// a\n  #include \"lib/b.glsl\"  \n").unwrap();
        fs::write(dir.path().join("lib/b.glsl"), "// b").unwrap();

        let source = "#include \"lib/a.glsl\"\n#include \"lib/b.glsl\"\n";
        let expanded = Preprocessor::new(dir.path(), 8).expand(source, "main.comp").unwrap();
        // No include guard: b appears twice
        assert_eq!(expanded, "// a\n// b\n// b\n");
    }

    #[test]
    fn test_non_directive_lines_are_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = "// #include \"nothing.glsl\"\n#define INCLUDE 1\n";
        let expanded = Preprocessor::new(dir.path(), 8).expand(source, "main.comp").unwrap();
        assert_eq!(expanded, source);
    }

    #[test]
    fn test_missing_include_reports_origin_and_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = "#version 450\n#include \"missing.glsl\"\n";

        let err = Preprocessor::new(dir.path(), 8).expand(source, "main.comp").unwrap_err();
        match &err {
            PreprocessError::UnableToOpenIncludeFile { origin, line, path, .. } => {
                assert_eq!(origin, "main.comp");
                assert_eq!(*line, 2);
                assert_eq!(path, &dir.path().join("missing.glsl"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("main.comp:2: unable to open include file"));
    }

    #[test]
    fn test_self_include_hits_depth_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("loop.glsl"), "#include \"loop.glsl\"\n").unwrap();

        let err = Preprocessor::new(dir.path(), 4).expand("#include \"loop.glsl\"\n", "main.comp").unwrap_err();
        assert!(matches!(err, PreprocessError::DepthExceeded { limit: 4, ref origin, .. } if origin == "loop.glsl"));
    }
}
