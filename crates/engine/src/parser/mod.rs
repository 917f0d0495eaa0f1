//! Component B — Parser Registry.
//!
//! `parse(path, bytes) -> ParseResult` (spec.md §4.B contract) dispatches to
//! the syntactic tree-sitter parser for languages it covers, and to the
//! generic structural parser otherwise. Parse errors are swallowed and
//! returned as an advisory string rather than propagated, matching spec.md
//! §4.B ("On parse error ... do not fail indexing") and the teacher's own
//! `ast::parse_file` / `stubs::extract_stubs`, both of which return `None`
//! or a best-effort result rather than an `Err` on malformed input.

pub mod generic;
#[cfg(feature = "treesitter")]
pub mod syntactic;

use codesift_core::hash::sha256_hex;
use codesift_core::types::{Chunk, InfoSnippet};

/// Output of parsing a single file (spec.md §4.B contract).
#[derive(Debug, Default)]
pub struct ParseResult {
    pub chunks: Vec<Chunk>,
    pub snippets: Vec<InfoSnippet>,
    pub file_hash: String,
    /// Advisory-only: set when the parser fell back to a worse strategy or
    /// hit malformed input. Never causes `parse` to fail indexing.
    pub warning: Option<String>,
}

/// Languages the syntactic (tree-sitter) parser covers. Anything else goes
/// through the generic structural parser.
fn syntactic_language(ext: &str) -> bool {
    matches!(ext, "rs" | "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "py" | "pyi" | "go" | "c" | "h" | "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" | "java")
}

/// Derive the display language name from a file extension.
pub fn language_for_ext(ext: &str) -> &'static str {
    match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" | "pyi" => "python",
        "go" => "go",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "java" => "java",
        "m" | "mm" => "objective-c",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "md" | "markdown" => "markdown",
        _ => "text",
    }
}

/// Parse a single file's bytes into chunks + snippets (spec.md §4.B).
///
/// Never returns `Err`: on any parse failure the result carries an empty
/// chunk/snippet list, a stable `file_hash`, and an advisory `warning`.
pub fn parse(path: &str, bytes: &[u8]) -> ParseResult {
    let file_hash = sha256_hex(bytes);
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();

    let content = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => {
            return ParseResult {
                chunks: Vec::new(),
                snippets: Vec::new(),
                file_hash,
                warning: Some(format!("{path}: not valid UTF-8, skipped")),
            }
        }
    };

    #[cfg(feature = "treesitter")]
    if syntactic_language(&ext) {
        match syntactic::parse(path, content, &ext, &file_hash) {
            Ok((chunks, snippets)) if !chunks.is_empty() => {
                return ParseResult { chunks, snippets, file_hash, warning: None }
            }
            Ok(_) => {
                // Tree-sitter produced no symbols (e.g. an empty file); fall
                // through to the generic parser rather than report nothing.
            }
            Err(e) => {
                return generic_fallback(path, content, &ext, file_hash, Some(e));
            }
        }
    }
    #[cfg(not(feature = "treesitter"))]
    let _ = syntactic_language(&ext);

    generic_fallback(path, content, &ext, file_hash, None)
}

fn generic_fallback(
    path: &str,
    content: &str,
    ext: &str,
    file_hash: String,
    warning: Option<String>,
) -> ParseResult {
    let (chunks, snippets) = generic::parse(path, content, ext, &file_hash);
    ParseResult { chunks, snippets, file_hash, warning }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_does_not_fail_indexing() {
        let result = parse("weird.bin", &[0xff, 0xfe, 0x00, 0xff]);
        assert!(result.chunks.is_empty());
        assert!(result.warning.is_some());
        assert!(!result.file_hash.is_empty());
    }

    #[test]
    fn language_for_ext_covers_primary_languages() {
        assert_eq!(language_for_ext("rs"), "rust");
        assert_eq!(language_for_ext("tsx"), "typescript");
        assert_eq!(language_for_ext("unknownext"), "text");
    }
}
