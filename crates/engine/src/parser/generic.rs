//! Generic structural fallback parser.
//!
//! Generalizes `codescope-server/src/stubs.rs`'s `classify_language` +
//! `extract_stubs` family: the teacher classifies a file's "family" (brace,
//! indent, config) to decide how to produce *stub* symbol listings; this
//! module reuses that same family classification but emits real `Chunk`
//! boundaries instead of stub text, plus Markdown heading-based
//! `InfoSnippet`s with a breadcrumb built from the heading stack, since this
//! engine (unlike the teacher) must index JSON/YAML/Markdown/ObjC/C content
//! for full-text and semantic search rather than just list their top-level
//! symbols.

use codesift_core::types::{Chunk, ChunkKind, InfoSnippet, SnippetKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Family {
    /// Brace-delimited source the syntactic parser doesn't cover (ObjC, bare C).
    Brace,
    /// Key: value config data (YAML).
    Indent,
    /// Structured data (JSON).
    Config,
    /// Prose with heading structure (Markdown).
    Markdown,
    /// Nothing recognized; index the whole file as one opaque chunk.
    Opaque,
}

fn classify_language(ext: &str) -> Family {
    match ext {
        "m" | "mm" | "c" | "h" => Family::Brace,
        "yaml" | "yml" | "toml" | "ini" => Family::Indent,
        "json" => Family::Config,
        "md" | "markdown" => Family::Markdown,
        _ => Family::Opaque,
    }
}

/// Parse with the structural fallback strategy. Infallible: worst case, the
/// whole file becomes a single opaque chunk (spec.md §4.B "never produce
/// zero chunks for a non-empty file").
pub fn parse(path: &str, content: &str, ext: &str, file_hash: &str) -> (Vec<Chunk>, Vec<InfoSnippet>) {
    if content.trim().is_empty() {
        return (Vec::new(), Vec::new());
    }

    let language = super::language_for_ext(ext);
    match classify_language(ext) {
        Family::Brace => brace_chunks(path, content, language, file_hash),
        Family::Indent => indent_chunks(path, content, language, file_hash),
        Family::Config => config_chunks(path, content, language, file_hash),
        Family::Markdown => markdown_chunks(path, content, language, file_hash),
        Family::Opaque => (vec![whole_file_chunk(path, content, language, file_hash)], Vec::new()),
    }
}

fn whole_file_chunk(path: &str, content: &str, language: &str, file_hash: &str) -> Chunk {
    let lines = content.lines().count().max(1);
    let mut chunk =
        Chunk::new(path, 1, lines, content.to_string(), ChunkKind::Unknown, language, file_hash);
    chunk.symbols = vec![path.rsplit('/').next().unwrap_or(path).to_string()];
    chunk
}

/// Brace-delimited: each top-level `@interface`/`@implementation`/function
/// (ObjC) or free function (bare C) becomes its own chunk, by tracking brace
/// depth the same way `stubs::stub_brace_based` walks lines.
fn brace_chunks(path: &str, content: &str, language: &str, file_hash: &str) -> (Vec<Chunk>, Vec<InfoSnippet>) {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut depth: i32 = 0;
    let mut block_start: Option<usize> = None;
    let mut block_header = String::new();

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let is_decl_start = depth == 0
            && (trimmed.starts_with("@interface")
                || trimmed.starts_with("@implementation")
                || trimmed.starts_with("@protocol")
                || is_c_function_header(trimmed));

        if is_decl_start && block_start.is_none() {
            block_start = Some(idx);
            block_header = trimmed.to_string();
        }

        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth = (depth - 1).max(0),
                _ => {}
            }
        }

        if let Some(start) = block_start {
            let closed_back_to_top = depth == 0 && line.contains('}');
            let is_end_directive = trimmed.starts_with("@end");
            if closed_back_to_top || is_end_directive {
                let end = idx;
                let text = lines[start..=end].join("\n");
                let kind = classify_brace_header(&block_header, ext_of(path));
                let name = extract_brace_name(&block_header).unwrap_or_else(|| "<anonymous>".to_string());
                let mut chunk = Chunk::new(path, start + 1, end + 1, text, kind, language, file_hash);
                chunk.symbols = vec![name];
                chunk.signature = Some(block_header.clone());
                chunks.push(chunk);
                block_start = None;
            }
        }
    }

    if chunks.is_empty() {
        chunks.push(whole_file_chunk(path, content, language, file_hash));
    }
    (chunks, Vec::new())
}

fn ext_of(path: &str) -> &str {
    path.rsplit_once('.').map(|(_, e)| e).unwrap_or("")
}

fn is_c_function_header(line: &str) -> bool {
    !line.is_empty()
        && line.ends_with(')')
        && !line.starts_with('#')
        && !line.starts_with("//")
        && !line.ends_with(';')
}

fn classify_brace_header(header: &str, ext: &str) -> ChunkKind {
    if header.starts_with("@interface") {
        ChunkKind::ObjcInterface
    } else if header.starts_with("@implementation") {
        ChunkKind::ObjcImpl
    } else if header.starts_with("@protocol") {
        ChunkKind::Protocol
    } else if ext == "c" || ext == "h" {
        ChunkKind::CFunction
    } else {
        ChunkKind::Unknown
    }
}

fn extract_brace_name(header: &str) -> Option<String> {
    let without_directive = header.splitn(2, ' ').nth(1)?.trim();
    let name: String =
        without_directive.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// YAML/TOML/INI: each top-level (unindented) `key:` starts a new chunk that
/// runs until the next top-level key.
fn indent_chunks(path: &str, content: &str, language: &str, file_hash: &str) -> (Vec<Chunk>, Vec<InfoSnippet>) {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut current_key: Option<String> = None;

    let is_top_level_key = |line: &str| -> bool {
        !line.is_empty()
            && !line.starts_with(' ')
            && !line.starts_with('\t')
            && !line.starts_with('-')
            && !line.starts_with('#')
            && line.contains(':')
    };

    for (idx, line) in lines.iter().enumerate() {
        if is_top_level_key(line) {
            if let Some(key) = current_key.take() {
                push_indent_chunk(path, &lines, start, idx, &key, language, file_hash, &mut chunks);
            }
            start = idx;
            current_key = line.split(':').next().map(|s| s.trim().to_string());
        }
    }
    if let Some(key) = current_key {
        push_indent_chunk(path, &lines, start, lines.len(), &key, language, file_hash, &mut chunks);
    }

    if chunks.is_empty() {
        chunks.push(whole_file_chunk(path, content, language, file_hash));
    }
    (chunks, Vec::new())
}

#[allow(clippy::too_many_arguments)]
fn push_indent_chunk(
    path: &str,
    lines: &[&str],
    start: usize,
    end: usize,
    key: &str,
    language: &str,
    file_hash: &str,
    out: &mut Vec<Chunk>,
) {
    if start >= end {
        return;
    }
    let text = lines[start..end].join("\n");
    let mut chunk =
        Chunk::new(path, start + 1, end, text, ChunkKind::YamlMapping, language, file_hash);
    chunk.symbols = vec![key.to_string()];
    out.push(chunk);
}

/// JSON: each top-level object member becomes a chunk by tracking brace/
/// bracket depth, so a large config file doesn't collapse into one opaque
/// blob that drowns out BM25 term weighting.
fn config_chunks(path: &str, content: &str, language: &str, file_hash: &str) -> (Vec<Chunk>, Vec<InfoSnippet>) {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0usize;
    let mut current_key: Option<String> = None;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if depth == 1 && current_key.is_none() {
            if let Some(key) = extract_json_key(trimmed) {
                current_key = Some(key);
                start = idx;
            }
        }

        for ch in line.chars() {
            match ch {
                '{' | '[' => depth += 1,
                '}' | ']' => depth -= 1,
                _ => {}
            }
        }

        if depth <= 1 {
            if let Some(key) = current_key.take() {
                let end = idx + 1;
                let text = lines[start..end.min(lines.len())].join("\n");
                let mut chunk = Chunk::new(
                    path,
                    start + 1,
                    end,
                    text,
                    ChunkKind::JsonObject,
                    language,
                    file_hash,
                );
                chunk.symbols = vec![key];
                chunks.push(chunk);
            }
        }
    }

    if chunks.is_empty() {
        chunks.push(whole_file_chunk(path, content, language, file_hash));
    }
    (chunks, Vec::new())
}

fn extract_json_key(line: &str) -> Option<String> {
    let line = line.trim_start();
    if !line.starts_with('"') {
        return None;
    }
    let rest = &line[1..];
    let end = rest.find('"')?;
    let key = &rest[..end];
    if rest[end + 1..].trim_start().starts_with(':') {
        Some(key.to_string())
    } else {
        None
    }
}

/// Markdown: one chunk per heading-delimited section, plus a mirrored
/// [`InfoSnippet`] per section so prose documentation participates in the
/// "documentation and examples" side-index spec.md §3.2 describes, with a
/// breadcrumb built from the enclosing heading stack (e.g. `Setup > Install`).
fn markdown_chunks(path: &str, content: &str, language: &str, file_hash: &str) -> (Vec<Chunk>, Vec<InfoSnippet>) {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut snippets = Vec::new();
    let mut heading_stack: Vec<(usize, String)> = Vec::new();

    let mut section_start = 0usize;
    let mut section_title = String::new();
    let mut section_breadcrumb: Option<String> = None;

    let flush = |start: usize,
                 end: usize,
                 title: &str,
                 breadcrumb: &Option<String>,
                 chunks: &mut Vec<Chunk>,
                 snippets: &mut Vec<InfoSnippet>| {
        if start >= end || title.is_empty() {
            return;
        }
        let text = lines[start..end].join("\n");
        let mut chunk =
            Chunk::new(path, start + 1, end, text.clone(), ChunkKind::MarkdownSection, language, file_hash);
        chunk.symbols = vec![title.to_string()];
        chunk.breadcrumb = breadcrumb.clone();
        chunks.push(chunk);

        let mut snippet = InfoSnippet::new(
            path,
            start + 1,
            end,
            text,
            SnippetKind::MarkdownSection,
            language,
            file_hash,
        );
        snippet.breadcrumb = breadcrumb.clone();
        snippets.push(snippet);
    };

    for (idx, line) in lines.iter().enumerate() {
        if let Some((level, title)) = parse_heading(line) {
            flush(section_start, idx, &section_title, &section_breadcrumb, &mut chunks, &mut snippets);

            heading_stack.retain(|(l, _)| *l < level);
            heading_stack.push((level, title.clone()));
            section_breadcrumb = if heading_stack.len() > 1 {
                Some(
                    heading_stack[..heading_stack.len() - 1]
                        .iter()
                        .map(|(_, t)| t.as_str())
                        .collect::<Vec<_>>()
                        .join(" > "),
                )
            } else {
                None
            };
            section_start = idx;
            section_title = title;
        }
    }
    flush(section_start, lines.len(), &section_title, &section_breadcrumb, &mut chunks, &mut snippets);

    if chunks.is_empty() {
        chunks.push(whole_file_chunk(path, content, language, file_hash));
    }
    (chunks, snippets)
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let title = trimmed[level..].trim();
    if title.is_empty() {
        None
    } else {
        Some((level, title.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_produces_no_chunks() {
        let (chunks, snippets) = parse("empty.json", "   \n  ", "json", "h");
        assert!(chunks.is_empty());
        assert!(snippets.is_empty());
    }

    #[test]
    fn json_top_level_keys_become_separate_chunks() {
        let src = "{\n  \"name\": \"codesift\",\n  \"version\": \"0.1.0\"\n}\n";
        let (chunks, _) = parse("package.json", src, "json", "h");
        let names: Vec<&String> = chunks.iter().flat_map(|c| c.symbols.iter()).collect();
        assert!(names.iter().any(|n| n.as_str() == "name"));
        assert!(names.iter().any(|n| n.as_str() == "version"));
    }

    #[test]
    fn markdown_sections_nest_breadcrumb_from_heading_stack() {
        let src = "# Guide\n\nintro\n\n## Setup\n\nstep one\n\n### Install\n\nrun this\n";
        let (chunks, snippets) = parse("README.md", src, "md", "h");
        assert_eq!(chunks.len(), snippets.len());
        let install = chunks.iter().find(|c| c.symbols.contains(&"Install".to_string())).unwrap();
        assert_eq!(install.breadcrumb.as_deref(), Some("Guide > Setup"));
    }

    #[test]
    fn objc_interface_becomes_a_chunk() {
        let src = "@interface Foo : NSObject\n- (void)bar;\n@end\n";
        let (chunks, _) = parse("Foo.m", src, "m", "h");
        assert!(chunks.iter().any(|c| c.symbols.contains(&"Foo".to_string())));
    }
}
