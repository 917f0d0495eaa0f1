//! Syntactic (tree-sitter) half of the Parser Registry.
//!
//! Directly generalizes `codescope-server/src/ast.rs`'s recursive
//! `walk_node`/`classify_node`/`extract_name`/`extract_signature` family.
//! The teacher only extracts name/kind/line-range/one-line signature for its
//! symbol index; this module additionally attaches `doc_comment`,
//! `breadcrumb`, `symbols`, `references`, and `conformances` per spec.md
//! §4.B, because the hybrid search engine's re-ranker (component H) needs
//! every one of those fields to compute its boosts.

use std::collections::HashSet;

use codesift_core::types::{Chunk, ChunkKind, InfoSnippet};
use tree_sitter::{Language, Node, Parser};

/// Map a file extension to its tree-sitter grammar.
fn language_for_ext(ext: &str) -> Option<Language> {
    match ext {
        "rs" => Some(tree_sitter_rust::LANGUAGE.into()),
        "ts" | "tsx" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "py" | "pyi" => Some(tree_sitter_python::LANGUAGE.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        "c" | "h" => Some(tree_sitter_c::LANGUAGE.into()),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(tree_sitter_cpp::LANGUAGE.into()),
        "java" => Some(tree_sitter_java::LANGUAGE.into()),
        _ => None,
    }
}

fn is_rust(ext: &str) -> bool {
    ext == "rs"
}
fn is_python(ext: &str) -> bool {
    matches!(ext, "py" | "pyi")
}
fn is_ts_js(ext: &str) -> bool {
    matches!(ext, "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs")
}
fn is_c_cpp(ext: &str) -> bool {
    matches!(ext, "c" | "h" | "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx")
}
fn is_go(ext: &str) -> bool {
    ext == "go"
}

/// Map a tree-sitter node kind to a [`ChunkKind`], given the file's language.
fn classify_node(kind: &str, ext: &str) -> Option<ChunkKind> {
    match kind {
        "function_item" => Some(ChunkKind::Function),
        "struct_item" => Some(ChunkKind::Struct),
        "enum_item" => Some(ChunkKind::Enum),
        "trait_item" => Some(ChunkKind::Protocol),
        "impl_item" => Some(ChunkKind::Extension),
        "type_item" => Some(ChunkKind::Typealias),
        "const_item" | "static_item" => Some(ChunkKind::Constant),
        "macro_definition" if is_rust(ext) => Some(ChunkKind::Macro),

        "function_declaration" => Some(ChunkKind::Function),
        "class_declaration" => Some(ChunkKind::Class),
        "interface_declaration" => Some(ChunkKind::Protocol),
        "type_alias_declaration" => Some(ChunkKind::Typealias),
        "method_definition" => Some(ChunkKind::Method),

        "function_definition" if is_python(ext) => Some(ChunkKind::Function),
        "function_definition" if is_c_cpp(ext) => Some(ChunkKind::CFunction),
        "class_definition" => Some(ChunkKind::Class),

        "method_declaration" if is_go(ext) => Some(ChunkKind::Method),
        "type_spec" if is_go(ext) => Some(ChunkKind::Typealias),

        "struct_specifier" => Some(ChunkKind::CStruct),
        "enum_specifier" => Some(ChunkKind::Enum),
        "class_specifier" => Some(ChunkKind::Class),
        "type_definition" if is_c_cpp(ext) => Some(ChunkKind::CTypedef),
        "preproc_def" | "preproc_function_def" if is_c_cpp(ext) => Some(ChunkKind::CMacro),

        "enum_declaration" => Some(ChunkKind::Enum),
        "record_declaration" => Some(ChunkKind::Struct),

        _ => None,
    }
}

fn extract_name<'a>(node: &Node<'a>, source: &'a [u8], ext: &str) -> Option<String> {
    for field in ["name", "type"] {
        if let Some(name_node) = node.child_by_field_name(field) {
            if let Ok(text) = name_node.utf8_text(source) {
                let name = text.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    if node.kind() == "impl_item" && is_rust(ext) {
        if let Some(type_node) = node.child_by_field_name("type") {
            if let Ok(text) = type_node.utf8_text(source) {
                return Some(text.trim().to_string());
            }
        }
    }

    if node.kind() == "type_spec" && is_go(ext) {
        if let Some(child) = node.named_child(0) {
            if let Ok(text) = child.utf8_text(source) {
                return Some(text.trim().to_string());
            }
        }
    }

    if (node.kind() == "function_definition" && is_c_cpp(ext)) || node.kind() == "function_item" {
        if let Some(decl) = node.child_by_field_name("declarator") {
            if let Some(name_node) = decl.child_by_field_name("declarator") {
                if let Ok(text) = name_node.utf8_text(source) {
                    return Some(text.trim().to_string());
                }
            }
            if let Ok(text) = decl.utf8_text(source) {
                let s = text.trim();
                if let Some(paren) = s.find('(') {
                    return Some(s[..paren].trim().to_string());
                }
                return Some(s.to_string());
            }
        }
    }

    None
}

/// First line of the node up to its body opener, with the access modifier
/// (if any) preserved verbatim — spec.md §4.B "signature ... with public
/// modifier preserved".
fn extract_signature(node: &Node, source: &[u8], ext: &str) -> String {
    let text = node.utf8_text(source).unwrap_or("");
    let first_line = text.lines().next().unwrap_or("").trim();

    let sig = if is_python(ext) {
        match first_line.find(':') {
            Some(colon) => &first_line[..=colon],
            None => first_line,
        }
    } else if let Some(brace) = first_line.find('{') {
        first_line[..brace].trim()
    } else {
        first_line
    };

    if sig.len() > 240 {
        let end = (0..=240).rev().find(|&i| sig.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &sig[..end])
    } else {
        sig.to_string()
    }
}

/// Contiguous `///`/`//!`/`/** */`/`#`-style comment lines immediately above
/// `node`'s start line are its doc comment (spec.md §4.B "adjacent `///`").
fn extract_doc_comment(node: &Node, source_text: &str, ext: &str) -> Option<String> {
    let lines: Vec<&str> = source_text.lines().collect();
    let start_row = node.start_position().row;
    if start_row == 0 {
        return None;
    }

    let is_doc_line = |line: &str| -> bool {
        let t = line.trim();
        if is_python(ext) {
            t.starts_with('#')
        } else {
            t.starts_with("///") || t.starts_with("//!") || t.starts_with("/**") || t.starts_with('*') || t.starts_with("//")
        }
    };

    let mut collected = Vec::new();
    let mut row = start_row;
    while row > 0 {
        let prev = lines.get(row - 1).copied().unwrap_or("");
        if prev.trim().is_empty() {
            break;
        }
        if !is_doc_line(prev) {
            break;
        }
        collected.push(prev.trim().to_string());
        row -= 1;
    }

    if collected.is_empty() {
        None
    } else {
        collected.reverse();
        Some(collected.join("\n"))
    }
}

/// Names after `:`/`extends`/`implements`/base-class parens, i.e. everything
/// a type declaration "conforms to" (spec.md §4.B "conformances").
fn extract_conformances(node: &Node, source: &[u8], ext: &str) -> Vec<String> {
    let text = node.utf8_text(source).unwrap_or("");
    let header = text.lines().next().unwrap_or("");
    let mut names = Vec::new();

    if is_rust(ext) {
        // `impl Trait for Type` or `trait Sub: Super1 + Super2`
        if node.kind() == "impl_item" {
            if let Some(trait_node) = node.child_by_field_name("trait") {
                if let Ok(t) = trait_node.utf8_text(source) {
                    names.push(t.trim().to_string());
                }
            }
        } else if let Some(colon) = header.find(':') {
            let rest = header[colon + 1..].trim_end_matches('{').trim();
            for part in rest.split('+') {
                let p = part.trim().trim_end_matches("where").trim();
                if !p.is_empty() && p.chars().next().is_some_and(|c| c.is_uppercase()) {
                    names.push(p.to_string());
                }
            }
        }
    } else if is_ts_js(ext) {
        if let Some(extends_idx) = header.find("extends") {
            let after = &header[extends_idx + "extends".len()..];
            let stop = after.find('{').unwrap_or(after.len());
            let stop = stop.min(after.find("implements").unwrap_or(usize::MAX));
            for n in after[..stop.min(after.len())].split(',') {
                let n = n.trim();
                if !n.is_empty() {
                    names.push(n.to_string());
                }
            }
        }
        if let Some(impl_idx) = header.find("implements") {
            let after = &header[impl_idx + "implements".len()..];
            let stop = after.find('{').unwrap_or(after.len());
            for n in after[..stop].split(',') {
                let n = n.trim();
                if !n.is_empty() {
                    names.push(n.to_string());
                }
            }
        }
    } else if is_python(ext) {
        if let (Some(open), Some(close)) = (header.find('('), header.rfind(')')) {
            if close > open {
                for n in header[open + 1..close].split(',') {
                    let n = n.trim();
                    if !n.is_empty() && n != "object" {
                        names.push(n.to_string());
                    }
                }
            }
        }
    }

    names
}

/// All identifier-like tokens referenced inside `node`, excluding the
/// declaration's own name, capped to keep chunk metadata bounded
/// (spec.md doesn't bound `references`, but an unbounded list defeats the
/// re-ranker's rare-term boost by diluting it with noise).
fn collect_references(node: &Node, source: &[u8], own_name: &str) -> Vec<String> {
    const MAX_REFERENCES: usize = 64;
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    fn walk<'a>(
        node: &Node<'a>,
        source: &'a [u8],
        own_name: &str,
        seen: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        if out.len() >= 64 {
            return;
        }
        let kind = node.kind();
        if kind == "identifier" || kind == "type_identifier" || kind == "field_identifier" {
            if let Ok(text) = node.utf8_text(source) {
                if text != own_name && !text.is_empty() && seen.insert(text.to_string()) {
                    out.push(text.to_string());
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if out.len() >= MAX_REFERENCES {
                return;
            }
            walk(&child, source, own_name, seen, out);
        }
    }

    walk(node, source, own_name, &mut seen, &mut out);
    out
}

/// Parse `content` (already known to be the given `ext`) into chunks.
/// Returns `Err` only when tree-sitter itself fails to produce a tree, not
/// when it produces a tree with zero recognized symbols (that is simply an
/// empty chunk list, handled by the caller).
pub fn parse(
    path: &str,
    content: &str,
    ext: &str,
    file_hash: &str,
) -> Result<(Vec<Chunk>, Vec<InfoSnippet>), String> {
    let lang = match language_for_ext(ext) {
        Some(l) => l,
        None => return Ok((Vec::new(), Vec::new())),
    };

    let mut parser = Parser::new();
    parser.set_language(&lang).map_err(|e| format!("{path}: failed to set grammar: {e}"))?;

    let tree = parser.parse(content, None).ok_or_else(|| format!("{path}: tree-sitter parse failed"))?;
    let root = tree.root_node();
    let source = content.as_bytes();
    let language_name = super::language_for_ext(ext);

    // First pass: walk the tree with a simple recursive descent (mirroring
    // `codescope-server/src/ast.rs::walk_node`), building one Chunk per
    // recognized node and a breadcrumb of names along the way.
    let mut chunks = Vec::new();
    let mut crumb_stack: Vec<String> = Vec::new();
    collect_chunks(&root, source, ext, file_hash, path, language_name, &mut crumb_stack, &mut chunks);

    Ok((chunks, Vec::new()))
}

#[allow(clippy::too_many_arguments)]
fn collect_chunks(
    node: &Node,
    source: &[u8],
    ext: &str,
    file_hash: &str,
    path: &str,
    language: &str,
    crumb_stack: &mut Vec<String>,
    out: &mut Vec<Chunk>,
) {
    let kind_str = node.kind();

    if let Some(mut kind) = classify_node(kind_str, ext) {
        let name = extract_name(node, source, ext).unwrap_or_else(|| "<anonymous>".to_string());
        if !crumb_stack.is_empty() && matches!(kind, ChunkKind::Function) && !is_go(ext) {
            kind = ChunkKind::Method;
        }

        let start_line = node.start_position().row + 1;
        let end_line = node.end_position().row + 1;
        let content = node.utf8_text(source).unwrap_or("").to_string();
        let signature = extract_signature(node, source, ext);
        let doc_comment =
            extract_doc_comment(node, std::str::from_utf8(source).unwrap_or(""), ext);
        let conformances = extract_conformances(node, source, ext);
        let references = collect_references(node, source, &name);
        let breadcrumb = if crumb_stack.is_empty() {
            None
        } else {
            Some(crumb_stack.join(" > "))
        };

        let mut chunk = Chunk::new(path, start_line, end_line, content, kind, language, file_hash);
        chunk.symbols = vec![name.clone()];
        chunk.references = references;
        chunk.doc_comment = doc_comment;
        chunk.signature = Some(signature);
        chunk.breadcrumb = breadcrumb;
        chunk.conformances = conformances;
        out.push(chunk);

        crumb_stack.push(name);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            collect_chunks(&child, source, ext, file_hash, path, language, crumb_stack, out);
        }
        crumb_stack.pop();
    } else {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            collect_chunks(&child, source, ext, file_hash, path, language, crumb_stack, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rust_struct_and_impl_with_conformance() {
        let src = r#"
/// Stores chunks.
pub struct ChunkStore {
    count: usize,
}

impl ChunkSource for ChunkStore {
    fn len(&self) -> usize {
        self.count
    }
}
"#;
        let (chunks, _) = parse("src/lib.rs", src, "rs", "filehash").unwrap();
        let store = chunks.iter().find(|c| c.symbols.contains(&"ChunkStore".to_string()));
        assert!(store.is_some(), "expected a ChunkStore chunk, got {chunks:?}");
        let store = store.unwrap();
        assert_eq!(store.doc_comment.as_deref(), Some("/// Stores chunks."));
        assert!(store.signature.as_deref().unwrap().contains("pub struct ChunkStore"));

        let imp = chunks.iter().find(|c| c.conformances.contains(&"ChunkSource".to_string()));
        assert!(imp.is_some(), "expected an impl chunk conforming to ChunkSource");

        let method = chunks.iter().find(|c| c.symbols.contains(&"len".to_string()));
        assert!(method.is_some());
        assert_eq!(method.unwrap().kind, ChunkKind::Method);
        assert!(method.unwrap().breadcrumb.is_some());
    }

    #[test]
    fn unsupported_extension_returns_empty_not_error() {
        let (chunks, snippets) = parse("notes.txt", "hello world", "txt", "h").unwrap();
        assert!(chunks.is_empty());
        assert!(snippets.is_empty());
    }
}
