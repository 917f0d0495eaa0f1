//! Core entities: [`Chunk`], [`InfoSnippet`], [`FileRecord`], [`ConformanceEdge`],
//! and the closed [`ChunkKind`] enumeration (spec.md §3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CodesiftError;
use crate::hash::sha256_hex;

/// Opaque unique identity for a chunk or snippet (spec.md §3.1, "Identity").
pub type ChunkId = Uuid;

/// A closed set of construct kinds a parser can emit (spec.md §3.2).
///
/// New languages should map onto one of these rather than growing the enum,
/// the way `codescope-server/src/ast.rs`'s `SymbolKind` stays a small closed
/// set even though it covers eight languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkKind {
    Function,
    Method,
    Initializer,
    Deinitializer,
    Subscript,
    Class,
    Struct,
    Enum,
    Protocol,
    Extension,
    Actor,
    Macro,
    Typealias,
    Variable,
    Constant,

    ObjcInterface,
    ObjcImpl,
    ObjcMethod,
    ObjcProperty,
    ObjcCategory,

    CFunction,
    CStruct,
    CTypedef,
    CMacro,

    JsonObject,
    JsonArray,
    YamlMapping,
    YamlSequence,

    MarkdownSection,
    MarkdownCodeBlock,
    Comment,

    File,
    Unknown,
}

impl ChunkKind {
    /// Type-shaped declarations: classes, structs, enums, protocols,
    /// extensions, actors, C structs/typedefs, JSON/YAML containers.
    pub fn is_type_declaration(&self) -> bool {
        matches!(
            self,
            ChunkKind::Class
                | ChunkKind::Struct
                | ChunkKind::Enum
                | ChunkKind::Protocol
                | ChunkKind::Extension
                | ChunkKind::Actor
                | ChunkKind::ObjcInterface
                | ChunkKind::ObjcImpl
                | ChunkKind::ObjcCategory
                | ChunkKind::CStruct
                | ChunkKind::CTypedef
                | ChunkKind::JsonObject
                | ChunkKind::JsonArray
                | ChunkKind::YamlMapping
                | ChunkKind::YamlSequence
        )
    }

    /// Invocable constructs: functions/methods/initializers/macros.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            ChunkKind::Function
                | ChunkKind::Method
                | ChunkKind::Initializer
                | ChunkKind::Deinitializer
                | ChunkKind::Subscript
                | ChunkKind::Macro
                | ChunkKind::ObjcMethod
                | ChunkKind::CFunction
                | ChunkKind::CMacro
        )
    }

    /// Coarse language family, used by the re-ranker's conceptual-query
    /// boost and by statistics reporting.
    pub fn language_family(&self) -> LanguageFamily {
        match self {
            ChunkKind::ObjcInterface
            | ChunkKind::ObjcImpl
            | ChunkKind::ObjcMethod
            | ChunkKind::ObjcProperty
            | ChunkKind::ObjcCategory => LanguageFamily::ObjectiveC,
            ChunkKind::CFunction | ChunkKind::CStruct | ChunkKind::CTypedef | ChunkKind::CMacro => {
                LanguageFamily::C
            }
            ChunkKind::JsonObject | ChunkKind::JsonArray => LanguageFamily::Json,
            ChunkKind::YamlMapping | ChunkKind::YamlSequence => LanguageFamily::Yaml,
            ChunkKind::MarkdownSection | ChunkKind::MarkdownCodeBlock => LanguageFamily::Markdown,
            ChunkKind::Comment | ChunkKind::File | ChunkKind::Unknown => LanguageFamily::Other,
            _ => LanguageFamily::Swifty,
        }
    }

    /// Parse the wire/storage form (kebab-case name) back into a [`ChunkKind`].
    pub fn parse(s: &str) -> Result<Self, CodesiftError> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| CodesiftError::InvalidKind(s.to_string()))
    }

    /// The wire/storage form of this kind (kebab-case).
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Method => "method",
            ChunkKind::Initializer => "initializer",
            ChunkKind::Deinitializer => "deinitializer",
            ChunkKind::Subscript => "subscript",
            ChunkKind::Class => "class",
            ChunkKind::Struct => "struct",
            ChunkKind::Enum => "enum",
            ChunkKind::Protocol => "protocol",
            ChunkKind::Extension => "extension",
            ChunkKind::Actor => "actor",
            ChunkKind::Macro => "macro",
            ChunkKind::Typealias => "typealias",
            ChunkKind::Variable => "variable",
            ChunkKind::Constant => "constant",
            ChunkKind::ObjcInterface => "objc-interface",
            ChunkKind::ObjcImpl => "objc-impl",
            ChunkKind::ObjcMethod => "objc-method",
            ChunkKind::ObjcProperty => "objc-property",
            ChunkKind::ObjcCategory => "objc-category",
            ChunkKind::CFunction => "c-function",
            ChunkKind::CStruct => "c-struct",
            ChunkKind::CTypedef => "c-typedef",
            ChunkKind::CMacro => "c-macro",
            ChunkKind::JsonObject => "json-object",
            ChunkKind::JsonArray => "json-array",
            ChunkKind::YamlMapping => "yaml-mapping",
            ChunkKind::YamlSequence => "yaml-sequence",
            ChunkKind::MarkdownSection => "markdown-section",
            ChunkKind::MarkdownCodeBlock => "markdown-code-block",
            ChunkKind::Comment => "comment",
            ChunkKind::File => "file",
            ChunkKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageFamily {
    Swifty,
    ObjectiveC,
    C,
    Json,
    Yaml,
    Markdown,
    Other,
}

/// Documentation-unit kinds (spec.md §3.1, Info Snippet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnippetKind {
    Documentation,
    MarkdownSection,
    ApiDocumentation,
    Example,
    Annotation,
}

impl SnippetKind {
    /// The wire/storage form of this kind (kebab-case), mirroring [`ChunkKind::as_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetKind::Documentation => "documentation",
            SnippetKind::MarkdownSection => "markdown-section",
            SnippetKind::ApiDocumentation => "api-documentation",
            SnippetKind::Example => "example",
            SnippetKind::Annotation => "annotation",
        }
    }

    /// Parse the wire/storage form back into a [`SnippetKind`].
    pub fn parse(s: &str) -> Result<Self, CodesiftError> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| CodesiftError::InvalidKind(s.to_string()))
    }
}

/// A single logical code unit (spec.md §3.1, Chunk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub kind: ChunkKind,
    pub symbols: Vec<String>,
    pub references: Vec<String>,
    pub doc_comment: Option<String>,
    pub signature: Option<String>,
    pub breadcrumb: Option<String>,
    pub language: String,
    pub token_count: usize,
    pub file_hash: String,
    pub content_hash: String,
    pub conformances: Vec<String>,
}

impl Chunk {
    /// Build a chunk, deriving `content_hash` (I5) and, when not already
    /// set, `token_count` from `content.len() / 4` (spec.md §3.1).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        content: String,
        kind: ChunkKind,
        language: impl Into<String>,
        file_hash: impl Into<String>,
    ) -> Self {
        let content_hash = sha256_hex(content.as_bytes());
        let token_count = content.len() / 4;
        Chunk {
            id: Uuid::new_v4(),
            path: path.into(),
            start_line,
            end_line,
            content,
            kind,
            symbols: Vec::new(),
            references: Vec::new(),
            doc_comment: None,
            signature: None,
            breadcrumb: None,
            language: language.into(),
            token_count,
            file_hash: file_hash.into(),
            content_hash,
            conformances: Vec::new(),
        }
    }

    /// Recompute `content_hash` after mutating `content` in place.
    pub fn rehash_content(&mut self) {
        self.content_hash = sha256_hex(self.content.as_bytes());
        if self.token_count == 0 {
            self.token_count = self.content.len() / 4;
        }
    }

    /// Text mirrored into the chunk FTS row (spec.md I2): content, symbols,
    /// doc comment, signature, and conformances concatenated for indexing.
    pub fn fts_text(&self) -> String {
        let mut parts = vec![self.content.clone(), self.symbols.join(" ")];
        if let Some(doc) = &self.doc_comment {
            parts.push(doc.clone());
        }
        if let Some(sig) = &self.signature {
            parts.push(sig.clone());
        }
        parts.push(self.conformances.join(" "));
        parts.join("\n")
    }
}

/// A documentation unit not tied to a code construct (spec.md §3.1, Info Snippet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoSnippet {
    pub id: ChunkId,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub breadcrumb: Option<String>,
    pub chunk_id: Option<ChunkId>,
    pub kind: SnippetKind,
    pub language: String,
    pub token_count: usize,
    pub file_hash: String,
}

impl InfoSnippet {
    pub fn new(
        path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        content: String,
        kind: SnippetKind,
        language: impl Into<String>,
        file_hash: impl Into<String>,
    ) -> Self {
        let token_count = content.len() / 4;
        InfoSnippet {
            id: Uuid::new_v4(),
            path: path.into(),
            start_line,
            end_line,
            content,
            breadcrumb: None,
            chunk_id: None,
            kind,
            language: language.into(),
            token_count,
            file_hash: file_hash.into(),
        }
    }
}

/// Per-path row carrying the last indexed content hash (spec.md §3.1, File Record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub hash: String,
    pub indexed_at_unix: u64,
}

/// `(chunkId, protocolName)` edge (spec.md §3.1, Conformance Edge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceEdge {
    pub chunk_id: ChunkId,
    pub protocol_name: String,
}

/// An embedding paired with the chunk it represents (spec.md §3.1, Vector Entry).
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
}

pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_kind_roundtrips_through_wire_form() {
        for kind in [
            ChunkKind::Function,
            ChunkKind::ObjcCategory,
            ChunkKind::YamlSequence,
            ChunkKind::MarkdownCodeBlock,
            ChunkKind::Unknown,
        ] {
            let s = kind.as_str();
            assert_eq!(ChunkKind::parse(s).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_string_is_an_error() {
        assert!(ChunkKind::parse("not-a-real-kind").is_err());
    }

    #[test]
    fn type_declaration_and_callable_predicates_are_disjoint() {
        for kind in [ChunkKind::Struct, ChunkKind::Function, ChunkKind::Comment] {
            assert!(!(kind.is_type_declaration() && kind.is_callable()));
        }
        assert!(ChunkKind::Struct.is_type_declaration());
        assert!(ChunkKind::Function.is_callable());
    }

    #[test]
    fn chunk_new_derives_content_hash_and_token_count() {
        let chunk = Chunk::new(
            "src/lib.rs",
            1,
            3,
            "fn foo() {}".to_string(),
            ChunkKind::Function,
            "rust",
            "filehash",
        );
        assert_eq!(chunk.content_hash, sha256_hex(b"fn foo() {}"));
        assert_eq!(chunk.token_count, "fn foo() {}".len() / 4);
    }

    #[test]
    fn snippet_kind_roundtrips_through_wire_form() {
        for kind in [SnippetKind::Documentation, SnippetKind::MarkdownSection, SnippetKind::Annotation] {
            assert_eq!(SnippetKind::parse(kind.as_str()).unwrap(), kind);
        }
    }
}
