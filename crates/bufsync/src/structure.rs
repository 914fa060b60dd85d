//
// structure.rs
//
// Parsed structure of a document snapshot: syntax tree plus position index
//

use std::sync::Arc;

use tower_lsp::lsp_types::Position;
use tree_sitter::{Point, Tree};

use crate::utf16::utf16_column_to_byte_offset;

/// Line start offsets of a content snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            content
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1)
                .filter(|start| *start < content.len()),
        );
        Self { line_starts }
    }

    /// Number of lines, not counting the empty remainder after the final terminator.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of a 0-based line, excluding its terminator.
    pub fn line_range(&self, content: &str, line: usize) -> Option<std::ops::Range<usize>> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or_else(|| content.strip_suffix('\n').unwrap_or(content).len().max(start));
        Some(start..end)
    }

    /// Convert an LSP position (UTF-16 column) into a byte offset.
    pub fn offset(&self, content: &str, position: Position) -> Option<usize> {
        let range = self.line_range(content, position.line as usize)?;
        let line = &content[range.clone()];
        Some(range.start + utf16_column_to_byte_offset(line, position.character))
    }

    /// Convert an LSP position into a tree-sitter point (byte column).
    pub fn point(&self, content: &str, position: Position) -> Option<Point> {
        let offset = self.offset(content, position)?;
        let row = position.line as usize;
        Some(Point::new(row, offset - self.line_starts[row]))
    }
}

/// Result of a successful structural parse of one document version.
#[derive(Debug)]
pub struct ParsedStructure {
    pub version: i32,
    pub tree: Tree,
    pub content: Arc<str>,
    pub index: LineIndex,
}

const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "type_identifier",
    "package_identifier",
    "label_name",
];

impl ParsedStructure {
    pub fn has_syntax_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// The identifier covering `position`, if any.
    pub fn identifier_at(&self, position: Position) -> Option<&str> {
        let point = self.index.point(&self.content, position)?;
        let node = self
            .tree
            .root_node()
            .descendant_for_point_range(point, point)?;
        if !IDENTIFIER_KINDS.contains(&node.kind()) {
            return None;
        }
        self.content.get(node.byte_range())
    }

    /// Names of the top-level function and method declarations.
    pub fn top_level_functions(&self) -> Vec<&str> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        root.named_children(&mut cursor)
            .filter(|n| n.kind() == "function_declaration" || n.kind() == "method_declaration")
            .filter_map(|n| n.child_by_field_name("name"))
            .filter_map(|name| self.content.get(name.byte_range()))
            .collect()
    }
}

/// Why no structure could be produced for a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("parser unavailable: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("parser produced no tree for {0}")]
    NoTree(String),
    #[error("{0}")]
    Rejected(String),
}

/// Produces structure for a content snapshot. Runs on background threads.
pub trait StructureParser: Send + Sync + 'static {
    fn parse(&self, name: &str, content: &str) -> Result<Tree, ParseError>;
}

/// Go parser backed by tree-sitter.
///
/// Trees containing syntax errors are still returned; tree-sitter recovers
/// from errors, and a partial tree is more useful than none.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoStructureParser;

impl StructureParser for GoStructureParser {
    fn parse(&self, name: &str, content: &str) -> Result<Tree, ParseError> {
        let tree = crate::parser_pool::with_parser(|parser| parser.parse(content, None))?
            .ok_or_else(|| ParseError::NoTree(name.to_string()))?;
        if tree.root_node().has_error() {
            log::info!("{name} has syntax errors");
        }
        Ok(tree)
    }
}
