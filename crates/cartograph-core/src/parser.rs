//! Tree-sitter parse driver.
//!
//! One entry point: [`parse_file`] reads a source file (memory-mapping
//! large ones), runs the language grammar and returns the tree together
//! with deterministic capture sets. Malformed files still come back: the
//! tree is flagged and definitions are extracted best-effort. Oversized
//! files and grammar timeouts are reported as skips, not errors.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tree_sitter::{Node, Parser as TsParser, Tree};

use crate::error::UpdaterError;
use crate::lang::LanguageProfile;

/// Size and time limits applied per file.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    pub max_file_bytes: u64,
    pub mmap_threshold_bytes: u64,
    pub timeout_secs: u64,
}

/// File content, owned or memory-mapped.
pub enum SourceBuffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl SourceBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v,
            Self::Mapped(m) => m,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// A successfully parsed file.
pub struct ParsedFile {
    pub source: SourceBuffer,
    pub tree: Tree,
    /// The tree contains ERROR nodes; extraction is best-effort.
    pub has_errors: bool,
}

impl ParsedFile {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    /// Capture set for the given node kinds, ordered by byte offset.
    ///
    /// The order depends only on the input bytes, never on traversal
    /// incidentals, so repeated runs see identical sequences.
    pub fn capture<'tree>(&'tree self, kinds: &[&str]) -> Vec<Node<'tree>> {
        let mut out = Vec::new();
        collect_kinds(self.tree.root_node(), kinds, &mut out);
        out.sort_by_key(|n| (n.start_byte(), n.end_byte()));
        out
    }
}

fn collect_kinds<'tree>(node: Node<'tree>, kinds: &[&str], out: &mut Vec<Node<'tree>>) {
    if kinds.contains(&node.kind()) {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_kinds(child, kinds, out);
    }
}

/// Outcome of driving the grammar over one file.
pub enum ParseOutcome {
    Parsed(ParsedFile),
    /// Byte length exceeded the hard cap; nothing was emitted.
    SkippedTooLarge(u64),
    /// The grammar gave up (timeout or internal failure).
    SkippedUnparsable,
}

/// Read and parse one file under the given limits.
pub fn parse_file(
    profile: &LanguageProfile,
    path: &Path,
    limits: &ParseLimits,
) -> Result<ParseOutcome, UpdaterError> {
    let meta = std::fs::metadata(path).map_err(|e| UpdaterError::io(path, e))?;
    let byte_len = meta.len();

    if byte_len > limits.max_file_bytes {
        return Ok(ParseOutcome::SkippedTooLarge(byte_len));
    }

    let source = if byte_len >= limits.mmap_threshold_bytes {
        let file = File::open(path).map_err(|e| UpdaterError::io(path, e))?;
        // Safety: the map is read-only and dropped before the file closes.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| UpdaterError::io(path, e))?;
        SourceBuffer::Mapped(map)
    } else {
        SourceBuffer::Owned(std::fs::read(path).map_err(|e| UpdaterError::io(path, e))?)
    };

    let mut parser = TsParser::new();
    parser
        .set_language(&profile.grammar)
        .map_err(|e| UpdaterError::Parse {
            path: path.display().to_string(),
            message: format!("failed to set language: {e}"),
        })?;
    if limits.timeout_secs > 0 {
        #[allow(deprecated)]
        parser.set_timeout_micros(limits.timeout_secs.saturating_mul(1_000_000));
    }

    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        return Ok(ParseOutcome::SkippedUnparsable);
    };

    let has_errors = tree.root_node().has_error();
    Ok(ParseOutcome::Parsed(ParsedFile { source, tree, has_errors }))
}

/// Parse in-memory bytes. Used by analyzers and tests that already hold
/// the content.
pub fn parse_bytes(profile: &LanguageProfile, bytes: Vec<u8>) -> Option<ParsedFile> {
    let mut parser = TsParser::new();
    parser.set_language(&profile.grammar).ok()?;
    let tree = parser.parse(&bytes, None)?;
    let has_errors = tree.root_node().has_error();
    Some(ParsedFile { source: SourceBuffer::Owned(bytes), tree, has_errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{Lang, LanguageRegistry};

    fn python_profile() -> std::sync::Arc<LanguageProfile> {
        LanguageRegistry::new().profile_for(Lang::Python).unwrap()
    }

    #[test]
    fn parses_wellformed_python() {
        let profile = python_profile();
        let parsed = parse_bytes(&profile, b"def f():\n    pass\n".to_vec()).unwrap();
        assert!(!parsed.has_errors);
        let functions = parsed.capture(profile.function_kinds);
        assert_eq!(functions.len(), 1);
    }

    #[test]
    fn flags_error_trees_but_still_captures() {
        let profile = python_profile();
        let parsed = parse_bytes(&profile, b"def f():\n    pass\ndef (broken\n".to_vec()).unwrap();
        assert!(parsed.has_errors);
        assert!(!parsed.capture(profile.function_kinds).is_empty());
    }

    #[test]
    fn captures_are_byte_ordered() {
        let profile = python_profile();
        let parsed =
            parse_bytes(&profile, b"def b():\n    pass\n\ndef a():\n    pass\n".to_vec()).unwrap();
        let functions = parsed.capture(profile.function_kinds);
        let offsets: Vec<usize> = functions.iter().map(|n| n.start_byte()).collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
    }
}
