//! Specialized per-file analyzers.
//!
//! An analyzer is a capability over pass-1 results: it looks at the parse
//! tree plus the outline the definer produced and appends nodes and edges
//! the generic extraction does not know about. New languages plug in by
//! registering a language profile and implementing [`FileAnalyzer`].
//!
//! - [`c_pointers`]: pointer declarations, aliasing, function pointers
//! - [`c_kernel`]: syscalls, exported symbols, lock discipline, macros
//! - [`tests`]: test suites/cases/assertions and framework detection
//! - [`bdd`]: Gherkin features and step-definition linking
//! - [`config_files`]: configuration keys and dependency manifests
//! - [`vcs`]: git history (contributors, commits, per-file modification)

pub mod bdd;
pub mod c_kernel;
pub mod c_pointers;
pub mod config_files;
pub mod vcs;

use crate::definer::FileOutline;
use crate::parser::ParsedFile;

/// A per-file analysis capability, run after the definer on the worker.
pub trait FileAnalyzer: Send + Sync {
    /// Whether this analyzer applies to the file at all.
    fn wants(&self, outline: &FileOutline) -> bool;

    /// Inspect the parse tree and append emissions to the outline.
    fn visit_file(&self, parsed: &ParsedFile, outline: &mut FileOutline);
}

/// The built-in analyzer set, in invocation order.
pub fn builtin_analyzers() -> Vec<Box<dyn FileAnalyzer>> {
    vec![
        Box::new(c_pointers::CPointerAnalyzer),
        Box::new(c_kernel::CKernelAnalyzer),
        Box::new(tests::TestAnalyzer),
    ]
}
