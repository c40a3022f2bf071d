//! repograph-pkg — Project Knowledge Graph construction and persistence
//!
//! The pipeline: scan the tree, normalize each file into a definition
//! record, detect project metadata and frameworks, resolve relationships
//! into typed edges, assemble the PKG document, and persist it to the
//! file cache and (when reachable) the graph database.

pub mod builder;
pub mod endpoints;
pub mod framework;
pub mod metadata;
pub mod normalizer;
pub mod relations;
pub mod scanner;
pub mod store;

pub use builder::{generate_pkg, PkgBuilder};
pub use framework::detect_module_framework;
pub use metadata::extract_project_metadata;
pub use normalizer::{normalize, Definitions, Language};
pub use scanner::{scan_repo, SourceFile};
pub use store::{load_cached_pkg, write_pkg_cache, GraphStore};
