//! Shared utilities

pub mod config;
pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod interning;

pub use config::Config;
pub use diagnostic::{Diagnostic, DiagnosticSink};
pub use fs::{FileSystem, RealFileSystem};
pub use interning::{NameTable, Symbol};
