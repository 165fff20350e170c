// Quizgen Infrastructure - System Adapters
// Implements: Generator (external command), source collaborators (data directory)

pub mod fs_sources;
pub mod subprocess_generator;

pub use fs_sources::FsSourceCatalog;
pub use subprocess_generator::{SubprocessGenerator, SubprocessGeneratorConfig};
