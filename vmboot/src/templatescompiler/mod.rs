pub mod compiler;
pub mod renderer;
pub mod repo;

pub use compiler::TemplatesCompiler;
pub use renderer::JobRenderer;
pub use repo::{FileTemplatesRepo, TemplateRecord, TemplatesRepo};
