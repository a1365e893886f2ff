mod atomic_io;
mod compiler;
mod database;
mod types;

pub use atomic_io::write_text_atomic;
pub use compiler::{compile_template_database, parse_template_database};
pub use database::{
    ActorTemplate, AiController, ConsumableTemplate, EntityTemplate, ItemTemplate,
    TemplateDatabase, TemplateId, TemplateKind,
};
pub use types::{ContentCompileError, ContentErrorCode, SourceLocation};
