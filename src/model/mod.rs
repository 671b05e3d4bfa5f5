//! Data model: fact records, class hierarchy, and the assembled program.

mod facts;
mod hierarchy;
mod program;

pub use facts::{
    simple_name_of, CallSite, CatchSite, ClassDef, Confidence, Entrypoint, EntrypointKind,
    FileExtraction, FunctionDef, FunctionKey, GlobalHandler, ImportInfo, RaiseSite,
    ResolutionEdge, ResolutionKind, ResolutionMode, MODULE_SCOPE,
};
pub use hierarchy::{ClassHierarchy, BUILTIN_ROOTS};
pub use program::ProgramModel;
