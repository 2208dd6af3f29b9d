pub mod error;
pub mod location;
pub mod source_change;

pub use error::{LuaError, LuaErrorKind, TraceFrame};
pub use location::{Location, Range};
pub use source_change::{SingleChange, SourceChange};
