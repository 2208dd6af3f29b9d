//! Meta crate that re-exports the bilua layers with the names downstream
//! code usually wants. Depend on the individual crates when deeper
//! integration is required.

pub use bilua_common as common;
pub use bilua_eval as eval;
pub use bilua_parse as parse;

pub use bilua_common::{Location, LuaError, LuaErrorKind, Range, SingleChange, SourceChange};
pub use bilua_eval::{EvalResult, Interpreter, ParseResult, Value, Vallist};
