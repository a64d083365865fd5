#![doc = include_str!("../../../README.md")]
#![expect(clippy::too_many_arguments, reason = "node constructors mirror the tree shapes they model")]
#![expect(clippy::float_cmp, reason = "epsilon comparisons are spelled out explicitly where it matters")]

mod ast;
mod bindings;
mod context;
mod error;
mod expr_eval;
mod interpolate;
mod io;
mod scope;
mod signal;
mod stmt_eval;
mod value;

pub use crate::{
    ast::{Block, CastTarget, Expr, FuncDef, Identifier, IdentifierName, Literal, Op, Stmt},
    bindings::{BindingError, BindingResult, Library, NativeFn, get_arg, get_arg_local, sanitize},
    context::{EvalCtx, InputSource, ScriptedInput, StdinInput, DEFAULT_MAX_CALL_DEPTH},
    error::{Fault, FaultKind, SourceLoc},
    interpolate::{NoUnicodeNames, UnicodeNames},
    io::{CollectPrint, NoPrint, PrintSink, StdPrint},
    scope::{Scope, ScopeRef},
    signal::Signal,
    stmt_eval::exec_program,
    value::{Blob, Value},
};

/// Evaluation-wide error/result alias. Kept at the crate root since nearly every
/// public function returns it.
pub type EvalResult<T> = Result<T, Fault>;
