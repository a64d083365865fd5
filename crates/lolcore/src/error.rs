use std::fmt;

use strum::{Display, IntoStaticStr};

/// A source position attached to a fault, when the originating node carried one.
///
/// Parse-tree nodes are not required to carry locations (the parser is an external
/// collaborator), so most constructors accept `None` and callers attach a location
/// with [`Fault::at`] once one is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The taxonomy of evaluation-time failures, matching the categories a caller needs
/// to distinguish (for diagnostics or for deciding whether a failure is recoverable).
///
/// Unlike a host-language exception hierarchy, none of these are catchable from
/// inside a running program: every fault aborts the innermost statement/expression
/// and unwinds to the caller of [`crate::exec_program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum FaultKind {
    /// Cast to/from a type that has no defined conversion (Function, Array as a
    /// cast target; Boolean as a cast source to String).
    TypeMismatch,
    /// Implicit cast of Nil to anything but String.
    ImplicitNilCast,
    /// `get_value`/`get_value_local` found no matching name in the chain searched.
    VariableNotFound,
    /// A declaration names a local already bound in the same scope.
    Redefinition,
    /// A slot-chain descent landed on a non-Array value.
    NotAnArray,
    /// Call target resolved to a value that is not a Function.
    NotCallable,
    /// A call supplied a different number of arguments than the function declares.
    ArityMismatch,
    /// Integer division, or float division where the divisor is within epsilon of zero.
    DivisionByZero,
    /// A string-interpolation escape was malformed (bad hex, unknown name, unterminated).
    InterpolationSyntax,
    /// A value could not be parsed as the requested numeric type.
    NumericParse,
    /// Recursive function calls nested past the configured limit.
    RecursionLimit,
    /// A binding's argument contract was not satisfied by the caller (see [`crate::bindings`]).
    BindingContract,
}

/// An evaluation-time failure: a [`FaultKind`] plus a human-readable message and,
/// when available, the source location of the node that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub location: Option<SourceLoc>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{loc}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for Fault {}

impl Fault {
    #[must_use]
    pub fn new(kind: FaultKind, message: impl fmt::Display) -> Self {
        Self {
            kind,
            message: message.to_string(),
            location: None,
        }
    }

    /// Attaches a source location, overwriting any the fault already carries.
    ///
    /// Used by the block/statement dispatch loop to stamp the innermost node's
    /// location onto an error bubbling up from a sub-evaluation that didn't have one.
    #[must_use]
    pub fn at(mut self, location: SourceLoc) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn type_mismatch(msg: impl fmt::Display) -> Self {
        Self::new(FaultKind::TypeMismatch, msg)
    }

    #[must_use]
    pub fn implicit_nil_cast() -> Self {
        Self::new(FaultKind::ImplicitNilCast, "cannot implicitly cast Nil")
    }

    #[must_use]
    pub fn variable_not_found(name: &str) -> Self {
        Self::new(FaultKind::VariableNotFound, format!("variable not found: {name}"))
    }

    #[must_use]
    pub fn redefinition(name: &str) -> Self {
        Self::new(FaultKind::Redefinition, format!("{name} is already defined in this scope"))
    }

    #[must_use]
    pub fn not_an_array(name: &str) -> Self {
        Self::new(FaultKind::NotAnArray, format!("{name} is not an array"))
    }

    #[must_use]
    pub fn not_callable(name: &str) -> Self {
        Self::new(FaultKind::NotCallable, format!("{name} is not a function"))
    }

    #[must_use]
    pub fn arity_mismatch(name: &str, expected: usize, actual: usize) -> Self {
        Self::new(
            FaultKind::ArityMismatch,
            format!("{name} expects {expected} argument(s), got {actual}"),
        )
    }

    #[must_use]
    pub fn division_by_zero() -> Self {
        Self::new(FaultKind::DivisionByZero, "division by zero")
    }

    #[must_use]
    pub fn interpolation_syntax(msg: impl fmt::Display) -> Self {
        Self::new(FaultKind::InterpolationSyntax, msg)
    }

    #[must_use]
    pub fn numeric_parse(msg: impl fmt::Display) -> Self {
        Self::new(FaultKind::NumericParse, msg)
    }

    #[must_use]
    pub fn recursion_limit(limit: usize) -> Self {
        Self::new(FaultKind::RecursionLimit, format!("recursion limit exceeded ({limit})"))
    }

    #[must_use]
    pub fn binding_contract(msg: impl fmt::Display) -> Self {
        Self::new(FaultKind::BindingContract, msg)
    }
}
