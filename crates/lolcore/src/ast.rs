//! The node types the evaluator consumes.
//!
//! Nothing in this crate builds these nodes from source text — that is the
//! lexer/parser's job, external to this crate. A front end constructs a [`Block`]
//! (typically the program's root) and hands it to [`crate::exec_program`].

use std::rc::Rc;

use crate::{bindings::NativeFn, error::SourceLoc};

/// Either a literal name or an expression to be evaluated and cast to a string,
/// optionally followed by a `.`-separated slot continuation (`a.b.c`).
#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: IdentifierName,
    pub slot: Option<Box<Identifier>>,
    pub location: SourceLoc,
}

impl Identifier {
    #[must_use]
    pub fn direct(name: impl Into<String>, location: SourceLoc) -> Self {
        Self {
            name: IdentifierName::Direct(name.into()),
            slot: None,
            location,
        }
    }

    #[must_use]
    pub fn with_slot(mut self, slot: Identifier) -> Self {
        self.slot = Some(Box::new(slot));
        self
    }
}

#[derive(Debug, Clone)]
pub enum IdentifierName {
    Direct(String),
    Indirect(Box<Expr>),
}

/// The explicit/implicit cast destination types (§4.3). `Nil` as a destination
/// always yields a fresh `Nil`, independent of the source value.
///
/// `Array` is only meaningful as a `Declaration`'s declared type (§4.5's zero-value
/// list names "new Array whose parent is the declaration scope" as one of the
/// zero values); a cast-statement targeting `Array` is rejected at runtime, same
/// as the source rejects it (§4.5 "Array as target type is rejected").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    Nil,
    Boolean,
    Integer,
    Float,
    String,
    Array,
}

#[derive(Debug, Clone)]
pub enum Literal {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f32),
    /// Raw source bytes, not yet interpolated — see [`crate::interpolate`].
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    Max,
    Min,
    And,
    Or,
    Xor,
    Not,
    Eq,
    Neq,
    Concat,
}

#[derive(Debug, Clone)]
pub enum Expr {
    ImpVar,
    Constant(Literal),
    Identifier(Identifier),
    Cast {
        expr: Box<Expr>,
        target: CastTarget,
    },
    Op {
        op: Op,
        args: Vec<Expr>,
    },
    FuncCall {
        target: Identifier,
        args: Vec<Expr>,
    },
    SystemCommand(Box<Expr>),
}

/// An ordered list of statements executed under a fresh child scope.
pub type Block = Vec<Stmt>;

/// The body of a user-defined function, shared between the `FuncDef` statement
/// that declares it and every `Value::Function` created from it.
///
/// Held by `Stmt::FuncDef` with a strong [`Rc`]; function values hold only a
/// [`std::rc::Weak`] reference (see [`crate::value::Value::Function`]), so the
/// definition is freed when the tree that owns it is dropped, never before.
#[derive(Debug)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Cast {
        target: Identifier,
        cast_target: CastTarget,
    },
    Print {
        args: Vec<Expr>,
        no_newline: bool,
    },
    Input {
        target: Identifier,
    },
    Assignment {
        target: Identifier,
        value: Expr,
    },
    Declaration {
        target: Identifier,
        init: Option<Expr>,
        declared_type: Option<CastTarget>,
        parent_scope: Option<Identifier>,
    },
    IfThenElse {
        yes: Block,
        guards: Vec<Expr>,
        blocks: Vec<Block>,
        no: Option<Block>,
    },
    Switch {
        guards: Vec<Expr>,
        blocks: Vec<Block>,
        default: Option<Block>,
    },
    Break,
    Return(Option<Expr>),
    Loop {
        var: Option<Identifier>,
        guard: Option<Expr>,
        update: Option<Expr>,
        body: Block,
    },
    Deallocation(Identifier),
    FuncDef {
        scope_qualifier: Option<Identifier>,
        def: Rc<FuncDef>,
    },
    ExprStmt(Expr),
    AltArrayDef {
        name: Identifier,
        parent: Option<Identifier>,
        body: Block,
    },
    /// Wraps a host callable; see [`crate::bindings`] for how these are synthesized.
    Binding(Rc<dyn NativeFn>),
    Import(Identifier),
}

impl Stmt {
    /// Builds the `FuncDef` statement plus a `Value::Function` factory for it,
    /// used by [`crate::bindings::Library`] to turn a native routine into a
    /// regular callable.
    #[must_use]
    pub fn func_def(scope_qualifier: Option<Identifier>, def: Rc<FuncDef>) -> Self {
        Self::FuncDef { scope_qualifier, def }
    }
}
