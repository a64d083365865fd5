//! The binding bridge (§4.6): exposes host-native routines as regular
//! callable program functions.
//!
//! A binding is wrapped in a synthetic `FuncDef` whose body is a single
//! [`Stmt::Binding`] statement. Calling it goes through the exact same
//! `FuncCall` path as a user-defined `HOW IZ` routine (argument binding,
//! arity checking, a fresh frame scope); the only difference is that its
//! body executes a [`NativeFn`] instead of interpreting LOLCODE statements.
//! STDIO, SOCKS, and STDLIB routine *bodies* are host-specific and out of
//! scope here; only `STRING`'s `LEN` and `AT`, which need no host I/O, are
//! implemented concretely. Everything else is registered through the same
//! [`Library`] builder by whatever embeds this crate.

use std::{fmt, rc::Rc};

use crate::{ast::CastTarget, ast::FuncDef, ast::Stmt, context::EvalCtx, error::Fault, interpolate, scope::ScopeRef, scope::get_value_local, signal::Signal, value::Value};

/// A host routine callable from program code. `call` runs as if it were the
/// entire body of the function it's bound to: its return value becomes the
/// call's result via `Signal::Return`.
pub trait NativeFn {
    fn name(&self) -> &str;
    fn call(&self, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault>;
}

impl fmt::Debug for dyn NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name())
    }
}

/// A binding-specific error, convertible to and from [`Fault`]. Exists so a
/// `NativeFn` impl can use `?` against argument-contract failures without
/// spelling out `Fault::binding_contract` at every call site.
#[derive(Debug, Clone)]
pub struct BindingError(Fault);

pub type BindingResult<T> = Result<T, BindingError>;

impl BindingError {
    #[must_use]
    pub fn missing_arg(name: &str) -> Self {
        Self(Fault::binding_contract(format!("missing bound argument: {name}")))
    }

    #[must_use]
    pub fn contract(msg: impl fmt::Display) -> Self {
        Self(Fault::binding_contract(msg))
    }
}

impl From<BindingError> for Fault {
    fn from(err: BindingError) -> Self {
        err.0
    }
}

impl From<Fault> for BindingError {
    fn from(fault: Fault) -> Self {
        Self(fault)
    }
}

/// Reads a bound parameter `name` out of the callee's own frame. Bound
/// parameters always live directly in the frame scope a `NativeFn` is called
/// with, never in an ancestor, so this never walks the parent chain.
pub fn get_arg_local(scope: &ScopeRef, name: &str) -> BindingResult<Value> {
    Ok(get_value_local(scope, name)?)
}

/// Like [`get_arg_local`], but reports a missing argument as a
/// `BindingContract` fault naming the argument, which reads better from a
/// library implementation than a bare `VariableNotFound`.
pub fn get_arg(scope: &ScopeRef, name: &str) -> BindingResult<Value> {
    get_arg_local(scope, name).map_err(|_| BindingError::missing_arg(name))
}

/// Doubles every `:` in `input`, making the result inert against a later
/// interpolation pass (§4.6). Used by bindings that hand program code a
/// string built from untrusted host data (e.g. a line read from a socket).
#[must_use]
pub fn sanitize(input: &str) -> String {
    input.replace(':', "::")
}

/// Builds the synthetic `FuncDef`/`Binding` statement pairs a set of native
/// routines needs to become regular callable functions (§4.6).
#[derive(Default)]
pub struct Library {
    routines: Vec<Stmt>,
}

impl Library {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one routine: `name` callable with `params`, backed by `native`.
    #[must_use]
    pub fn routine(mut self, name: impl Into<String>, params: Vec<String>, native: Rc<dyn NativeFn>) -> Self {
        let def = Rc::new(FuncDef {
            name: name.into(),
            params,
            body: vec![Stmt::Binding(native)],
        });
        self.routines.push(Stmt::func_def(None, def));
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<Stmt> {
        self.routines
    }
}

/// `STRING`'s `LEN(STR)`: character count of `STR` cast to `String`.
#[derive(Debug, Default)]
pub struct StringLen;

impl NativeFn for StringLen {
    fn name(&self) -> &str {
        "LEN"
    }

    fn call(&self, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
        let arg = get_arg_local(scope, "STR")?;
        let cast = interpolate::implicit_cast(&arg, CastTarget::String, scope, ctx)?;
        let Value::String(s) = cast else {
            unreachable!("cast to String always returns Value::String")
        };
        let len = i64::try_from(s.borrow().chars().count()).unwrap_or(i64::MAX);
        Ok(Signal::Return(Some(Value::Integer(len))))
    }
}

/// `STRING`'s `AT(STR, INDEX)`: the character at the zero-based `INDEX` of
/// `STR` cast to `String`, as a one-character `String`.
#[derive(Debug, Default)]
pub struct StringAt;

impl NativeFn for StringAt {
    fn name(&self) -> &str {
        "AT"
    }

    fn call(&self, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
        let str_arg = get_arg_local(scope, "STR")?;
        let index_arg = get_arg_local(scope, "INDEX")?;
        let str_cast = interpolate::implicit_cast(&str_arg, CastTarget::String, scope, ctx)?;
        let Value::String(s) = str_cast else {
            unreachable!("cast to String always returns Value::String")
        };
        let index_cast = interpolate::implicit_cast(&index_arg, CastTarget::Integer, scope, ctx)?;
        let Value::Integer(index) = index_cast else {
            unreachable!("cast to Integer always returns Value::Integer")
        };
        let chars: Vec<char> = s.borrow().chars().collect();
        let index = usize::try_from(index).map_err(|_| Fault::binding_contract("AT index out of range"))?;
        let ch = chars.get(index).ok_or_else(|| Fault::binding_contract("AT index out of range"))?;
        Ok(Signal::Return(Some(Value::string(ch.to_string()))))
    }
}

/// The `STRING` library: `LEN` and `AT`, the only two routines that need no
/// host collaborator to implement (§1 out-of-scope).
#[must_use]
pub fn string_library() -> Vec<Stmt> {
    Library::new()
        .routine("LEN", vec!["STR".to_string()], Rc::new(StringLen))
        .routine("AT", vec!["STR".to_string(), "INDEX".to_string()], Rc::new(StringAt))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::ScriptedInput, interpolate::NoUnicodeNames, io::NoPrint, scope::Scope};

    fn call_native(native: &dyn NativeFn, scope: &ScopeRef) -> Signal {
        let mut print = NoPrint;
        let mut input = ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = EvalCtx::new(&mut print, &mut input, &names);
        native.call(scope, &mut ctx).unwrap()
    }

    #[test]
    fn len_counts_characters() {
        let scope = Scope::root();
        crate::scope::create_value(&scope, "STR");
        crate::scope::update_value(&scope, "STR", Value::string("cat")).unwrap();
        let signal = call_native(&StringLen, &scope);
        assert!(matches!(signal, Signal::Return(Some(Value::Integer(3)))));
    }

    #[test]
    fn at_returns_single_character() {
        let scope = Scope::root();
        crate::scope::create_value(&scope, "STR");
        crate::scope::update_value(&scope, "STR", Value::string("cat")).unwrap();
        crate::scope::create_value(&scope, "INDEX");
        crate::scope::update_value(&scope, "INDEX", Value::Integer(1)).unwrap();
        let signal = call_native(&StringAt, &scope);
        match signal {
            Signal::Return(Some(Value::String(s))) => assert_eq!(*s.borrow(), "a"),
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn sanitize_doubles_colons() {
        assert_eq!(sanitize("a:b::c"), "a::b::::c");
    }
}
