use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::{Identifier, IdentifierName},
    error::Fault,
    expr_eval::eval_expr,
    interpolate::explicit_cast,
    ast::CastTarget,
    context::EvalCtx,
    value::Value,
};

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A lexically nested identifier→value mapping.
///
/// `parent` is the lexical enclosing scope (absent for the root). `caller` is the
/// *dynamic* scope of the invoker: child blocks inherit their parent's caller
/// unchanged, while a function-call frame overrides it to the dispatch target, so
/// that `ME` resolves up the caller chain instead of the lexical one (§4.2).
///
/// Names and values are parallel, insertion-ordered vectors rather than a map:
/// the spec models them as two arrays of identical length (invariant 1), and at
/// the small sizes LOLCODE programs actually use, a linear scan is simpler to
/// reason about than hashing and preserves declaration order for free.
pub struct Scope {
    parent: Option<ScopeRef>,
    caller: Option<ScopeRef>,
    impvar: Value,
    names: Vec<String>,
    values: Vec<Value>,
}

impl Scope {
    #[must_use]
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: None,
            caller: None,
            impvar: Value::Nil,
            names: Vec::new(),
            values: Vec::new(),
        }))
    }

    /// `create(parent)`: caller is inherited from `parent.caller`.
    #[must_use]
    pub fn create(parent: &ScopeRef) -> ScopeRef {
        let caller = parent.borrow().caller.clone();
        Rc::new(RefCell::new(Self {
            parent: Some(Rc::clone(parent)),
            caller,
            impvar: Value::Nil,
            names: Vec::new(),
            values: Vec::new(),
        }))
    }

    /// `create_with_caller(parent, caller)`: used only when building a function
    /// call's own frame, so that `ME` inside the call resolves to `caller`.
    #[must_use]
    pub fn create_with_caller(parent: &ScopeRef, caller: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(Rc::clone(parent)),
            caller: Some(Rc::clone(caller)),
            impvar: Value::Nil,
            names: Vec::new(),
            values: Vec::new(),
        }))
    }

    #[must_use]
    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn caller(&self) -> Option<&ScopeRef> {
        self.caller.as_ref()
    }

    #[must_use]
    pub fn implicit(&self) -> Value {
        self.impvar.clone()
    }

    /// Replaces the implicit variable, returning the previous one so the caller
    /// can drop it explicitly (matches the spec's "drop old one" wording; in
    /// practice just lets the returned `Value` fall out of scope).
    pub fn set_implicit(&mut self, value: Value) -> Value {
        std::mem::replace(&mut self.impvar, value)
    }

    fn local_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Appends a fresh local binding. Caller is responsible for checking
    /// `declares_locally` first; this never checks for collisions itself so that
    /// `update_value`'s "declare during update" niche (the Nil-default convenience)
    /// can still reuse it internally.
    fn push_local(&mut self, name: String, value: Value) {
        self.names.push(name);
        self.values.push(value);
    }

    #[must_use]
    pub fn declares_locally(&self, name: &str) -> bool {
        self.local_index(name).is_some()
    }

    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.local_index(name).map(|i| self.values[i].clone())
    }

    fn set_local(&mut self, name: &str, value: Value) -> bool {
        if let Some(i) = self.local_index(name) {
            self.values[i] = value;
            true
        } else {
            false
        }
    }

    fn remove_local(&mut self, name: &str) -> bool {
        if let Some(i) = self.local_index(name) {
            self.names.remove(i);
            self.values.remove(i);
            true
        } else {
            false
        }
    }
}

/// Resolves a (possibly indirect) identifier's leaf name string against `scope`.
///
/// Direct identifiers are copied as-is; indirect ones are evaluated as an
/// expression under `scope` and explicit-cast to `String` (§4.2 `resolve_name`).
pub(crate) fn resolve_name(id: &Identifier, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<String, Fault> {
    match &id.name {
        IdentifierName::Direct(name) => Ok(name.clone()),
        IdentifierName::Indirect(expr) => {
            let value = eval_expr(expr, scope, ctx)?;
            let cast = explicit_cast(&value, CastTarget::String, scope, ctx)?;
            match cast {
                Value::String(s) => Ok(s.borrow().clone()),
                _ => unreachable!("explicit_cast(.., String) always returns Value::String"),
            }
        }
    }
}

/// Follows an identifier's slot chain: at each step, resolve the current name
/// under `src`, look it up in `dest`, require an `Array`, and descend into its
/// scope for the next slot. Returns the scope the leaf name should be resolved
/// against, plus the leaf name itself.
pub(crate) fn resolve_terminal(
    target: &Identifier,
    src: &ScopeRef,
    dest: &ScopeRef,
    ctx: &mut EvalCtx,
) -> Result<(ScopeRef, String), Fault> {
    let name = resolve_name(target, src, ctx)?;
    match &target.slot {
        None => Ok((Rc::clone(dest), name)),
        Some(next) => {
            let value = get_value(dest, &name)?;
            let Value::Array(inner) = value else {
                return Err(Fault::not_an_array(&name).at(target.location));
            };
            resolve_terminal(next, src, &inner, ctx)
        }
    }
}

/// `create_value`: appends a fresh `(name, Nil)` entry at the terminal scope.
/// Callers are expected to have already rejected local redefinition.
pub(crate) fn create_value(scope: &ScopeRef, name: &str) {
    scope.borrow_mut().push_local(name.to_string(), Value::Nil);
}

/// `update_value`: walks `scope` and its ancestors for the first binding named
/// `name`, replacing its value. Errors with `VariableNotFound` if none exists.
pub(crate) fn update_value(scope: &ScopeRef, name: &str, value: Value) -> Result<(), Fault> {
    let mut current = Rc::clone(scope);
    loop {
        let found = current.borrow_mut().set_local(name, value.clone());
        if found {
            return Ok(());
        }
        let next = current.borrow().parent.clone();
        match next {
            Some(p) => current = p,
            None => return Err(Fault::variable_not_found(name)),
        }
    }
}

/// `get_value`: walks `scope` and its ancestors for the first binding named
/// `name`.
pub(crate) fn get_value(scope: &ScopeRef, name: &str) -> Result<Value, Fault> {
    let mut current = Rc::clone(scope);
    loop {
        if let Some(v) = current.borrow().get_local(name) {
            return Ok(v);
        }
        let next = current.borrow().parent.clone();
        match next {
            Some(p) => current = p,
            None => return Err(Fault::variable_not_found(name)),
        }
    }
}

/// `get_value_local`: only the scope's own entries, no ancestor walk. This is
/// what the binding bridge's `get_arg` uses to read a callee's bound parameters
/// (§4.6) without risking a lexical-parent name collision.
pub(crate) fn get_value_local(scope: &ScopeRef, name: &str) -> Result<Value, Fault> {
    scope.borrow().get_local(name).ok_or_else(|| Fault::variable_not_found(name))
}

/// `delete_value`: removes the first ancestor's entry named `name`, preserving
/// the order of what remains.
pub(crate) fn delete_value(scope: &ScopeRef, name: &str) -> Result<(), Fault> {
    let mut current = Rc::clone(scope);
    loop {
        if current.borrow_mut().remove_local(name) {
            return Ok(());
        }
        let next = current.borrow().parent.clone();
        match next {
            Some(p) => current = p,
            None => return Err(Fault::variable_not_found(name)),
        }
    }
}

/// `get_scope`/`get_scope_local`: resolves `I`, `ME`, or an `Array`-valued
/// identifier to its inner scope. `I` is the scope passed in directly; `ME`
/// walks the caller chain to its outermost link (§3 invariant 5); anything else
/// must resolve (locally when `local` is set) to an `Array`.
pub(crate) fn get_scope(scope: &ScopeRef, name: &str, local: bool) -> Result<ScopeRef, Fault> {
    match name {
        "I" => Ok(Rc::clone(scope)),
        "ME" => {
            let mut outer = scope.borrow().caller.clone();
            let mut last = Rc::clone(scope);
            while let Some(next) = outer {
                last = Rc::clone(&next);
                outer = next.borrow().caller.clone();
            }
            Ok(last)
        }
        _ => {
            let value = if local {
                scope.borrow().get_local(name).ok_or_else(|| Fault::variable_not_found(name))?
            } else {
                get_value(scope, name)?
            };
            match value {
                Value::Array(inner) => Ok(inner),
                _ => Err(Fault::not_an_array(name)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scope_inherits_callers_caller() {
        let root = Scope::root();
        let caller = Scope::create(&root);
        let frame = Scope::create_with_caller(&root, &caller);
        let child = Scope::create(&frame);
        assert!(Rc::ptr_eq(child.borrow().caller().unwrap(), &caller));
    }

    #[test]
    fn me_walks_to_outermost_caller() {
        let root = Scope::root();
        let outer_caller = Scope::create(&root);
        let inner_caller = Scope::create_with_caller(&root, &outer_caller);
        let frame = Scope::create_with_caller(&root, &inner_caller);
        let resolved = get_scope(&frame, "ME", false).unwrap();
        assert!(Rc::ptr_eq(&resolved, &outer_caller));
    }

    #[test]
    fn i_is_the_scope_itself() {
        let root = Scope::root();
        let resolved = get_scope(&root, "I", false).unwrap();
        assert!(Rc::ptr_eq(&resolved, &root));
    }

    #[test]
    fn declaration_then_read_round_trips() {
        let root = Scope::root();
        create_value(&root, "X");
        assert!(matches!(get_value(&root, "X"), Ok(Value::Nil)));
        update_value(&root, "X", Value::Integer(5)).unwrap();
        assert!(matches!(get_value(&root, "X"), Ok(Value::Integer(5))));
    }

    #[test]
    fn get_value_walks_parent_chain() {
        let root = Scope::root();
        create_value(&root, "X");
        update_value(&root, "X", Value::Integer(1)).unwrap();
        let child = Scope::create(&root);
        assert!(matches!(get_value(&child, "X"), Ok(Value::Integer(1))));
    }

    #[test]
    fn delete_preserves_remaining_order() {
        let root = Scope::root();
        create_value(&root, "A");
        create_value(&root, "B");
        create_value(&root, "C");
        delete_value(&root, "B").unwrap();
        assert_eq!(root.borrow().names, vec!["A", "C"]);
    }
}
