//! The statement evaluator (§4.5) and [`exec_program`], the crate's public
//! entry point.
//!
//! A [`crate::ast::Block`] never creates its own child scope internally —
//! whichever construct introduces a nested body (`If`/`Else`, `Loop`,
//! `Switch`) creates the child scope explicitly before handing the block to
//! [`exec_block`]. A function call's frame is the one exception: its own
//! frame scope already holds nothing but the bound parameters, so the body
//! runs directly in it rather than in yet another child.

use std::rc::Rc;

use crate::{
    ast::{CastTarget, Expr, Identifier, IdentifierName, Literal, Op, Stmt},
    context::EvalCtx,
    error::Fault,
    expr_eval::eval_expr,
    interpolate,
    scope::{self, Scope, ScopeRef},
    signal::Signal,
    value::{FunctionRef, Value},
};

/// Runs `program` under a fresh root scope. A bare `Break` reaching the top
/// level (no enclosing loop or switch absorbed it) is reported as a fault;
/// a bare `Return` is accepted and simply discarded, matching a script that
/// ends with `GTFO` outside any function.
pub fn exec_program(program: &crate::ast::Block, ctx: &mut EvalCtx) -> Result<(), Fault> {
    let root = Scope::root();
    match exec_block(program, &root, ctx)? {
        Signal::Default | Signal::Return(_) => Ok(()),
        Signal::Break => Err(Fault::type_mismatch("BREAK reached outside any loop or switch")),
    }
}

pub(crate) fn exec_block(block: &crate::ast::Block, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    for stmt in block {
        let signal = exec_stmt(stmt, scope, ctx)?;
        if !signal.is_default() {
            return Ok(signal);
        }
    }
    Ok(Signal::Default)
}

fn exec_stmt(stmt: &Stmt, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    match stmt {
        Stmt::Cast { target, cast_target } => exec_cast(target, *cast_target, scope, ctx),
        Stmt::Print { args, no_newline } => exec_print(args, *no_newline, scope, ctx),
        Stmt::Input { target } => exec_input(target, scope, ctx),
        Stmt::Assignment { target, value } => exec_assignment(target, value, scope, ctx),
        Stmt::Declaration {
            target,
            init,
            declared_type,
            parent_scope,
        } => exec_declaration(target, init.as_ref(), *declared_type, parent_scope.as_ref(), scope, ctx),
        Stmt::IfThenElse { yes, guards, blocks, no } => exec_if(yes, guards, blocks, no.as_ref(), scope, ctx),
        Stmt::Switch { guards, blocks, default } => exec_switch(guards, blocks, default.as_ref(), scope, ctx),
        Stmt::Break => Ok(Signal::Break),
        Stmt::Return(expr) => exec_return(expr.as_ref(), scope, ctx),
        Stmt::Loop { var, guard, update, body } => exec_loop(var.as_ref(), guard.as_ref(), update.as_ref(), body, scope, ctx),
        Stmt::Deallocation(id) => exec_deallocation(id, scope, ctx),
        Stmt::FuncDef { scope_qualifier, def } => exec_func_def(scope_qualifier.as_ref(), def, scope, ctx),
        Stmt::ExprStmt(expr) => {
            eval_expr(expr, scope, ctx)?;
            Ok(Signal::Default)
        }
        Stmt::AltArrayDef { name, parent, body } => exec_alt_array_def(name, parent.as_ref(), body, scope, ctx),
        Stmt::Binding(native) => native.call(scope, ctx),
        Stmt::Import(_) => {
            // A front end splices a requested library's Library::build() routines
            // into the program tree before exec_program ever runs; by the time
            // this statement executes, the routines it names already exist.
            Ok(Signal::Default)
        }
    }
}

fn exec_cast(target: &Identifier, cast_target: CastTarget, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    let (dest, name) = scope::resolve_terminal(target, scope, scope, ctx)?;
    let value = scope::get_value(&dest, &name).map_err(|e| e.at(target.location))?;
    let cast = interpolate::explicit_cast(&value, cast_target, scope, ctx)?;
    scope::update_value(&dest, &name, cast).map_err(|e| e.at(target.location))?;
    Ok(Signal::Default)
}

fn exec_print(args: &[Expr], no_newline: bool, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    for arg in args {
        let value = eval_expr(arg, scope, ctx)?;
        let cast = interpolate::implicit_cast(&value, CastTarget::String, scope, ctx)?;
        let Value::String(s) = cast else {
            unreachable!("cast to String always returns Value::String");
        };
        ctx.print.write_str(&s.borrow());
    }
    if !no_newline {
        ctx.print.write_newline();
    }
    Ok(Signal::Default)
}

fn exec_input(target: &Identifier, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    let (dest, name) = scope::resolve_terminal(target, scope, scope, ctx)?;
    let line = ctx.input.read_line().unwrap_or_default();
    scope::update_value(&dest, &name, Value::string(line)).map_err(|e| e.at(target.location))?;
    Ok(Signal::Default)
}

fn exec_assignment(target: &Identifier, value: &Expr, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    let (dest, name) = scope::resolve_terminal(target, scope, scope, ctx)?;
    let value = eval_expr(value, scope, ctx)?;
    scope::update_value(&dest, &name, value).map_err(|e| e.at(target.location))?;
    Ok(Signal::Default)
}

fn exec_declaration(
    target: &Identifier,
    init: Option<&Expr>,
    declared_type: Option<CastTarget>,
    parent_scope: Option<&Identifier>,
    scope: &ScopeRef,
    ctx: &mut EvalCtx,
) -> Result<Signal, Fault> {
    let (dest, name) = scope::resolve_terminal(target, scope, scope, ctx)?;
    if dest.borrow().declares_locally(&name) {
        return Err(Fault::redefinition(&name).at(target.location));
    }
    let value = if let Some(expr) = init {
        let evaluated = eval_expr(expr, scope, ctx)?;
        match declared_type {
            Some(ty) => interpolate::explicit_cast(&evaluated, ty, scope, ctx)?,
            None => evaluated,
        }
    } else if let Some(ty) = declared_type {
        zero_value(ty, &dest)
    } else if let Some(parent_id) = parent_scope {
        // An object declaration inheriting another object's member scope as
        // its own lexical parent, so member lookups on it fall back to the
        // named object when not found locally.
        let parent_name = scope::resolve_name(parent_id, scope, ctx)?;
        let inherited = scope::get_scope(scope, &parent_name, false)?;
        Value::Array(Scope::create(&inherited))
    } else {
        Value::Nil
    };
    scope::create_value(&dest, &name);
    scope::update_value(&dest, &name, value).map_err(|e| e.at(target.location))?;
    Ok(Signal::Default)
}

fn zero_value(ty: CastTarget, declaration_scope: &ScopeRef) -> Value {
    match ty {
        CastTarget::Nil => Value::Nil,
        CastTarget::Boolean => Value::Boolean(false),
        CastTarget::Integer => Value::Integer(0),
        CastTarget::Float => Value::Float(0.0),
        CastTarget::String => Value::string(""),
        // A bare `ITZ A BUKKIT`-style declared type: an unconditional fresh
        // empty Array parented on the scope the declaration runs in, distinct
        // from the parent_scope-qualified path above (§4.5).
        CastTarget::Array => Value::Array(Scope::create(declaration_scope)),
    }
}

fn eval_guard(guard: &Expr, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<bool, Fault> {
    let value = eval_expr(guard, scope, ctx)?;
    let cast = interpolate::implicit_cast(&value, CastTarget::Boolean, scope, ctx)?;
    let Value::Boolean(b) = cast else {
        unreachable!("cast to Boolean always returns Value::Boolean");
    };
    Ok(b)
}

fn exec_if(
    yes: &crate::ast::Block,
    guards: &[Expr],
    blocks: &[crate::ast::Block],
    no: Option<&crate::ast::Block>,
    scope: &ScopeRef,
    ctx: &mut EvalCtx,
) -> Result<Signal, Fault> {
    let it = scope.borrow().implicit();
    let it_truthy = {
        let cast = interpolate::implicit_cast(&it, CastTarget::Boolean, scope, ctx)?;
        let Value::Boolean(b) = cast else {
            unreachable!("cast to Boolean always returns Value::Boolean");
        };
        b
    };
    if it_truthy {
        let child = Scope::create(scope);
        return exec_block(yes, &child, ctx);
    }
    for (guard, block) in guards.iter().zip(blocks) {
        if eval_guard(guard, scope, ctx)? {
            let child = Scope::create(scope);
            return exec_block(block, &child, ctx);
        }
    }
    if let Some(no) = no {
        let child = Scope::create(scope);
        return exec_block(no, &child, ctx);
    }
    Ok(Signal::Default)
}

fn absorb_break(signal: Signal) -> Signal {
    match signal {
        Signal::Break => Signal::Default,
        other => other,
    }
}

fn exec_switch(
    guards: &[Expr],
    blocks: &[crate::ast::Block],
    default: Option<&crate::ast::Block>,
    scope: &ScopeRef,
    ctx: &mut EvalCtx,
) -> Result<Signal, Fault> {
    let it = interpolate::interpolate_if_string(scope.borrow().implicit(), scope, ctx)?;
    let mut matched = None;
    for (i, guard) in guards.iter().enumerate() {
        let g = eval_expr(guard, scope, ctx)?;
        let g = interpolate::interpolate_if_string(g, scope, ctx)?;
        if it.structurally_eq(&g) {
            matched = Some(i);
            break;
        }
    }
    let Some(start) = matched else {
        return match default {
            Some(block) => {
                let child = Scope::create(scope);
                Ok(absorb_break(exec_block(block, &child, ctx)?))
            }
            None => Ok(Signal::Default),
        };
    };
    // Fallthrough: once a case matches, every following case body runs in
    // order (each in its own child scope) until a `Break` or `Return`.
    for block in &blocks[start..] {
        let child = Scope::create(scope);
        match exec_block(block, &child, ctx)? {
            Signal::Break => return Ok(Signal::Default),
            Signal::Return(v) => return Ok(Signal::Return(v)),
            Signal::Default => {}
        }
    }
    if let Some(block) = default {
        let child = Scope::create(scope);
        return Ok(absorb_break(exec_block(block, &child, ctx)?));
    }
    Ok(Signal::Default)
}

fn exec_return(expr: Option<&Expr>, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    let value = match expr {
        Some(e) => Some(eval_expr(e, scope, ctx)?),
        None => None,
    };
    Ok(Signal::Return(value))
}

fn exec_loop(
    var: Option<&Identifier>,
    guard: Option<&Expr>,
    update: Option<&Expr>,
    body: &crate::ast::Block,
    scope: &ScopeRef,
    ctx: &mut EvalCtx,
) -> Result<Signal, Fault> {
    loop {
        // A guard always means "keep looping while true"; a front end
        // parsing `TIL` wraps the condition in a negation itself so this
        // evaluator only ever sees one polarity.
        if let Some(guard) = guard {
            if !eval_guard(guard, scope, ctx)? {
                break;
            }
        }
        let child = Scope::create(scope);
        match exec_block(body, &child, ctx)? {
            Signal::Break => break,
            Signal::Return(v) => return Ok(Signal::Return(v)),
            Signal::Default => {}
        }
        if let (Some(var), Some(update)) = (var, update) {
            run_loop_update(var, update, scope, ctx)?;
        }
    }
    Ok(Signal::Default)
}

/// Applies a loop's per-iteration update. Recognizes the `var = var +/- 1`
/// shape as a fast path: that exact shape can have no side effects beyond
/// the increment itself (a constant and a read of the identifier being
/// updated), so it mutates the slot directly instead of round-tripping
/// through the general expression evaluator.
fn run_loop_update(var: &Identifier, update: &Expr, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<(), Fault> {
    if let Some(delta) = increment_fast_path(var, update) {
        let (dest, name) = scope::resolve_terminal(var, scope, scope, ctx)?;
        let current = scope::get_value(&dest, &name)?;
        if let Value::Integer(n) = current {
            scope::update_value(&dest, &name, Value::Integer(n.wrapping_add(delta)))?;
            return Ok(());
        }
    }
    let (dest, name) = scope::resolve_terminal(var, scope, scope, ctx)?;
    let value = eval_expr(update, scope, ctx)?;
    scope::update_value(&dest, &name, value)
}

fn increment_fast_path(var: &Identifier, update: &Expr) -> Option<i64> {
    let Expr::Op { op, args } = update else {
        return None;
    };
    let delta = match op {
        Op::Add => 1,
        Op::Sub => -1,
        _ => return None,
    };
    let [Expr::Identifier(id), Expr::Constant(Literal::Integer(1))] = args.as_slice() else {
        return None;
    };
    if id.slot.is_some() || var.slot.is_some() {
        return None;
    }
    let (IdentifierName::Direct(a), IdentifierName::Direct(b)) = (&id.name, &var.name) else {
        return None;
    };
    (a == b).then_some(delta)
}

fn exec_deallocation(id: &Identifier, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    let (dest, name) = scope::resolve_terminal(id, scope, scope, ctx)?;
    scope::delete_value(&dest, &name).map_err(|e| e.at(id.location))?;
    Ok(Signal::Default)
}

fn exec_func_def(scope_qualifier: Option<&Identifier>, def: &Rc<crate::ast::FuncDef>, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    let target_scope = match scope_qualifier {
        Some(id) => {
            let name = scope::resolve_name(id, scope, ctx)?;
            scope::get_scope(scope, &name, false)?
        }
        None => Rc::clone(scope),
    };
    if target_scope.borrow().declares_locally(&def.name) {
        return Err(Fault::redefinition(&def.name));
    }
    scope::create_value(&target_scope, &def.name);
    scope::update_value(&target_scope, &def.name, Value::Function(FunctionRef::new(def, scope)))?;
    Ok(Signal::Default)
}

fn exec_alt_array_def(name: &Identifier, parent: Option<&Identifier>, body: &crate::ast::Block, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Signal, Fault> {
    let (dest, leaf) = scope::resolve_terminal(name, scope, scope, ctx)?;
    if dest.borrow().declares_locally(&leaf) {
        return Err(Fault::redefinition(&leaf).at(name.location));
    }
    let lexical_parent = match parent {
        Some(id) => {
            let parent_name = scope::resolve_name(id, scope, ctx)?;
            scope::get_scope(scope, &parent_name, false)?
        }
        None => Rc::clone(&dest),
    };
    let array_scope = Scope::create(&lexical_parent);
    scope::create_value(&dest, &leaf);
    scope::update_value(&dest, &leaf, Value::Array(Rc::clone(&array_scope)))?;
    exec_block(body, &array_scope, ctx)?;
    Ok(Signal::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::FuncDef, context::ScriptedInput, interpolate::NoUnicodeNames, io::CollectPrint};

    fn run_program(program: &crate::ast::Block) -> String {
        let mut print = CollectPrint::new();
        let mut input = ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = EvalCtx::new(&mut print, &mut input, &names);
        exec_program(program, &mut ctx).unwrap();
        print.into_output()
    }

    #[test]
    fn print_joins_args_and_adds_newline() {
        let program = vec![Stmt::Print {
            args: vec![Expr::Constant(Literal::String("hi".into()))],
            no_newline: false,
        }];
        assert_eq!(run_program(&program), "hi\n");
    }

    #[test]
    fn declaration_then_print_round_trips() {
        let id = Identifier::direct("X", crate::error::SourceLoc { file: "t", line: 1 });
        let program = vec![
            Stmt::Declaration {
                target: id.clone(),
                init: Some(Expr::Constant(Literal::Integer(7))),
                declared_type: None,
                parent_scope: None,
            },
            Stmt::Print {
                args: vec![Expr::Identifier(id)],
                no_newline: true,
            },
        ];
        assert_eq!(run_program(&program), "7");
    }

    #[test]
    fn switch_falls_through_until_break() {
        let program = vec![
            Stmt::Switch {
                guards: vec![Expr::Constant(Literal::Integer(1))],
                blocks: vec![
                    vec![Stmt::Print {
                        args: vec![Expr::Constant(Literal::String("a".into()))],
                        no_newline: true,
                    }],
                    vec![Stmt::Print {
                        args: vec![Expr::Constant(Literal::String("b".into()))],
                        no_newline: true,
                    }],
                ],
                default: None,
            },
        ];
        // IT defaults to Nil, which never matches Integer(1); nothing prints.
        assert_eq!(run_program(&program), "");
    }

    #[test]
    fn loop_increment_fast_path_runs_expected_iterations() {
        let loc = crate::error::SourceLoc { file: "t", line: 1 };
        let var = Identifier::direct("I", loc);
        let program = vec![
            Stmt::Declaration {
                target: var.clone(),
                init: Some(Expr::Constant(Literal::Integer(0))),
                declared_type: None,
                parent_scope: None,
            },
            Stmt::Loop {
                var: Some(var.clone()),
                guard: Some(Expr::Op {
                    op: Op::Eq,
                    args: vec![Expr::Identifier(var.clone()), Expr::Identifier(var.clone())],
                }),
                update: Some(Expr::Op {
                    op: Op::Add,
                    args: vec![Expr::Identifier(var.clone()), Expr::Constant(Literal::Integer(1))],
                }),
                body: vec![
                    Stmt::Print {
                        args: vec![Expr::Identifier(var.clone())],
                        no_newline: true,
                    },
                    Stmt::IfThenElse {
                        yes: vec![Stmt::Break],
                        guards: vec![Expr::Op {
                            op: Op::Eq,
                            args: vec![Expr::Identifier(var), Expr::Constant(Literal::Integer(2))],
                        }],
                        blocks: vec![vec![Stmt::Break]],
                        no: None,
                    },
                ],
            },
        ];
        assert_eq!(run_program(&program), "012");
    }

    #[test]
    fn function_call_returns_value() {
        let loc = crate::error::SourceLoc { file: "t", line: 1 };
        let def = Rc::new(FuncDef {
            name: "DOUBLE".to_string(),
            params: vec!["N".to_string()],
            body: vec![Stmt::Return(Some(Expr::Op {
                op: Op::Add,
                args: vec![Expr::Identifier(Identifier::direct("N", loc)), Expr::Identifier(Identifier::direct("N", loc))],
            }))],
        });
        let program = vec![
            Stmt::FuncDef { scope_qualifier: None, def },
            Stmt::Print {
                args: vec![Expr::FuncCall {
                    target: Identifier::direct("DOUBLE", loc),
                    args: vec![Expr::Constant(Literal::Integer(21))],
                }],
                no_newline: true,
            },
        ];
        assert_eq!(run_program(&program), "42");
    }

    #[test]
    fn declared_array_type_yields_empty_scope_parented_on_declaration_site() {
        let loc = crate::error::SourceLoc { file: "t", line: 1 };
        let root = Scope::root();
        let mut print = CollectPrint::new();
        let mut input = ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = EvalCtx::new(&mut print, &mut input, &names);

        let program = vec![Stmt::Declaration {
            target: Identifier::direct("A", loc),
            init: None,
            declared_type: Some(CastTarget::Array),
            parent_scope: None,
        }];
        exec_block(&program, &root, &mut ctx).unwrap();

        let Value::Array(a_scope) = scope::get_value(&root, "A").unwrap() else {
            panic!("A did not declare to an Array");
        };
        assert!(Rc::ptr_eq(a_scope.borrow().parent().unwrap(), &root));
    }

    /// Grounds the `eval_call` fix for the `create_with_caller` argument
    /// order: a call through a qualified target (`A.F()`) must resolve `ME`
    /// inside `F`'s body to `A`, not to whatever scope happened to make the
    /// call. Distinguishes the two by tagging both `A` and the root with a
    /// `TAG` that only a correct `ME` resolution picks apart.
    #[test]
    fn qualified_call_resolves_me_to_the_dispatch_target() {
        let loc = crate::error::SourceLoc { file: "t", line: 1 };
        let a_id = Identifier::direct("A", loc);
        let f_id = Identifier::direct("F", loc);
        let tag_id = Identifier::direct("TAG", loc);
        let ctx_id = Identifier::direct("CTX", loc);
        let result_id = Identifier::direct("RESULT", loc);

        let def = Rc::new(FuncDef {
            name: "F".to_string(),
            params: vec![],
            body: vec![
                Stmt::AltArrayDef {
                    name: ctx_id.clone(),
                    parent: Some(Identifier::direct("ME", loc)),
                    body: vec![],
                },
                Stmt::Return(Some(Expr::Identifier(ctx_id))),
            ],
        });

        let program = vec![
            Stmt::Declaration {
                target: tag_id.clone(),
                init: Some(Expr::Constant(Literal::String("ROOT".into()))),
                declared_type: None,
                parent_scope: None,
            },
            Stmt::Declaration {
                target: a_id.clone(),
                init: None,
                declared_type: Some(CastTarget::Array),
                parent_scope: None,
            },
            Stmt::Declaration {
                target: a_id.clone().with_slot(tag_id.clone()),
                init: Some(Expr::Constant(Literal::String("A".into()))),
                declared_type: None,
                parent_scope: None,
            },
            Stmt::FuncDef { scope_qualifier: Some(a_id.clone()), def },
            Stmt::Declaration {
                target: result_id.clone(),
                init: None,
                declared_type: None,
                parent_scope: None,
            },
            Stmt::Assignment {
                target: result_id.clone(),
                value: Expr::FuncCall { target: a_id.with_slot(f_id), args: vec![] },
            },
        ];

        let root = Scope::root();
        let mut print = CollectPrint::new();
        let mut input = ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = EvalCtx::new(&mut print, &mut input, &names);
        exec_block(&program, &root, &mut ctx).unwrap();

        let Value::Array(result_scope) = scope::get_value(&root, "RESULT").unwrap() else {
            panic!("RESULT did not hold the returned CTX array");
        };
        let Value::String(resolved_tag) = scope::get_value(&result_scope, "TAG").unwrap() else {
            panic!("TAG did not resolve through CTX's parent chain");
        };
        assert_eq!(*resolved_tag.borrow(), "A");
    }
}
