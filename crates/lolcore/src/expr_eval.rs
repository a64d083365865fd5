//! The expression evaluator (§4.4).
//!
//! Arithmetic and comparison operators dispatch on the operand type pair
//! (match on `(Numeric, Numeric)`) rather than a generic numeric trait,
//! mirroring how the core's sibling evaluators keep each operand
//! combination spelled out explicitly instead of hiding it behind overload
//! resolution.

use std::process::Command;

use crate::{
    ast::{CastTarget, Expr, Literal, Op},
    context::EvalCtx,
    error::Fault,
    interpolate,
    scope::{self, ScopeRef},
    signal::Signal,
    stmt_eval,
    value::Value,
};

#[derive(Debug, Clone, Copy)]
enum Numeric {
    Integer(i64),
    Float(f32),
}

pub(crate) fn eval_expr(expr: &Expr, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    match expr {
        Expr::ImpVar => Ok(scope.borrow().implicit()),
        Expr::Constant(lit) => Ok(eval_literal(lit)),
        Expr::Identifier(id) => {
            let (dest, name) = scope::resolve_terminal(id, scope, scope, ctx)?;
            scope::get_value(&dest, &name).map_err(|e| e.at(id.location))
        }
        Expr::Cast { expr, target } => {
            let value = eval_expr(expr, scope, ctx)?;
            interpolate::explicit_cast(&value, *target, scope, ctx)
        }
        Expr::Op { op, args } => eval_op(*op, args, scope, ctx),
        Expr::FuncCall { target, args } => eval_call(target, args, scope, ctx),
        Expr::SystemCommand(inner) => eval_system_command(inner, scope, ctx),
    }
}

fn eval_literal(lit: &Literal) -> Value {
    match lit {
        Literal::Nil => Value::Nil,
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Integer(n) => Value::Integer(*n),
        Literal::Float(f) => Value::Float(*f),
        // Raw bytes, not yet interpolated; see crate::interpolate.
        Literal::String(s) => Value::string(s.clone()),
    }
}

fn eval_op(op: Op, args: &[Expr], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    match op {
        Op::Add | Op::Sub | Op::Mult | Op::Div | Op::Mod | Op::Max | Op::Min => eval_arith(op, args, scope, ctx),
        Op::And | Op::Or | Op::Xor => eval_bool_fold(op, args, scope, ctx),
        Op::Not => eval_not(args, scope, ctx),
        Op::Eq | Op::Neq => eval_eq(op, args, scope, ctx),
        Op::Concat => eval_concat(args, scope, ctx),
    }
}

fn eval_arith(op: Op, args: &[Expr], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let [first, rest @ ..] = args else {
        return Err(Fault::type_mismatch("arithmetic operator needs at least one argument"));
    };
    let first = eval_expr(first, scope, ctx)?;
    let mut acc = to_numeric(&first, scope, ctx)?;
    for arg in rest {
        let next = eval_expr(arg, scope, ctx)?;
        let next = to_numeric(&next, scope, ctx)?;
        acc = apply_arith(op, acc, promote_like(acc, next))?;
    }
    Ok(numeric_to_value(acc))
}

/// Promotes `b` to match `a`'s shape when the pair disagrees, so every
/// `apply_arith` match arm only ever sees same-variant pairs.
fn promote_like(a: Numeric, b: Numeric) -> Numeric {
    match (a, b) {
        (Numeric::Float(_), Numeric::Integer(n)) => Numeric::Float(n as f32),
        (Numeric::Integer(_), Numeric::Float(f)) => Numeric::Float(f),
        _ => b,
    }
}

/// Promotes an arithmetic operand to a native numeric: `Nil`/`Boolean` go
/// through the usual `Integer` cast; a `String` is interpolated first, then
/// reads as `Float` if it contains a `.`, otherwise as `Integer`. `Integer`
/// and `Float` operands pass through unchanged.
fn to_numeric(value: &Value, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Numeric, Fault> {
    match value {
        Value::Integer(n) => Ok(Numeric::Integer(*n)),
        Value::Float(f) => Ok(Numeric::Float(*f)),
        Value::Nil | Value::Boolean(_) => {
            let cast = interpolate::implicit_cast(value, CastTarget::Integer, scope, ctx)?;
            let Value::Integer(n) = cast else {
                unreachable!("cast to Integer always returns Value::Integer");
            };
            Ok(Numeric::Integer(n))
        }
        Value::String(_) => {
            let cast = interpolate::implicit_cast(value, CastTarget::String, scope, ctx)?;
            let Value::String(s) = cast else {
                unreachable!("cast to String always returns Value::String");
            };
            let text = s.borrow().trim().to_string();
            if text.contains('.') {
                text.parse::<f32>().map(Numeric::Float).map_err(|_| Fault::numeric_parse(format!("cannot parse Float from {text:?}")))
            } else {
                text.parse::<i64>().map(Numeric::Integer).map_err(|_| Fault::numeric_parse(format!("cannot parse Integer from {text:?}")))
            }
        }
        Value::Function(_) | Value::Array(_) | Value::Blob(_) => Err(Fault::type_mismatch(format!("cannot use {} in arithmetic", value.type_name()))),
    }
}

fn numeric_to_value(n: Numeric) -> Value {
    match n {
        Numeric::Integer(n) => Value::Integer(n),
        Numeric::Float(f) => Value::Float(f),
    }
}

fn apply_arith(op: Op, a: Numeric, b: Numeric) -> Result<Numeric, Fault> {
    // promote_like guarantees `a` and `b` share a variant before we get here;
    // if either started out Float, both operands were promoted to Float.
    match (a, b) {
        (Numeric::Integer(x), Numeric::Integer(y)) => apply_arith_int(op, x, y),
        (Numeric::Float(x), Numeric::Float(y)) => apply_arith_float(op, x, y),
        (Numeric::Integer(x), Numeric::Float(y)) => apply_arith_float(op, x as f32, y),
        (Numeric::Float(x), Numeric::Integer(y)) => apply_arith_float(op, x, y as f32),
    }
}

fn apply_arith_int(op: Op, x: i64, y: i64) -> Result<Numeric, Fault> {
    match op {
        Op::Add => Ok(Numeric::Integer(x.wrapping_add(y))),
        Op::Sub => Ok(Numeric::Integer(x.wrapping_sub(y))),
        Op::Mult => Ok(Numeric::Integer(x.wrapping_mul(y))),
        Op::Div => {
            if y == 0 {
                return Err(Fault::division_by_zero());
            }
            Ok(Numeric::Integer(x.wrapping_div(y)))
        }
        Op::Mod => {
            if y == 0 {
                return Err(Fault::division_by_zero());
            }
            Ok(Numeric::Integer(x.rem_euclid(y)))
        }
        Op::Max => Ok(Numeric::Integer(x.max(y))),
        Op::Min => Ok(Numeric::Integer(x.min(y))),
        _ => unreachable!("eval_arith only dispatches arithmetic ops here"),
    }
}

fn apply_arith_float(op: Op, x: f32, y: f32) -> Result<Numeric, Fault> {
    match op {
        Op::Add => Ok(Numeric::Float(x + y)),
        Op::Sub => Ok(Numeric::Float(x - y)),
        Op::Mult => Ok(Numeric::Float(x * y)),
        Op::Div => {
            if y.abs() < crate::value::EPSILON {
                return Err(Fault::division_by_zero());
            }
            Ok(Numeric::Float(x / y))
        }
        Op::Mod => {
            if y.abs() < crate::value::EPSILON {
                return Err(Fault::division_by_zero());
            }
            Ok(Numeric::Float(x.rem_euclid(y)))
        }
        Op::Max => Ok(Numeric::Float(x.max(y))),
        Op::Min => Ok(Numeric::Float(x.min(y))),
        _ => unreachable!("eval_arith only dispatches arithmetic ops here"),
    }
}

fn eval_bool_fold(op: Op, args: &[Expr], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let mut acc: Option<bool> = None;
    for arg in args {
        let value = eval_expr(arg, scope, ctx)?;
        let cast = interpolate::implicit_cast(&value, CastTarget::Boolean, scope, ctx)?;
        let Value::Boolean(b) = cast else {
            unreachable!("cast to Boolean always returns Value::Boolean");
        };
        acc = Some(match acc {
            None => b,
            Some(prev) => match op {
                Op::And => prev && b,
                Op::Or => prev || b,
                Op::Xor => prev ^ b,
                _ => unreachable!("eval_bool_fold only dispatches And/Or/Xor"),
            },
        });
        match (op, acc) {
            (Op::And, Some(false)) | (Op::Or, Some(true)) => break,
            _ => {}
        }
    }
    Ok(Value::Boolean(acc.unwrap_or(false)))
}

fn eval_not(args: &[Expr], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let [arg] = args else {
        return Err(Fault::type_mismatch("NOT takes exactly one argument"));
    };
    let value = eval_expr(arg, scope, ctx)?;
    let cast = interpolate::implicit_cast(&value, CastTarget::Boolean, scope, ctx)?;
    let Value::Boolean(b) = cast else {
        unreachable!("cast to Boolean always returns Value::Boolean");
    };
    Ok(Value::Boolean(!b))
}

fn eval_eq(op: Op, args: &[Expr], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let [lhs, rhs] = args else {
        return Err(Fault::type_mismatch("comparison takes exactly two arguments"));
    };
    let a = interpolate::interpolate_if_string(eval_expr(lhs, scope, ctx)?, scope, ctx)?;
    let b = interpolate::interpolate_if_string(eval_expr(rhs, scope, ctx)?, scope, ctx)?;
    let eq = a.structurally_eq(&b);
    Ok(Value::Boolean(if op == Op::Eq { eq } else { !eq }))
}

fn eval_concat(args: &[Expr], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let mut out = String::new();
    for arg in args {
        let value = eval_expr(arg, scope, ctx)?;
        let cast = interpolate::implicit_cast(&value, CastTarget::String, scope, ctx)?;
        let Value::String(s) = cast else {
            unreachable!("cast to String always returns Value::String");
        };
        out.push_str(&s.borrow());
    }
    Ok(Value::string(out))
}

fn eval_call(target: &crate::ast::Identifier, args: &[Expr], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let (dest, name) = scope::resolve_terminal(target, scope, scope, ctx)?;
    let func_value = scope::get_value(&dest, &name).map_err(|e| e.at(target.location))?;
    let Value::Function(func_ref) = func_value else {
        return Err(Fault::not_callable(&name).at(target.location));
    };
    let def = func_ref.upgrade().ok_or_else(|| Fault::not_callable(&name))?;
    if args.len() != def.params.len() {
        return Err(Fault::arity_mismatch(&name, def.params.len(), args.len()).at(target.location));
    }
    let values = args.iter().map(|a| eval_expr(a, scope, ctx)).collect::<Result<Vec<_>, _>>()?;

    // Parent is the function's own lexical declaration scope, not the call
    // site or the dispatch target; caller is the dispatch target, so `ME`
    // inside the body resolves to it rather than to the call site's own caller.
    let frame = crate::scope::Scope::create_with_caller(func_ref.declaration_scope(), &dest);
    for (param, value) in def.params.iter().zip(values) {
        scope::create_value(&frame, param);
        scope::update_value(&frame, param, value)?;
    }

    ctx.enter_call()?;
    let result = stmt_eval::exec_block(&def.body, &frame, ctx);
    ctx.leave_call();

    match result? {
        Signal::Return(value) => Ok(value.unwrap_or(Value::Nil)),
        Signal::Default => {
            // Falling off the end of the body yields the frame's own implicit
            // variable; steal it out so the frame doesn't also hold a live
            // reference to the value we're about to return.
            Ok(frame.borrow_mut().set_implicit(Value::Nil))
        }
        Signal::Break => Ok(Value::Nil),
    }
}

fn eval_system_command(inner: &Expr, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let value = eval_expr(inner, scope, ctx)?;
    let cast = interpolate::explicit_cast(&value, CastTarget::String, scope, ctx)?;
    let Value::String(command) = cast else {
        unreachable!("cast to String always returns Value::String");
    };
    let command = command.borrow().clone();
    let output = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .output()
        .map_err(|e| Fault::binding_contract(format!("failed to execute system command: {e}")))?;
    let text = String::from_utf8_lossy(&output.stdout);
    Ok(Value::string(text.trim_end_matches('\n')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::ScriptedInput, interpolate::NoUnicodeNames, io::NoPrint, scope::Scope};

    fn run(expr: &Expr, scope: &ScopeRef) -> Result<Value, Fault> {
        let mut print = NoPrint;
        let mut input = ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = EvalCtx::new(&mut print, &mut input, &names);
        eval_expr(expr, scope, &mut ctx)
    }

    #[test]
    fn integer_addition_stays_integer() {
        let scope = Scope::root();
        let expr = Expr::Op {
            op: Op::Add,
            args: vec![Expr::Constant(Literal::Integer(2)), Expr::Constant(Literal::Integer(3))],
        };
        assert!(matches!(run(&expr, &scope), Ok(Value::Integer(5))));
    }

    #[test]
    fn mixed_addition_promotes_to_float() {
        let scope = Scope::root();
        let expr = Expr::Op {
            op: Op::Add,
            args: vec![Expr::Constant(Literal::Integer(2)), Expr::Constant(Literal::Float(0.5))],
        };
        match run(&expr, &scope) {
            Ok(Value::Float(f)) => assert!((f - 2.5).abs() < crate::value::EPSILON),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn integer_division_by_zero_errors() {
        let scope = Scope::root();
        let expr = Expr::Op {
            op: Op::Div,
            args: vec![Expr::Constant(Literal::Integer(1)), Expr::Constant(Literal::Integer(0))],
        };
        assert!(run(&expr, &scope).is_err());
    }

    #[test]
    fn concat_casts_each_argument_to_string() {
        let scope = Scope::root();
        let expr = Expr::Op {
            op: Op::Concat,
            args: vec![Expr::Constant(Literal::String("a".into())), Expr::Constant(Literal::Integer(1))],
        };
        match run(&expr, &scope) {
            Ok(Value::String(s)) => assert_eq!(*s.borrow(), "a1"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn eq_compares_interpolated_string_content() {
        let scope = Scope::root();
        let expr = Expr::Op {
            op: Op::Eq,
            args: vec![Expr::Constant(Literal::String("::".into())), Expr::Constant(Literal::String(":".into()))],
        };
        assert!(matches!(run(&expr, &scope), Ok(Value::Boolean(true))));
    }
}
