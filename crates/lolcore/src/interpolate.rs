//! Explicit/implicit casts (§4.3) and the `:`-escape string interpolation
//! mini-language that backs every cast to `String`.

use crate::{ast::CastTarget, context::EvalCtx, error::Fault, scope::ScopeRef, value::EPSILON, value::Value};

/// Resolves a `:[NAME]` escape's normative character name to a Unicode code
/// point. This table is external to the core (§1 out-of-scope): implement it
/// with whatever Unicode character database the embedder already has on hand.
pub trait UnicodeNames {
    fn resolve(&self, name: &str) -> Option<char>;
}

/// A `UnicodeNames` that recognizes nothing. Fine for programs that don't use
/// `:[NAME]` escapes; anything that does gets `InterpolationSyntax`.
#[derive(Debug, Default)]
pub struct NoUnicodeNames;

impl UnicodeNames for NoUnicodeNames {
    fn resolve(&self, _name: &str) -> Option<char> {
        None
    }
}

/// Rewrites `raw` left to right, expanding `:`-escapes (§4.3). `:{VAR}` reads
/// `VAR` as a *local* binding of `scope` (or the implicit variable when `VAR`
/// is `IT`) and implicit-casts it to `String`. Never re-scans text it just
/// inserted — `:{}` output is not itself interpolated.
pub fn interpolate(raw: &str, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<String, Fault> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != ':' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let Some(&marker) = chars.get(i + 1) else {
            // A trailing lone ':' with nothing after it: pass through verbatim.
            out.push(':');
            i += 1;
            continue;
        };
        match marker {
            ')' => {
                out.push('\n');
                i += 2;
            }
            '3' => {
                out.push('\r');
                i += 2;
            }
            '>' => {
                out.push('\t');
                i += 2;
            }
            'o' => {
                out.push('\u{7}');
                i += 2;
            }
            '"' => {
                out.push('"');
                i += 2;
            }
            ':' => {
                out.push(':');
                i += 2;
            }
            '(' => {
                let (ch, consumed) = parse_hex_escape(&chars[i + 2..])?;
                out.push(ch);
                i += 2 + consumed;
            }
            '[' => {
                let (ch, consumed) = parse_named_escape(&chars[i + 2..], ctx)?;
                out.push(ch);
                i += 2 + consumed;
            }
            '{' => {
                let (text, consumed) = parse_var_escape(&chars[i + 2..], scope, ctx)?;
                out.push_str(&text);
                i += 2 + consumed;
            }
            _ => {
                // No recognized escape: the colon is literal, re-process the next byte normally.
                out.push(':');
                i += 1;
            }
        }
    }
    Ok(out)
}


fn parse_hex_escape(rest: &[char]) -> Result<(char, usize), Fault> {
    let end = rest
        .iter()
        .position(|&c| c == ')')
        .ok_or_else(|| Fault::interpolation_syntax("unterminated :(HEX) escape, missing ')'"))?;
    let digits: String = rest[..end].iter().collect();
    if digits.starts_with('-') {
        return Err(Fault::interpolation_syntax("negative code point in :(HEX) escape"));
    }
    let code = u32::from_str_radix(&digits, 16)
        .map_err(|_| Fault::interpolation_syntax(format!("invalid hex in :(HEX) escape: {digits}")))?;
    let ch = char::from_u32(code)
        .ok_or_else(|| Fault::interpolation_syntax(format!("code point out of range in :(HEX) escape: {digits}")))?;
    Ok((ch, end + 1))
}

fn parse_named_escape(rest: &[char], ctx: &mut EvalCtx) -> Result<(char, usize), Fault> {
    let end = rest
        .iter()
        .position(|&c| c == ']')
        .ok_or_else(|| Fault::interpolation_syntax("unterminated :[NAME] escape, missing ']'"))?;
    let name: String = rest[..end].iter().collect();
    let ch = ctx
        .unicode_names
        .resolve(&name)
        .ok_or_else(|| Fault::interpolation_syntax(format!("unknown character name in :[NAME] escape: {name}")))?;
    Ok((ch, end + 1))
}

fn parse_var_escape(rest: &[char], scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<(String, usize), Fault> {
    let end = rest
        .iter()
        .position(|&c| c == '}')
        .ok_or_else(|| Fault::interpolation_syntax("unterminated :{VAR} escape, missing '}'"))?;
    let name: String = rest[..end].iter().collect();
    let value = if name == "IT" {
        scope.borrow().implicit()
    } else {
        scope
            .borrow()
            .get_local(&name)
            .ok_or_else(|| Fault::interpolation_syntax(format!("unknown variable in :{{VAR}} escape: {name}")))?
    };
    let cast = implicit_cast(&value, CastTarget::String, scope, ctx)?;
    let Value::String(s) = cast else {
        unreachable!("cast to String always returns Value::String")
    };
    Ok((s.borrow().clone(), end + 1))
}

/// `explicit_cast`: §4.3's cast table. `Nil` as a destination always yields a
/// fresh `Nil` regardless of source.
pub fn explicit_cast(value: &Value, target: CastTarget, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    if target == CastTarget::Nil {
        return Ok(Value::Nil);
    }
    match target {
        CastTarget::Nil => unreachable!(),
        CastTarget::Boolean => cast_to_boolean(value, scope, ctx),
        CastTarget::Integer => cast_to_integer(value, scope, ctx),
        CastTarget::Float => cast_to_float(value, scope, ctx),
        CastTarget::String => cast_to_string(value, scope, ctx),
        // Only meaningful as a Declaration's declared type; a cast-statement
        // targeting Array is rejected (§4.5).
        CastTarget::Array => Err(Fault::type_mismatch("cannot cast to Array")),
    }
}

/// `implicit_cast`: identical to `explicit_cast`, except `Nil` as a *source*
/// cast to anything but `String` fails with `ImplicitNilCast`.
pub fn implicit_cast(value: &Value, target: CastTarget, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    if matches!(value, Value::Nil) && target != CastTarget::String && target != CastTarget::Nil {
        return Err(Fault::implicit_nil_cast());
    }
    explicit_cast(value, target, scope, ctx)
}

fn cast_to_boolean(value: &Value, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let b = match value {
        Value::Nil => false,
        Value::Boolean(b) => *b,
        Value::Integer(n) => *n != 0,
        Value::Float(f) => f.abs() > EPSILON,
        Value::String(_) => {
            let interpolated = interpolated_text(value, scope, ctx)?;
            interpolated.bytes().next().is_some_and(|b| b != 0)
        }
        Value::Function(_) | Value::Array(_) | Value::Blob(_) => {
            return Err(Fault::type_mismatch(format!("cannot cast {} to Boolean", value.type_name())));
        }
    };
    Ok(Value::Boolean(b))
}

fn cast_to_integer(value: &Value, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let n = match value {
        Value::Nil => 0,
        Value::Boolean(b) => i64::from(*b),
        Value::Integer(n) => *n,
        Value::Float(f) => *f as i64,
        Value::String(_) => {
            let interpolated = interpolated_text(value, scope, ctx)?;
            parse_decimal_integer(&interpolated)?
        }
        Value::Function(_) | Value::Array(_) | Value::Blob(_) => {
            return Err(Fault::type_mismatch(format!("cannot cast {} to Integer", value.type_name())));
        }
    };
    Ok(Value::Integer(n))
}

fn cast_to_float(value: &Value, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let f = match value {
        Value::Nil => 0.0,
        Value::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Integer(n) => *n as f32,
        Value::Float(f) => *f,
        Value::String(_) => {
            let interpolated = interpolated_text(value, scope, ctx)?;
            interpolated
                .trim()
                .parse::<f32>()
                .map_err(|_| Fault::numeric_parse(format!("cannot parse Float from {interpolated:?}")))?
        }
        Value::Function(_) | Value::Array(_) | Value::Blob(_) => {
            return Err(Fault::type_mismatch(format!("cannot cast {} to Float", value.type_name())));
        }
    };
    Ok(Value::Float(f))
}

fn cast_to_string(value: &Value, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    let s = match value {
        Value::Nil => String::new(),
        // Rejected by the source interpreter; preserved verbatim (§9 open questions).
        Value::Boolean(_) => return Err(Fault::type_mismatch("cannot cast Boolean to String")),
        Value::Integer(n) => n.to_string(),
        // Truncated, not rounded, to 2 decimal places (§4.3): 1.999 casts to
        // "1.99", not "2.00".
        Value::Float(f) => format!("{:.2}", (f * 100.0).trunc() / 100.0),
        Value::String(_) => interpolated_text(value, scope, ctx)?,
        Value::Function(_) | Value::Array(_) | Value::Blob(_) => {
            return Err(Fault::type_mismatch(format!("cannot cast {} to String", value.type_name())));
        }
    };
    Ok(Value::string(s))
}

/// `Eq`/`Neq`/`Switch` guard matching compare a string's *interpolated*
/// content, not its raw escape sequences: a literal always carries raw bytes
/// until cast, so comparing two strings without this step would compare
/// their unexpanded source text instead of their displayed value.
pub(crate) fn interpolate_if_string(value: Value, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<Value, Fault> {
    if matches!(value, Value::String(_)) {
        explicit_cast(&value, CastTarget::String, scope, ctx)
    } else {
        Ok(value)
    }
}

fn interpolated_text(value: &Value, scope: &ScopeRef, ctx: &mut EvalCtx) -> Result<String, Fault> {
    let Value::String(raw) = value else {
        unreachable!("interpolated_text is only called on Value::String");
    };
    let raw = raw.borrow().clone();
    interpolate(&raw, scope, ctx)
}

/// Accepts an optional leading `-` then one or more digits; rejects a decimal
/// point, per the "decimal-string" predicate the source applies before
/// parsing an Integer.
fn parse_decimal_integer(s: &str) -> Result<i64, Fault> {
    let trimmed = s.trim();
    if trimmed.contains('.') {
        return Err(Fault::numeric_parse(format!(
            "cannot parse Integer from {trimmed:?}: contains a decimal point"
        )));
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| Fault::numeric_parse(format!("cannot parse Integer from {trimmed:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::NoPrint;

    fn test_ctx<'a>(print: &'a mut NoPrint, input: &'a mut crate::context::ScriptedInput, names: &'a NoUnicodeNames) -> EvalCtx<'a> {
        EvalCtx::new(print, input, names)
    }

    #[test]
    fn escape_table_round_trips() {
        let scope = crate::scope::Scope::root();
        let mut print = NoPrint;
        let mut input = crate::context::ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = test_ctx(&mut print, &mut input, &names);
        let out = interpolate(r#":):3:>:o:"::"#, &scope, &mut ctx).unwrap();
        assert_eq!(out, "\n\r\t\u{7}\":");
    }

    #[test]
    fn quote_escape_then_brace_is_not_a_var_escape() {
        let scope = crate::scope::Scope::root();
        let mut print = NoPrint;
        let mut input = crate::context::ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = test_ctx(&mut print, &mut input, &names);
        let out = interpolate(r#":":}"#, &scope, &mut ctx).unwrap();
        assert_eq!(out, "\":}");
    }

    #[test]
    fn var_escape_reads_it_from_implicit_variable() {
        let scope = crate::scope::Scope::root();
        scope.borrow_mut().set_implicit(Value::Integer(42));
        let mut print = NoPrint;
        let mut input = crate::context::ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = test_ctx(&mut print, &mut input, &names);
        let out = interpolate(":{IT}", &scope, &mut ctx).unwrap();
        assert_eq!(out, "42");
    }

    #[test]
    fn hex_escape_rejects_missing_paren() {
        let scope = crate::scope::Scope::root();
        let mut print = NoPrint;
        let mut input = crate::context::ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = test_ctx(&mut print, &mut input, &names);
        assert!(interpolate(":(41", &scope, &mut ctx).is_err());
    }

    #[test]
    fn boolean_to_string_is_rejected() {
        let scope = crate::scope::Scope::root();
        let mut print = NoPrint;
        let mut input = crate::context::ScriptedInput::default();
        let names = NoUnicodeNames;
        let mut ctx = test_ctx(&mut print, &mut input, &names);
        assert!(explicit_cast(&Value::Boolean(true), CastTarget::String, &scope, &mut ctx).is_err());
    }

    #[test]
    fn integer_string_with_dot_is_rejected() {
        assert!(parse_decimal_integer("3.0").is_err());
        assert_eq!(parse_decimal_integer("-7").unwrap(), -7);
    }
}
