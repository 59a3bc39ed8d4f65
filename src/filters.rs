//! Built-in filters and coercion types.
//!
//! Structural filters (`repeat`, `at`, `to`, `prune`, `fail`) steer where a
//! value lands; the rest transform the value itself. Filter signatures are
//! declared positionally: position 0 types the subject value, later
//! positions type the raw parameters, with `?default`, `a|b|c` enum and
//! `name*` rest variants.

use std::collections::HashMap;

use crate::context::Context;
use crate::engine::{Engine, EngineError};
use crate::place::{parse_range, Target};
use crate::repeat;
use crate::tree::Document;
use crate::value::Value;

/// Register every built-in on a fresh engine.
pub fn register<D: Document>(engine: &mut Engine<D>) {
    engine.add_type("any", type_any);
    engine.add_type("str", type_str);
    engine.add_type("int", type_int);
    engine.add_type("float", type_float);
    engine.add_type("num", type_num);
    engine.add_type("bool", type_bool);
    engine.add_type("array", type_array);
    engine.add_type("path", type_path);
    engine.add_type("filter", type_filter);
    engine.add_type("entries", type_entries);

    engine.add_filter("repeat", &["array?", "str?", "filter?"], repeat::repeat);
    engine.add_filter("at", &["any?", "str?*", "str?", "str?"], filter_at);
    engine.add_filter("to", &["any?", "str?", "str?"], filter_to);
    engine.add_filter("prune", &["any?", "str?*", "str?", "str?"], filter_prune);
    engine.add_filter("fail", &["any?"], filter_fail);

    engine.add_filter("or", &["any?", "str"], filter_or);
    engine.add_filter("and", &["any?", "str"], filter_and);
    engine.add_filter("alt", &["any?", "str?", "str?"], filter_alt);
    engine.add_filter("not", &["any?"], filter_not);
    engine.add_filter("eq", &["any?", "str", "str?"], filter_eq);
    engine.add_filter("neq", &["any?", "str", "str?"], filter_neq);
    engine.add_filter("switch", &["any?", "str*"], filter_switch);
    engine.add_filter("const", &["any?", "str"], filter_const);
    engine.add_filter("as", &["any?", "str"], filter_as);
    engine.add_filter("format", &["any?", "str", "str?"], filter_format);

    engine.add_filter("case", &["str?", "up|low|caps"], filter_case);
    engine.add_filter("pre", &["str?", "str"], filter_pre);
    engine.add_filter("post", &["str?", "str"], filter_post);
    engine.add_filter("trim", &["str?"], filter_trim);
    engine.add_filter("split", &["str?", "str?"], filter_split);
    engine.add_filter("join", &["array?", "str?"], filter_join);

    engine.add_filter("nth", &["array?", "int"], filter_nth);
    engine.add_filter("slice", &["array?", "int?0", "int?"], filter_slice);
    engine.add_filter("sort", &["array?"], filter_sort);
    engine.add_filter("rev", &["array?"], filter_rev);
    engine.add_filter("keys", &["any?"], filter_keys);
    engine.add_filter("values", &["any?"], filter_values);
}

type Out = Result<Option<Value>, EngineError>;

// ----------------------------------------------------------------------
// Coercion types
// ----------------------------------------------------------------------

fn type_any<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    v
}

fn type_str<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    v.map(|v| Value::String(v.as_string()))
}

fn type_int<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    v.and_then(|v| v.as_int()).map(Value::Integer)
}

fn type_float<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    v.and_then(|v| v.as_float()).map(Value::Float)
}

fn type_num<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    match v {
        Some(Value::Integer(n)) => Some(Value::Integer(n)),
        Some(Value::Float(n)) => Some(Value::Float(n)),
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Value::Integer(i))
            } else {
                s.parse::<f64>().ok().map(Value::Float)
            }
        }
        _ => None,
    }
}

fn type_bool<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    let v = v?;
    let b = match &v {
        Value::Boolean(b) => *b,
        Value::String(s) => match s.as_str() {
            "true" => true,
            "false" => false,
            other => !other.is_empty(),
        },
        other => other.is_truthy(),
    };
    Some(Value::Boolean(b))
}

fn type_array<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    match v {
        None => None,
        Some(Value::Null) => Some(Value::Array(Vec::new())),
        Some(Value::Array(items)) => Some(Value::Array(items)),
        Some(other) => Some(Value::Array(vec![other])),
    }
}

fn type_path<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    match v {
        Some(Value::String(s)) => {
            if s.is_empty() {
                Some(Value::Array(Vec::new()))
            } else {
                Some(Value::Array(
                    s.split('.').map(|p| Value::String(p.to_string())).collect(),
                ))
            }
        }
        _ => None,
    }
}

fn type_filter<D: Document>(ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    match v {
        Some(Value::String(s)) if ctx.engine.filters.contains_key(&s) => {
            Some(Value::String(s))
        }
        _ => None,
    }
}

/// Objects become `{key, value}` pairs in key order; arrays get their
/// indices as keys. This is how repeat iterates objects without special-
/// casing them.
fn type_entries<D: Document>(_ctx: &mut Context<'_, D>, v: Option<Value>) -> Option<Value> {
    match v {
        Some(Value::Object(map)) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            Some(Value::Array(
                keys.into_iter()
                    .map(|k| {
                        let mut pair = HashMap::new();
                        pair.insert("value".to_string(), map[&k].clone());
                        pair.insert("key".to_string(), Value::String(k));
                        Value::Object(pair)
                    })
                    .collect(),
            ))
        }
        Some(Value::Array(items)) => Some(Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    let mut pair = HashMap::new();
                    pair.insert("key".to_string(), Value::Integer(i as i64));
                    pair.insert("value".to_string(), v);
                    Value::Object(pair)
                })
                .collect(),
        )),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Structural filters
// ----------------------------------------------------------------------

/// `at:range:before:after` — widen the destination to an ancestor and
/// declare how many siblings on each side ride along.
fn filter_at<D: Document>(ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let spec = params[0].as_string();
    let spec = if spec.is_empty() { "*".to_string() } else { spec };
    ctx.dest.extend(&*ctx.doc, &spec);
    if let Value::String(s) = &params[1] {
        ctx.dest.before = parse_range(s);
    }
    if let Value::String(s) = &params[2] {
        ctx.dest.after = parse_range(s);
    }
    Ok(val)
}

/// `to:target:selector` — reinterpret the destination: an attribute name,
/// `*` for the whole node, `-` for its content, nothing to drop the write.
fn filter_to<D: Document>(ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let to = match &params[0] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    let sel = match &params[1] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    ctx.dest.restrict(&*ctx.doc, to.as_deref(), sel.as_deref());
    Ok(val)
}

/// `prune:range:before:after` — position like `at`, drop the write, and
/// remove the ranged subtree entirely when the value is falsey.
fn filter_prune<D: Document>(
    ctx: &mut Context<'_, D>,
    val: Option<Value>,
    params: &[Value],
) -> Out {
    let spec = params[0].as_string();
    let spec = if spec.is_empty() { "*".to_string() } else { spec };
    ctx.dest.extend(&*ctx.doc, &spec);
    if let Value::String(s) = &params[1] {
        ctx.dest.before = parse_range(s);
    }
    if let Value::String(s) = &params[2] {
        ctx.dest.after = parse_range(s);
    }
    let keep = val.as_ref().map(Value::is_truthy).unwrap_or(false);
    if !keep {
        let (_, cursor) = {
            let Context {
                ref dest,
                ref mut doc,
                ref mut state,
                ..
            } = *ctx;
            dest.extract(&mut **doc, &mut **state)
        };
        ctx.doc.arena_mut().detach(cursor);
    }
    ctx.dest.target = Target::None;
    Ok(val)
}

/// Cancel the hit unless the value is truthy.
fn filter_fail<D: Document>(ctx: &mut Context<'_, D>, val: Option<Value>, _params: &[Value]) -> Out {
    if !val.as_ref().map(Value::is_truthy).unwrap_or(false) {
        ctx.expr.cancel = true;
    }
    Ok(val)
}

// ----------------------------------------------------------------------
// Logic and defaulting
// ----------------------------------------------------------------------

fn filter_or<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    match val {
        None | Some(Value::Null) => Ok(Some(params[0].clone())),
        some => Ok(some),
    }
}

fn filter_and<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    match val {
        Some(v) if v.is_truthy() => Ok(Some(params[0].clone())),
        other => Ok(other),
    }
}

/// Boolean projection: truthy becomes the first parameter, falsey the
/// second (default nothing).
fn filter_alt<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let truthy = val.as_ref().map(Value::is_truthy).unwrap_or(false);
    Ok(Some(if truthy {
        params[0].clone()
    } else {
        params[1].clone()
    }))
}

fn filter_not<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, _params: &[Value]) -> Out {
    let truthy = val.as_ref().map(Value::is_truthy).unwrap_or(false);
    Ok(Some(Value::Boolean(!truthy)))
}

fn filter_eq<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let subject = val.map(|v| v.as_string()).unwrap_or_default();
    let hit = subject == params[0].as_string();
    match (&params[1], hit) {
        (Value::Null, _) => Ok(Some(Value::Boolean(hit))),
        (then, true) => Ok(Some(then.clone())),
        (_, false) => Ok(Some(Value::Null)),
    }
}

fn filter_neq<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let subject = val.map(|v| v.as_string()).unwrap_or_default();
    let miss = subject != params[0].as_string();
    match (&params[1], miss) {
        (Value::Null, _) => Ok(Some(Value::Boolean(miss))),
        (then, true) => Ok(Some(then.clone())),
        (_, false) => Ok(Some(Value::Null)),
    }
}

/// `switch:case:result:...:default` — map the value through case/result
/// pairs; an odd trailing parameter is the default.
fn filter_switch<D: Document>(
    _ctx: &mut Context<'_, D>,
    val: Option<Value>,
    params: &[Value],
) -> Out {
    let subject = val.as_ref().map(|v| v.as_string()).unwrap_or_default();
    let Value::Array(cases) = &params[0] else {
        return Ok(val);
    };
    let mut i = 0;
    while i + 1 < cases.len() {
        if cases[i].as_string() == subject {
            return Ok(Some(cases[i + 1].clone()));
        }
        i += 2;
    }
    if cases.len() % 2 == 1 {
        return Ok(Some(cases[cases.len() - 1].clone()));
    }
    Ok(Some(Value::Null))
}

fn filter_const<D: Document>(_ctx: &mut Context<'_, D>, _val: Option<Value>, params: &[Value]) -> Out {
    Ok(Some(params[0].clone()))
}

/// Re-coerce the value through a registered type (`as:int`, `as:entries`,
/// a custom type, ...).
fn filter_as<D: Document>(ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let name = params[0].as_string();
    ctx.coerce(&name, val)
}

/// Render the value through a registered named format
/// (`format:name[:spec]`).
fn filter_format<D: Document>(ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let name = params[0].as_string();
    let spec = params[1].as_string();
    let engine = ctx.engine;
    let Some(f) = engine.formats.get(&name).copied() else {
        return Err(EngineError::Filter {
            filter: "format".to_string(),
            message: format!("unknown format: {}", name),
        });
    };
    match val {
        Some(v) => Ok(f(ctx, &v, &spec)),
        None => Ok(None),
    }
}

// ----------------------------------------------------------------------
// Strings
// ----------------------------------------------------------------------

fn filter_case<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let s = match val {
        Some(Value::String(s)) => s,
        other => return Ok(other),
    };
    let out = match params[0].as_string().as_str() {
        "up" => s.to_uppercase(),
        "low" => s.to_lowercase(),
        _ => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        }
    };
    Ok(Some(Value::String(out)))
}

fn filter_pre<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    match val {
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(Value::String(format!(
            "{}{}",
            params[0].as_string(),
            s
        )))),
        other => Ok(other),
    }
}

fn filter_post<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    match val {
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(Value::String(format!(
            "{}{}",
            s,
            params[0].as_string()
        )))),
        other => Ok(other),
    }
}

fn filter_trim<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, _params: &[Value]) -> Out {
    match val {
        Some(Value::String(s)) => Ok(Some(Value::String(s.trim().to_string()))),
        other => Ok(other),
    }
}

fn filter_split<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let s = match val {
        Some(Value::String(s)) => s,
        other => return Ok(other),
    };
    let parts: Vec<Value> = match &params[0] {
        Value::String(sep) if !sep.is_empty() => s
            .split(sep.as_str())
            .map(|p| Value::String(p.to_string()))
            .collect(),
        _ => s
            .split_whitespace()
            .map(|p| Value::String(p.to_string()))
            .collect(),
    };
    Ok(Some(Value::Array(parts)))
}

fn filter_join<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let items = match val {
        Some(Value::Array(items)) => items,
        other => return Ok(other),
    };
    let sep = params[0].as_string();
    let joined = items
        .iter()
        .map(Value::as_string)
        .collect::<Vec<_>>()
        .join(&sep);
    Ok(Some(Value::String(joined)))
}

// ----------------------------------------------------------------------
// Collections
// ----------------------------------------------------------------------

fn filter_nth<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let items = match val {
        Some(Value::Array(items)) => items,
        other => return Ok(other),
    };
    let len = items.len() as i64;
    let mut idx = params[0].as_int().unwrap_or(0);
    if idx < 0 {
        idx += len;
    }
    if (0..len).contains(&idx) {
        Ok(Some(items[idx as usize].clone()))
    } else {
        Ok(Some(Value::Null))
    }
}

fn filter_slice<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, params: &[Value]) -> Out {
    let items = match val {
        Some(Value::Array(items)) => items,
        other => return Ok(other),
    };
    let len = items.len() as i64;
    let clamp = |i: i64| -> usize {
        let i = if i < 0 { len + i } else { i };
        i.clamp(0, len) as usize
    };
    let begin = clamp(params[0].as_int().unwrap_or(0));
    let end = match &params[1] {
        Value::Null => items.len(),
        v => clamp(v.as_int().unwrap_or(len)),
    };
    if begin >= end {
        return Ok(Some(Value::Array(Vec::new())));
    }
    Ok(Some(Value::Array(items[begin..end].to_vec())))
}

fn filter_sort<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, _params: &[Value]) -> Out {
    let mut items = match val {
        Some(Value::Array(items)) => items,
        other => return Ok(other),
    };
    items.sort_by(|a, b| match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.as_string().cmp(&b.as_string()),
    });
    Ok(Some(Value::Array(items)))
}

fn filter_rev<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, _params: &[Value]) -> Out {
    let mut items = match val {
        Some(Value::Array(items)) => items,
        other => return Ok(other),
    };
    items.reverse();
    Ok(Some(Value::Array(items)))
}

fn filter_keys<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, _params: &[Value]) -> Out {
    match val {
        Some(Value::Object(map)) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            Ok(Some(Value::Array(
                keys.into_iter().map(Value::String).collect(),
            )))
        }
        Some(Value::Array(items)) => Ok(Some(Value::Array(
            (0..items.len() as i64).map(Value::Integer).collect(),
        ))),
        _ => Ok(Some(Value::Null)),
    }
}

fn filter_values<D: Document>(_ctx: &mut Context<'_, D>, val: Option<Value>, _params: &[Value]) -> Out {
    match val {
        Some(Value::Object(map)) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            Ok(Some(Value::Array(
                keys.into_iter().map(|k| map[&k].clone()).collect(),
            )))
        }
        Some(Value::Array(items)) => Ok(Some(Value::Array(items))),
        _ => Ok(Some(Value::Null)),
    }
}
