//! The repeat mechanism: turn the subtree an expression lives in into a
//! template, then re-merge a clone of it once per item of the subject
//! collection.

use std::collections::HashMap;

use crate::context::Context;
use crate::engine::EngineError;
use crate::place::Target;
use crate::tree::{Document, NodeId};
use crate::value::Value;

/// The `repeat[:alias[:placer]]` filter.
///
/// The subject must already be array-like (the `array` coercion wraps a
/// lone value, and objects go through `as:entries` first). The destination
/// widens to the owner node unless an earlier `at` positioned it, the
/// template is extracted around a live cursor, and each item's child scope
/// drives a full recursive merge of a deep clone. No value returns to the
/// pipeline: the tree mutation is the result.
pub fn repeat<D: Document>(
    ctx: &mut Context<'_, D>,
    val: Option<Value>,
    params: &[Value],
) -> Result<Option<Value>, EngineError> {
    let items = match val {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    };
    let alias = params.first().and_then(param_str);
    let placer = params.get(1).and_then(param_str);

    // default positioning: widen to the node the expression lives in
    if matches!(ctx.dest.target, Target::Text | Target::Attr | Target::Tag) {
        ctx.dest.restrict(&*ctx.doc, Some("*"), None);
    }

    // rewrite the source hit so each item clone re-merges against the
    // alias instead of the original collection path
    let full = ctx.src.read(&*ctx.doc).unwrap_or_default();
    let prefix: String = ctx.src.hits.iter().map(|h| h.raw.as_str()).collect();
    let consumed = prefix.len() + ctx.raw_source.len();
    let tail = full.get(consumed..).unwrap_or("").to_string();
    let rebased = ctx.expr.rebased_source(alias.as_deref());

    if ctx.src.target == Target::Text && ctx.dest.node == ctx.src.node {
        // the text run itself is the template: split off the surrounding
        // literal text so only the hit repeats, and merge the split-off
        // runs against the outer scope (the walk has already passed them)
        let parent = ctx.doc.arena().parent(ctx.src.node);
        let next = ctx.doc.arena().next_sibling(ctx.src.node);
        if let Some(parent) = parent {
            if !prefix.is_empty() {
                let node = ctx.doc.arena_mut().create_text(&prefix);
                ctx.doc
                    .arena_mut()
                    .insert_before(parent, node, Some(ctx.src.node));
                ctx.engine.merge_node(&mut *ctx.doc, node, &ctx.scope.data)?;
            }
            if !tail.is_empty() {
                let node = ctx.doc.arena_mut().create_text(&tail);
                ctx.doc.arena_mut().insert_before(parent, node, next);
                ctx.engine.merge_node(&mut *ctx.doc, node, &ctx.scope.data)?;
            }
            ctx.doc.arena_mut().set_text(ctx.src.node, &rebased);
        } else {
            let rewritten = format!("{prefix}{rebased}{tail}");
            ctx.doc.arena_mut().set_text(ctx.src.node, &rewritten);
        }
    } else {
        let rewritten = format!("{prefix}{rebased}{tail}");
        match ctx.src.target {
            Target::Text => ctx.doc.arena_mut().set_text(ctx.src.node, &rewritten),
            Target::Attr => {
                if let Some(name) = ctx.src.attr.clone() {
                    ctx.doc.arena_mut().set_attr(ctx.src.node, &name, &rewritten);
                }
            }
            _ => {}
        }
    }

    // pull the template out of the live tree, leaving a cursor behind
    let (template, cursor) = {
        let Context {
            ref dest,
            ref mut doc,
            ref mut state,
            ..
        } = *ctx;
        dest.extract(&mut **doc, &mut **state)
    };

    let parent_data = ctx.scope.data.clone();
    let engine = ctx.engine;
    for item in items {
        let data = child_data(&parent_data, alias.as_deref(), item);
        let clone = ctx.doc.arena_mut().clone_node(template, true);
        let merged = engine.merge_node(&mut *ctx.doc, clone, &data)?;
        // an item whose merge produced nothing leaves no placeholder
        if ctx.doc.arena().is_fragment(merged) && ctx.doc.arena().children(merged).is_empty() {
            continue;
        }
        if let Some(placer) = &placer {
            if let Some(desc) = engine.filters.get(placer) {
                let func = desc.func;
                func(ctx, Some(Value::Node(merged)), &[Value::Node(cursor)])?;
            } else {
                log::warn!("unknown placement filter: {}", placer);
            }
            continue;
        }
        let Some(parent) = ctx.doc.arena().parent(cursor) else {
            continue;
        };
        if ctx.doc.arena().is_fragment(merged) {
            let kids: Vec<NodeId> = ctx.doc.arena().children(merged).to_vec();
            for kid in kids {
                ctx.doc.arena_mut().insert_before(parent, kid, Some(cursor));
            }
        } else {
            ctx.doc.arena_mut().insert_before(parent, merged, Some(cursor));
        }
    }

    ctx.doc.arena_mut().detach(cursor);

    // the spot that held the expression carries no scalar substitution
    ctx.expr.cancel = true;
    ctx.src.target = Target::None;
    ctx.dest.target = Target::None;
    Ok(None)
}

/// Build the data for one item's child scope: an alias binds the item by
/// name, a bare scalar becomes the whole data, and a bare object shallow-
/// merges its keys over the parent's.
fn child_data(parent: &Value, alias: Option<&str>, item: Value) -> Value {
    match alias {
        Some(name) => {
            let mut map = match parent {
                Value::Object(map) => map.clone(),
                _ => HashMap::new(),
            };
            map.insert(name.to_string(), item);
            Value::Object(map)
        }
        None => match item {
            Value::Object(fields) => {
                let mut map = match parent {
                    Value::Object(map) => map.clone(),
                    _ => HashMap::new(),
                };
                for (k, v) in fields {
                    map.insert(k, v);
                }
                Value::Object(map)
            }
            scalar => scalar,
        },
    }
}

fn param_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
