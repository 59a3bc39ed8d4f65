use graft_lang::{Context, Engine, EngineError, Plugin, TextDocument, Value};
use std::collections::HashMap;

fn json_object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

fn json_array(values: Vec<Value>) -> Value {
    Value::Array(values)
}

fn s(v: &str) -> Value {
    Value::String(v.to_string())
}

fn merge(template: &str, data: Value) -> Value {
    Engine::new().merge(template, &data).unwrap()
}

// ========================================================================
// Shape preservation
// ========================================================================

#[test]
fn test_no_match_round_trip() {
    assert_eq!(merge("hello world", json_object(vec![])), s("hello world"));
    assert_eq!(merge("", json_object(vec![])), s(""));
    assert_eq!(merge("a[b", json_object(vec![])), s("a[b"));
}

#[test]
fn test_simple_substitution() {
    let data = json_object(vec![("name", s("Ada"))]);
    assert_eq!(merge("Hello [name]!", data), s("Hello Ada!"));
}

#[test]
fn test_lone_expression_keeps_value_type() {
    let data = json_object(vec![("age", Value::Integer(30))]);
    assert_eq!(merge("[age]", data), Value::Integer(30));

    let data = json_object(vec![("pi", Value::Float(3.5))]);
    assert_eq!(merge("[pi]", data), Value::Float(3.5));

    let data = json_object(vec![("flag", Value::Boolean(true))]);
    assert_eq!(merge("[flag]", data), Value::Boolean(true));
}

#[test]
fn test_adjacent_expressions_concatenate() {
    let data = json_object(vec![("a", Value::Integer(1)), ("b", Value::Integer(2))]);
    assert_eq!(merge("[a][b]", data), s("12"));
}

// ========================================================================
// Unresolved paths
// ========================================================================

#[test]
fn test_unresolved_path_stays_literal() {
    assert_eq!(
        merge("a[to.nothing]b", json_object(vec![])),
        s("a[to.nothing]b")
    );
}

#[test]
fn test_optional_path_disappears() {
    assert_eq!(merge("a[to?.nothing]b", json_object(vec![])), s("ab"));
}

#[test]
fn test_resolved_but_absent_final_key_is_null() {
    // the container exists, the key does not: explicit null, not literal
    assert_eq!(merge("x[gone]y", json_object(vec![])), s("xy"));
}

#[test]
fn test_null_value_renders_empty() {
    let data = json_object(vec![("n", Value::Null)]);
    assert_eq!(merge("a[n]b", data), s("ab"));
}

#[test]
fn test_failure_is_idempotent() {
    let once = merge("a[to.nothing]b [x|bad!syntax]", json_object(vec![]));
    let Value::String(text) = once.clone() else {
        panic!("expected string");
    };
    let twice = merge(&text, json_object(vec![]));
    assert_eq!(once, twice);
}

#[test]
fn test_mid_path_null_stays_literal() {
    let data = json_object(vec![("a", Value::Null)]);
    assert_eq!(merge("x[a.b]y", data), s("x[a.b]y"));
}

// ========================================================================
// Filters
// ========================================================================

#[test]
fn test_or_fires_on_absent_value() {
    assert_eq!(merge("[nick|or:anon]", json_object(vec![])), s("anon"));
    let data = json_object(vec![("nick", Value::Null)]);
    assert_eq!(merge("[nick|or:anon]", data), s("anon"));
    let data = json_object(vec![("nick", s("ada"))]);
    assert_eq!(merge("[nick|or:anon]", data), s("ada"));
}

#[test]
fn test_or_does_not_fire_on_unresolved_path() {
    // the walk never reached the last segment, so nothing transforms
    assert_eq!(
        merge("[a.b|or:x]", json_object(vec![])),
        s("[a.b|or:x]")
    );
}

#[test]
fn test_rebase_recovers_unresolved_path() {
    // the empty filter segment forces the pipeline to keep going
    assert_eq!(merge("[a.b||or:x]", json_object(vec![])), s("x"));
}

#[test]
fn test_case() {
    let data = json_object(vec![("name", s("ada lovelace"))]);
    assert_eq!(merge("[name|case:up]", data.clone()), s("ADA LOVELACE"));
    assert_eq!(merge("[name|case:caps]", data.clone()), s("Ada lovelace"));
    let data = json_object(vec![("name", s("ADA"))]);
    assert_eq!(merge("[name|case:low]", data), s("ada"));
}

#[test]
fn test_enum_param_mismatch_degrades_to_null() {
    let data = json_object(vec![("name", s("ada"))]);
    assert_eq!(merge("[name|case:wild]", data), Value::Null);
}

#[test]
fn test_pre_post_trim() {
    let data = json_object(vec![("name", s("ada"))]);
    assert_eq!(merge("[name|post:!]", data.clone()), s("ada!"));
    assert_eq!(merge("[name|pre:dr ]", data), s("dr ada"));
    let data = json_object(vec![("v", s("  x  "))]);
    assert_eq!(merge("[v|trim]", data), s("x"));
    // a prefix never applies to an absent value
    let data = json_object(vec![("name", Value::Null)]);
    assert_eq!(merge("a[name|pre:dr ]b", data), s("ab"));
}

#[test]
fn test_eq_neq() {
    let data = json_object(vec![("status", s("ok"))]);
    assert_eq!(merge("[status|eq:ok]", data.clone()), Value::Boolean(true));
    assert_eq!(merge("[status|eq:ok:fine]", data.clone()), s("fine"));
    assert_eq!(merge("[status|eq:down:bad]", data.clone()), Value::Null);
    assert_eq!(merge("[status|neq:down]", data), Value::Boolean(true));
}

#[test]
fn test_alt_and_not() {
    let data = json_object(vec![("ok", Value::Boolean(true))]);
    assert_eq!(merge("[ok|alt:yes:no]", data.clone()), s("yes"));
    assert_eq!(merge("[ok|not]", data), Value::Boolean(false));
    let data = json_object(vec![("ok", Value::Boolean(false))]);
    assert_eq!(merge("[ok|alt:yes:no]", data), s("no"));
}

#[test]
fn test_switch() {
    let data = json_object(vec![("color", s("blue"))]);
    assert_eq!(
        merge("[color|switch:red:FF0000:blue:0000FF:000000]", data),
        s("0000FF")
    );
    let data = json_object(vec![("color", s("green"))]);
    assert_eq!(
        merge("[color|switch:red:FF0000:blue:0000FF:000000]", data),
        s("000000")
    );
}

#[test]
fn test_const_and_as() {
    let data = json_object(vec![("x", s("whatever"))]);
    assert_eq!(merge("[x|const:fixed]", data), s("fixed"));
    let data = json_object(vec![("n", s("42"))]);
    assert_eq!(merge("[n|as:int]", data), Value::Integer(42));
    let data = json_object(vec![("n", Value::Integer(7))]);
    assert_eq!(merge("[n|as:str]", data), s("7"));
}

#[test]
fn test_collection_filters() {
    let items = json_array(vec![
        Value::Integer(10),
        Value::Integer(20),
        Value::Integer(30),
    ]);
    let data = json_object(vec![("items", items)]);
    assert_eq!(merge("[items|nth:1]", data.clone()), Value::Integer(20));
    assert_eq!(merge("[items|nth:-1]", data.clone()), Value::Integer(30));
    assert_eq!(merge("[items|join:,]", data.clone()), s("10,20,30"));
    assert_eq!(merge("[items|slice:1:3|join:,]", data.clone()), s("20,30"));
    assert_eq!(merge("[items|rev|join:,]", data), s("30,20,10"));

    let data = json_object(vec![(
        "items",
        json_array(vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)]),
    )]);
    assert_eq!(merge("[items|sort|join:,]", data), s("1,2,3"));
}

#[test]
fn test_split_then_join() {
    let data = json_object(vec![("csv", s("a,b,c"))]);
    assert_eq!(merge("[csv|split:,|join:-]", data), s("a-b-c"));
}

#[test]
fn test_keys_values() {
    let obj = json_object(vec![("b", Value::Integer(1)), ("a", Value::Integer(2))]);
    let data = json_object(vec![("obj", obj)]);
    assert_eq!(merge("[obj|keys|join:,]", data.clone()), s("a,b"));
    assert_eq!(merge("[obj|values|join:,]", data), s("2,1"));
}

#[test]
fn test_entries_type() {
    let obj = json_object(vec![("a", Value::Integer(1))]);
    let data = json_object(vec![("obj", obj)]);
    let pair = merge("[obj|as:entries|nth:0]", data);
    assert_eq!(
        pair,
        json_object(vec![("key", s("a")), ("value", Value::Integer(1))])
    );
}

#[test]
fn test_percent_encoded_path_segment() {
    let data = json_object(vec![("a b", s("yes"))]);
    assert_eq!(merge("[a%20b]", data), s("yes"));
}

#[test]
fn test_nested_expression_builds_outer_path() {
    let data = json_object(vec![("key", s("name")), ("name", s("Ada"))]);
    assert_eq!(merge("[[key]]", data), s("Ada"));
}

#[test]
fn test_unknown_filter_is_dropped() {
    let data = json_object(vec![("name", s("Ada"))]);
    assert_eq!(merge("[name|bogus]", data), s("Ada"));
}

#[test]
fn test_cancel_restores_hit() {
    let data = json_object(vec![("v", Value::Boolean(false))]);
    assert_eq!(merge("[v|fail]!", data), s("[v|fail]!"));
    let data = json_object(vec![("v", Value::Boolean(true))]);
    assert_eq!(merge("[v|fail]!", data), s("true!"));
}

// ========================================================================
// Debug mode
// ========================================================================

#[test]
fn test_debug_mode_raises_unknown_filter() {
    let mut engine = Engine::new();
    engine.debug = true;
    let data = json_object(vec![("name", s("Ada"))]);
    let err = engine.merge("[name|bogus]", &data).unwrap_err();
    assert!(matches!(err, EngineError::UnknownFilter(name) if name == "bogus"));
}

#[test]
fn test_debug_mode_raises_param_error() {
    let mut engine = Engine::new();
    engine.debug = true;
    let data = json_object(vec![("name", s("ada"))]);
    let err = engine.merge("[name|case:wild]", &data).unwrap_err();
    assert!(matches!(err, EngineError::Param { filter, .. } if filter == "case"));
}

// ========================================================================
// Registration surface
// ========================================================================

fn exclaim(
    _ctx: &mut Context<'_, TextDocument>,
    val: Option<Value>,
    _params: &[Value],
) -> Result<Option<Value>, EngineError> {
    match val {
        Some(Value::String(s)) => Ok(Some(Value::String(format!("{}!", s)))),
        other => Ok(other),
    }
}

#[test]
fn test_custom_filter_registration() {
    let mut engine = Engine::new();
    engine.add_filter("exclaim", &["str?"], exclaim);
    let data = json_object(vec![("name", s("Ada"))]);
    assert_eq!(engine.merge("[name|exclaim]", &data).unwrap(), s("Ada!"));
}

#[test]
fn test_extend_with_plugin() {
    let mut engine = Engine::new();
    engine.extend(Plugin {
        filters: vec![("exclaim".to_string(), vec!["str?".to_string()], exclaim)],
        ..Plugin::default()
    });
    let data = json_object(vec![("name", s("Ada"))]);
    assert_eq!(engine.merge("[name|exclaim]", &data).unwrap(), s("Ada!"));
}

#[test]
fn test_engines_are_independent() {
    let mut custom = Engine::new();
    custom.add_filter("exclaim", &["str?"], exclaim);
    let plain: Engine<TextDocument> = Engine::new();
    let data = json_object(vec![("name", s("Ada"))]);
    assert_eq!(custom.merge("[name|exclaim]", &data).unwrap(), s("Ada!"));
    // the other engine never saw the registration
    assert_eq!(plain.merge("[name|exclaim]", &data).unwrap(), s("Ada"));
}

fn cents(
    _ctx: &mut Context<'_, TextDocument>,
    v: &Value,
    _spec: &str,
) -> Option<Value> {
    v.as_float().map(|f| Value::String(format!("{:.2}", f)))
}

#[test]
fn test_named_format() {
    let mut engine = Engine::new();
    engine.add_format("cents", cents);
    let data = json_object(vec![("price", Value::Float(3.5))]);
    assert_eq!(
        engine.merge("[price|format:cents]", &data).unwrap(),
        s("3.50")
    );
}

fn shout(
    _ctx: &mut Context<'_, TextDocument>,
    val: Option<Value>,
    _params: &[Value],
) -> Result<Option<Value>, EngineError> {
    Ok(val.map(|v| Value::String(v.as_string().to_uppercase())))
}

#[test]
fn test_after_all_hook() {
    let mut engine = Engine::new();
    engine.hooks.after_all = Some(shout);
    let data = json_object(vec![("name", s("ada"))]);
    assert_eq!(engine.merge("[name]", &data).unwrap(), s("ADA"));
}
