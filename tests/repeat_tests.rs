use graft_lang::{Document, Engine, MarkupDocument, Value};
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

fn merged(doc: &mut MarkupDocument, data: Value) -> String {
    let engine = Engine::new();
    let root = doc.root();
    engine.merge_node(doc, root, &data).unwrap();
    doc.to_markup()
}

// ========================================================================
// Text repeats
// ========================================================================

#[test]
fn test_repeat_cardinality_and_order() {
    let data = json_object(vec![("items", json_array(vec![s("a"), s("b"), s("c")]))]);
    assert_eq!(merge("[items|repeat:it]-", data), s("abc-"));
}

#[test]
fn test_repeat_empty_array_removes_template() {
    let data = json_object(vec![("items", json_array(vec![]))]);
    assert_eq!(merge("[items|repeat:it]-", data), s("-"));
}

#[test]
fn test_repeat_wraps_lone_value() {
    let data = json_object(vec![("solo", s("s"))]);
    assert_eq!(merge("[solo|repeat:x]!", data), s("s!"));
}

#[test]
fn test_repeat_with_leftover_path() {
    let rows = json_array(vec![
        json_object(vec![("name", s("a"))]),
        json_object(vec![("name", s("b"))]),
    ]);
    let data = json_object(vec![("rows", rows)]);
    assert_eq!(merge("[rows.name|repeat],", data), s("ab,"));
}

#[test]
fn test_repeat_keeps_downstream_filters() {
    let data = json_object(vec![("items", json_array(vec![s("a"), s("b")]))]);
    assert_eq!(merge("[items|repeat|case:up]", data), s("AB"));
}

#[test]
fn test_repeat_over_root_array() {
    let data = json_array(vec![
        json_object(vec![("title", s("A"))]),
        json_object(vec![("title", s("B"))]),
    ]);
    assert_eq!(merge("[title|repeat]", data), s("AB"));
}

#[test]
fn test_repeat_literal_text_around_hit_stays_once() {
    let data = json_object(vec![("items", json_array(vec![s("x"), s("y")]))]);
    assert_eq!(merge("<[items|repeat]>", data), s("<xy>"));
}

// ========================================================================
// Tree repeats
// ========================================================================

#[test]
fn test_repeat_clones_list_items() {
    let mut doc = MarkupDocument::new();
    let ul = doc.element("ul");
    let li = doc.element("li");
    let t = doc.text("[items.name|repeat:item]");
    doc.append(li, t);
    doc.append(ul, li);
    let root = doc.root();
    doc.append(root, ul);

    let items = json_array(vec![
        json_object(vec![("name", s("a"))]),
        json_object(vec![("name", s("b"))]),
        json_object(vec![("name", s("c"))]),
    ]);
    let data = json_object(vec![("items", items)]);
    assert_eq!(
        merged(&mut doc, data),
        "<ul><li>a</li><li>b</li><li>c</li></ul>"
    );
}

#[test]
fn test_repeat_empty_array_removes_subtree() {
    let mut doc = MarkupDocument::new();
    let ul = doc.element("ul");
    let li = doc.element("li");
    let t = doc.text("[items.name|repeat:item]");
    doc.append(li, t);
    doc.append(ul, li);
    let root = doc.root();
    doc.append(root, ul);

    let data = json_object(vec![("items", json_array(vec![]))]);
    assert_eq!(merged(&mut doc, data), "<ul></ul>");
}

#[test]
fn test_repeat_sibling_expressions_see_the_alias() {
    let mut doc = MarkupDocument::new();
    let ul = doc.element("ul");
    let li = doc.element("li");
    let t = doc.text("[users.id|repeat:u]:[u.name] ");
    doc.append(li, t);
    doc.append(ul, li);
    let root = doc.root();
    doc.append(root, ul);

    let users = json_array(vec![
        json_object(vec![("id", Value::Integer(1)), ("name", s("ada"))]),
        json_object(vec![("id", Value::Integer(2)), ("name", s("joan"))]),
    ]);
    let data = json_object(vec![("users", users)]);
    assert_eq!(
        merged(&mut doc, data),
        "<ul><li>1:ada </li><li>2:joan </li></ul>"
    );
}

#[test]
fn test_nested_repeats_layer_scopes() {
    let mut doc = MarkupDocument::new();
    let p = doc.element("p");
    let t1 = doc.text("[groups.title|repeat:g]");
    let span = doc.element("span");
    let t2 = doc.text("[g.items|repeat]");
    doc.append(span, t2);
    doc.append(p, t1);
    doc.append(p, span);
    let root = doc.root();
    doc.append(root, p);

    let groups = json_array(vec![
        json_object(vec![
            ("title", s("A")),
            ("items", json_array(vec![s("1"), s("2")])),
        ]),
        json_object(vec![
            ("title", s("B")),
            ("items", json_array(vec![s("3")])),
        ]),
    ]);
    let data = json_object(vec![("groups", groups)]);
    assert_eq!(
        merged(&mut doc, data),
        "<p>A<span>1</span><span>2</span></p><p>B<span>3</span></p>"
    );
}

#[test]
fn test_repeat_over_object_entries() {
    let mut doc = MarkupDocument::new();
    let ul = doc.element("ul");
    let li = doc.element("li");
    let t = doc.text("[pairs|as:entries|repeat:e|to][e.key]=[e.value]");
    doc.append(li, t);
    doc.append(ul, li);
    let root = doc.root();
    doc.append(root, ul);

    let pairs = json_object(vec![("b", Value::Integer(2)), ("a", Value::Integer(1))]);
    let data = json_object(vec![("pairs", pairs)]);
    assert_eq!(
        merged(&mut doc, data),
        "<ul><li>a=1</li><li>b=2</li></ul>"
    );
}

#[test]
fn test_repeat_skips_unresolved_collection() {
    // the collection path never resolves: the template stays untouched
    let mut doc = MarkupDocument::new();
    let ul = doc.element("ul");
    let li = doc.element("li");
    let t = doc.text("[absent.list.name|repeat:x]");
    doc.append(li, t);
    doc.append(ul, li);
    let root = doc.root();
    doc.append(root, ul);

    assert_eq!(
        merged(&mut doc, json_object(vec![])),
        "<ul><li>[absent.list.name|repeat:x]</li></ul>"
    );
}
