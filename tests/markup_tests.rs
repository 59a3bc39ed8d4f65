use graft_lang::{Document, Engine, MarkupDocument, NodeId, Value};
use std::collections::HashMap;

fn json_object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

fn s(v: &str) -> Value {
    Value::String(v.to_string())
}

/// Element with a single text child, attached to the document root.
fn element_with_text(doc: &mut MarkupDocument, tag: &str, text: &str) -> NodeId {
    let el = doc.element(tag);
    let t = doc.text(text);
    doc.append(el, t);
    let root = doc.root();
    doc.append(root, el);
    el
}

fn merged(doc: &mut MarkupDocument, data: Value) -> String {
    let engine = Engine::new();
    let root = doc.root();
    engine.merge_node(doc, root, &data).unwrap();
    doc.to_markup()
}

// ========================================================================
// Text and attribute substitution
// ========================================================================

#[test]
fn test_text_and_attribute_merge() {
    let mut doc = MarkupDocument::new();
    let a = element_with_text(&mut doc, "a", "[name]");
    doc.set_attr(a, "href", "/u/[id]");
    let data = json_object(vec![("name", s("Ada")), ("id", Value::Integer(5))]);
    assert_eq!(merged(&mut doc, data), "<a href=\"/u/5\">Ada</a>");
}

#[test]
fn test_unresolved_attribute_stays_literal() {
    let mut doc = MarkupDocument::new();
    let a = element_with_text(&mut doc, "a", "x");
    doc.set_attr(a, "href", "/u/[user.id]");
    assert_eq!(
        merged(&mut doc, json_object(vec![])),
        "<a href=\"/u/[user.id]\">x</a>"
    );
}

// ========================================================================
// Attribute write semantics
// ========================================================================

#[test]
fn test_boolean_attribute_presence() {
    let mut doc = MarkupDocument::new();
    let input = element_with_text(&mut doc, "input", "");
    doc.set_attr(input, "checked", "[on]");
    let data = json_object(vec![("on", Value::Boolean(true))]);
    assert_eq!(merged(&mut doc, data), "<input checked></input>");

    let mut doc = MarkupDocument::new();
    let input = element_with_text(&mut doc, "input", "");
    doc.set_attr(input, "checked", "[on]");
    let data = json_object(vec![("on", Value::Boolean(false))]);
    assert_eq!(merged(&mut doc, data), "<input></input>");
}

#[test]
fn test_boolean_conjunction_on_plain_attribute() {
    let mut doc = MarkupDocument::new();
    let div = element_with_text(&mut doc, "div", "");
    doc.set_attr(div, "data-x", "[a][b]");
    let data = json_object(vec![
        ("a", Value::Boolean(true)),
        ("b", Value::Boolean(true)),
    ]);
    assert_eq!(merged(&mut doc, data), "<div data-x=\"true\"></div>");

    let mut doc = MarkupDocument::new();
    let div = element_with_text(&mut doc, "div", "");
    doc.set_attr(div, "data-x", "[a][b]");
    let data = json_object(vec![
        ("a", Value::Boolean(true)),
        ("b", Value::Boolean(false)),
    ]);
    assert_eq!(merged(&mut doc, data), "<div></div>");
}

#[test]
fn test_all_null_hits_remove_attribute() {
    let mut doc = MarkupDocument::new();
    let div = element_with_text(&mut doc, "div", "");
    doc.set_attr(div, "data-x", "[a][b]");
    assert_eq!(merged(&mut doc, json_object(vec![])), "<div></div>");
}

#[test]
fn test_class_list_from_booleans() {
    let mut doc = MarkupDocument::new();
    let div = element_with_text(&mut doc, "div", "");
    doc.set_attr(div, "class", "[a|alt:on] [b|alt:off]");
    let data = json_object(vec![
        ("a", Value::Boolean(true)),
        ("b", Value::Boolean(false)),
    ]);
    // single space separated, no leading/trailing whitespace
    assert_eq!(merged(&mut doc, data), "<div class=\"on\"></div>");
}

#[test]
fn test_class_list_removed_when_empty() {
    let mut doc = MarkupDocument::new();
    let div = element_with_text(&mut doc, "div", "");
    doc.set_attr(div, "class", "[a|alt:on]");
    let data = json_object(vec![("a", Value::Boolean(false))]);
    assert_eq!(merged(&mut doc, data), "<div></div>");
}

#[test]
fn test_to_class_merges_onto_existing_tokens() {
    let mut doc = MarkupDocument::new();
    let div = element_with_text(&mut doc, "div", "[cls|to:class]");
    doc.set_attr(div, "class", "base");
    let data = json_object(vec![("cls", s("extra"))]);
    assert_eq!(merged(&mut doc, data), "<div class=\"base extra\"></div>");
}

// ========================================================================
// Target redirection
// ========================================================================

#[test]
fn test_to_attribute_redirect() {
    let mut doc = MarkupDocument::new();
    element_with_text(&mut doc, "div", "[title|to:data-title]");
    let data = json_object(vec![("title", s("hey"))]);
    assert_eq!(merged(&mut doc, data), "<div data-title=\"hey\"></div>");
}

#[test]
fn test_to_content_replaces_children() {
    let mut doc = MarkupDocument::new();
    element_with_text(&mut doc, "div", "x[v|to:-]y");
    let data = json_object(vec![("v", s("V"))]);
    assert_eq!(merged(&mut doc, data), "<div>V</div>");
}

#[test]
fn test_to_sibling_selector() {
    let mut doc = MarkupDocument::new();
    let ul = doc.element("ul");
    let li1 = doc.element("li");
    let t1 = doc.text("one");
    doc.append(li1, t1);
    let li2 = doc.element("li");
    let t2 = doc.text("[v|to:-:-1]");
    doc.append(li2, t2);
    doc.append(ul, li1);
    doc.append(ul, li2);
    let root = doc.root();
    doc.append(root, ul);
    let data = json_object(vec![("v", s("TWO"))]);
    assert_eq!(merged(&mut doc, data), "<ul><li>TWO</li><li></li></ul>");
}

#[test]
fn test_at_replaces_whole_node() {
    let mut doc = MarkupDocument::new();
    let div = doc.element("div");
    let p = doc.element("p");
    let t = doc.text("[content|at]");
    doc.append(p, t);
    doc.append(div, p);
    let root = doc.root();
    doc.append(root, div);
    let data = json_object(vec![("content", s("X"))]);
    assert_eq!(merged(&mut doc, data), "<div>X</div>");
}

#[test]
fn test_at_ancestor_selector() {
    let mut doc = MarkupDocument::new();
    let ul = doc.element("ul");
    let li = doc.element("li");
    let b = doc.element("b");
    let t = doc.text("[v|at:li]");
    doc.append(b, t);
    doc.append(li, b);
    doc.append(ul, li);
    let root = doc.root();
    doc.append(root, ul);
    let data = json_object(vec![("v", s("V"))]);
    assert_eq!(merged(&mut doc, data), "<ul>V</ul>");
}

#[test]
fn test_at_star_hops() {
    let mut doc = MarkupDocument::new();
    let div = doc.element("div");
    let span = doc.element("span");
    let i = doc.element("i");
    let t = doc.text("[v|at:**]");
    doc.append(i, t);
    doc.append(span, i);
    doc.append(div, span);
    let root = doc.root();
    doc.append(root, div);
    let data = json_object(vec![("v", s("V"))]);
    assert_eq!(merged(&mut doc, data), "<div>V</div>");
}

#[test]
fn test_prune_removes_subtree_when_falsey() {
    let mut doc = MarkupDocument::new();
    let div = doc.element("div");
    let p = doc.element("p");
    let t = doc.text("x[ok|prune]");
    doc.append(p, t);
    doc.append(div, p);
    let root = doc.root();
    doc.append(root, div);
    let data = json_object(vec![("ok", Value::Boolean(false))]);
    assert_eq!(merged(&mut doc, data), "<div></div>");
}

#[test]
fn test_prune_keeps_subtree_when_truthy() {
    let mut doc = MarkupDocument::new();
    let div = doc.element("div");
    let p = doc.element("p");
    let t = doc.text("x[ok|prune]");
    doc.append(p, t);
    doc.append(div, p);
    let root = doc.root();
    doc.append(root, div);
    let data = json_object(vec![("ok", Value::Boolean(true))]);
    assert_eq!(merged(&mut doc, data), "<div><p>x</p></div>");
}

// ========================================================================
// Tag renames
// ========================================================================

#[test]
fn test_tag_rename_is_applied_after_the_walk() {
    let mut doc = MarkupDocument::new();
    let el = element_with_text(&mut doc, "[tag]", "hi [name]");
    doc.set_attr(el, "id", "k");
    let data = json_object(vec![("tag", s("section")), ("name", s("Ada"))]);
    assert_eq!(
        merged(&mut doc, data),
        "<section id=\"k\">hi Ada</section>"
    );
}

#[test]
fn test_partial_tag_name() {
    let mut doc = MarkupDocument::new();
    element_with_text(&mut doc, "h[level]", "title");
    let data = json_object(vec![("level", Value::Integer(2))]);
    assert_eq!(merged(&mut doc, data), "<h2>title</h2>");
}
