use graft_lang::{Expression, FilterCall};

fn call(name: &str, params: Vec<&str>) -> FilterCall {
    FilterCall {
        name: name.to_string(),
        params: params.into_iter().map(str::to_string).collect(),
    }
}

// ========================================================================
// Path parsing
// ========================================================================

#[test]
fn test_simple_path() {
    let expr = Expression::parse("user.address.city").unwrap();
    assert_eq!(expr.path, vec!["user", "address", "city"]);
    assert!(expr.filters.is_empty());
    assert!(!expr.optional);
}

#[test]
fn test_empty_path_is_identity() {
    let expr = Expression::parse("").unwrap();
    assert!(expr.path.is_empty());
    assert!(expr.filters.is_empty());
}

#[test]
fn test_optional_marker_on_first_segment() {
    let expr = Expression::parse("to?.nothing").unwrap();
    assert!(expr.optional);
    assert_eq!(expr.path, vec!["to", "nothing"]);
}

#[test]
fn test_lone_optional_marker() {
    let expr = Expression::parse("?").unwrap();
    assert!(expr.optional);
    assert!(expr.path.is_empty());
}

#[test]
fn test_percent_decoded_segments() {
    let expr = Expression::parse("a%20b.c").unwrap();
    assert_eq!(expr.path, vec!["a b", "c"]);
}

#[test]
fn test_invalid_path_is_not_an_expression() {
    assert!(Expression::parse("not a path").is_none());
    assert!(Expression::parse("a,b").is_none());
    assert!(Expression::parse("semi;colon").is_none());
}

// ========================================================================
// Filter pipelines
// ========================================================================

#[test]
fn test_filters_with_params() {
    let expr = Expression::parse("price|or:0|case:up").unwrap();
    assert_eq!(expr.path, vec!["price"]);
    assert_eq!(
        expr.filters,
        vec![call("or", vec!["0"]), call("case", vec!["up"])]
    );
}

#[test]
fn test_params_are_percent_decoded() {
    let expr = Expression::parse("v|or:a%7cb").unwrap();
    assert_eq!(expr.filters, vec![call("or", vec!["a|b"])]);
}

#[test]
fn test_empty_segment_is_rebase() {
    let expr = Expression::parse("a||or:x").unwrap();
    // a leading empty slot also binds the prehook
    assert!(expr.prehook);
    assert_eq!(expr.filters, vec![call("", vec![]), call("or", vec!["x"])]);

    let expr = Expression::parse("a|trim||or:x").unwrap();
    assert!(!expr.prehook);
    assert_eq!(
        expr.filters,
        vec![call("trim", vec![]), call("", vec![]), call("or", vec!["x"])]
    );
}

#[test]
fn test_trailing_empty_segment_binds_posthook() {
    let expr = Expression::parse("a|trim||").unwrap();
    assert!(expr.posthook);
    assert_eq!(
        expr.filters,
        vec![call("trim", vec![]), call("", vec![]), call("", vec![])]
    );
}

// ========================================================================
// Run state
// ========================================================================

#[test]
fn test_fork_resets_run_state() {
    let mut expr = Expression::parse("a|trim").unwrap();
    expr.cursor = 1;
    expr.last = true;
    expr.cancel = true;
    let fork = expr.fork();
    assert_eq!(fork.cursor, 0);
    assert!(!fork.last);
    assert!(!fork.cancel);
    assert_eq!(fork.path, expr.path);
    assert_eq!(fork.filters, expr.filters);
}

#[test]
fn test_rebased_source_keeps_unconsumed_filters() {
    let mut expr = Expression::parse("list|repeat:item|case:up").unwrap();
    expr.cursor = 1;
    assert_eq!(expr.rebased_source(Some("item")), "[item|case:up]");
}

#[test]
fn test_rebased_source_with_leftover_path() {
    let mut expr = Expression::parse("rows.name|repeat:row").unwrap();
    expr.cursor = 1;
    expr.rest = vec!["name".to_string()];
    assert_eq!(expr.rebased_source(Some("row")), "[row.name]");
    assert_eq!(expr.rebased_source(None), "[name]");
}

#[test]
fn test_rebased_source_identity() {
    let mut expr = Expression::parse("tags|repeat").unwrap();
    expr.cursor = 1;
    assert_eq!(expr.rebased_source(None), "[]");
}
