use crate::engine::{Engine, EngineError, TypeSpec};
use crate::expression::{Expression, FilterCall};
use crate::place::{Hit, HitOut, Place, Target};
use crate::tokenizer::Token;
use crate::tree::{Document, NodeId};
use crate::value::Value;

/// The data frame an expression resolves against. Repeat overrides it per
/// iteration with a child scope.
#[derive(Debug, Clone)]
pub struct Scope {
    pub data: Value,
    pub path: Vec<String>,
    pub alias: Option<String>,
}

impl Scope {
    pub fn new(data: Value) -> Self {
        Scope {
            data,
            path: Vec::new(),
            alias: None,
        }
    }

    /// Walk a dotted path into the data.
    ///
    /// The walk reaching the final segment's container distinguishes a
    /// missing final key ("resolved but absent") from a missing
    /// intermediate one ("not found"). A named segment meeting an array
    /// stops the walk early: the collection itself becomes the value and
    /// the leftover segments are reported for repeat to rebase per item.
    pub fn resolve(&self, path: &[String]) -> Resolved {
        if path.is_empty() {
            return Resolved {
                value: Some(self.data.clone()),
                last: true,
                rest: Vec::new(),
            };
        }
        let mut cur = &self.data;
        for (i, seg) in path.iter().enumerate() {
            let last = i + 1 == path.len();
            if matches!(cur, Value::Array(_)) && seg.parse::<i64>().is_err() {
                return Resolved {
                    value: Some(cur.clone()),
                    last: true,
                    rest: path[i..].to_vec(),
                };
            }
            let next = match cur {
                Value::Object(map) => map.get(seg.as_str()),
                Value::Array(arr) => seg.parse::<i64>().ok().and_then(|idx| {
                    let len = arr.len() as i64;
                    let idx = if idx < 0 { len + idx } else { idx };
                    if (0..len).contains(&idx) {
                        arr.get(idx as usize)
                    } else {
                        None
                    }
                }),
                _ => None,
            };
            match next {
                Some(Value::Null) if !last => {
                    return Resolved {
                        value: None,
                        last: false,
                        rest: Vec::new(),
                    };
                }
                Some(v) => cur = v,
                None => {
                    return Resolved {
                        value: None,
                        last,
                        rest: Vec::new(),
                    };
                }
            }
        }
        Resolved {
            value: Some(cur.clone()),
            last: true,
            rest: Vec::new(),
        }
    }
}

/// Outcome of one path resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub value: Option<Value>,
    pub last: bool,
    /// Leftover segments past a collection the walk stopped at
    pub rest: Vec<String>,
}

/// What a whole string template reduced to, for the string merge entry
/// point: a lone expression collapsing to a single value keeps its type
/// instead of being stringified.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture {
    Empty,
    One(Value),
    Many,
}

impl Capture {
    pub fn offer(&mut self, v: &Value) {
        *self = match std::mem::replace(self, Capture::Many) {
            Capture::Empty => Capture::One(v.clone()),
            _ => Capture::Many,
        };
    }
}

/// Mutable bookkeeping threaded through one tree walk: the (possibly
/// relocated) merge root, the tag renames deferred to the end of the walk,
/// and the scalar capture for string merges.
#[derive(Debug)]
pub struct MergeState {
    pub root: NodeId,
    pub replacements: Vec<(NodeId, String)>,
    pub capture: Capture,
}

impl MergeState {
    pub fn new(root: NodeId) -> Self {
        MergeState {
            root,
            replacements: Vec::new(),
            capture: Capture::Empty,
        }
    }
}

/// One merge step: everything a filter may see and touch while a single
/// expression-bearing string is being resolved.
///
/// `src` is where the expressions were found; `dest` starts identical and
/// diverges when a filter redirects the write. The expression itself is
/// stateful and replaced per hit.
pub struct Context<'a, D: Document> {
    pub engine: &'a Engine<D>,
    pub doc: &'a mut D,
    pub scope: &'a Scope,
    pub expr: Expression,
    pub src: Place,
    pub dest: Place,
    /// Value as resolved from the path, before any filter ran
    pub raw: Option<Value>,
    /// Verbatim source text of the hit currently being resolved
    pub raw_source: String,
    pub state: &'a mut MergeState,
}

impl<'a, D: Document> Context<'a, D> {
    /// Resolve every token of a scanned string into `src.hits`.
    pub fn run_tokens(&mut self, tokens: &[Token]) -> Result<(), EngineError> {
        for token in tokens {
            // a structural filter may have consumed the whole place
            if self.src.target == Target::None {
                break;
            }
            match token {
                Token::Literal(s) => self.src.hits.push(Hit {
                    raw: s.clone(),
                    out: HitOut::Literal,
                }),
                Token::Expr(parts) => {
                    let raw = token.source();
                    let content = self.flatten(parts)?;
                    self.src.index = self.src.hits.len();
                    self.run_hit(&content, raw)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve nested expressions inside a bracket group to a flat content
    /// string. An inner expression that does not resolve keeps its source
    /// text verbatim.
    fn flatten(&mut self, parts: &[Token]) -> Result<String, EngineError> {
        let mut out = String::new();
        for part in parts {
            match part {
                Token::Literal(s) => out.push_str(s),
                Token::Expr(sub) => {
                    let inner = self.flatten(sub)?;
                    match self.eval_inline(&inner)? {
                        Some(text) => out.push_str(&text),
                        None => out.push_str(&part.source()),
                    }
                }
            }
        }
        Ok(out)
    }

    /// Evaluate one expression content string for its value alone, leaving
    /// the surrounding hit state untouched. Used for nested expressions.
    fn eval_inline(&mut self, content: &str) -> Result<Option<String>, EngineError> {
        let Some(expr) = Expression::parse(content) else {
            return Ok(None);
        };
        let saved_expr = std::mem::replace(&mut self.expr, expr);
        let saved_dest = self.dest.clone();
        let saved_raw = self.raw.take();
        let value = self.resolve_current();
        self.raw = value.clone();
        let result = self.mutate(value);
        self.expr = saved_expr;
        self.dest = saved_dest;
        self.raw = saved_raw;
        Ok(result?.map(|v| v.as_string()))
    }

    /// Resolve one expression hit and record its outcome.
    fn run_hit(&mut self, content: &str, raw: String) -> Result<(), EngineError> {
        let Some(expr) = Expression::parse(content) else {
            // not an expression at all: the bracket text is prose
            self.src.hits.push(Hit {
                raw,
                out: HitOut::Literal,
            });
            return Ok(());
        };
        self.expr = expr;
        self.dest = self.src.fork();
        self.raw_source = raw.clone();
        let value = self.resolve_current();
        self.raw = value.clone();
        let result = self.mutate(value)?;

        if self.expr.cancel {
            // the hit is discarded; its text stays as it was, unless a
            // structural filter already consumed the place
            if self.src.target != Target::None {
                self.src.hits.push(Hit {
                    raw,
                    out: HitOut::Cancelled,
                });
            }
            return Ok(());
        }

        if self.src.target == Target::None {
            return Ok(());
        }

        let redirected = !self.dest.same_location(&self.src);
        if redirected || self.dest.target == Target::None {
            // the value went elsewhere; this spot empties out
            self.src.hits.push(Hit {
                raw,
                out: HitOut::Placeholder,
            });
            if self.dest.target != Target::None {
                let hit = [Hit {
                    raw: String::new(),
                    out: HitOut::Value(result.unwrap_or(Value::Null)),
                }];
                let Context {
                    ref mut doc,
                    ref src,
                    ref dest,
                    ref mut state,
                    ..
                } = *self;
                dest.write(&mut **doc, &hit, src, &mut **state);
            }
            return Ok(());
        }

        match result {
            Some(v) => self.src.hits.push(Hit {
                raw,
                out: HitOut::Value(v),
            }),
            None => self.src.hits.push(Hit {
                raw,
                out: HitOut::Missing,
            }),
        }
        Ok(())
    }

    /// Resolve the current expression's path against the scope, recording
    /// the resolution flags on the expression. A walk that stopped at a
    /// collection only counts as resolved when a repeat is there to
    /// consume it; otherwise the hit is simply "not found".
    fn resolve_current(&mut self) -> Option<Value> {
        let resolved = self.scope.resolve(&self.expr.path);
        self.expr.last = resolved.last;
        self.expr.rest = resolved.rest;
        if !self.expr.rest.is_empty()
            && !self.expr.filters.iter().any(|f| f.name == "repeat")
        {
            self.expr.last = false;
            return None;
        }
        resolved.value
    }

    /// Write the accumulated hits back through the source place.
    pub fn finish(&mut self) {
        if self.src.target == Target::None || self.src.hits.is_empty() {
            return;
        }
        if self.src.target == Target::Text && self.src.hits.len() == 1 {
            if let HitOut::Value(v) = &self.src.hits[0].out {
                self.state.capture.offer(v);
            }
        }
        let Context {
            ref mut doc,
            ref src,
            ref mut state,
            ..
        } = *self;
        src.write(&mut **doc, &src.hits, src, &mut **state);
    }

    /// Run the filter pipeline over a resolved value.
    ///
    /// The loop stops early when the value is undefined and the path never
    /// fully resolved: something that was never found is not transformed
    /// further, and the hit stays literal. A fully resolved but absent
    /// value coerces to explicit null at the end.
    pub fn mutate(&mut self, mut val: Option<Value>) -> Result<Option<Value>, EngineError> {
        let engine = self.engine;
        if let Some(hook) = engine.hooks.before_all {
            val = hook(self, val, &[])?;
        }
        loop {
            if self.expr.cancel {
                return Ok(None);
            }
            if val.is_none() && !self.expr.last {
                // something that was never found is not transformed, but a
                // rebase segment may still recover the pipeline
                match self.expr.filters.get(self.expr.cursor) {
                    Some(call) if call.name.is_empty() => {}
                    _ => break,
                }
            }
            let Some(call) = self.expr.filters.get(self.expr.cursor).cloned() else {
                break;
            };
            self.expr.cursor += 1;
            if call.name.is_empty() {
                // rebase: the current value counts as resolved from here on
                self.expr.last = true;
                continue;
            }
            let Some(desc) = engine.filters.get(&call.name) else {
                if engine.debug {
                    return Err(EngineError::UnknownFilter(call.name));
                }
                log::warn!("unknown filter: {}", call.name);
                continue;
            };
            if let Some(hook) = engine.hooks.before_each {
                val = hook(self, val, &[])?;
            }
            if let Some(hook) = engine.hooks.before.get(&call.name) {
                let hook = *hook;
                val = hook(self, val, &[])?;
            }
            val = match self.apply(&desc.types, desc.func, &call, val) {
                Ok(v) => v,
                Err(e) => {
                    if engine.debug {
                        return Err(e);
                    }
                    log::debug!("filter {} failed: {}", call.name, e);
                    Some(Value::Null)
                }
            };
            if let Some(hook) = engine.hooks.after.get(&call.name) {
                let hook = *hook;
                val = hook(self, val, &[])?;
            }
            if let Some(hook) = engine.hooks.after_each {
                val = hook(self, val, &[])?;
            }
        }
        if let Some(hook) = engine.hooks.after_all {
            val = hook(self, val, &[])?;
        }
        if self.expr.cancel {
            return Ok(None);
        }
        if val.is_none() && (self.expr.last || self.expr.optional) {
            val = Some(Value::Null);
        }
        Ok(val)
    }

    /// Type-check and coerce one filter invocation, then run it.
    fn apply(
        &mut self,
        types: &[TypeSpec],
        func: crate::engine::FilterFn<D>,
        call: &FilterCall,
        val: Option<Value>,
    ) -> Result<Option<Value>, EngineError> {
        // position 0 is the subject value
        let subject = match types.first() {
            None => val,
            Some(TypeSpec::Enum(alts)) => match val {
                Some(v) if alts.contains(&v.as_string()) => Some(v),
                _ => return Ok(None),
            },
            Some(TypeSpec::Named { name, default, .. }) => {
                let coerced = match val {
                    Some(v) => self.coerce(name, Some(v))?,
                    None => None,
                };
                match (coerced, default) {
                    (Some(v), _) => Some(v),
                    (None, Some(Some(d))) => {
                        self.coerce(name, Some(Value::String(d.clone())))?
                    }
                    (None, Some(None)) => None,
                    // required subject missing: the invocation is skipped
                    (None, None) => return Ok(None),
                }
            }
        };

        let mut params = Vec::new();
        let mut raw_idx = 0;
        for spec in types.iter().skip(1) {
            match spec {
                TypeSpec::Enum(alts) => {
                    let raw = call.params.get(raw_idx).cloned();
                    raw_idx += 1;
                    match raw {
                        Some(s) if alts.contains(&s) => params.push(Value::String(s)),
                        Some(s) => {
                            return Err(EngineError::Param {
                                filter: call.name.clone(),
                                message: format!(
                                    "expected one of {}, got '{}'",
                                    alts.join("|"),
                                    s
                                ),
                            });
                        }
                        None => {
                            return Err(EngineError::Param {
                                filter: call.name.clone(),
                                message: format!("missing parameter {}", raw_idx),
                            });
                        }
                    }
                }
                TypeSpec::Named {
                    name, rest: true, ..
                } => {
                    let mut list = Vec::new();
                    while raw_idx < call.params.len() {
                        let raw = call.params[raw_idx].clone();
                        raw_idx += 1;
                        let coerced = self.coerce(name, Some(Value::String(raw)))?;
                        list.push(coerced.unwrap_or(Value::Null));
                    }
                    params.push(Value::Array(list));
                }
                TypeSpec::Named { name, default, .. } => {
                    let raw = call.params.get(raw_idx).cloned();
                    raw_idx += 1;
                    match (raw, default) {
                        (Some(s), _) => {
                            let coerced = self.coerce(name, Some(Value::String(s)))?;
                            params.push(coerced.unwrap_or(Value::Null));
                        }
                        (None, Some(Some(d))) => {
                            let coerced =
                                self.coerce(name, Some(Value::String(d.clone())))?;
                            params.push(coerced.unwrap_or(Value::Null));
                        }
                        (None, Some(None)) => params.push(Value::Null),
                        (None, None) => {
                            return Err(EngineError::Param {
                                filter: call.name.clone(),
                                message: format!("missing parameter {}", raw_idx),
                            });
                        }
                    }
                }
            }
        }

        func(self, subject, &params)
    }

    /// Coerce a value through a registered type.
    pub fn coerce(&mut self, name: &str, val: Option<Value>) -> Result<Option<Value>, EngineError> {
        let engine = self.engine;
        match engine.types.get(name) {
            Some(f) => {
                let f = *f;
                Ok(f(self, val))
            }
            None => Err(EngineError::UnknownType(name.to_string())),
        }
    }
}
