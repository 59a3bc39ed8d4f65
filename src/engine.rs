use std::collections::HashMap;

use crate::context::{Capture, Context, MergeState, Scope};
use crate::expression::Expression;
use crate::filters;
use crate::place::Place;
use crate::symbols::OPEN;
use crate::tokenizer::{self, Tokenizer};
use crate::tree::text::TextDocument;
use crate::tree::{Document, NodeData, NodeId};
use crate::value::Value;

/// A registered filter function. Receives the running context, the subject
/// value (None when the path resolved to nothing) and the coerced
/// parameters; returns the next pipeline value.
pub type FilterFn<D> =
    fn(&mut Context<'_, D>, Option<Value>, &[Value]) -> Result<Option<Value>, EngineError>;

/// A registered coercion type, dispatched by name from filter signatures.
pub type TypeFn<D> = fn(&mut Context<'_, D>, Option<Value>) -> Option<Value>;

/// A registered named format, consulted by value-formatting filters.
pub type FormatFn<D> = fn(&mut Context<'_, D>, &Value, &str) -> Option<Value>;

/// Declared type of one filter parameter position.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    /// `name` (required), `name?` / `name?default` (optional with
    /// default), `name*` (rest: consumes all remaining parameters)
    Named {
        name: String,
        default: Option<Option<String>>,
        rest: bool,
    },
    /// `a|b|c`: the raw parameter must be one of the alternatives
    Enum(Vec<String>),
}

impl TypeSpec {
    pub fn parse(s: &str) -> TypeSpec {
        if s.contains('|') {
            return TypeSpec::Enum(s.split('|').map(str::to_string).collect());
        }
        if let Some((name, def)) = s.split_once('?') {
            let default = if def.is_empty() {
                Some(None)
            } else {
                Some(Some(def.to_string()))
            };
            return TypeSpec::Named {
                name: name.to_string(),
                default,
                rest: false,
            };
        }
        if let Some(name) = s.strip_suffix('*') {
            return TypeSpec::Named {
                name: name.to_string(),
                default: None,
                rest: true,
            };
        }
        TypeSpec::Named {
            name: s.to_string(),
            default: None,
            rest: false,
        }
    }
}

/// A registered filter: its positional type signature (position 0 is the
/// subject value) plus the function.
pub struct FilterDescriptor<D: Document> {
    pub types: Vec<TypeSpec>,
    pub func: FilterFn<D>,
}

impl<D: Document> Clone for FilterDescriptor<D> {
    fn clone(&self) -> Self {
        FilterDescriptor {
            types: self.types.clone(),
            func: self.func,
        }
    }
}

/// Engine-wide callbacks around pipeline execution.
pub struct Hooks<D: Document> {
    /// Once per expression, on the raw resolved value
    pub before_all: Option<FilterFn<D>>,
    /// Once per expression, after the pipeline
    pub after_all: Option<FilterFn<D>>,
    /// Around every filter invocation
    pub before_each: Option<FilterFn<D>>,
    pub after_each: Option<FilterFn<D>>,
    /// Around one specific filter, keyed by name
    pub before: HashMap<String, FilterFn<D>>,
    pub after: HashMap<String, FilterFn<D>>,
}

impl<D: Document> Default for Hooks<D> {
    fn default() -> Self {
        Hooks {
            before_all: None,
            after_all: None,
            before_each: None,
            after_each: None,
            before: HashMap::new(),
            after: HashMap::new(),
        }
    }
}

impl<D: Document> Clone for Hooks<D> {
    fn clone(&self) -> Self {
        Hooks {
            before_all: self.before_all,
            after_all: self.after_all,
            before_each: self.before_each,
            after_each: self.after_each,
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

/// A bundle of registrations merged into an engine with
/// [`Engine::extend`].
pub struct Plugin<D: Document> {
    pub filters: Vec<(String, Vec<String>, FilterFn<D>)>,
    pub types: Vec<(String, TypeFn<D>)>,
    pub formats: Vec<(String, FormatFn<D>)>,
    pub hooks: Hooks<D>,
}

impl<D: Document> Default for Plugin<D> {
    fn default() -> Self {
        Plugin {
            filters: Vec::new(),
            types: Vec::new(),
            formats: Vec::new(),
            hooks: Hooks::default(),
        }
    }
}

/// Errors surfaced by a merge. In production mode most of these are
/// caught at the single-filter boundary, logged, and degraded to null;
/// with [`Engine::debug`] set they propagate to the caller instead.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// A filter name with no registration (debug mode only)
    UnknownFilter(String),

    /// A type name with no registration in a filter signature
    UnknownType(String),

    /// Wrong arity, enum mismatch, or missing required parameter
    Param { filter: String, message: String },

    /// A filter body rejected its input
    Filter { filter: String, message: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownFilter(name) => write!(f, "Unknown filter: {}", name),
            EngineError::UnknownType(name) => write!(f, "Unknown type: {}", name),
            EngineError::Param { filter, message } => {
                write!(f, "Parameter error in {}: {}", filter, message)
            }
            EngineError::Filter { filter, message } => {
                write!(f, "Filter error in {}: {}", filter, message)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// One independently configured merge engine.
///
/// An engine is an explicit value, not ambient state: two engines with
/// different registrations coexist without seeing each other. Cloning an
/// engine copies its whole configuration, which is how a derived engine
/// with a few extra filters is made.
pub struct Engine<D: Document> {
    pub filters: HashMap<String, FilterDescriptor<D>>,
    pub types: HashMap<String, TypeFn<D>>,
    pub formats: HashMap<String, FormatFn<D>>,
    pub hooks: Hooks<D>,
    /// Fail fast instead of degrading to null
    pub debug: bool,
}

impl<D: Document> Clone for Engine<D> {
    fn clone(&self) -> Self {
        Engine {
            filters: self.filters.clone(),
            types: self.types.clone(),
            formats: self.formats.clone(),
            hooks: self.hooks.clone(),
            debug: self.debug,
        }
    }
}

impl<D: Document> Default for Engine<D> {
    fn default() -> Self {
        Engine::new()
    }
}

impl<D: Document> Engine<D> {
    /// Engine with the built-in filters and types registered.
    pub fn new() -> Self {
        let mut engine = Engine {
            filters: HashMap::new(),
            types: HashMap::new(),
            formats: HashMap::new(),
            hooks: Hooks::default(),
            debug: false,
        };
        filters::register(&mut engine);
        engine
    }

    pub fn add_filter(&mut self, name: &str, types: &[&str], func: FilterFn<D>) {
        let types = types.iter().map(|t| TypeSpec::parse(t)).collect();
        self.filters
            .insert(name.to_string(), FilterDescriptor { types, func });
    }

    pub fn add_type(&mut self, name: &str, func: TypeFn<D>) {
        self.types.insert(name.to_string(), func);
    }

    pub fn add_format(&mut self, name: &str, func: FormatFn<D>) {
        self.formats.insert(name.to_string(), func);
    }

    /// Merge a plugin's registrations into this engine. Hook slots in the
    /// plugin override existing ones; named entries accumulate.
    pub fn extend(&mut self, plugin: Plugin<D>) {
        for (name, types, func) in plugin.filters {
            let types: Vec<&str> = types.iter().map(String::as_str).collect();
            self.add_filter(&name, &types, func);
        }
        for (name, func) in plugin.types {
            self.add_type(&name, func);
        }
        for (name, func) in plugin.formats {
            self.add_format(&name, func);
        }
        if plugin.hooks.before_all.is_some() {
            self.hooks.before_all = plugin.hooks.before_all;
        }
        if plugin.hooks.after_all.is_some() {
            self.hooks.after_all = plugin.hooks.after_all;
        }
        if plugin.hooks.before_each.is_some() {
            self.hooks.before_each = plugin.hooks.before_each;
        }
        if plugin.hooks.after_each.is_some() {
            self.hooks.after_each = plugin.hooks.after_each;
        }
        self.hooks.before.extend(plugin.hooks.before);
        self.hooks.after.extend(plugin.hooks.after);
    }

    /// Merge a data value into the tree rooted at `root`, in place.
    /// Returns the (possibly relocated) root.
    pub fn merge_node(&self, doc: &mut D, root: NodeId, data: &Value) -> Result<NodeId, EngineError> {
        let mut state = MergeState::new(root);
        self.merge_tree(doc, root, data, &mut state)?;
        Ok(state.root)
    }

    /// Merge each node of a slice, preserving order.
    pub fn merge_nodes(
        &self,
        doc: &mut D,
        nodes: &[NodeId],
        data: &Value,
    ) -> Result<Vec<NodeId>, EngineError> {
        nodes
            .iter()
            .map(|&node| self.merge_node(doc, node, data))
            .collect()
    }

    pub(crate) fn merge_tree(
        &self,
        doc: &mut D,
        root: NodeId,
        data: &Value,
        state: &mut MergeState,
    ) -> Result<(), EngineError> {
        let scope = Scope::new(data.clone());
        let iter = doc.arena_mut().create_iterator(root);
        let walk = loop {
            let Some(node) = doc.arena_mut().iter_next(iter) else {
                break Ok(());
            };
            if let Err(e) = self.merge_single(doc, node, &scope, state) {
                break Err(e);
            }
        };
        doc.arena_mut().drop_iterator(iter);
        walk?;
        // tag renames were deferred so the walk never sees a swapped node
        let renames = std::mem::take(&mut state.replacements);
        for (old, tag) in renames {
            rename(doc, old, &tag, state);
        }
        Ok(())
    }

    fn merge_single(
        &self,
        doc: &mut D,
        node: NodeId,
        scope: &Scope,
        state: &mut MergeState,
    ) -> Result<(), EngineError> {
        match doc.arena().data(node).clone() {
            NodeData::Text(value) => {
                self.merge_place(doc, Place::text(node), &value, scope, state)
            }
            NodeData::Element { tag, attrs } => {
                if tag.contains(OPEN) {
                    self.merge_place(doc, Place::tag(node), &tag, scope, state)?;
                }
                for (name, value) in attrs {
                    if value.contains(OPEN) {
                        self.merge_place(
                            doc,
                            Place::attribute(node, &name),
                            &value,
                            scope,
                            state,
                        )?;
                    }
                }
                Ok(())
            }
            NodeData::Fragment => Ok(()),
        }
    }

    fn merge_place(
        &self,
        doc: &mut D,
        place: Place,
        raw: &str,
        scope: &Scope,
        state: &mut MergeState,
    ) -> Result<(), EngineError> {
        let tokens = Tokenizer::new(raw).tokenize();
        if !tokenizer::has_expr(&tokens) {
            return Ok(());
        }
        let dest = place.fork();
        let mut ctx = Context {
            engine: self,
            doc,
            scope,
            expr: Expression::empty(),
            src: place,
            dest,
            raw: None,
            raw_source: String::new(),
            state,
        };
        ctx.run_tokens(&tokens)?;
        ctx.finish();
        Ok(())
    }
}

impl Engine<TextDocument> {
    /// Merge a string template. The output mirrors the input shape: plain
    /// text stays a string, and a template that is one lone expression
    /// collapsing to a single value keeps that value's type.
    pub fn merge(&self, template: &str, data: &Value) -> Result<Value, EngineError> {
        let tokens = Tokenizer::new(template).tokenize();
        if !tokenizer::has_expr(&tokens) {
            return Ok(Value::String(template.to_string()));
        }
        let lone_expr = tokens.len() == 1;
        let mut doc = TextDocument::from_str(template);
        let root = doc.root();
        let mut state = MergeState::new(root);
        self.merge_tree(&mut doc, root, data, &mut state)?;
        if lone_expr {
            if let Capture::One(v) = state.capture {
                return Ok(v);
            }
        }
        let out = doc.serialize(doc.root());
        Ok(Value::String(out))
    }
}

/// Apply one deferred tag rename: build the new element, move attributes
/// and children over, and swap it into the tree.
fn rename<D: Document>(doc: &mut D, old: NodeId, tag: &str, state: &mut MergeState) {
    if !doc.arena().is_element(old) {
        return;
    }
    let new = doc.arena_mut().create_element(tag);
    for (name, value) in doc.arena().attrs(old) {
        doc.arena_mut().set_attr(new, &name, &value);
    }
    while let Some(child) = doc.arena().first_child(old) {
        doc.arena_mut().append(new, child);
    }
    if doc.arena().parent(old).is_some() {
        doc.arena_mut().replace(old, new);
    }
    if state.root == old {
        state.root = new;
    }
    if doc.root() == old {
        doc.set_root(new);
    }
}
