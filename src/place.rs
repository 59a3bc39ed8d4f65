use crate::context::MergeState;
use crate::symbols::RANGE;
use crate::tree::{self, Document, NodeId};
use crate::value::Value;

/// Which kind of location a [`Place`] points at. Exactly one is active;
/// filters may only move a target forward (narrow, replace, or widen),
/// never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Write capability dropped: nothing is written back
    None,
    /// A text run (the node itself holds the expression)
    Text,
    /// A whole node, replaced by the computed result
    Node,
    /// The content of a node (children replaced, node kept)
    Cont,
    /// A named attribute of a node
    Attr,
    /// The tag name of a node (applied after the walk ends)
    Tag,
}

/// How many siblings on one side participate in a read/write/removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Span {
    #[default]
    None,
    Count(usize),
    All,
}

/// Compact sibling range: a span plus an optional selector the siblings
/// must match. Parsed from `""`, `"3"`, `"*"`, `"2div"`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Range {
    pub span: Span,
    pub sel: Option<String>,
}

/// Parse compact range syntax. Anything unparseable is an empty range.
pub fn parse_range(s: &str) -> Range {
    if s.is_empty() {
        return Range::default();
    }
    match RANGE.captures(s) {
        Some(caps) => {
            let sel = caps.get(2).map(|m| m.as_str().to_string());
            let span = match caps.get(1).map(|m| m.as_str()) {
                Some("*") => Span::All,
                Some(digits) => Span::Count(digits.parse().unwrap_or(0)),
                None if sel.is_some() => Span::All,
                None => Span::None,
            };
            Range { span, sel }
        }
        None => Range::default(),
    }
}

/// One resolved segment of a scanned string: its verbatim source text plus
/// what the pipeline decided it becomes.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub raw: String,
    pub out: HitOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HitOut {
    /// Plain text between expressions
    Literal,
    /// The expression resolved to this value
    Value(Value),
    /// The value was redirected to another place: this spot empties out
    Placeholder,
    /// The path did not resolve: the raw bracket text stays
    Missing,
    /// A filter cancelled the hit: the raw bracket text stays
    Cancelled,
}

/// One write location in the tree, plus pending sibling range adjustments.
///
/// Two places exist per merge step: `src`, where the expression was found,
/// and `dest`, where the result lands. They start identical and diverge
/// when a filter redirects the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub target: Target,
    pub node: NodeId,
    pub attr: Option<String>,
    pub before: Range,
    pub after: Range,
    pub hits: Vec<Hit>,
    pub index: usize,
}

impl Place {
    pub fn text(node: NodeId) -> Place {
        Place {
            target: Target::Text,
            node,
            attr: None,
            before: Range::default(),
            after: Range::default(),
            hits: Vec::new(),
            index: 0,
        }
    }

    pub fn attribute(node: NodeId, name: &str) -> Place {
        Place {
            target: Target::Attr,
            node,
            attr: Some(name.to_string()),
            before: Range::default(),
            after: Range::default(),
            hits: Vec::new(),
            index: 0,
        }
    }

    pub fn tag(node: NodeId) -> Place {
        Place {
            target: Target::Tag,
            node,
            attr: None,
            before: Range::default(),
            after: Range::default(),
            hits: Vec::new(),
            index: 0,
        }
    }

    /// Same location, fresh write state. This is how `dest` starts from
    /// `src`.
    pub fn fork(&self) -> Place {
        Place {
            target: self.target,
            node: self.node,
            attr: self.attr.clone(),
            before: Range::default(),
            after: Range::default(),
            hits: Vec::new(),
            index: 0,
        }
    }

    pub fn same_location(&self, other: &Place) -> bool {
        self.target == other.target && self.node == other.node && self.attr == other.attr
    }

    /// The element this place hangs off: the parent for a text run, the
    /// node itself otherwise.
    pub fn owner<D: Document>(&self, doc: &D) -> NodeId {
        if self.target == Target::Text {
            match doc.arena().parent(self.node) {
                Some(p) if doc.arena().is_element(p) => p,
                _ => self.node,
            }
        } else {
            self.node
        }
    }

    /// Current content of the place.
    pub fn read<D: Document>(&self, doc: &D) -> Option<String> {
        match self.target {
            Target::Text | Target::Cont | Target::Node => {
                doc.arena().text(self.node).map(str::to_string)
            }
            Target::Attr => self
                .attr
                .as_deref()
                .and_then(|a| doc.arena().attr(self.node, a))
                .map(str::to_string),
            Target::Tag => doc.arena().tag(self.node).map(str::to_string),
            Target::None => None,
        }
    }

    /// Reinterpret the target. `to` is `None` to drop the write
    /// capability, `*` for the whole node, `-` for its content, or an
    /// attribute name. `selector` optionally walks to a qualifying sibling
    /// first (`+2`, `-1`, `+div`).
    pub fn restrict<D: Document>(&mut self, doc: &D, to: Option<&str>, selector: Option<&str>) {
        if let Some(sel) = selector {
            if let Some(node) = self.walk_sibling(doc, sel) {
                self.node = node;
                if self.target == Target::Text {
                    self.target = Target::Node;
                }
            }
        }
        match to {
            None => self.target = Target::None,
            Some("*") => {
                self.node = self.owner(doc);
                self.target = Target::Node;
            }
            Some("-") => {
                self.node = self.owner(doc);
                self.target = Target::Cont;
            }
            Some(name) => {
                self.node = self.owner(doc);
                self.attr = Some(name.to_string());
                self.target = Target::Attr;
            }
        }
    }

    /// Widen the target to an ancestor. `-` targets the current node's
    /// content, `/` the outermost element, `*` (repeated) hops that many
    /// levels minus one, anything else is a selector for the nearest
    /// matching ancestor. Failure leaves the target unchanged.
    pub fn extend<D: Document>(&mut self, doc: &D, spec: &str) {
        if spec == "-" {
            if matches!(self.target, Target::Attr | Target::Tag) {
                return;
            }
            self.node = self.owner(doc);
            self.target = Target::Cont;
            return;
        }
        if spec == "/" {
            let mut node = self.owner(doc);
            while let Some(parent) = doc.arena().parent(node) {
                if !doc.arena().is_element(parent) {
                    break;
                }
                node = parent;
            }
            self.node = node;
            self.target = Target::Node;
            return;
        }
        if !spec.is_empty() && spec.chars().all(|c| c == '*') {
            let mut node = self.owner(doc);
            for _ in 1..spec.len() {
                match doc.arena().parent(node) {
                    Some(parent) if doc.arena().is_element(parent) => node = parent,
                    _ => {
                        log::warn!("no ancestor {} levels up", spec.len() - 1);
                        return;
                    }
                }
            }
            self.node = node;
            self.target = Target::Node;
            return;
        }
        match tree::closest(doc, self.owner(doc), spec) {
            Some(node) => {
                self.node = node;
                self.target = Target::Node;
            }
            None => log::warn!("no ancestor matching {selector}", selector = spec),
        }
    }

    fn walk_sibling<D: Document>(&self, doc: &D, sel: &str) -> Option<NodeId> {
        let (forward, rest) = match sel.chars().next() {
            Some('+') => (true, &sel[1..]),
            Some('-') => (false, &sel[1..]),
            _ => (true, sel),
        };
        let range = parse_range(rest);
        let count = match range.span {
            Span::Count(n) if n > 0 => n,
            // a bare selector walks to the nearest matching sibling
            Span::All if range.sel.is_none() => return None,
            _ => 1,
        };
        let mut node = self.owner(doc);
        let mut taken = 0;
        while taken < count {
            let next = if forward {
                doc.arena().next_sibling(node)
            } else {
                doc.arena().prev_sibling(node)
            };
            match next {
                Some(n) => {
                    node = n;
                    if range
                        .sel
                        .as_deref()
                        .map(|s| doc.matches(n, s))
                        .unwrap_or(true)
                    {
                        taken += 1;
                    }
                }
                None => return None,
            }
        }
        Some(node)
    }

    /// Siblings covered by the before/after range on one side, in
    /// document order.
    pub fn range_nodes<D: Document>(&self, doc: &D, forward: bool) -> Vec<NodeId> {
        let range = if forward { &self.after } else { &self.before };
        let mut out = Vec::new();
        let (limit, all) = match range.span {
            Span::None => return out,
            Span::Count(n) => (n, false),
            Span::All => (0, true),
        };
        let mut cur = self.node;
        while all || out.len() < limit {
            let next = if forward {
                doc.arena().next_sibling(cur)
            } else {
                doc.arena().prev_sibling(cur)
            };
            match next {
                Some(n) => {
                    if let Some(sel) = range.sel.as_deref() {
                        if !doc.matches(n, sel) {
                            break;
                        }
                    }
                    out.push(n);
                    cur = n;
                }
                None => break,
            }
        }
        if !forward {
            out.reverse();
        }
        out
    }

    /// Remove the target (and pending sibling ranges) from the live tree.
    /// Returns the extracted fragment and a placeholder cursor left at the
    /// vacated position, so later writes and repeats know where to
    /// reinsert.
    pub fn extract<D: Document>(&self, doc: &mut D, state: &mut MergeState) -> (NodeId, NodeId) {
        if self.target == Target::Cont {
            let arena = doc.arena_mut();
            let frag = arena.create_fragment();
            let kids: Vec<NodeId> = arena.children(self.node).to_vec();
            for kid in kids {
                arena.detach(kid);
                arena.append(frag, kid);
            }
            let cursor = arena.create_text("");
            arena.append(self.node, cursor);
            return (frag, cursor);
        }

        let mut nodes = self.range_nodes(doc, false);
        nodes.push(self.node);
        nodes.extend(self.range_nodes(doc, true));

        let first = nodes[0];
        let mut replaced_root = None;
        let arena = doc.arena_mut();
        let cursor = arena.create_text("");
        match arena.parent(first) {
            Some(parent) => arena.insert_before(parent, cursor, Some(first)),
            None => {
                // extracting a parentless root: wrap it in a fragment so
                // the cursor has somewhere to live
                let wrap = arena.create_fragment();
                arena.append(wrap, cursor);
                replaced_root = Some(wrap);
            }
        }
        let frag = arena.create_fragment();
        for node in nodes {
            arena.detach(node);
            arena.append(frag, node);
        }
        if let Some(wrap) = replaced_root {
            if state.root == self.node {
                state.root = wrap;
            }
            if doc.root() == self.node {
                doc.set_root(wrap);
            }
        }
        (frag, cursor)
    }

    /// Write the computed hits back through this place. `origin` is the
    /// place the value was read at: writes landing on a different node
    /// merge token-list attributes instead of replacing them.
    pub fn write<D: Document>(
        &self,
        doc: &mut D,
        hits: &[Hit],
        origin: &Place,
        state: &mut MergeState,
    ) {
        if self.target == Target::None || hits.is_empty() {
            return;
        }
        let slots = collapse(hits);
        match self.target {
            Target::Tag => {
                let mut name = String::new();
                for slot in &slots {
                    if let Slot::Str(s) = slot {
                        name.push_str(s);
                    }
                }
                let name = name.trim().to_string();
                if !name.is_empty() {
                    state.replacements.push((self.node, name));
                }
            }
            Target::Attr => {
                let Some(name) = self.attr.clone() else { return };
                let form = attr_form(doc, &slots);
                let additive = origin.node != self.node;
                write_attr(doc, self.node, &name, &form, additive);
                for sib in self.range_nodes(doc, false) {
                    write_attr(doc, sib, &name, &form, true);
                }
                for sib in self.range_nodes(doc, true) {
                    write_attr(doc, sib, &name, &form, true);
                }
            }
            Target::Text | Target::Node | Target::Cont => {
                self.write_content(doc, slots, state);
            }
            Target::None => {}
        }
    }

    fn write_content<D: Document>(&self, doc: &mut D, slots: Vec<Slot>, state: &mut MergeState) {
        // sibling ranges are removed first
        for sib in self.range_nodes(doc, false) {
            doc.arena_mut().detach(sib);
        }
        for sib in self.range_nodes(doc, true) {
            doc.arena_mut().detach(sib);
        }

        let has_nodes = slots.iter().any(|s| matches!(s, Slot::Node(_)));

        if self.target == Target::Text && !has_nodes {
            // mutate the existing text run in place
            let joined: String = slots.iter().map(Slot::render).collect();
            doc.arena_mut().set_text(self.node, &joined);
            return;
        }

        if self.target == Target::Cont {
            let kids: Vec<NodeId> = doc.arena().children(self.node).to_vec();
            for kid in kids {
                doc.arena_mut().detach(kid);
            }
            for slot in slots {
                insert_slot(doc, self.node, slot, None);
            }
            return;
        }

        // Text-with-nodes or Node: the target node is replaced entirely
        let parent = doc.arena().parent(self.node);
        let mut inserted = Vec::new();
        match parent {
            Some(parent) => {
                for slot in slots {
                    inserted.extend(insert_slot(doc, parent, slot, Some(self.node)));
                }
                doc.arena_mut().detach(self.node);
            }
            None => {
                let wrap = doc.arena_mut().create_fragment();
                for slot in slots {
                    inserted.extend(insert_slot(doc, wrap, slot, None));
                }
                if doc.root() == self.node {
                    doc.set_root(wrap);
                }
                if state.root == self.node {
                    state.root = wrap;
                }
                return;
            }
        }
        if state.root == self.node {
            state.root = match (inserted.len(), parent) {
                (1, _) => inserted[0],
                (_, Some(p)) => p,
                _ => state.root,
            };
            if doc.root() == self.node {
                doc.set_root(state.root);
            }
        }
    }
}

/// Flattened write slot.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Null,
    Bool(bool),
    Str(String),
    Node(NodeId),
}

impl Slot {
    fn render(&self) -> String {
        match self {
            Slot::Null => String::new(),
            Slot::Bool(b) => b.to_string(),
            Slot::Str(s) => s.clone(),
            Slot::Node(_) => String::new(),
        }
    }
}

/// Flatten hits into write slots. An all-null list collapses to a single
/// null (the value disappears); an all-boolean list collapses to the
/// conjunction of its values.
fn collapse(hits: &[Hit]) -> Vec<Slot> {
    let slots: Vec<Slot> = hits
        .iter()
        .map(|hit| match &hit.out {
            HitOut::Literal | HitOut::Missing | HitOut::Cancelled => Slot::Str(hit.raw.clone()),
            HitOut::Placeholder | HitOut::Value(Value::Null) => Slot::Null,
            HitOut::Value(Value::Boolean(b)) => Slot::Bool(*b),
            HitOut::Value(Value::Node(id)) => Slot::Node(*id),
            HitOut::Value(v) => Slot::Str(v.as_string()),
        })
        .collect();
    if !slots.is_empty() && slots.iter().all(|s| matches!(s, Slot::Null)) {
        return vec![Slot::Null];
    }
    if !slots.is_empty() && slots.iter().all(|s| matches!(s, Slot::Bool(_))) {
        let conj = slots.iter().all(|s| matches!(s, Slot::Bool(true)));
        return vec![Slot::Bool(conj)];
    }
    slots
}

#[derive(Debug, Clone, PartialEq)]
enum AttrForm {
    Null,
    Bool(bool),
    Str(String),
}

fn attr_form<D: Document>(doc: &D, slots: &[Slot]) -> AttrForm {
    match slots {
        [Slot::Null] => AttrForm::Null,
        [Slot::Bool(b)] => AttrForm::Bool(*b),
        _ => {
            let mut out = String::new();
            for slot in slots {
                match slot {
                    Slot::Node(id) => out.push_str(&doc.serialize(*id)),
                    other => out.push_str(&other.render()),
                }
            }
            AttrForm::Str(out)
        }
    }
}

/// Attributes set by presence alone.
const BOOLEAN_ATTRS: &[&str] = &[
    "allowfullscreen",
    "async",
    "autofocus",
    "autoplay",
    "checked",
    "controls",
    "default",
    "defer",
    "disabled",
    "formnovalidate",
    "hidden",
    "inert",
    "ismap",
    "itemscope",
    "loop",
    "multiple",
    "muted",
    "nomodule",
    "novalidate",
    "open",
    "playsinline",
    "readonly",
    "required",
    "reversed",
    "selected",
];

/// Attributes holding a space-separated token list.
const TOKEN_LIST_ATTRS: &[&str] = &["class"];

fn write_attr<D: Document>(doc: &mut D, node: NodeId, name: &str, form: &AttrForm, additive: bool) {
    if !doc.arena().is_element(node) {
        return;
    }
    if BOOLEAN_ATTRS.contains(&name) {
        let on = match form {
            AttrForm::Bool(b) => *b,
            AttrForm::Null => false,
            AttrForm::Str(s) => !s.is_empty() && s != "false",
        };
        if on {
            doc.arena_mut().set_attr(node, name, "");
        } else {
            doc.arena_mut().remove_attr(node, name);
        }
        return;
    }
    if TOKEN_LIST_ATTRS.contains(&name) {
        let incoming = match form {
            AttrForm::Str(s) => s.clone(),
            AttrForm::Bool(b) => b.to_string(),
            AttrForm::Null => String::new(),
        };
        let tokens: Vec<String> = incoming.split_whitespace().map(str::to_string).collect();
        let value = if additive {
            let mut merged: Vec<String> = doc
                .arena()
                .attr(node, name)
                .unwrap_or("")
                .split_whitespace()
                .map(str::to_string)
                .collect();
            for t in tokens {
                if !merged.contains(&t) {
                    merged.push(t);
                }
            }
            merged.join(" ")
        } else {
            tokens.join(" ")
        };
        if value.is_empty() {
            doc.arena_mut().remove_attr(node, name);
        } else {
            doc.arena_mut().set_attr(node, name, &value);
        }
        return;
    }
    match form {
        AttrForm::Null | AttrForm::Bool(false) => doc.arena_mut().remove_attr(node, name),
        AttrForm::Bool(true) => doc.arena_mut().set_attr(node, name, "true"),
        AttrForm::Str(s) => doc.arena_mut().set_attr(node, name, s),
    }
}

/// Materialize one slot under `parent`, before `reference`. Fragments pour
/// their children in; strings become text runs; null vanishes.
fn insert_slot<D: Document>(
    doc: &mut D,
    parent: NodeId,
    slot: Slot,
    reference: Option<NodeId>,
) -> Vec<NodeId> {
    let mut inserted = Vec::new();
    match slot {
        Slot::Null => {}
        Slot::Bool(b) => {
            let text = doc.arena_mut().create_text(&b.to_string());
            doc.arena_mut().insert_before(parent, text, reference);
            inserted.push(text);
        }
        Slot::Str(s) => {
            if !s.is_empty() {
                let text = doc.arena_mut().create_text(&s);
                doc.arena_mut().insert_before(parent, text, reference);
                inserted.push(text);
            }
        }
        Slot::Node(id) => {
            if doc.arena().is_fragment(id) {
                let kids: Vec<NodeId> = doc.arena().children(id).to_vec();
                for kid in kids {
                    doc.arena_mut().insert_before(parent, kid, reference);
                    inserted.push(kid);
                }
            } else {
                doc.arena_mut().insert_before(parent, id, reference);
                inserted.push(id);
            }
        }
    }
    inserted
}
