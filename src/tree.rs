//! The tree backends the merge engine runs over.
//!
//! The engine never manipulates a concrete document type directly: it goes
//! through the [`Document`] trait, whose three implementations share one
//! [`Arena`] node store. The arena owns every node of a document as a slot
//! in a flat vector; nodes refer to each other by [`NodeId`], so the engine
//! can hold ids across arbitrary mutations without borrow gymnastics.
//!
//! Iteration during a merge is removal-aware: the arena keeps a registry of
//! live iterators and adjusts their pending position whenever a `detach`
//! removes the subtree that position falls in. The walk never re-visits or
//! skips a still-attached node because an unrelated removal happened.

pub mod json;
pub mod markup;
pub mod text;

pub type NodeId = usize;

/// Payload of one tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// Element with a tag name and ordered attributes
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// Text run
    Text(String),
    /// Container with no identity of its own; serializes as its children
    Fragment,
}

#[derive(Debug, Clone)]
struct NodeSlot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct IterState {
    root: NodeId,
    next: Option<NodeId>,
    active: bool,
}

/// Handle to a registered tree iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterId(usize);

/// The node store every document backend is built on.
#[derive(Debug, Default, Clone)]
pub struct Arena {
    slots: Vec<NodeSlot>,
    iters: Vec<IterState>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.slots.push(NodeSlot {
            data,
            parent: None,
            children: Vec::new(),
        });
        self.slots.len() - 1
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, value: &str) -> NodeId {
        self.push(NodeData::Text(value.to_string()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeData::Fragment)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.slots[id].data
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.slots[id].data, NodeData::Element { .. })
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.slots[id].data, NodeData::Text(_))
    }

    pub fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.slots[id].data, NodeData::Fragment)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.slots[id].data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.slots[id].data {
            NodeData::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let NodeData::Text(v) = &mut self.slots[id].data {
            *v = value.to_string();
        }
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.slots[id].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.slots[id].data {
            if let Some(pair) = attrs.iter_mut().find(|(k, _)| k == name) {
                pair.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.slots[id].data {
            attrs.retain(|(k, _)| k != name);
        }
    }

    /// Owned snapshot of an element's attributes, safe to iterate while
    /// the element is being mutated.
    pub fn attrs(&self, id: NodeId) -> Vec<(String, String)> {
        match &self.slots[id].data {
            NodeData::Element { attrs, .. } => attrs.clone(),
            _ => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id].children.first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.slots[id].parent?;
        let siblings = &self.slots[parent].children;
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.slots[id].parent?;
        let siblings = &self.slots[parent].children;
        let pos = siblings.iter().position(|&c| c == id)?;
        if pos == 0 { None } else { siblings.get(pos - 1).copied() }
    }

    /// True when `id` is `ancestor` or sits anywhere below it.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.slots[n].parent;
        }
        false
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Attach `child` under `parent`, before `reference` (or at the end).
    /// A child attached elsewhere is detached first.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if self.slots[child].parent.is_some() {
            self.detach(child);
        }
        let pos = match reference {
            Some(r) => self.slots[parent]
                .children
                .iter()
                .position(|&c| c == r)
                .unwrap_or(self.slots[parent].children.len()),
            None => self.slots[parent].children.len(),
        };
        self.slots[parent].children.insert(pos, child);
        self.slots[child].parent = Some(parent);
    }

    /// Unlink `id` from its parent. The node and its subtree stay alive in
    /// the arena and may be re-attached later. Live iterators whose pending
    /// position falls inside the detached subtree are advanced to the
    /// subtree's pre-order successor before the unlink happens.
    pub fn detach(&mut self, id: NodeId) {
        let mut fixes = Vec::new();
        for (i, it) in self.iters.iter().enumerate() {
            if !it.active {
                continue;
            }
            if let Some(pending) = it.next {
                // an iterator walking inside the detached subtree keeps its
                // relative position; only outside walks must skip past it
                if self.is_within(pending, id) && !self.is_within(it.root, id) {
                    fixes.push((i, self.successor_skipping(id, it.root)));
                }
            }
        }
        for (i, next) in fixes {
            self.iters[i].next = next;
        }
        if let Some(parent) = self.slots[id].parent.take() {
            self.slots[parent].children.retain(|&c| c != id);
        }
    }

    /// Insert `new` where `old` is, then detach `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if let Some(parent) = self.slots[old].parent {
            self.insert_before(parent, new, Some(old));
        }
        self.detach(old);
    }

    /// Copy a node; with `deep` the whole subtree is copied.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let data = self.slots[id].data.clone();
        let copy = self.push(data);
        if deep {
            let kids = self.slots[id].children.clone();
            for kid in kids {
                let kid_copy = self.clone_node(kid, true);
                self.slots[copy].children.push(kid_copy);
                self.slots[kid_copy].parent = Some(copy);
            }
        }
        copy
    }

    // ------------------------------------------------------------------
    // Removal-aware iteration
    // ------------------------------------------------------------------

    /// Register a pre-order iterator rooted at `root`. The root itself is
    /// yielded first.
    pub fn create_iterator(&mut self, root: NodeId) -> IterId {
        self.iters.push(IterState {
            root,
            next: Some(root),
            active: true,
        });
        IterId(self.iters.len() - 1)
    }

    /// Yield the iterator's pending node and advance it.
    pub fn iter_next(&mut self, it: IterId) -> Option<NodeId> {
        let state = &self.iters[it.0];
        if !state.active {
            return None;
        }
        let current = state.next?;
        let root = state.root;
        let next = self.successor(current, root);
        self.iters[it.0].next = next;
        Some(current)
    }

    pub fn drop_iterator(&mut self, it: IterId) {
        self.iters[it.0].active = false;
        self.iters[it.0].next = None;
    }

    /// Pre-order successor of `id` within the subtree rooted at `root`.
    fn successor(&self, id: NodeId, root: NodeId) -> Option<NodeId> {
        if let Some(first) = self.first_child(id) {
            return Some(first);
        }
        self.successor_skipping(id, root)
    }

    /// Pre-order successor of `id` that does not descend into `id`.
    fn successor_skipping(&self, id: NodeId, root: NodeId) -> Option<NodeId> {
        let mut cur = id;
        loop {
            if cur == root {
                return None;
            }
            if let Some(sib) = self.next_sibling(cur) {
                return Some(sib);
            }
            cur = self.parent(cur)?;
        }
    }
}

/// The capability contract the merge engine depends on. Each backend
/// exposes the shared arena, tracks its own root, matches nodes against
/// selectors, and serializes subtrees to its native textual form.
pub trait Document {
    fn arena(&self) -> &Arena;
    fn arena_mut(&mut self) -> &mut Arena;
    fn root(&self) -> NodeId;
    fn set_root(&mut self, id: NodeId);

    /// Selector matching for `closest`-style lookups: `*` matches any
    /// element, otherwise the tag name must be equal. Backends with a real
    /// selector engine override this.
    fn matches(&self, id: NodeId, selector: &str) -> bool {
        if selector == "*" {
            return self.arena().is_element(id);
        }
        self.arena().tag(id) == Some(selector)
    }

    /// Serialize a subtree to the backend's native textual form.
    fn serialize(&self, id: NodeId) -> String;
}

/// Nearest ancestor (including `id` itself) matching `selector`.
pub fn closest<D: Document + ?Sized>(doc: &D, id: NodeId, selector: &str) -> Option<NodeId> {
    let mut cur = Some(id);
    while let Some(n) = cur {
        if doc.matches(n, selector) {
            return Some(n);
        }
        cur = doc.arena().parent(n);
    }
    None
}
