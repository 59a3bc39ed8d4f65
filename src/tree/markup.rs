use crate::tree::{Arena, Document, NodeData, NodeId};

/// Element/text document with an HTML-flavoured serialization.
///
/// This is the reference tree-shaped backend: documents are built
/// programmatically (markup parsing belongs to the host, not the engine)
/// and serialize to angle-bracket markup.
#[derive(Debug, Clone)]
pub struct MarkupDocument {
    arena: Arena,
    root: NodeId,
}

impl MarkupDocument {
    /// Empty document: a fragment root awaiting children.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.create_fragment();
        MarkupDocument { arena, root }
    }

    pub fn element(&mut self, tag: &str) -> NodeId {
        self.arena.create_element(tag)
    }

    pub fn text(&mut self, value: &str) -> NodeId {
        self.arena.create_text(value)
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.arena.append(parent, child);
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        self.arena.set_attr(id, name, value);
    }

    /// Serialize the whole document.
    pub fn to_markup(&self) -> String {
        self.serialize(self.root)
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.arena.data(id) {
            NodeData::Text(value) => out.push_str(&escape_text(value)),
            NodeData::Fragment => {
                for &child in self.arena.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                for &child in self.arena.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl Default for MarkupDocument {
    fn default() -> Self {
        MarkupDocument::new()
    }
}

impl Document for MarkupDocument {
    fn arena(&self) -> &Arena {
        &self.arena
    }

    fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    fn serialize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }
}

fn escape_text(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '&' => "&amp;".chars().collect::<Vec<_>>(),
            '<' => "&lt;".chars().collect(),
            '>' => "&gt;".chars().collect(),
            c => vec![c],
        })
        .collect()
}

fn escape_attr(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '&' => "&amp;".chars().collect::<Vec<_>>(),
            '"' => "&quot;".chars().collect(),
            '<' => "&lt;".chars().collect(),
            c => vec![c],
        })
        .collect()
}

#[test]
fn test_markup_serialization() {
    let mut doc = MarkupDocument::new();
    let div = doc.element("div");
    doc.set_attr(div, "class", "note");
    let txt = doc.text("a < b");
    doc.append(div, txt);
    let root = doc.root();
    doc.append(root, div);
    assert_eq!(doc.to_markup(), "<div class=\"note\">a &lt; b</div>");
}
