use crate::tree::{Arena, Document, NodeData, NodeId};

/// Text-only document: a fragment of text runs, no elements.
///
/// This is what string templates merge through. Serialization is plain
/// concatenation of every text run in order.
#[derive(Debug, Clone)]
pub struct TextDocument {
    arena: Arena,
    root: NodeId,
}

impl TextDocument {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.create_fragment();
        TextDocument { arena, root }
    }

    /// Document holding the given string as its single text run.
    pub fn from_str(value: &str) -> Self {
        let mut doc = TextDocument::new();
        let text = doc.arena.create_text(value);
        doc.arena.append(doc.root, text);
        doc
    }

    /// Concatenated text of the whole document.
    pub fn to_text(&self) -> String {
        self.serialize(self.root)
    }

    fn collect(&self, id: NodeId, out: &mut String) {
        match self.arena.data(id) {
            NodeData::Text(value) => out.push_str(value),
            _ => {
                for &child in self.arena.children(id) {
                    self.collect(child, out);
                }
            }
        }
    }
}

impl Default for TextDocument {
    fn default() -> Self {
        TextDocument::new()
    }
}

impl Document for TextDocument {
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
        self.collect(id, &mut out);
        out
    }
}

#[test]
fn test_round_trip() {
    let doc = TextDocument::from_str("hello world");
    assert_eq!(doc.to_text(), "hello world");
}
