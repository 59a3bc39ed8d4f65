pub mod context;
pub mod engine;
pub mod expression;
pub mod filters;
pub mod place;
pub mod repeat;
pub mod symbols;
pub mod tokenizer;
pub mod tree;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use context::{Context, MergeState, Scope};
pub use engine::{Engine, EngineError, FilterDescriptor, Hooks, Plugin, TypeSpec};
pub use expression::{Expression, FilterCall};
pub use place::{Hit, HitOut, Place, Range, Span, Target};
pub use tokenizer::{Token, Tokenizer};
pub use tree::json::JsonDocument;
pub use tree::markup::MarkupDocument;
pub use tree::text::TextDocument;
pub use tree::{Arena, Document, NodeData, NodeId};
pub use value::Value;
