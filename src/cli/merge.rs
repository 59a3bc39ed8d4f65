//! Execute template merges against JSON input

use super::CliError;
use crate::tokenizer::Tokenizer;
use crate::{Document, Engine, JsonDocument, Token, Value};

/// Options for the merge command
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// The template to merge
    pub template: String,
    /// JSON data string
    pub input: Option<String>,
    /// Treat the template itself as a JSON document and merge through the
    /// JSON backend
    pub json: bool,
    /// Pretty-print JSON output
    pub pretty: bool,
    /// Only scan the template, don't merge
    pub syntax_only: bool,
    /// Fail fast instead of degrading to null
    pub debug: bool,
}

/// Result of a merge operation
#[derive(Debug)]
pub enum MergeResult {
    /// Syntax scan passed; reports whether any expression was found
    SyntaxValid { expressions: usize },
    /// The merged output, raw when the result was a plain string
    Text(String),
    /// The merged output as a JSON value
    Json(serde_json::Value),
}

/// Execute a graft merge operation
pub fn execute_merge(options: &MergeOptions) -> Result<MergeResult, CliError> {
    if options.syntax_only {
        let tokens = Tokenizer::new(&options.template).tokenize();
        let expressions = tokens
            .iter()
            .filter(|t| matches!(t, Token::Expr(_)))
            .count();
        return Ok(MergeResult::SyntaxValid { expressions });
    }

    let json_str = options.input.as_ref().ok_or(CliError::NoInput)?;
    let json_value: serde_json::Value = serde_json::from_str(json_str)?;
    let data = Value::from_json(json_value);

    if options.json {
        let template: serde_json::Value = serde_json::from_str(&options.template)?;
        let mut doc = JsonDocument::from_json(template);
        let mut engine = Engine::new();
        engine.debug = options.debug;
        let root = doc.root();
        engine.merge_node(&mut doc, root, &data)?;
        return Ok(MergeResult::Json(doc.to_json()));
    }

    let mut engine = Engine::new();
    engine.debug = options.debug;
    let merged = engine.merge(&options.template, &data)?;
    match merged {
        Value::String(s) => Ok(MergeResult::Text(s)),
        other => Ok(MergeResult::Json(other.to_json())),
    }
}
