use clap::{Parser, Subcommand};
use graft_lang::cli::{self, CliError, MergeOptions, MergeResult};
use graft_lang::Tokenizer;
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Graft - A tree-merging template language for text, markup, and JSON documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a template with JSON data
    Merge {
        /// The template to merge
        template: String,

        /// JSON data (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Treat the template itself as a JSON document
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Only scan the template, don't merge
        #[arg(long)]
        syntax_only: bool,

        /// Fail fast on filter errors instead of degrading to null
        #[arg(long)]
        debug: bool,
    },

    /// Dump the token tree of a template
    Tokens {
        /// The template to scan
        template: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Merge {
            template,
            input,
            json,
            pretty,
            syntax_only,
            debug,
        } => run_merge(template, input, json, pretty, syntax_only, debug),
        Commands::Tokens { template } => {
            let tokens = Tokenizer::new(&template).tokenize();
            for token in tokens {
                println!("{:?}", token);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_merge(
    template: String,
    input: Option<String>,
    json: bool,
    pretty: bool,
    syntax_only: bool,
    debug: bool,
) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = MergeOptions {
        template,
        input,
        json,
        pretty,
        syntax_only,
        debug,
    };

    match cli::execute_merge(&options)? {
        MergeResult::SyntaxValid { expressions } => {
            println!("Syntax is valid ({} expressions)", expressions)
        }
        MergeResult::Text(s) => println!("{}", s),
        MergeResult::Json(value) => {
            let out = if pretty {
                serde_json::to_string_pretty(&value)
            } else {
                serde_json::to_string(&value)
            }
            .unwrap_or_default();
            println!("{}", out);
        }
    }
    Ok(())
}
