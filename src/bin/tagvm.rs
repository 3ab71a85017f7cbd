//! Command-line interface for tagvm
//! Parses a file with one of the built-in languages and prints the resulting tag stream.
//!
//! Usage:
//!   tagvm parse `<path>` [--language `<name>`] [--format `<format>`] [--config `<file>`]
//!   tagvm list-formats                                   - List all available output formats
//!   tagvm list-languages                                 - List the built-in languages
//!
//! Input files may contain `${}` markers, which are read as interpolation points.

use clap::{Arg, Command};
use tagvm::vm::formats::FormatRegistry;
use tagvm::vm::grammars;
use tagvm::vm::{parse_with, Evaluator, EvaluatorOptions, Input};
use tagvm_config::{Loader, TagvmConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = Command::new("tagvm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run a grammar over a file and print its concrete syntax tree tags")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("parse")
                .about("Parse a file and print the tag stream")
                .arg(
                    Arg::new("path")
                        .help("Path to the file to parse")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("language")
                        .long("language")
                        .short('l')
                        .help("Built-in language to parse with")
                        .default_value("arithmetic"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format (e.g., 'tags', 'treeviz'); defaults to the configured"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .help("Configuration file layered over the built-in defaults"),
                ),
        )
        .subcommand(Command::new("list-formats").about("List available output formats"))
        .subcommand(Command::new("list-languages").about("List the built-in languages"))
        .get_matches();

    match matches.subcommand() {
        Some(("parse", parse_matches)) => {
            let path = parse_matches
                .get_one::<String>("path")
                .map(String::as_str)
                .unwrap_or_default();
            let language = parse_matches
                .get_one::<String>("language")
                .map(String::as_str)
                .unwrap_or("arithmetic");
            let format = parse_matches.get_one::<String>("format").map(String::as_str);
            let config = parse_matches.get_one::<String>("config").map(String::as_str);
            handle_parse_command(path, language, format, config);
        }
        Some(("list-formats", _)) => handle_list_formats_command(),
        Some(("list-languages", _)) => handle_list_languages_command(),
        _ => unreachable!(),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn load_config(path: Option<&str>, format: Option<&str>) -> TagvmConfig {
    let mut loader = Loader::new();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    if let Some(format) = format {
        loader = loader
            .set_override("output.format", format)
            .unwrap_or_else(|e| fail(format!("Invalid format override: {}", e)));
    }
    loader
        .build()
        .unwrap_or_else(|e| fail(format!("Failed to load configuration: {}", e)))
}

/// RUST_LOG wins over the configured level.
fn init_tracing(config: &TagvmConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Handle the parse command
fn handle_parse_command(path: &str, language: &str, format: Option<&str>, config: Option<&str>) {
    let config = load_config(config, format);
    init_tracing(&config);

    let (language, document) = grammars::by_name(language).unwrap_or_else(|| {
        fail(format!(
            "Unknown language '{}' (available: {})",
            language,
            grammars::NAMES.join(", ")
        ))
    });

    let source = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("Error reading file: {}", e)));

    let evaluator = Evaluator::new(language).with_options(EvaluatorOptions::from(&config.engine));
    let parse = parse_with(&evaluator, document, Input::from_template(&source))
        .unwrap_or_else(|e| fail(format!("Parse error: {}", e)));

    let output = FormatRegistry::with_defaults()
        .serialize(&parse.tags, config.output.format.as_str())
        .unwrap_or_else(|e| fail(e));

    print!("{}", output);
}

/// Handle the list-formats command
fn handle_list_formats_command() {
    let registry = FormatRegistry::with_defaults();
    println!("Available output formats:\n");
    for name in registry.list_formats() {
        let description = registry
            .get(&name)
            .map(|formatter| formatter.description())
            .unwrap_or_default();
        println!("  {}", name);
        println!("    {}", description);
    }
}

/// Handle the list-languages command
fn handle_list_languages_command() {
    println!("Built-in languages:\n");
    for name in grammars::NAMES {
        println!("  {}", name);
    }
}
