//! notequery: command-line front end for the note query engine.
//!
//! # Responsibility
//! - Import JSON-lines corpus records into the corpus store.
//! - Route hybrid queries against the stored corpus and print ranked hits.
//! - Report tag counts and configured fields.

use clap::{Parser, Subcommand};
use log::info;
use notequery_core::{
    init_logging, open_db, CorpusRecord, CorpusService, EngineConfig, ParseError, Query,
    SearchEngine, SearchRequest, SqliteNoteRepository,
};
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "notequery")]
#[command(author, version, about = "Hybrid tag and full-text search over note collections")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, default_value = "notequery.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import corpus records from a JSON-lines file
    Import {
        /// File with one record object per line
        input: PathBuf,
    },

    /// Run a query, e.g. `attention tags: nlp AND NOT deprecated`
    Query {
        /// Query text; the part after `tags:` is a tag expression
        text: String,

        /// Restrict results to one field
        #[arg(short, long)]
        field: Option<String>,

        /// Maximum number of hits (default: config `default_limit`)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print tag usage counts
    Tags {
        /// Restrict counts to one field
        #[arg(short, long)]
        field: Option<String>,
    },

    /// Print known fields with alias and search prompt
    Fields,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::from_file(&cli.config)?;
    if let Some(dir) = config.logging.dir.as_deref() {
        init_logging(&config.logging.level, dir)?;
    }

    match cli.command {
        Commands::Import { input } => cmd_import(&config, &input)?,
        Commands::Query { text, field, limit } => cmd_query(&config, text, field, limit)?,
        Commands::Tags { field } => cmd_tags(&config, field.as_deref())?,
        Commands::Fields => cmd_fields(&config)?,
    }

    Ok(())
}

fn cmd_import(config: &EngineConfig, input: &Path) -> Result<(), Box<dyn Error>> {
    let records = read_records(input)?;

    let mut conn = open_db(&config.database_path)?;
    let mut service = CorpusService::new(SqliteNoteRepository::new(&mut conn));
    service.register_fields(config.field_names())?;
    let report = service.import_records(&records)?;

    println!(
        "imported {} notes across {} fields",
        report.note_ids.len(),
        report.fields
    );
    Ok(())
}

fn read_records(input: &Path) -> Result<Vec<CorpusRecord>, Box<dyn Error>> {
    let reader = BufReader::new(File::open(input)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CorpusRecord = serde_json::from_str(&line)
            .map_err(|err| format!("{}:{}: {err}", input.display(), index + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn load_engine(config: &EngineConfig) -> Result<SearchEngine, Box<dyn Error>> {
    let mut conn = open_db(&config.database_path)?;
    let service = CorpusService::new(SqliteNoteRepository::new(&mut conn));
    let engine = SearchEngine::new();
    let report = service.reload_engine(&engine)?;
    info!(
        "event=cli_load module=cli status=ok generation={} notes={}",
        report.generation, report.notes
    );
    Ok(engine)
}

fn cmd_query(
    config: &EngineConfig,
    text: String,
    field: Option<String>,
    limit: Option<usize>,
) -> Result<(), Box<dyn Error>> {
    let engine = load_engine(config)?;

    let mut request = SearchRequest::new(text);
    request.field = field;
    request.limit = limit.or(config.default_limit);

    let response = match engine.search(&request) {
        Ok(response) => response,
        Err(err) => {
            print_parse_error(&request.text, &err);
            return Err(err.into());
        }
    };

    for hit in &response.hits {
        let Some(note) = response.snapshot.note(hit.note_id) else {
            continue;
        };
        println!(
            "{:.4}\t{}\t{}:{}\t{}",
            hit.score,
            note.field,
            note.position.notebook,
            note.position.cell,
            note.title()
        );
    }
    Ok(())
}

/// Prints the tag expression with a caret under the offending byte.
fn print_parse_error(text: &str, err: &ParseError) {
    let Some(expression) = Query::split(text).tag_expression else {
        return;
    };
    let column = expression
        .char_indices()
        .take_while(|(offset, _)| *offset < err.position())
        .count();
    eprintln!("  {expression}");
    eprintln!("  {}^", " ".repeat(column));
}

fn cmd_tags(config: &EngineConfig, field: Option<&str>) -> Result<(), Box<dyn Error>> {
    let engine = load_engine(config)?;
    for entry in engine.snapshot().tag_counts(field) {
        println!("{}\t{}", entry.count, entry.tag);
    }
    Ok(())
}

fn cmd_fields(config: &EngineConfig) -> Result<(), Box<dyn Error>> {
    let mut conn = open_db(&config.database_path)?;
    let service = CorpusService::new(SqliteNoteRepository::new(&mut conn));

    let mut names = config
        .field_names()
        .map(str::to_string)
        .collect::<Vec<_>>();
    for stored in service.list_fields()? {
        if !names.contains(&stored) {
            names.push(stored);
        }
    }

    for name in names {
        let (alias, prompt) = match config.field(&name) {
            Some(field) => (
                field.display_name().to_string(),
                field.search_prompt.clone().unwrap_or_default(),
            ),
            None => (name.clone(), String::new()),
        };
        println!("{name}\t{alias}\t{prompt}");
    }
    Ok(())
}
