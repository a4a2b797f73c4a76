//! Mindgraph CLI — concept graph generation from files or stdin.
//!
//! Usage:
//!   mindgraph generate [FILE] [--text <text>] [--max-chars N] [--flat]
//!   mindgraph segment [FILE] [--max-chars N]

use clap::{Parser, Subcommand};
use mindgraph::pipeline::segment;
use mindgraph::{
    ContentSource, FileSource, HttpClientConfig, HttpGenerationClient, LiteralSource,
    MindmapService, PipelineConfig,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mindgraph", version, about = "Concept graph engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a mindmap and print it as JSON
    Generate {
        /// Input file (markdown or plain text); omit to read stdin
        file: Option<PathBuf>,
        /// Literal input text instead of a file
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// Maximum characters per chunk
        #[arg(long, default_value_t = 3000)]
        max_chars: usize,
        /// Retries after a failed generation call
        #[arg(long, default_value_t = 3)]
        retries: u32,
        /// Seconds between retry attempts
        #[arg(long, default_value_t = 2)]
        backoff_secs: u64,
        /// Extract chunks independently instead of carrying a running summary
        #[arg(long)]
        flat: bool,
        /// Chat completions endpoint
        #[arg(long, default_value = "https://api.openai.com/v1/chat/completions")]
        endpoint: String,
        /// Model identifier
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
        /// Environment variable holding the API key
        #[arg(long, default_value = "MINDGRAPH_API_KEY")]
        api_key_env: String,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Segment input into chunks and print their sizes (debugging aid)
    Segment {
        /// Input file; omit to read stdin
        file: Option<PathBuf>,
        /// Maximum characters per chunk
        #[arg(long, default_value_t = 3000)]
        max_chars: usize,
    },
}

fn read_stdin() -> Result<String, String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| format!("cannot read stdin: {}", e))?;
    Ok(buffer)
}

fn resolve_source(
    file: Option<PathBuf>,
    text: Option<String>,
) -> Result<Box<dyn ContentSource>, String> {
    match (file, text) {
        (Some(path), _) => Ok(Box::new(FileSource::new(path))),
        (None, Some(text)) => Ok(Box::new(LiteralSource::new(text))),
        (None, None) => Ok(Box::new(LiteralSource::new(read_stdin()?))),
    }
}

async fn cmd_generate(
    file: Option<PathBuf>,
    text: Option<String>,
    config: PipelineConfig,
    http: HttpClientConfig,
    pretty: bool,
) -> i32 {
    let client = match HttpGenerationClient::new(http) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let service = MindmapService::with_config(Arc::new(client), config);

    let source = match resolve_source(file, text) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match service.generate_from_source(source.as_ref()).await {
        Ok(mindmap) => {
            let rendered = if pretty {
                serde_json::to_string_pretty(&mindmap)
            } else {
                serde_json::to_string(&mindmap)
            };
            match rendered {
                Ok(json) => {
                    println!("{}", json);
                    0
                }
                Err(e) => {
                    eprintln!("Error: cannot render output: {}", e);
                    1
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_segment(file: Option<PathBuf>, max_chars: usize) -> i32 {
    let source = match resolve_source(file, None) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let fetched = match source.fetch_text().await {
        Ok(fetched) => fetched,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let chunks = segment(&fetched.text, max_chars);
    println!("{} chunk(s)", chunks.len());
    for chunk in &chunks {
        println!("  chunk {}: {} chars", chunk.index, chunk.text.chars().count());
    }
    0
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mindgraph=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Generate {
            file,
            text,
            max_chars,
            retries,
            backoff_secs,
            flat,
            endpoint,
            model,
            api_key_env,
            pretty,
        } => {
            let mut config = PipelineConfig::new()
                .with_max_chunk_chars(max_chars)
                .with_retry(retries, Duration::from_secs(backoff_secs));
            if flat {
                config = config.flat();
            }

            let http = HttpClientConfig {
                endpoint,
                model,
                api_key: std::env::var(&api_key_env).ok(),
                ..HttpClientConfig::default()
            };

            cmd_generate(file, text, config, http, pretty).await
        }
        Commands::Segment { file, max_chars } => cmd_segment(file, max_chars).await,
    };

    std::process::exit(exit_code);
}
