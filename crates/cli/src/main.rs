use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use docqa_core::{FileExtractor, TextExtractor};
use docqa_rag::{
    AnswerOptions, ChatbotConfig, DocumentChatbot, EmbeddingCache, EmbeddingClient, RetrievedChunk,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG: &str = "docqa.toml";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "docqa", version = VERSION, about = "Ask questions about a local document")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long = "cache-dir", global = true)]
    cache_dir: Option<PathBuf>,
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, chunk and embed a document, filling the cache.
    Ingest {
        input: PathBuf,
        #[arg(long = "doc-id")]
        doc_id: Option<String>,
    },
    Ask {
        input: PathBuf,
        question: String,
        #[command(flatten)]
        answer: AnswerArgs,
        #[arg(long = "show-chunks", action = ArgAction::SetTrue)]
        show_chunks: bool,
    },
    Retrieve {
        input: PathBuf,
        question: String,
        #[arg(long = "top-k")]
        top_k: Option<usize>,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Interactive session; each line on stdin is a question.
    Chat {
        input: Option<PathBuf>,
        #[command(flatten)]
        answer: AnswerArgs,
        #[arg(long = "show-chunks", action = ArgAction::SetTrue)]
        show_chunks: bool,
    },
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    List,
    Clear,
}

#[derive(Args, Debug, Clone, Default)]
struct AnswerArgs {
    #[arg(long = "top-k")]
    top_k: Option<usize>,
    #[arg(long = "max-sentences")]
    max_sentences: Option<usize>,
    #[arg(long = "min-score")]
    min_score: Option<f32>,
}

impl AnswerArgs {
    fn resolve(&self, defaults: &AnswerOptions) -> AnswerOptions {
        AnswerOptions {
            top_k: self.top_k.unwrap_or(defaults.top_k),
            max_sentences: self.max_sentences.unwrap_or(defaults.max_sentences),
            min_score: self.min_score.unwrap_or(defaults.min_score),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = resolve_config(&config_path, cli.cache_dir.clone(), |key| {
        env::var(key).ok()
    })?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    match cli.command {
        Commands::Ingest { input, doc_id } => {
            let mut bot = build_chatbot(&config)?;
            let path = resolve_input(&input, &data_dir);
            let text = extract_text(&path)?;
            let status = bot.ingest(&text, doc_id.as_deref())?;
            println!("{status}");
            if let Some(id) = bot.document_id() {
                println!("document: {id} ({} chunks)", bot.chunks().len());
            }
        }
        Commands::Ask {
            input,
            question,
            answer,
            show_chunks,
        } => {
            let mut bot = build_chatbot(&config)?;
            load_document(&mut bot, &resolve_input(&input, &data_dir))?;
            let options = answer.resolve(&config.retrieval);
            let response = bot.ask(&question, &options)?;
            println!("{}", response.answer);
            if show_chunks {
                print_chunks(&response.chunks);
            }
        }
        Commands::Retrieve {
            input,
            question,
            top_k,
            json,
        } => {
            let mut bot = build_chatbot(&config)?;
            load_document(&mut bot, &resolve_input(&input, &data_dir))?;
            let hits = bot.retrieve(&question, top_k.unwrap_or(config.retrieval.top_k))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_chunks(&hits);
            }
        }
        Commands::Chat {
            input,
            answer,
            show_chunks,
        } => {
            let mut bot = build_chatbot(&config)?;
            if let Some(input) = input {
                load_document(&mut bot, &resolve_input(&input, &data_dir))?;
            }
            let options = answer.resolve(&config.retrieval);
            let session = ChatSession {
                options,
                data_dir: &data_dir,
                show_chunks,
            };
            let stdin = io::stdin();
            run_chat(&mut bot, &session, stdin.lock(), io::stdout())?;
        }
        Commands::Cache { action } => {
            let cache = EmbeddingCache::new(&config.cache.dir);
            match action {
                CacheAction::List => {
                    let entries = cache.entries()?;
                    if entries.is_empty() {
                        println!("cache {} is empty", cache.dir().display());
                    }
                    for entry in entries {
                        println!("{}\t{} bytes\t{}", entry.doc_id, entry.bytes, entry.path.display());
                    }
                }
                CacheAction::Clear => {
                    let removed = cache.clear()?;
                    println!("removed {removed} cached documents from {}", cache.dir().display());
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// File values first, then environment, then flags.
fn resolve_config<F>(path: &Path, cache_dir: Option<PathBuf>, lookup: F) -> Result<ChatbotConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ChatbotConfig::load(path)?;
    config.apply_env_from(lookup)?;
    if let Some(dir) = cache_dir {
        config.cache.dir = dir;
    }
    Ok(config)
}

fn build_chatbot(config: &ChatbotConfig) -> Result<DocumentChatbot> {
    let embedder = EmbeddingClient::from_config(&config.embedding)
        .context("failed to set up the embedding backend")?;
    Ok(DocumentChatbot::from_config(config, Arc::new(embedder)))
}

/// Paths that do not exist as given are looked up in the data directory.
fn resolve_input(input: &Path, data_dir: &Path) -> PathBuf {
    if input.exists() || input.is_absolute() {
        return input.to_path_buf();
    }
    let candidate = data_dir.join(input);
    if candidate.exists() {
        candidate
    } else {
        input.to_path_buf()
    }
}

fn extract_text(path: &Path) -> Result<String> {
    FileExtractor::new()
        .extract(path)
        .with_context(|| format!("failed to read {}", path.display()))
}

fn load_document(bot: &mut DocumentChatbot, path: &Path) -> Result<()> {
    let text = extract_text(path)?;
    let status = bot.ingest(&text, None)?;
    tracing::info!(path = %path.display(), %status, "document ready");
    Ok(())
}

fn list_documents(data_dir: &Path) -> Vec<PathBuf> {
    if !data_dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| FileExtractor::supports(path))
        .collect();
    files.sort();
    files
}

fn print_chunks(chunks: &[RetrievedChunk]) {
    // stdout closed early is not worth failing the command for
    let _ = write_chunks(&mut io::stdout(), chunks);
}

fn write_chunks<W: Write>(out: &mut W, chunks: &[RetrievedChunk]) -> io::Result<()> {
    for (rank, chunk) in chunks.iter().enumerate() {
        writeln!(
            out,
            "[{}] score={:.3} chunk={}\n{}\n",
            rank + 1,
            chunk.score,
            chunk.index,
            chunk.text
        )?;
    }
    Ok(())
}

const CHAT_HELP: &str = "\
commands:
  :load <FILE>  ingest a document (relative names resolve in the data dir)
  :files        list supported documents in the data dir
  :chunks       show the active document and its chunk count
  :reset        forget the active document
  :help         show this help
  :quit         leave the session
anything else is asked as a question";

struct ChatSession<'a> {
    options: AnswerOptions,
    data_dir: &'a Path,
    show_chunks: bool,
}

fn run_chat<R, W>(
    bot: &mut DocumentChatbot,
    session: &ChatSession<'_>,
    input: R,
    mut out: W,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(out, "type :help for commands")?;
    write!(out, "> ")?;
    out.flush()?;
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            write!(out, "> ")?;
            out.flush()?;
            continue;
        }
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        match command {
            ":quit" | ":q" | ":exit" => break,
            ":help" => writeln!(out, "{CHAT_HELP}")?,
            ":reset" => {
                bot.reset();
                writeln!(out, "session reset")?;
            }
            ":chunks" => match bot.document_id() {
                Some(id) => writeln!(out, "{id}: {} chunks", bot.chunks().len())?,
                None => writeln!(out, "no document loaded")?,
            },
            ":files" => {
                let files = list_documents(session.data_dir);
                if files.is_empty() {
                    writeln!(out, "no supported documents in {}", session.data_dir.display())?;
                }
                for file in files {
                    writeln!(out, "{}", file.display())?;
                }
            }
            ":load" if arg.is_empty() => writeln!(out, "usage: :load <FILE>")?,
            ":load" => {
                let path = resolve_input(Path::new(arg), session.data_dir);
                match extract_text(&path).and_then(|text| bot.ingest(&text, None)) {
                    Ok(status) => writeln!(out, "{status}")?,
                    Err(err) => writeln!(out, "error: {err:#}")?,
                }
            }
            _ if command.starts_with(':') => {
                writeln!(out, "unknown command {command}; type :help")?
            }
            _ => match bot.ask(line, &session.options) {
                Ok(response) => {
                    writeln!(out, "{}", response.answer)?;
                    if session.show_chunks {
                        write_chunks(&mut out, &response.chunks)?;
                    }
                }
                Err(err) => writeln!(out, "error: {err:#}")?,
            },
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    Ok(())
}
