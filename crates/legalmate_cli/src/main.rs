use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use legalmate_core::{
    evaluate_cases, load_corpus, top_k, ConversationSession, CorpusIndex, EmbeddingProvider,
    EvalCase, FallbackConfig, GenerativeFallbackClient, HashEmbeddingProvider, LegalAssistant,
    MiniLmEmbeddingProvider, ResponseRouter, Role, DEFAULT_CHAT_MODEL, DEFAULT_ENDPOINT,
    DEFAULT_HASH_DIM, DEFAULT_REQUIRED_PASS_RATE, DEFAULT_THRESHOLD, DEFAULT_TIMEOUT_SECS,
    LEGAL_INFO_DISCLAIMER,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type Embedder = Box<dyn EmbeddingProvider + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "legalmate", version)]
#[command(about = "Answers VCAT and consumer-rights questions from a curated FAQ, falling back to a hosted model")]
struct Cli {
    /// FAQ corpus: a JSON array or JSON Lines file of {question, answer, source} records.
    #[arg(long, global = true, env = "LEGALMATE_CORPUS", default_value = "legal_faqs.json")]
    corpus: PathBuf,

    /// all-MiniLM-L6-v2 safetensors file. Without it a hashing embedder is used.
    #[arg(long, global = true, env = "LEGALMATE_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// tokenizer.json for the model. Required when --model-path is set.
    #[arg(long, global = true, env = "LEGALMATE_TOKENIZER_PATH")]
    tokenizer_path: Option<PathBuf>,

    /// Scores strictly above this are answered from the corpus.
    #[arg(long, global = true, default_value_t = DEFAULT_THRESHOLD, allow_negative_numbers = true)]
    threshold: f32,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, global = true, env = "LEGALMATE_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    #[arg(long, global = true, env = "LEGALMATE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Whole-request timeout for the hosted model, in seconds.
    #[arg(
        long,
        global = true,
        env = "LEGALMATE_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: u64,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat session (default).
    Chat,
    /// Answer a single question and exit.
    Ask {
        #[arg(long)]
        question: String,
        /// Print the reply and its route as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the closest FAQ entries and the routing decision, without calling the model.
    Search {
        #[arg(long)]
        question: String,
        #[arg(
            long,
            default_value_t = 3,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        top_k: usize,
    },
    /// Check routing against labelled cases.
    Eval {
        #[arg(long)]
        cases: PathBuf,
        #[arg(long, default_value_t = DEFAULT_REQUIRED_PASS_RATE)]
        min_pass_rate: f32,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn make_embedder(cli: &Cli) -> Result<Embedder> {
    match (&cli.model_path, &cli.tokenizer_path) {
        (Some(model), Some(tokenizer)) => {
            tracing::info!(model = %model.display(), "loading sentence encoder");
            Ok(Box::new(MiniLmEmbeddingProvider::load(model, tokenizer)?))
        }
        (None, None) => Ok(Box::new(HashEmbeddingProvider::new(DEFAULT_HASH_DIM))),
        _ => anyhow::bail!("--model-path and --tokenizer-path must both be provided"),
    }
}

fn build_index(cli: &Cli, embedder: &Embedder) -> Result<Arc<CorpusIndex>> {
    let entries = load_corpus(&cli.corpus)?;
    let index = CorpusIndex::build(entries, embedder).context("build corpus index")?;
    if index.is_empty() {
        tracing::warn!(corpus = %cli.corpus.display(), "corpus is empty, every query will use the generative fallback");
    }
    Ok(Arc::new(index))
}

fn fallback_config(cli: &Cli) -> Result<FallbackConfig> {
    Ok(FallbackConfig::new(cli.api_key.clone())?
        .with_model(cli.chat_model.clone())
        .with_endpoint(cli.endpoint.clone())
        .with_timeout(Duration::from_secs(cli.timeout_secs)))
}

/// Everything a query needs, wired once at startup. Any failure here is fatal.
fn make_assistant(cli: &Cli) -> Result<LegalAssistant<Embedder>> {
    let config = fallback_config(cli)?;
    let router = ResponseRouter::with_threshold(cli.threshold)?;
    let embedder = make_embedder(cli)?;
    let index = build_index(cli, &embedder)?;
    let fallback = GenerativeFallbackClient::openai(&config).context("create model client")?;
    Ok(LegalAssistant::new(index, embedder, router, fallback))
}

fn read_eval_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(file).context("parse eval cases json")
}

fn run_chat(assistant: &LegalAssistant<Embedder>) -> Result<()> {
    let mut editor = DefaultEditor::new().context("initialise line editor")?;
    let mut session = ConversationSession::new();

    println!("LegalMate: ask about VCAT and consumer rights in Victoria. Type 'exit' to quit.");
    println!("{LEGAL_INFO_DISCLAIMER}");

    loop {
        match editor.readline("you> ") {
            Ok(line) => {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                if matches!(query, "exit" | "quit") {
                    break;
                }
                let _ = editor.add_history_entry(query);
                let reply = assistant.ask(&mut session, query);
                println!("legalmate> {}\n", reply.content);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("read input"),
        }
    }

    let questions = session
        .all_turns()
        .iter()
        .filter(|t| t.role == Role::User)
        .count();
    tracing::debug!(questions, "chat session ended");
    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Chat => {
            let assistant = make_assistant(&cli)?;
            run_chat(&assistant)?;
        }
        Commands::Ask { question, json } => {
            let assistant = make_assistant(&cli)?;
            let mut session = ConversationSession::new();
            let reply = assistant.ask(&mut session, question);
            if *json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                println!("{}", reply.content);
            }
        }
        Commands::Search { question, top_k: k } => {
            let router = ResponseRouter::with_threshold(cli.threshold)?;
            let embedder = make_embedder(&cli)?;
            let index = build_index(&cli, &embedder)?;
            let query = embedder.embed(question)?;
            let ranked = top_k(&query, &index, *k);

            match ranked.first() {
                Some(best) => println!(
                    "decision={:?} score={:.4} threshold={:.2}",
                    router.decide(best.score),
                    best.score,
                    router.threshold()
                ),
                None => println!("decision=no_match entries=0"),
            }
            for m in &ranked {
                if let Some(entry) = index.entry(m.entry_index) {
                    println!(
                        "entry={} score={:.4} question={:?} source={}",
                        m.entry_index, m.score, entry.question, entry.source
                    );
                }
            }
        }
        Commands::Eval {
            cases,
            min_pass_rate,
        } => {
            let run_id = format!("eval-{}", chrono::Utc::now().timestamp_millis());
            let router = ResponseRouter::with_threshold(cli.threshold)?;
            let embedder = make_embedder(&cli)?;
            let index = build_index(&cli, &embedder)?;
            let cases = read_eval_cases(cases)?;
            let summary = evaluate_cases(&embedder, &index, &router, &cases)?;

            for o in &summary.outcomes {
                println!(
                    "case={} passed={} route={:?} entry={} score={} latency={:.1}ms",
                    o.case_id,
                    o.passed,
                    o.actual_route,
                    o.actual_entry
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "null".to_string()),
                    o.score
                        .map(|s| format!("{s:.4}"))
                        .unwrap_or_else(|| "null".to_string()),
                    o.latency_ms
                );
            }
            println!(
                "run_id={} total={} passed={} failed={} pass_rate={:.4} required={:.4} meets_threshold={}",
                run_id,
                summary.total,
                summary.passed,
                summary.failed,
                summary.pass_rate,
                min_pass_rate,
                summary.meets(*min_pass_rate)
            );

            if !summary.meets(*min_pass_rate) {
                anyhow::bail!(
                    "pass rate {:.4} below required {:.4}",
                    summary.pass_rate,
                    min_pass_rate
                );
            }
        }
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
