use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use crv_ai::client::ApiClient;
use crv_ai::embeddings::openai_embed::OpenAiEmbedder;
use crv_ai::llm::openai_llm::OpenAiCompleter;
use crv_ai::retrieve::scorer::{EmbeddingScorer, RelevanceScorer, TermOverlapScorer};
use crv_ai::revise::{CachedInputs, Reviser, Services};
use crv_ai::scrape::HttpFetcher;
use crv_ai::search::bing::{BingSearch, DEFAULT_BING_ENDPOINT};
use crv_ai::search::SearchEngine;
use crv_core::config::{EvidenceSourceKind, PipelineConfig};
use crv_core::domain::{RevisionResult, RevisionStats};
use crv_core::error::AppError;
use crv_core::records::{load_finished_results, read_records, write_run_args, RecordWriter};
use serde::Serialize;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Parser)]
#[command(author, version, about = "Revise claims against retrieved web evidence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Revise every claim of a JSONL file
    Run(RunArgs),
    /// Check that the completion API is reachable
    Check {
        /// OpenAI-compatible API base URL
        #[arg(long, default_value = DEFAULT_API_BASE)]
        api_base: String,
    },
}

#[derive(Clone, Copy, Debug, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
enum ScorerKind {
    TermOverlap,
    Embedding,
}

#[derive(Args, Debug, Serialize)]
struct RunArgs {
    /// JSONL file of `{input_info: {...}}` records
    #[arg(long)]
    input_file: PathBuf,
    /// JSONL file to write revisions to
    #[arg(long)]
    output_file: PathBuf,
    /// Field of `input_info` holding the claim
    #[arg(long, default_value = "model_outputs_explanation")]
    claim_field: String,
    /// Field of `input_info` holding optional preceding context
    #[arg(long)]
    context_field: Option<String>,
    /// JSON pipeline config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Resume from records already present in the output file
    #[arg(long)]
    resume: bool,
    /// Earlier output whose questions, evidence and gate decisions are replayed
    #[arg(long)]
    reuse_from: Option<PathBuf>,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,
    /// Web search endpoint
    #[arg(long, default_value = DEFAULT_BING_ENDPOINT)]
    search_endpoint: String,
    /// Relevance scorer for passages and evidence selection
    #[arg(long, value_enum, default_value_t = ScorerKind::TermOverlap)]
    scorer: ScorerKind,
    /// Embedding model for `--scorer embedding`
    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,
    /// Per-request timeout for completion calls, in seconds
    #[arg(long, default_value_t = 60)]
    completion_timeout_secs: u64,

    #[command(flatten)]
    #[serde(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Args, Debug, Default, Serialize)]
struct ConfigOverrides {
    /// Completion model
    #[arg(long)]
    model: Option<String>,
    /// Sampling temperature for question generation
    #[arg(long)]
    temperature_qgen: Option<f32>,
    /// Question generation rounds
    #[arg(long)]
    num_rounds_qgen: Option<u32>,
    /// Search results kept per query
    #[arg(long)]
    max_search_results_per_query: Option<usize>,
    /// Passages returned per search result
    #[arg(long)]
    max_passages_per_search_result: Option<usize>,
    /// Sentences per passage
    #[arg(long)]
    max_sentences_per_passage: Option<usize>,
    /// Sliding window step, in sentences
    #[arg(long)]
    sliding_distance: Option<usize>,
    /// Evidences consumed per question
    #[arg(long)]
    max_evidences_per_question: Option<usize>,
    /// Largest accepted edit distance relative to the claim length
    #[arg(long)]
    max_edit_ratio: Option<f64>,
    /// Attribution set size cap
    #[arg(long)]
    max_selected_evidences: Option<usize>,
    /// Prefer smaller attribution sets on ties (`--prefer-fewer false` turns it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    prefer_fewer: Option<bool>,
    /// Where evidence comes from
    #[arg(long, value_enum)]
    evidence_source: Option<EvidenceSourceArg>,
    /// Seed for randomized passage lengths
    #[arg(long)]
    seed: Option<u64>,
    /// Randomize sentences per passage within [1, max]
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    randomize_num_sentences: Option<bool>,
}

#[derive(Clone, Copy, Debug, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
enum EvidenceSourceArg {
    Search,
    Hallucinated,
}

impl ConfigOverrides {
    fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(v) = &self.model {
            cfg.model = v.clone();
        }
        if let Some(v) = self.temperature_qgen {
            cfg.temperature_qgen = v;
        }
        if let Some(v) = self.num_rounds_qgen {
            cfg.num_rounds_qgen = v;
        }
        if let Some(v) = self.max_search_results_per_query {
            cfg.max_search_results_per_query = v;
        }
        if let Some(v) = self.max_passages_per_search_result {
            cfg.max_passages_per_search_result = v;
        }
        if let Some(v) = self.max_sentences_per_passage {
            cfg.max_sentences_per_passage = v;
        }
        if let Some(v) = self.sliding_distance {
            cfg.sliding_distance = v;
        }
        if let Some(v) = self.max_evidences_per_question {
            cfg.max_evidences_per_question = v;
        }
        if let Some(v) = self.max_edit_ratio {
            cfg.max_edit_ratio = v;
        }
        if let Some(v) = self.max_selected_evidences {
            cfg.max_selected_evidences = v;
        }
        if let Some(v) = self.prefer_fewer {
            cfg.prefer_fewer = v;
        }
        if let Some(v) = self.evidence_source {
            cfg.evidence_source = match v {
                EvidenceSourceArg::Search => EvidenceSourceKind::Search,
                EvidenceSourceArg::Hallucinated => EvidenceSourceKind::Hallucinated,
            };
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(v) = self.randomize_num_sentences {
            cfg.randomize_num_sentences = v;
        }
    }
}

/// What lands in `<output>_args`: the invocation plus the resolved config.
#[derive(Serialize)]
struct PersistedArgs<'a> {
    #[serde(flatten)]
    args: &'a RunArgs,
    pipeline: &'a PipelineConfig,
}

/// Search placeholder for hallucinated-evidence runs without a search key.
struct SearchDisabled;

impl SearchEngine for SearchDisabled {
    fn search(&self, _query: &str) -> Result<Vec<String>, AppError> {
        Err(AppError::new(
            "SEARCH_CONFIG_MISSING",
            "AZURE_SEARCH_KEY is not set",
        ))
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_config(args: &RunArgs) -> Result<PipelineConfig, AppError> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    args.overrides.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

fn build_services(args: &RunArgs, cfg: &PipelineConfig) -> Result<Services, AppError> {
    let client = ApiClient::new(&args.api_base, env_key("OPENAI_API_KEY"))?;

    let search: Box<dyn SearchEngine> = match env_key("AZURE_SEARCH_KEY") {
        Some(key) => Box::new(BingSearch::with_endpoint(&args.search_endpoint, key)?),
        None if cfg.evidence_source == EvidenceSourceKind::Search => {
            return Err(AppError::new(
                "SEARCH_CONFIG_MISSING",
                "AZURE_SEARCH_KEY must be set to retrieve web evidence",
            ))
        }
        None => Box::new(SearchDisabled),
    };

    let scorer: Box<dyn RelevanceScorer> = match args.scorer {
        ScorerKind::TermOverlap => Box::new(TermOverlapScorer),
        ScorerKind::Embedding => Box::new(EmbeddingScorer::new(
            OpenAiEmbedder::new(client.clone()),
            args.embedding_model.clone(),
        )),
    };

    Ok(Services {
        completer: Box::new(
            OpenAiCompleter::new(client)
                .with_timeout(Duration::from_secs(args.completion_timeout_secs)),
        ),
        search,
        fetcher: Box::new(HttpFetcher::new()),
        scorer,
    })
}

fn load_reusable(path: Option<&Path>, claim_field: &str) -> Result<BTreeMap<String, RevisionResult>, AppError> {
    match path {
        Some(p) => load_finished_results(p, claim_field),
        None => Ok(BTreeMap::new()),
    }
}

/// Returns the number of claims that could not be revised.
fn run(args: &RunArgs) -> Result<usize, AppError> {
    let cfg = resolve_config(args)?;
    let args_path = write_run_args(
        &args.output_file,
        &PersistedArgs {
            args,
            pipeline: &cfg,
        },
    )?;
    log::info!("run arguments written to {}", args_path.display());

    // Read before the output file is truncated below.
    let finished = if args.resume {
        log::info!("resuming from {}", args.output_file.display());
        load_finished_results(&args.output_file, &args.claim_field)?
    } else {
        BTreeMap::new()
    };
    let reusable = load_reusable(args.reuse_from.as_deref(), &args.claim_field)?;
    let records = read_records(&args.input_file)?;

    let reviser = Reviser::new(build_services(args, &cfg)?, cfg)?;
    let mut writer = RecordWriter::create(&args.output_file)?;
    let mut failed = 0usize;
    let mut totals = RevisionStats::default();

    for (idx, mut rec) in records.into_iter().enumerate() {
        let claim = rec.claim(&args.claim_field)?.to_string();
        if let Some(done) = finished.get(&claim) {
            rec.result = Some(done.clone());
            writer.write(&rec)?;
            continue;
        }

        let context = args
            .context_field
            .as_deref()
            .and_then(|f| rec.input_info.get(f))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let cached = reusable
            .get(&claim)
            .map(CachedInputs::from_result)
            .unwrap_or_default();

        match reviser.run(&claim, context.as_deref(), &cached) {
            Ok(outcome) => {
                let stats = &outcome.stats;
                log::info!(
                    "record {}: gates_opened={} edits_applied={} fallbacks={}",
                    idx + 1,
                    stats.gates_opened,
                    stats.edits_applied,
                    stats.fallbacks()
                );
                if stats.fallbacks() > 0 {
                    log::warn!("record {}: responses ignored: {:?}", idx + 1, stats);
                }
                totals.merge(stats);
                rec.result = Some(outcome.result);
            }
            Err(e) => {
                log::error!("record {}: claim not revised: {e}", idx + 1);
                failed += 1;
            }
        }
        writer.write(&rec)?;
    }

    log::info!("run totals: failed_claims={failed} {totals:?}");
    Ok(failed)
}

fn check(api_base: &str) -> Result<(), AppError> {
    let client = ApiClient::new(api_base, env_key("OPENAI_API_KEY"))?;
    client.health_check()?;
    println!("completion API reachable at {}", client.base_url());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Run(args) => run(args).map(|failed| {
            if failed > 0 {
                log::warn!("{failed} claims could not be revised");
            }
            failed == 0
        }),
        Commands::Check { api_base } => check(api_base).map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::try_parse_from([
            "claimrevise",
            "run",
            "--input-file",
            "in.jsonl",
            "--output-file",
            "out.jsonl",
            "--max-edit-ratio",
            "0.5",
            "--prefer-fewer",
            "--evidence-source",
            "hallucinated",
        ])
        .expect("parse");
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.claim_field, "model_outputs_explanation");
        assert!(!args.resume);

        let cfg = resolve_config(&args).expect("config");
        assert_eq!(cfg.max_edit_ratio, 0.5);
        assert!(cfg.prefer_fewer);
        assert_eq!(cfg.evidence_source, EvidenceSourceKind::Hallucinated);
        assert_eq!(cfg.model, "text-davinci-003");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::try_parse_from([
            "claimrevise",
            "run",
            "--input-file",
            "in.jsonl",
            "--output-file",
            "out.jsonl",
            "--max-selected-evidences",
            "9",
        ])
        .expect("parse");
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let err = resolve_config(&args).expect_err("invalid");
        assert_eq!(err.code, "CONFIG_INVALID");
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec![
            "claimrevise",
            "run",
            "--input-file",
            "in.jsonl",
            "--output-file",
            "out.jsonl",
        ];
        argv.extend_from_slice(extra);
        let cli = Cli::try_parse_from(argv).expect("parse");
        match cli.command {
            Commands::Run(args) => args,
            Commands::Check { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn boolean_flags_can_switch_config_settings_off() {
        let mut cfg = PipelineConfig {
            prefer_fewer: true,
            randomize_num_sentences: true,
            ..PipelineConfig::default()
        };
        run_args(&["--prefer-fewer", "false", "--randomize-num-sentences", "false"])
            .overrides
            .apply(&mut cfg);
        assert!(!cfg.prefer_fewer);
        assert!(!cfg.randomize_num_sentences);

        let mut untouched = PipelineConfig {
            prefer_fewer: true,
            ..PipelineConfig::default()
        };
        run_args(&[]).overrides.apply(&mut untouched);
        assert!(untouched.prefer_fewer);
    }

    #[test]
    fn persisted_args_carry_invocation_and_resolved_config() {
        let args = run_args(&["--scorer", "embedding", "--max-edit-ratio", "0.25"]);
        let cfg = resolve_config(&args).expect("config");
        let value = serde_json::to_value(PersistedArgs {
            args: &args,
            pipeline: &cfg,
        })
        .expect("serialize");

        assert_eq!(value["input_file"], "in.jsonl");
        assert_eq!(value["claim_field"], "model_outputs_explanation");
        assert_eq!(value["scorer"], "embedding");
        assert_eq!(value["completion_timeout_secs"], 60);
        assert_eq!(value["max_edit_ratio"], 0.25);
        assert_eq!(value["prefer_fewer"], serde_json::Value::Null);
        assert_eq!(value["pipeline"]["max_edit_ratio"], 0.25);
        assert_eq!(value["pipeline"]["model"], "text-davinci-003");
    }
}
