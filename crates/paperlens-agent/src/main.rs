//! Paperlens — Biomarker knowledge base from research papers.
//! Entry point for the `paperlens` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use paperlens_agent::config::{Config, Overrides};
use paperlens_agent::discover::run_discovery;
use paperlens_agent::notify::{build_notifier, high_confidence_digest, new_papers_digest};
use paperlens_agent::pipeline::{aggregate_from_file, list_pdfs, Pipeline};
use paperlens_agent::build_storage;
use paperlens_ingestion::sources::pubmed::PubMedClient;
use paperlens_llm::cost::DEFAULT_AVG_CHARS_PER_PAPER;
use paperlens_llm::{build_backend, estimate_cost, PaperSummariser, Provider};
use paperlens_storage::OutputNames;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "paperlens", version, about = "Summarise research papers and aggregate biomarker evidence across them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise every PDF in the papers directory and build the knowledge base
    Process {
        #[command(flatten)]
        common: CommonArgs,

        /// Skip the cost confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Send a high-confidence digest when done
        #[arg(long)]
        notify: bool,
    },

    /// Rebuild the knowledge base from an existing summaries file
    Aggregate {
        /// paper_summaries_*.json, or a list of {paper_id, biomarker_mentions}
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Search PubMed for papers not seen before
    Discover {
        #[arg(short, long)]
        query: Option<String>,

        #[arg(long, value_name = "N")]
        max_results: Option<usize>,

        #[arg(long, value_name = "DAYS")]
        days_back: Option<i64>,

        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Send the list of new papers when any are found
        #[arg(long)]
        notify: bool,
    },

    /// Print the effective configuration and any validation errors
    Config {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(clap::Args, Debug, Default)]
struct CommonArgs {
    #[arg(long, value_name = "DIR")]
    papers_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// anthropic, openai or openai_compatible
    #[arg(short, long)]
    provider: Option<Provider>,
}

impl From<&CommonArgs> for Overrides {
    fn from(args: &CommonArgs) -> Self {
        Overrides {
            papers_dir: args.papers_dir.clone(),
            output_dir: args.output_dir.clone(),
            workers: args.workers,
            provider: args.provider,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = Config::load()?;

    let default_filter = format!("paperlens={},info", config.logging.level.to_lowercase());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Process { common, yes, notify } => {
            config.apply(&Overrides::from(&common));
            process(&config, yes, notify).await
        }
        Command::Aggregate { input, common } => {
            config.apply(&Overrides::from(&common));
            let storage = build_storage(&config)?;
            let names = OutputNames::new(config.llm.provider.as_str());
            let report = aggregate_from_file(&input, storage.as_ref(), &names, config.processing.top_n).await?;
            println!("{report}");
            Ok(())
        }
        Command::Discover { query, max_results, days_back, output_dir, notify } => {
            config.apply(&Overrides { output_dir, ..Default::default() });
            discover(
                &config,
                query.unwrap_or_else(|| config.pubmed.query.clone()),
                max_results.unwrap_or(config.pubmed.max_results),
                days_back.unwrap_or(config.pubmed.days_back),
                notify,
            )
            .await
        }
        Command::Config { common } => {
            config.apply(&Overrides::from(&common));
            print_config(&config);
            Ok(())
        }
    }
}

async fn process(config: &Config, yes: bool, notify: bool) -> anyhow::Result<()> {
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ✗ {e}");
        }
        anyhow::bail!("Configuration is invalid ({} problem(s))", errors.len());
    }

    let pdfs = list_pdfs(&config.processing.papers_dir)?;
    if pdfs.is_empty() {
        warn!(dir = %config.processing.papers_dir.display(), "No PDF files found");
        return Ok(());
    }

    let provider = config.llm.provider;
    let estimate = estimate_cost(pdfs.len(), DEFAULT_AVG_CHARS_PER_PAPER, config.costs.pricing(provider));
    println!("Found {} PDF(s) in {}", pdfs.len(), config.processing.papers_dir.display());
    println!("Provider: {provider} ({})", config.llm.model());
    println!("Estimated cost: {estimate}");

    if !yes {
        let proceed = dialoguer::Confirm::new()
            .with_prompt("Proceed?")
            .default(true)
            .interact()
            .context("Confirmation prompt failed (use --yes for non-interactive runs)")?;
        if !proceed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let backend = build_backend(
        provider,
        config.llm.api_key(),
        Some(config.llm.model().to_string()),
        config.llm.base_url.clone(),
    )?;
    info!("LLM backend ready: {} / {}", backend.provider(), backend.model_id());

    let summariser = Arc::new(PaperSummariser::new(backend, config.llm.summariser_config()));
    let storage = build_storage(config)?;
    let pipeline = Pipeline::new(
        summariser,
        storage,
        config.llm.max_chars(),
        config.processing.workers,
        config.processing.top_n,
    );

    let bar = ProgressBar::new(pdfs.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("progress template")?
            .progress_chars("#>-"),
    );

    let (report, kb) = pipeline.run(&pdfs, Some(bar)).await?;
    println!("\n{report}");

    if notify || config.notify.enabled {
        let notifier = build_notifier(config.notify.webhook_url());
        let (subject, body) = high_confidence_digest(&kb);
        if let Err(e) = notifier.send(&subject, &body).await {
            warn!(notifier = notifier.name(), error = %e, "Notification failed");
        }
    }
    Ok(())
}

async fn discover(config: &Config, query: String, max_results: usize, days_back: i64, notify: bool) -> anyhow::Result<()> {
    let client = PubMedClient::new(config.pubmed.email.clone(), config.pubmed.api_key());
    let storage = build_storage(config)?;
    let tracking_file = config.tracking_file();

    let outcome = run_discovery(&client, &tracking_file, storage.as_ref(), &query, max_results, days_back).await?;

    if outcome.papers.is_empty() {
        println!("No new papers for \"{query}\" in the last {days_back} day(s).");
        return Ok(());
    }

    println!("Found {} new paper(s):", outcome.papers.len());
    for paper in &outcome.papers {
        println!("  {} {} ({})", paper.pmid, paper.title, paper.year.as_deref().unwrap_or("n.d."));
    }
    if let Some(output) = &outcome.output {
        println!("Saved to {output}");
    }
    println!("Tracking {} paper(s) in {}", outcome.tracked_total, tracking_file.display());

    if notify || config.notify.enabled {
        let notifier = build_notifier(config.notify.webhook_url());
        let (subject, body) = new_papers_digest(&outcome.papers, &query);
        if let Err(e) = notifier.send(&subject, &body).await {
            warn!(notifier = notifier.name(), error = %e, "Notification failed");
        }
    }
    Ok(())
}

fn print_config(config: &Config) {
    println!("Paperlens configuration");
    for (key, value) in config.summary() {
        println!("  {key:<14} {value}");
    }
    let errors = config.validate();
    if errors.is_empty() {
        println!("\n✓ Configuration is valid");
    } else {
        println!("\nConfiguration errors:");
        for e in errors {
            println!("  ✗ {e}");
        }
    }
}
