// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Annalist CLI
//!
//! Extract relation triples, load them into the graph store and ask
//! questions against it.

use annalist_core::{AnnalistConfig, GraphStats};
use annalist_index::EntityRelationIndex;
use annalist_ingest::{export_csv, ExtractionReport, Importer, TripleExtractor};
use annalist_query::{AppContext, Orchestrator, QuestionContext};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "annalist")]
#[command(about = "Annalist - historical knowledge graph and context retrieval", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true, env = "ANNALIST_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract triples from the annotated files and write them as CSV
    Extract {
        /// Directory holding the annotated files (overrides config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// CSV output path (overrides config file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract triples and load them into the graph store
    Import {
        /// Directory holding the annotated files (overrides config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Keep the existing graph instead of clearing it first
        #[arg(long)]
        no_clear: bool,
    },

    /// Show node and edge counts
    Stats,

    /// Show the passages known for one or more entity names
    Context {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Answer a question from the graph
    Ask { question: String },

    /// Rebuild the entity-relation index from the graph store
    Reindex,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "annalist=debug"
    } else {
        "annalist=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn extract(config: &AnnalistConfig, data_dir: &Path) -> ExtractionReport {
    let report = TripleExtractor::new().extract_dir(data_dir, &config.import.files);
    info!(
        files_read = report.files_read,
        files_missing = report.files_missing,
        files_failed = report.files_failed,
        triples = report.triples.len(),
        duplicates = report.duplicates_dropped,
        "Extraction finished"
    );
    report
}

fn print_stats(stats: &GraphStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("Nodes: {}", stats.node_count);
    for (label, count) in &stats.nodes_by_label {
        println!("  {label}: {count}");
    }
    println!("Edges: {}", stats.edge_count);
    for (relation, count) in &stats.edges_by_relation {
        println!("  {relation}: {count}");
    }
    Ok(())
}

fn print_context(context: &QuestionContext, json: bool) -> Result<()> {
    if json {
        let value = match context {
            QuestionContext::NoNames => serde_json::json!({ "names": [], "passages": [] }),
            QuestionContext::NotFound { names } => {
                serde_json::json!({ "names": names, "passages": [] })
            }
            QuestionContext::Found {
                names,
                passages,
                cache_hit,
            } => serde_json::json!({
                "names": names,
                "passages": passages,
                "cache_hit": cache_hit,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match context {
        QuestionContext::NoNames => println!("No entity names given"),
        QuestionContext::NotFound { names } => {
            println!("No relations found for {}", names.join(", "))
        }
        QuestionContext::Found {
            passages,
            cache_hit,
            ..
        } => {
            for passage in passages {
                println!("{passage}");
            }
            if *cache_hit {
                println!("(from cache)");
            }
        }
    }
    Ok(())
}

async fn open(config: &AnnalistConfig) -> Result<Orchestrator> {
    let ctx = AppContext::from_config(config)
        .await
        .context("Failed to open graph store")?;
    Ok(Orchestrator::open(ctx))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config =
        AnnalistConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Extraction only touches files
    if let Commands::Extract { data_dir, output } = &cli.command {
        let data_dir = data_dir.as_ref().unwrap_or(&config.import.data_dir);
        let output = output.as_ref().unwrap_or(&config.import.csv_output);

        let report = extract(&config, data_dir);
        export_csv(output, &report.triples)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!(
            "✓ Extracted {} triples from {} files into {}",
            report.triples.len(),
            report.files_read,
            output.display()
        );
        return Ok(());
    }

    let orchestrator = open(&config).await?;

    match cli.command {
        Commands::Extract { .. } => unreachable!(), // Handled above

        Commands::Import { data_dir, no_clear } => {
            let data_dir = data_dir.unwrap_or_else(|| config.import.data_dir.clone());
            let report = extract(&config, &data_dir);
            export_csv(&config.import.csv_output, &report.triples).with_context(|| {
                format!("Failed to write {}", config.import.csv_output.display())
            })?;

            let ctx = orchestrator.context();
            let index = ctx
                .index
                .clone()
                .unwrap_or_else(|| Arc::new(EntityRelationIndex::new()));
            let imported = Importer::new(ctx.store.clone())
                .clear_first(config.import.clear_before_import && !no_clear)
                .import(&report.triples, &index)
                .await
                .context("Import failed")?;

            if !cli.json {
                println!(
                    "✓ Imported {} triples ({} edges upserted)",
                    report.triples.len(),
                    imported.edges_upserted
                );
            }
            print_stats(&imported.stats, cli.json)?;
        }

        Commands::Stats => {
            let stats = orchestrator.context().store.stats().await?;
            print_stats(&stats, cli.json)?;
        }

        Commands::Context { names } => {
            let context = orchestrator.context_for_names(names).await?;
            print_context(&context, cli.json)?;
        }

        Commands::Ask { question } => {
            let answer = orchestrator.answer_question(&question).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "question": question, "answer": answer }));
            } else {
                println!("{answer}");
            }
        }

        Commands::Reindex => {
            orchestrator.reindex().await?;
            match &orchestrator.context().index {
                Some(index) => {
                    let snapshot = index.snapshot();
                    println!(
                        "✓ Index rebuilt: {} entities, {} edges (revision {})",
                        snapshot.entity_count(),
                        snapshot.edge_count(),
                        snapshot.revision()
                    );
                }
                None => println!("✓ Name lexicon reloaded (index disabled)"),
            }
        }
    }

    let stats = orchestrator.close().await;
    if cli.verbose && !cli.json {
        println!(
            "Cache: {} hits, {} misses, {} errors",
            stats.hits, stats.misses, stats.errors
        );
    }
    Ok(())
}
