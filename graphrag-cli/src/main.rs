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

//! GraphRAG CLI
//!
//! `graphrag index` builds the knowledge graph and community summaries;
//! `graphrag query` answers a global question from those summaries.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphrag_core::{artifacts, build_client, GraphRagConfig, IndexingPipeline, QueryPipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "graphrag")]
#[command(about = "GraphRAG - knowledge graph indexing and global query", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "GRAPHRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the knowledge graph and community summaries
    Index {
        /// Text units as a JSON array or JSON Lines of {id, text}
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving the graph and summaries
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Model used for every LLM call
        #[arg(long)]
        model: Option<String>,

        /// LLM provider (ollama, openai, anthropic)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Answer a global query from community summaries
    Query {
        /// The question to ask the corpus
        #[arg(short, long)]
        query: String,

        /// Community summaries written by `index`
        #[arg(long)]
        summaries: Option<PathBuf>,

        /// Model used for every LLM call
        #[arg(long)]
        model: Option<String>,

        /// LLM provider (ollama, openai, anthropic)
        #[arg(long)]
        provider: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "graphrag=info,graphrag_core=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn apply_llm_overrides(
    config: &mut GraphRagConfig,
    model: Option<String>,
    provider: Option<String>,
) {
    if let Some(model) = model {
        config.llm.model = Some(model);
    }
    if let Some(provider) = provider {
        config.llm.provider = provider;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config =
        GraphRagConfig::load(cli.config.clone()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Index {
            input,
            output_dir,
            model,
            provider,
        } => {
            apply_llm_overrides(&mut config, model, provider);
            if let Some(dir) = output_dir {
                config.storage.output_dir = dir;
            }
            config.validate()?;

            info!("Starting GraphRAG indexing pipeline");
            let units = artifacts::load_text_units(&input)
                .with_context(|| format!("Failed to load text units from {}", input.display()))?;

            let llm = build_client(&config.llm)?;
            let storage = config.storage.clone();
            let pipeline = IndexingPipeline::new(config, llm);

            let output = pipeline.run(&units).await?;
            let paths = IndexingPipeline::persist(&output, &storage)?;

            info!(
                graph = %paths.graph_path.display(),
                summaries = %paths.summaries_path.display(),
                communities = output.stats.communities,
                failed_extractions = output.stats.failed_extractions,
                failed_summaries = output.stats.failed_summaries,
                "GraphRAG indexing pipeline completed"
            );
        }

        Commands::Query {
            query,
            summaries,
            model,
            provider,
        } => {
            apply_llm_overrides(&mut config, model, provider);
            config.validate()?;

            let summaries_path = summaries.unwrap_or_else(|| config.storage.summaries_path());
            info!(query = %query, "Starting GraphRAG query pipeline");

            let llm = build_client(&config.llm)?;
            let pipeline = QueryPipeline::new(&config, llm);
            let answer = pipeline.answer(&query, &summaries_path).await.with_context(|| {
                format!(
                    "Query failed; run `graphrag index` first if {} does not exist",
                    summaries_path.display()
                )
            })?;

            let rule = "=".repeat(80);
            println!("\n{}", rule);
            println!("Query: {}", answer.query);
            println!("\nFinal Global Answer:\n");
            println!("{}", answer.final_answer);
            println!("{}", rule);

            info!(
                partials_used = answer.partials_used,
                communities = answer.communities_consulted,
                "GraphRAG query pipeline completed"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_command() {
        let cli = Cli::try_parse_from([
            "graphrag",
            "query",
            "--query",
            "What are the main themes?",
            "--provider",
            "openai",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                query, provider, summaries, ..
            } => {
                assert_eq!(query, "What are the main themes?");
                assert_eq!(provider.as_deref(), Some("openai"));
                assert!(summaries.is_none());
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_llm_overrides() {
        let mut config = GraphRagConfig::default();
        apply_llm_overrides(&mut config, Some("llama3".to_string()), None);
        assert_eq!(config.llm.model.as_deref(), Some("llama3"));
        assert_eq!(config.llm.provider, "ollama");
    }
}
