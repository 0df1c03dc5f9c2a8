use std::{path::Path, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod products;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use products::{MySqlProductSource, StaticProductSource};
use semantic::{Embedder, EmbeddingModel, SearchService, UnavailableEmbedder};

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = Config::from_env().context("invalid configuration")?;
    log::debug!("config: {}", serde_json::to_string(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let command = args.command.unwrap_or(cli::Command::Serve {
        bind: None,
        catalog: None,
    });

    match command {
        cli::Command::Serve { bind, catalog } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }

            // loaded before entering the runtime, the model downloader blocks
            let service = Arc::new(SearchService::with_candidate_pool(
                load_embedder(&config),
                config.candidate_pool,
            ));

            runtime.block_on(async {
                // no traffic is accepted until the build has finished or failed
                match build(&service, &config, catalog.as_deref()).await {
                    Ok(count) => log::info!("serving {count} products"),
                    Err(err) => {
                        log::error!("index build failed, searches will return no results: {err:#}")
                    }
                }

                web::serve(service, config.bind).await
            })
        }

        cli::Command::Search {
            query,
            top_k,
            catalog,
        } => {
            let model = EmbeddingModel::new(
                &config.model_name,
                config.model_cache_dir.clone(),
                config.embed_batch_size,
            )?;
            let service =
                SearchService::with_candidate_pool(Arc::new(model), config.candidate_pool);

            runtime.block_on(build(&service, &config, catalog.as_deref()))?;

            let results = service.search(&query, top_k as usize)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

/// Load the configured model. A model that fails to load is replaced by an
/// embedder that always errors, so the server still starts (not ready).
fn load_embedder(config: &Config) -> Arc<dyn Embedder> {
    log::info!("Loading embedding model '{}'", config.model_name);

    match EmbeddingModel::new(
        &config.model_name,
        config.model_cache_dir.clone(),
        config.embed_batch_size,
    ) {
        Ok(model) => {
            log::info!("Model loaded: {} ({} dimensions)", config.model_name, model.dimensions());
            Arc::new(model)
        }
        Err(err) => {
            log::error!("failed to load embedding model: {err}");
            Arc::new(UnavailableEmbedder::new(&config.model_name, err.to_string()))
        }
    }
}

async fn build(
    service: &SearchService,
    config: &Config,
    catalog: Option<&Path>,
) -> anyhow::Result<usize> {
    let count = match catalog {
        Some(path) => {
            let source = StaticProductSource::from_json_file(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?;
            service.build_index(&source).await?
        }
        None => {
            let source = MySqlProductSource::connect(config).await?;
            service.build_index(&source).await?
        }
    };

    Ok(count)
}
