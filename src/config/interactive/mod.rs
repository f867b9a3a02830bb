use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ProviderKind, SearchMode, get_config_dir};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Ragdocs Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let mut config = load_existing_config(&config_dir);

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Choose which model family produces the document embeddings.");
    eprintln!();

    configure_provider(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Search Settings").bold().yellow());
    configure_search(&mut config)?;

    eprintln!();
    let chunk_budget: usize = Input::new()
        .with_prompt("Chunk size budget (characters)")
        .default(config.chunking.max_chunk_chars)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (100..=100_000).contains(input) {
                Ok(())
            } else {
                Err("Chunk budget must be between 100 and 100000")
            }
        })
        .interact_text()?;
    config.chunking.max_chunk_chars = chunk_budget;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    let provider = match config.embedding.provider {
        ProviderKind::Local => "local",
        ProviderKind::Gemini => "gemini",
    };
    eprintln!("  Provider: {}", style(provider).cyan());
    match config.embedding.provider {
        ProviderKind::Local => {
            eprintln!("  Model: {}", style(&config.embedding.local_model).cyan());
        }
        ProviderKind::Gemini => {
            eprintln!("  Model: {}", style(&config.gemini.embedding_model).cyan());
            let key_status = if config.gemini.api_key.trim().is_empty() {
                style("not set").red()
            } else {
                style("set").green()
            };
            eprintln!("  API key: {}", key_status);
        }
    }
    eprintln!(
        "  Dimension: {}",
        style(config.embedding_dimension()).cyan()
    );
    eprintln!("  Table: {}", style(config.table_name()).cyan());

    eprintln!();
    eprintln!("{}", style("Search:").bold().yellow());
    let mode = match config.search.mode {
        SearchMode::Scan => "scan",
        SearchMode::Native => "native",
    };
    eprintln!("  Mode: {}", style(mode).cyan());
    if config.search.mode == SearchMode::Native {
        eprintln!(
            "  Candidate pool: {}",
            style(config.search.candidate_pool).cyan()
        );
    }

    eprintln!();
    eprintln!(
        "  Chunk budget: {} chars",
        style(config.chunking.max_chunk_chars).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &std::path::Path) -> Config {
    match Config::load(config_dir) {
        Ok(config) => {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        }
        Err(_) => {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            let mut config = Config::default();
            config.base_dir = config_dir.to_path_buf();
            config
        }
    }
}

fn configure_provider(config: &mut Config) -> Result<()> {
    let providers = &["local", "gemini"];
    let default_index = match config.embedding.provider {
        ProviderKind::Local => 0,
        ProviderKind::Gemini => 1,
    };

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(providers)
        .interact()?;

    if provider_index == 0 {
        config.embedding.provider = ProviderKind::Local;

        let model: String = Input::new()
            .with_prompt("Local embedding model")
            .default(config.embedding.local_model.clone())
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Model name cannot be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        config.embedding.local_model = model;

        let dimension: u32 = Input::new()
            .with_prompt("Embedding dimension")
            .default(config.embedding.local_dimension)
            .validate_with(validate_dimension_input)
            .interact_text()?;
        config.embedding.local_dimension = dimension;
    } else {
        config.embedding.provider = ProviderKind::Gemini;

        let api_key: String = Input::new()
            .with_prompt("Gemini API key (GEMINI_API_KEY overrides this)")
            .default(config.gemini.api_key.clone())
            .allow_empty(true)
            .interact_text()?;
        config.gemini.api_key = api_key;

        let model: String = Input::new()
            .with_prompt("Gemini embedding model")
            .default(config.gemini.embedding_model.clone())
            .interact_text()?;
        config.gemini.embedding_model = model;

        let dimension: u32 = Input::new()
            .with_prompt("Embedding dimension")
            .default(config.gemini.embedding_dimension)
            .validate_with(validate_dimension_input)
            .interact_text()?;
        config.gemini.embedding_dimension = dimension;
    }

    Ok(())
}

fn configure_search(config: &mut Config) -> Result<()> {
    let modes = &["scan (in-process cosine scan)", "native (vector index)"];
    let default_index = match config.search.mode {
        SearchMode::Scan => 0,
        SearchMode::Native => 1,
    };

    let mode_index = Select::new()
        .with_prompt("Search mode")
        .default(default_index)
        .items(modes)
        .interact()?;

    if mode_index == 0 {
        config.search.mode = SearchMode::Scan;
    } else {
        config.search.mode = SearchMode::Native;

        let candidate_pool: u32 = Input::new()
            .with_prompt("Candidate pool size for native search")
            .default(config.search.candidate_pool)
            .validate_with(|input: &u32| -> Result<(), &str> {
                if (1..=10_000).contains(input) {
                    Ok(())
                } else {
                    Err("Candidate pool must be between 1 and 10000")
                }
            })
            .interact_text()?;
        config.search.candidate_pool = candidate_pool;
    }

    Ok(())
}

#[expect(
    clippy::trivially_copy_pass_by_ref,
    reason = "dialoguer validators receive references"
)]
fn validate_dimension_input(input: &u32) -> Result<(), &'static str> {
    if (64..=8192).contains(input) {
        Ok(())
    } else {
        Err("Dimension must be between 64 and 8192")
    }
}
