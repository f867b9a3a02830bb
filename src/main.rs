use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ragdocs::Result;
use ragdocs::commands::{
    add_document, build_index, chat, delete_document, embed_text, get_document, ingest_docs,
    list_documents, search_documents, show_stats, update_stored_document,
};
use ragdocs::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "ragdocs")]
#[command(about = "Semantic document store with retrieval-augmented chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embedding provider and search settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a documentation tree (one feature per subdirectory)
    Ingest {
        /// Directory containing one subdirectory per feature
        dir: PathBuf,
        /// Store paragraph chunks instead of whole documents
        #[arg(long)]
        chunked: bool,
        /// Only ingest the named feature directory
        #[arg(long)]
        feature: Option<String>,
    },
    /// Embed and store a single document from a file
    Add {
        /// Document title
        title: String,
        /// File containing the document content
        file: PathBuf,
        /// Document type label
        #[arg(long, default_value = "document")]
        r#type: String,
        /// Metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Show a stored document
    Get {
        /// Document ID
        id: String,
        /// Print the full document content
        #[arg(long)]
        content: bool,
    },
    /// Update a stored document (content changes are re-embedded)
    Update {
        /// Document ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// File containing the new content
        #[arg(long)]
        file: Option<PathBuf>,
        /// New document type label
        #[arg(long = "type")]
        document_type: Option<String>,
        /// Replacement metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Delete a stored document
    Delete {
        /// Document ID
        id: String,
    },
    /// List stored documents, newest first
    List {
        /// Only show documents of this type
        #[arg(long = "type")]
        document_type: Option<String>,
        /// Maximum number of documents to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Number of documents to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Search stored documents by semantic similarity
    Search {
        /// Search query
        query: String,
        /// Maximum number of results (1-100)
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Minimum similarity score (0.0-1.0)
        #[arg(long, default_value_t = 0.7)]
        threshold: f32,
        /// Override the configured search mode ('scan' or 'native')
        #[arg(long)]
        mode: Option<String>,
    },
    /// Ask a question answered with retrieved documents as context
    Chat {
        /// The question to answer
        query: String,
        /// Maximum number of context documents (1-100)
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Minimum similarity score for context documents (0.0-1.0)
        #[arg(long, default_value_t = 0.7)]
        threshold: f32,
        /// Sampling temperature override
        #[arg(long)]
        temperature: Option<f32>,
        /// Maximum output tokens override
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Embed a piece of text and print the vector
    Embed {
        /// Text to embed
        text: String,
    },
    /// Show document store statistics
    Stats,
    /// Build the native vector index
    Index,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest {
            dir,
            chunked,
            feature,
        } => {
            ingest_docs(dir, chunked, feature).await?;
        }
        Commands::Add {
            title,
            file,
            r#type,
            metadata,
        } => {
            add_document(title, file, r#type, metadata).await?;
        }
        Commands::Get { id, content } => {
            get_document(id, content).await?;
        }
        Commands::Update {
            id,
            title,
            file,
            document_type,
            metadata,
        } => {
            update_stored_document(id, title, file, document_type, metadata).await?;
        }
        Commands::Delete { id } => {
            delete_document(id).await?;
        }
        Commands::List {
            document_type,
            limit,
            offset,
        } => {
            list_documents(document_type, limit, offset).await?;
        }
        Commands::Search {
            query,
            limit,
            threshold,
            mode,
        } => {
            search_documents(query, limit, threshold, mode).await?;
        }
        Commands::Chat {
            query,
            limit,
            threshold,
            temperature,
            max_tokens,
        } => {
            chat(query, limit, threshold, temperature, max_tokens).await?;
        }
        Commands::Embed { text } => {
            embed_text(text).await?;
        }
        Commands::Stats => {
            show_stats().await?;
        }
        Commands::Index => {
            build_index().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["ragdocs", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::List { .. });
        }
    }

    #[test]
    fn ingest_command_with_flags() {
        let cli = Cli::try_parse_from([
            "ragdocs",
            "ingest",
            "/tmp/docs",
            "--chunked",
            "--feature",
            "billing",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest {
                dir,
                chunked,
                feature,
            } = parsed.command
            {
                assert_eq!(dir, PathBuf::from("/tmp/docs"));
                assert!(chunked);
                assert_eq!(feature, Some("billing".to_string()));
            }
        }
    }

    #[test]
    fn search_command_defaults() {
        let cli = Cli::try_parse_from(["ragdocs", "search", "how does billing work"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                query,
                limit,
                threshold,
                mode,
            } = parsed.command
            {
                assert_eq!(query, "how does billing work");
                assert_eq!(limit, 10);
                assert!((threshold - 0.7).abs() < f32::EPSILON);
                assert_eq!(mode, None);
            }
        }
    }

    #[test]
    fn chat_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "ragdocs",
            "chat",
            "what is this",
            "--temperature",
            "0.2",
            "--max-tokens",
            "512",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Chat {
                temperature,
                max_tokens,
                ..
            } = parsed.command
            {
                assert_eq!(temperature, Some(0.2));
                assert_eq!(max_tokens, Some(512));
            }
        }
    }

    #[test]
    fn list_command_type_filter() {
        let cli = Cli::try_parse_from(["ragdocs", "list", "--type", "feature-doc"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::List { document_type, .. } = parsed.command {
                assert_eq!(document_type, Some("feature-doc".to_string()));
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["ragdocs", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn add_requires_title_and_file() {
        let cli = Cli::try_parse_from(["ragdocs", "add", "Only Title"]);
        assert!(cli.is_err());
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["ragdocs", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["ragdocs", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
