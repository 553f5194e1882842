use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    availability::ServiceAvailabilityChecker,
    config::Settings,
    conversation::Conversation,
    document::{DocumentProcessor, DocumentStore},
    model::{ChatModel, CompletionConfig, EmbeddingModel},
    search::SearchService,
    tool::{DynamicToolLoader, ToolContext},
    value::RagQuery,
    vector_store::VectorStore,
};

#[derive(Debug, Parser)]
#[command(name = "finch", version, about = "Document-grounded chat over your own files")]
pub struct Cli {
    /// Path to a JSON settings file. Falls back to FINCH_* environment
    /// variables when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask a single question and print the answer with its sources.
    Ask {
        question: String,

        /// Fall back to the model's own knowledge when no documents match.
        #[arg(long)]
        general_knowledge: bool,

        /// Maximum number of document excerpts to retrieve.
        #[arg(long, default_value_t = 5)]
        max_results: usize,

        /// Minimum similarity score for an excerpt to count.
        #[arg(long, default_value_t = 0.2)]
        score_threshold: f32,
    },

    /// Interactive question-and-answer session.
    Chat {
        #[arg(long)]
        general_knowledge: bool,

        /// Save the transcript to this file on exit.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Chunk, embed and index files into the document store.
    Ingest {
        /// Files to ingest (.pdf, .docx, .txt).
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Inspect or remove indexed documents.
    Documents {
        #[command(subcommand)]
        command: DocumentsCommand,
    },

    /// Probe every backing service and report what is reachable.
    Health,

    /// Print the effective configuration.
    Config,

    /// Re-probe services and show which tools load now.
    Reload,
}

#[derive(Debug, Subcommand)]
pub enum DocumentsCommand {
    /// List indexed documents with their chunk counts.
    List,
    /// Delete every chunk of the named document.
    Delete { filename: String },
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::from_env().context("loading settings from the environment")?,
    };
    Ok(settings)
}

async fn connect_store(settings: &Settings) -> anyhow::Result<DocumentStore> {
    let store = VectorStore::new_chroma(&settings.chroma, settings.external.retry_attempts)
        .await
        .context("connecting to the vector store")?;
    let embedder = EmbeddingModel::new_azure(&settings.azure, settings.external.retry_attempts)?;
    Ok(DocumentStore::new(store, embedder))
}

async fn build_search(settings: &Settings) -> anyhow::Result<SearchService> {
    let store = connect_store(settings).await?;
    let chat = ChatModel::new_azure(&settings.azure, settings.external.retry_attempts)?;
    let config = CompletionConfig {
        temperature: settings.azure.temperature,
        max_tokens: settings.azure.max_tokens,
    };
    Ok(SearchService::new(store, chat).with_completion_config(config))
}

fn print_response(response: &crate::value::RagResponse) {
    println!("{}", response.answer);
    let sources = response.sources();
    if !sources.is_empty() {
        println!();
        println!("Sources: {}", sources.join(", "));
    }
    log::debug!(
        "mode={} confidence={:.2} tokens={}",
        response.mode,
        response.confidence,
        response.usage.total_tokens
    );
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Command::Ask {
            question,
            general_knowledge,
            max_results,
            score_threshold,
        } => {
            let service = build_search(&settings).await?;
            let query = RagQuery::new(question)
                .with_max_results(max_results)
                .with_score_threshold(score_threshold)
                .with_general_knowledge(general_knowledge);
            let response = service.search_and_generate(&query).await;
            print_response(&response);
        }

        Command::Chat {
            general_knowledge,
            save,
        } => {
            let service = build_search(&settings).await?;
            let mut conversation = Conversation::new();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut stdout = tokio::io::stdout();

            println!("Ask a question, or 'exit' to leave.");
            loop {
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                    break;
                }

                conversation.push_user(question);
                let query =
                    RagQuery::new(question).with_general_knowledge(general_knowledge);
                let response = service.search_and_generate(&query).await;
                print_response(&response);
                conversation.push_assistant(&response.answer, response.mode, &response.usage);
            }

            if let Some(path) = save {
                conversation.save(&path)?;
                println!("Transcript saved to {}", path.display());
            }
        }

        Command::Ingest { paths } => {
            let processor = DocumentProcessor::new(settings.documents.clone());
            let store = connect_store(&settings).await?;

            let outcome = processor.process_files(&paths).await;
            for (name, chunks) in &outcome.succeeded {
                let ids = store.add_chunks(chunks).await?;
                println!("{name}: indexed {} chunks", ids.len());
            }
            for (name, error) in &outcome.failed {
                eprintln!("{name}: {error}");
            }
            if outcome.failed.is_empty() {
                println!("Ingested {} file(s).", outcome.success_count());
            } else {
                anyhow::bail!(
                    "{} of {} file(s) failed",
                    outcome.failure_count(),
                    outcome.success_count() + outcome.failure_count()
                );
            }
        }

        Command::Documents { command } => {
            let store = connect_store(&settings).await?;
            match command {
                DocumentsCommand::List => {
                    let documents = store.list_documents().await?;
                    if documents.is_empty() {
                        println!("No documents indexed.");
                    }
                    for doc in documents {
                        println!(
                            "{}  {} chunks  {}  uploaded {}",
                            doc.filename, doc.chunk_count, doc.file_type, doc.upload_timestamp
                        );
                    }
                }
                DocumentsCommand::Delete { filename } => {
                    let removed = store.delete_document(&filename).await?;
                    println!("Deleted {removed} chunk(s) of {filename}.");
                }
            }
        }

        Command::Health => {
            let client = reqwest::Client::new();
            let store = VectorStore::new_chroma(&settings.chroma, 1).await.ok();
            let checker = ServiceAvailabilityChecker::new(
                &settings.availability,
                &settings.external,
                store,
                client,
            );
            let mut verdicts: Vec<_> = checker.check_all().await.into_iter().collect();
            verdicts.sort_by_key(|(service, _)| service.to_string());
            for (service, available) in verdicts {
                println!("{service}: {}", if available { "up" } else { "down" });
            }
        }

        Command::Config => {
            let mut shown = settings.clone();
            if !shown.azure.api_key.is_empty() {
                shown.azure.api_key = "<redacted>".to_owned();
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }

        Command::Reload => {
            let client = reqwest::Client::new();
            let search = build_search(&settings).await.ok();
            let store = search.as_ref().map(|s| s.store().vector_store().clone());
            let checker = Arc::new(ServiceAvailabilityChecker::new(
                &settings.availability,
                &settings.external,
                store,
                client.clone(),
            ));
            let mut loader = DynamicToolLoader::new(
                checker,
                ToolContext {
                    external: settings.external.clone(),
                    client,
                    search,
                },
            );
            let loaded = loader.reload_tools().await;
            if loaded.is_empty() {
                println!("No tools available.");
            }
            for (category, tools) in loaded {
                let names: Vec<String> = tools.iter().map(|t| t.tool.name()).collect();
                println!("{category}: {}", names.join(", "));
            }
        }
    }
    Ok(())
}
