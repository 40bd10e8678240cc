//! Authz RAG - question answering over documents the user may read
//!
//! Logs the user in through the hosted login page, then answers one question
//! using only the document chunks their policy allows.

use anyhow::Context;
use authz_rag::auth::PangeaIdentityClient;
use authz_rag::authz::pangea::PangeaAuthorizer;
use authz_rag::config;
use authz_rag::index::{MemoryVectorStore, OpenAiEmbeddings};
use authz_rag::ingest::{self, TextSplitter};
use authz_rag::llm::{AnswerSynthesizer, OpenAiChat, DEFAULT_CHAT_MODEL};
use authz_rag::telemetry::{self, LogFormat};
use authz_rag::{AuthzRetriever, Config, LoginFlow};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authz RAG - answer a question from the documents you are allowed to read
#[derive(Parser, Debug)]
#[command(name = "authz-rag")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Question to answer
    prompt: String,

    /// Chat model used to write the answer
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    model: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format = if args.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    telemetry::init_subscriber(format)?;

    if config::load_dotenv()? {
        debug!("Loaded environment from {}", config::DOTENV_FILE);
    }
    // Fails before any listener is opened
    let config = Config::from_env().context("Failed to load configuration from the environment")?;

    let identity = PangeaIdentityClient::new(
        &config.pangea.service_url("authn"),
        config.pangea.authn_client_token.expose(),
    )?;
    let flow = LoginFlow::new(
        &config.pangea.hosted_login_url,
        config.login.clone(),
        Arc::new(identity),
    )?;
    let principal = flow.authenticate().await?;
    info!("Authenticated as {}.", principal);

    let splitter = TextSplitter::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap);
    let chunks = ingest::ingest(&config.retrieval.data_dir, &splitter)
        .with_context(|| format!("Failed to ingest {}", config.retrieval.data_dir.display()))?;
    if chunks.is_empty() {
        warn!(
            data_dir = %config.retrieval.data_dir.display(),
            "No documents found"
        );
    }
    info!(chunks = chunks.len(), "Indexing documents");

    let store = MemoryVectorStore::from_documents(
        chunks,
        OpenAiEmbeddings::new(&config.openai)?,
        config.retrieval.top_k,
    )
    .await?;

    let authorizer = PangeaAuthorizer::builder()
        .url(&config.pangea.service_url("authz"))
        .token(config.pangea.authz_token.expose())
        .build()?;

    let retriever = AuthzRetriever::new(store, Arc::new(authorizer), principal)
        .with_max_concurrent_checks(config.retrieval.max_concurrent_checks);
    let context = retriever.retrieve(&args.prompt).await?;

    let chat = OpenAiChat::new(&config.openai, args.model)?;
    let answer = chat.answer(&args.prompt, &context).await?;
    println!("{}", answer);

    Ok(())
}
