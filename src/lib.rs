//! Authz RAG Library
//!
//! Retrieval-augmented question answering where every retrieved document
//! chunk is checked against a per-user authorization policy before it can
//! reach the language model.
//!
//! # Features
//!
//! - **Browser Login**: Hosted login page with a local callback listener
//! - **Category Policies**: One `read` check per chunk category via Pangea AuthZ
//! - **Fail Closed**: A policy check that cannot reach a decision fails retrieval
//! - **Rank Preserving**: Filtering never reorders the index results
//!
//! # Example
//!
//! ```no_run
//! use authz_rag::auth::Principal;
//! use authz_rag::authz::AllowAllAuthorizer;
//! use authz_rag::index::{DocumentChunk, MemoryVectorStore, OpenAiEmbeddings};
//! use authz_rag::retriever::AuthzRetriever;
//! use authz_rag::Config;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let chunks = vec![DocumentChunk::new("Lunch is at noon.", "data/office/lunch.md")
//!     .with_category("office")];
//! let store = MemoryVectorStore::from_documents(
//!     chunks,
//!     OpenAiEmbeddings::new(&config.openai)?,
//!     config.retrieval.top_k,
//! )
//! .await?;
//!
//! let retriever = AuthzRetriever::new(store, Arc::new(AllowAllAuthorizer), Principal::new("alice"));
//! let context = retriever.retrieve("When is lunch?").await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod authz;
pub mod config;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod login;
pub mod metrics;
pub mod pangea;
pub mod retriever;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use login::LoginFlow;
pub use retriever::AuthzRetriever;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
