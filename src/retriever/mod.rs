//! Authorization-filtered retrieval
//!
//! Wraps a [`RetrievalIndex`] and drops every candidate the current principal
//! may not read. Ranking is left exactly as the index produced it; a denied
//! chunk is removed, nothing is re-sorted.
//!
//! Chunks without a category are public by default (see
//! [`UncategorizedPolicy`]). Every other chunk costs one `read` check against
//! its category. Checks run concurrently up to a bound, and any check that
//! fails to reach a decision fails the whole retrieval.

use crate::auth::Principal;
use crate::authz::{Authorizer, AuthzError, AuthzRequest};
use crate::index::{DocumentChunk, IndexError, RetrievalIndex};
use crate::metrics;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of policy checks in flight at once
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("Retrieval index error: {0}")]
    Index(#[from] IndexError),

    #[error("Policy check failed for category '{category}': {source}")]
    Policy {
        category: String,
        #[source]
        source: AuthzError,
    },
}

/// How chunks with no category are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UncategorizedPolicy {
    /// Readable by anyone, no policy check issued
    #[default]
    Public,
    /// Never returned
    Restricted,
}

/// Outcome of the policy check for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationDecision {
    pub chunk: DocumentChunk,
    pub allowed: bool,
}

/// Retriever that filters index results through per-category authorization
pub struct AuthzRetriever<I> {
    index: I,
    authorizer: Arc<dyn Authorizer>,
    principal: Principal,
    max_concurrent_checks: usize,
    uncategorized: UncategorizedPolicy,
}

impl<I: RetrievalIndex> AuthzRetriever<I> {
    pub fn new(index: I, authorizer: Arc<dyn Authorizer>, principal: Principal) -> Self {
        Self {
            index,
            authorizer,
            principal,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            uncategorized: UncategorizedPolicy::default(),
        }
    }

    /// Bound the number of concurrent policy checks (minimum 1)
    pub fn with_max_concurrent_checks(mut self, limit: usize) -> Self {
        self.max_concurrent_checks = limit.max(1);
        self
    }

    pub fn with_uncategorized_policy(mut self, policy: UncategorizedPolicy) -> Self {
        self.uncategorized = policy;
        self
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Chunks relevant to `query` that the principal may read, in index order
    pub async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, RetrieveError> {
        let started = Instant::now();
        let candidates = self.index.search(query).await?;
        let total = candidates.len();

        let decisions = self.decide(candidates).await?;
        let allowed: Vec<DocumentChunk> = decisions
            .into_iter()
            .filter(|d| d.allowed)
            .map(|d| d.chunk)
            .collect();

        metrics::record_retrieve_duration(started.elapsed().as_secs_f64());
        debug!(
            principal = %self.principal,
            candidates = total,
            allowed = allowed.len(),
            "Filtered retrieval"
        );
        Ok(allowed)
    }

    /// Decide every candidate, keeping input order.
    ///
    /// Fails as soon as any check errors; outstanding checks are dropped.
    pub async fn decide(
        &self,
        candidates: Vec<DocumentChunk>,
    ) -> Result<Vec<AuthorizationDecision>, RetrieveError> {
        stream::iter(candidates)
            .map(|chunk| self.decide_one(chunk))
            .buffered(self.max_concurrent_checks)
            .try_collect()
            .await
    }

    async fn decide_one(&self, chunk: DocumentChunk) -> Result<AuthorizationDecision, RetrieveError> {
        let Some(category) = chunk.category.clone() else {
            let allowed = self.uncategorized == UncategorizedPolicy::Public;
            metrics::record_authz_decision(if allowed { "public" } else { "deny" });
            return Ok(AuthorizationDecision { chunk, allowed });
        };
        let request = AuthzRequest::read(self.principal.id(), &category);

        let allowed = match self.authorizer.authorize(&request).await {
            Ok(allowed) => allowed,
            Err(source) => {
                metrics::record_authz_error();
                warn!(
                    category = %category,
                    error = %source,
                    "Policy check failed"
                );
                return Err(RetrieveError::Policy { category, source });
            }
        };

        metrics::record_authz_decision(if allowed { "allow" } else { "deny" });
        Ok(AuthorizationDecision { chunk, allowed })
    }
}
