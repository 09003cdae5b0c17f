//! Storage port for per-domain taxonomy documents.

use async_trait::async_trait;
use tracing::warn;

use crate::domain::errors::DomainResult;
use crate::domain::models::Taxonomy;

/// Whole-document storage for per-domain taxonomies
#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    /// Strict read: `Ok(None)` when the document is absent, `Err` when it
    /// exists but cannot be decoded.
    async fn try_load(&self, domain: &str) -> DomainResult<Option<Taxonomy>>;

    /// Replace the whole document.
    async fn save(&self, domain: &str, taxonomy: &Taxonomy) -> DomainResult<()>;

    /// Domains with a stored document.
    async fn list_domains(&self) -> DomainResult<Vec<String>>;

    /// Fail-soft read: absent or malformed documents degrade to an empty taxonomy.
    async fn load(&self, domain: &str) -> Taxonomy {
        match self.try_load(domain).await {
            Ok(Some(taxonomy)) => taxonomy,
            Ok(None) => {
                warn!(domain, "Taxonomy document missing, using empty taxonomy");
                Taxonomy::default()
            }
            Err(e) => {
                warn!(domain, error = %e, "Taxonomy document unreadable, using empty taxonomy");
                Taxonomy::default()
            }
        }
    }
}
