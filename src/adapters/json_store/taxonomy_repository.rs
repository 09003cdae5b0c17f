//! JSON file implementation of the TaxonomyRepository.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{read_document, validate_domain, write_document};
use crate::domain::errors::DomainResult;
use crate::domain::models::Taxonomy;
use crate::domain::ports::TaxonomyRepository;

/// Stores one document per domain at `<root>/domains/<domain>.json`.
#[derive(Debug, Clone)]
pub struct JsonTaxonomyRepository {
    dir: PathBuf,
}

impl JsonTaxonomyRepository {
    /// Documents under `data_dir/domains`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("domains"),
        }
    }

    /// Document path for `domain`.
    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{domain}.json"))
    }
}

#[async_trait]
impl TaxonomyRepository for JsonTaxonomyRepository {
    async fn try_load(&self, domain: &str) -> DomainResult<Option<Taxonomy>> {
        validate_domain(domain)?;
        read_document(&self.path_for(domain)).await
    }

    async fn save(&self, domain: &str, taxonomy: &Taxonomy) -> DomainResult<()> {
        validate_domain(domain)?;
        let path = self.path_for(domain);
        write_document(&path, taxonomy).await?;
        debug!(domain, path = %path.display(), categories = taxonomy.categories.len(), "Saved taxonomy");
        Ok(())
    }

    async fn list_domains(&self) -> DomainResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut domains = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                domains.push(stem.to_string());
            }
        }
        domains.sort();
        Ok(domains)
    }
}
