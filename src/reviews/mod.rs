mod config;

pub use config::{
    ensure_workspace_structure, workspace_root, AppConfig, DedupSettings, EnrichmentSettings,
    ScreeningSettings, WorkspacePaths,
};

use crate::orchestration::{log_event, EventType};
use crate::records::CanonicalRecord;
use crate::screening::{CsvDecisionStore, SessionStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A scoping review with its state directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join("review.json")
    }

    pub fn canonical_records_path(&self) -> PathBuf {
        self.root.join("canonical_records.json")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.root.join("sessions.jsonl")
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join("events.jsonl")
    }
}

/// Manages reviews, configuration, and their stores.
pub struct ReviewManager {
    pub config: AppConfig,
    pub paths: WorkspacePaths,
}

impl ReviewManager {
    /// Opens the workspace resolved by [`workspace_root`].
    pub fn new() -> Result<Self> {
        Self::open(&workspace_root()?)
    }

    pub fn open(root: &Path) -> Result<Self> {
        let paths = ensure_workspace_structure(root)?;
        let config = config::load_or_default(&paths.config_file())?;
        Ok(Self { config, paths })
    }

    pub fn save_config(&self) -> Result<()> {
        config::save(&self.paths.config_file(), &self.config)
    }

    pub fn list_reviews(&self) -> Result<Vec<Review>> {
        let mut reviews = Vec::new();
        if self.paths.reviews_dir.exists() {
            for entry in fs::read_dir(&self.paths.reviews_dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let metadata = entry.path().join("review.json");
                if metadata.exists() {
                    let review: Review = serde_json::from_slice(&fs::read(&metadata)?)
                        .with_context(|| format!("Failed to parse {:?}", metadata))?;
                    reviews.push(review);
                }
            }
        }
        reviews.sort_by_key(|r| r.created_at);
        Ok(reviews)
    }

    pub fn find_review(&self, slug: &str) -> Result<Option<Review>> {
        Ok(self.list_reviews()?.into_iter().find(|r| r.slug == slug))
    }

    pub fn create_review(&mut self, name: &str) -> Result<Review> {
        let slug = slugify(name);
        if slug.is_empty() {
            anyhow::bail!("Review name {:?} has no usable characters", name);
        }
        if self.find_review(&slug)?.is_some() {
            anyhow::bail!("A review with slug '{slug}' already exists");
        }
        let created_at = Utc::now();
        let root = self.paths.review_dir(&slug);
        fs::create_dir_all(&root)?;
        let review = Review {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug,
            root,
            created_at,
            last_active_at: Some(created_at),
        };
        self.persist_review(&review)?;
        log_event(
            &review,
            EventType::ReviewCreated,
            serde_json::json!({ "review_id": review.id, "name": review.name }),
        )?;
        self.set_active_review(&review.slug)?;
        Ok(review)
    }

    fn persist_review(&self, review: &Review) -> Result<()> {
        fs::create_dir_all(&review.root)?;
        fs::write(review.metadata_path(), serde_json::to_vec_pretty(review)?)?;
        Ok(())
    }

    pub fn set_active_review(&mut self, slug: &str) -> Result<Review> {
        let mut review = self
            .find_review(slug)?
            .with_context(|| format!("No review named '{slug}'"))?;
        review.last_active_at = Some(Utc::now());
        self.persist_review(&review)?;
        log_event(
            &review,
            EventType::ReviewSelected,
            serde_json::json!({ "review_id": review.id, "slug": review.slug }),
        )?;
        self.config.last_active_review = Some(review.slug.clone());
        self.save_config()?;
        Ok(review)
    }

    pub fn active_review(&self) -> Result<Option<Review>> {
        match &self.config.last_active_review {
            Some(slug) => self.find_review(slug),
            None => Ok(None),
        }
    }

    /// Picks the named review, or the active one when `slug` is `None`.
    pub fn resolve_review(&self, slug: Option<&str>) -> Result<Review> {
        match slug {
            Some(slug) => self
                .find_review(slug)?
                .with_context(|| format!("No review named '{slug}'")),
            None => self
                .active_review()?
                .context("No active review; run `reviewbase init <name>` first"),
        }
    }

    pub fn load_canonical_records(&self, review: &Review) -> Result<Vec<CanonicalRecord>> {
        let path = review.canonical_records_path();
        if path.exists() {
            let records: Vec<CanonicalRecord> = serde_json::from_slice(&fs::read(&path)?)
                .with_context(|| format!("Failed to parse {:?}", path))?;
            Ok(records)
        } else {
            Ok(Vec::new())
        }
    }

    pub fn save_canonical_records(&self, review: &Review, records: &[CanonicalRecord]) -> Result<()> {
        let path = review.canonical_records_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_vec_pretty(records)?)
            .with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn decision_store(&self, review: &Review) -> CsvDecisionStore {
        CsvDecisionStore::new(review.root.join(&self.config.screening.decisions_file))
    }

    pub fn session_store(&self, review: &Review) -> SessionStore {
        SessionStore::for_review(review)
    }
}

/// Create a filesystem-safe slug from a review name.
fn slugify(name: &str) -> String {
    let mut slug = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').to_string()
}
