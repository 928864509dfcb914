//! Guide repository.
//!
//! All validation (name, band sanity, no-overlap) runs before any write, so a
//! rejected call never leaves a guide partially modified.

use thiserror::Error;
use tracing::info;

use crate::models::{find_overlap, Guide, GuideBand, GuideSummary};
use crate::store::{LabStore, StoreError};

/// Guide repository errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuideError {
    #[error("Guide not found: {0}")]
    NotFound(String),

    #[error("A guide named {0:?} already exists")]
    DuplicateName(String),

    #[error("Bands {first} and {second} overlap for marker {marker}")]
    OverlappingBands {
        marker: String,
        first: usize,
        second: usize,
    },

    #[error("Band {index} is invalid: {reason}")]
    InvalidBand { index: usize, reason: String },

    #[error("Guide name must not be blank")]
    EmptyName,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<StoreError> for GuideError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => GuideError::NotFound(name),
            StoreError::Unavailable(msg) => GuideError::StorageUnavailable(msg),
        }
    }
}

impl From<serde_json::Error> for GuideError {
    fn from(e: serde_json::Error) -> Self {
        GuideError::Serialization(e.to_string())
    }
}

pub type GuideResult<T> = Result<T, GuideError>;

/// Check a submitted band set for invalid bands and overlaps.
pub fn validate_bands(bands: &[GuideBand]) -> GuideResult<()> {
    if let Some((index, reason)) = bands
        .iter()
        .enumerate()
        .find_map(|(i, band)| band.problem().map(|reason| (i, reason)))
    {
        return Err(GuideError::InvalidBand {
            index,
            reason: reason.to_string(),
        });
    }

    match find_overlap(bands) {
        Some(overlap) => Err(GuideError::OverlappingBands {
            marker: overlap.marker,
            first: overlap.first,
            second: overlap.second,
        }),
        None => Ok(()),
    }
}

fn validate_name(name: &str) -> GuideResult<()> {
    if name.trim().is_empty() {
        Err(GuideError::EmptyName)
    } else {
        Ok(())
    }
}

/// CRUD access to reference guides through a storage collaborator.
pub struct GuideRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: LabStore> GuideRepository<'a, S> {
    /// Create a repository over a store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create a guide. Fails with `DuplicateName` if the name is taken.
    pub async fn create(&self, name: &str, bands: Vec<GuideBand>) -> GuideResult<Guide> {
        validate_name(name)?;
        validate_bands(&bands)?;
        if self.exists(name).await? {
            return Err(GuideError::DuplicateName(name.to_string()));
        }

        self.store.save_guide(name, &bands, None).await?;
        info!(guide = name, bands = bands.len(), "guide created");
        Ok(Guide::new(name, bands))
    }

    /// Get a guide by name.
    pub async fn get(&self, name: &str) -> GuideResult<Guide> {
        Ok(self.store.get_guide(name).await?)
    }

    /// Summaries of every guide, sorted by name.
    pub async fn list(&self) -> GuideResult<Vec<GuideSummary>> {
        let mut summaries = self
            .snapshot()
            .await?
            .iter()
            .map(Guide::summary)
            .collect::<Result<Vec<_>, _>>()?;
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Every stored guide, for use as a matcher snapshot.
    pub async fn snapshot(&self) -> GuideResult<Vec<Guide>> {
        Ok(self.store.list_guides().await?)
    }

    /// Replace a guide's bands and optionally rename it.
    ///
    /// Fails with `NotFound` if `name` does not exist and with
    /// `DuplicateName` if `new_name` belongs to a different guide.
    pub async fn update(
        &self,
        name: &str,
        bands: Vec<GuideBand>,
        new_name: Option<&str>,
    ) -> GuideResult<Guide> {
        if let Some(target) = new_name {
            validate_name(target)?;
        }
        validate_bands(&bands)?;

        self.store.get_guide(name).await?;
        let rename = new_name.filter(|target| *target != name);
        if let Some(target) = rename {
            if self.exists(target).await? {
                return Err(GuideError::DuplicateName(target.to_string()));
            }
        }

        self.store.save_guide(name, &bands, rename).await?;
        let final_name = rename.unwrap_or(name);
        info!(
            guide = name,
            renamed_to = ?rename,
            bands = bands.len(),
            "guide updated"
        );
        Ok(Guide::new(final_name, bands))
    }

    /// Delete a guide by name.
    ///
    /// `NotFound` can be treated by callers as already deleted.
    pub async fn delete(&self, name: &str) -> GuideResult<()> {
        self.store.delete_guide(name).await?;
        info!(guide = name, "guide deleted");
        Ok(())
    }

    async fn exists(&self, name: &str) -> GuideResult<bool> {
        match self.store.get_guide(name).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Gender;

    fn igg_bands() -> Vec<GuideBand> {
        vec![
            GuideBand::new("IgG", 0, 5, 200.0, 500.0),
            GuideBand::new("IgG", 6, 120, 600.0, 1600.0),
        ]
    }

    #[test]
    fn test_validate_bands() {
        assert!(validate_bands(&igg_bands()).is_ok());
        assert!(validate_bands(&[]).is_ok());

        let invalid = vec![GuideBand::new("IgG", 10, 5, 200.0, 500.0)];
        assert!(matches!(
            validate_bands(&invalid),
            Err(GuideError::InvalidBand { index: 0, .. })
        ));

        let overlapping = vec![
            GuideBand::new("IgM", 0, 18, 40.0, 200.0).with_gender(Gender::Male),
            GuideBand::new("IgM", 18, 99, 40.0, 230.0),
        ];
        assert_eq!(
            validate_bands(&overlapping),
            Err(GuideError::OverlappingBands {
                marker: "IgM".into(),
                first: 0,
                second: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let repo = GuideRepository::new(&db);

        let created = repo.create("IgG-Guide", igg_bands()).await.unwrap();
        assert_eq!(created.bands, igg_bands());
        assert_eq!(repo.get("IgG-Guide").await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let db = Database::open_in_memory().unwrap();
        let repo = GuideRepository::new(&db);
        assert_eq!(repo.create("  ", igg_bands()).await, Err(GuideError::EmptyName));
    }

    #[tokio::test]
    async fn test_update_same_name_replaces_bands() {
        let db = Database::open_in_memory().unwrap();
        let repo = GuideRepository::new(&db);
        repo.create("IgG-Guide", igg_bands()).await.unwrap();

        let updated = repo
            .update("IgG-Guide", igg_bands()[..1].to_vec(), Some("IgG-Guide"))
            .await
            .unwrap();
        assert_eq!(updated.name, "IgG-Guide");
        assert_eq!(repo.get("IgG-Guide").await.unwrap().bands.len(), 1);
    }

    #[tokio::test]
    async fn test_list_summaries() {
        let db = Database::open_in_memory().unwrap();
        let repo = GuideRepository::new(&db);
        repo.create("Pediatric", igg_bands()).await.unwrap();
        repo.create("Adult", vec![]).await.unwrap();

        let summaries = repo.list().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Adult");
        assert_eq!(summaries[0].band_count, 0);
        assert_eq!(summaries[1].markers, vec!["IgG".to_string()]);
    }
}
