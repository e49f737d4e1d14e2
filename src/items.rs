use crate::{
    models::{Item, ItemDraft, ItemId, Page},
    repository::{RepositoryError, RepositoryState},
};

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("title is required")]
    InvalidInput,

    #[error("item not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// ItemStore
///
/// Item lifecycle on top of the repository: input normalization, existence
/// checks, and the listing policy.
#[derive(Clone)]
pub struct ItemStore {
    repo: RepositoryState,
}

impl ItemStore {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// draft
    ///
    /// Normalizes raw form input. The title is trimmed and must remain non-empty;
    /// a description that is blank after trimming becomes absent.
    pub fn draft(title: &str, description: Option<&str>) -> Result<ItemDraft, ItemError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ItemError::InvalidInput);
        }
        let description = description
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        Ok(ItemDraft {
            title: title.to_string(),
            description,
        })
    }

    pub async fn create(&self, title: &str, description: Option<&str>) -> Result<Item, ItemError> {
        let draft = Self::draft(title, description)?;
        Ok(self.repo.insert_item(&draft).await?)
    }

    pub async fn get(&self, id: ItemId) -> Result<Item, ItemError> {
        self.repo.get_item(id).await?.ok_or(ItemError::NotFound)
    }

    /// update
    ///
    /// Rewrites title and description. Input is validated before the store is
    /// touched, so a rejected update leaves the row exactly as it was.
    pub async fn update(&self, id: ItemId, title: &str, description: Option<&str>) -> Result<Item, ItemError> {
        let draft = Self::draft(title, description)?;
        self.repo
            .update_item(id, &draft)
            .await?
            .ok_or(ItemError::NotFound)
    }

    pub async fn delete(&self, id: ItemId) -> Result<(), ItemError> {
        if self.repo.delete_item(id).await? {
            Ok(())
        } else {
            Err(ItemError::NotFound)
        }
    }

    /// list
    ///
    /// Newest items first, `per_page` at a time. Pages are 1-indexed; anything
    /// below 1 reads as the first page, and a page past the end is simply empty.
    pub async fn list(&self, page: u64, per_page: u32) -> Result<Page<Item>, ItemError> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = u64::try_from(self.repo.count_items().await?).unwrap_or(0);

        let offset = (page - 1).saturating_mul(u64::from(per_page));
        let items = if offset >= total {
            Vec::new()
        } else {
            // offset < total, and total came from an i64
            self.repo
                .list_items(i64::from(per_page), offset as i64)
                .await?
        };

        Ok(Page::new(items, page, per_page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_trims_and_drops_blank_description() {
        let draft = ItemStore::draft("  Lamp ", Some("   ")).unwrap();
        assert_eq!(draft.title, "Lamp");
        assert_eq!(draft.description, None);

        let draft = ItemStore::draft("Lamp", Some("  brass, 1920s \n")).unwrap();
        assert_eq!(draft.description.as_deref(), Some("brass, 1920s"));
    }

    #[test]
    fn test_draft_rejects_blank_title() {
        assert!(matches!(ItemStore::draft("", None), Err(ItemError::InvalidInput)));
        assert!(matches!(
            ItemStore::draft(" \t ", Some("still invalid")),
            Err(ItemError::InvalidInput)
        ));
    }
}
