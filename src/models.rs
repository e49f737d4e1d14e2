use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type AdminId = i64;
pub type ItemId = i64;

// --- Core Application Schemas (Mapped to Database) ---

/// Admin
///
/// The single privileged actor. Rows live in the `admins` table and are only ever
/// inserted (registration); the hash is never serialized into a view.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct Admin {
    pub id: AdminId,
    // Unique and case-sensitive.
    pub username: String,
    // Argon2id PHC string (algorithm, params and salt embedded).
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Item
///
/// The public content entity from the `items` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: Option<String>,
    // Assigned by the store at insertion and never rewritten.
    pub created_at: DateTime<Utc>,
}

/// ItemDraft
///
/// Validated title/description pair ready to be written. Only the item store
/// constructs drafts, so a draft's title is always non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub description: Option<String>,
}

/// Page
///
/// One slice of a paginated listing plus the navigation facts a renderer needs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    // 1-indexed page number that was requested.
    pub page: u64,
    pub per_page: u32,
    pub total: u64,
    // Number of non-empty pages; zero when there are no rows at all.
    pub pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, per_page: u32, total: u64) -> Self {
        let pages = total.div_ceil(u64::from(per_page));
        // Past the end, "previous" points at the last non-empty page.
        let has_prev = page > 1 && pages > 0;
        let has_next = page < pages;
        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_page: has_prev.then(|| (page - 1).min(pages)),
            next_page: has_next.then(|| page + 1),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// CredentialsForm
///
/// Body of `POST /admin/register` and `POST /admin/login`. Missing fields
/// deserialize as empty strings so validation, not the extractor, rejects them.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// ItemForm
///
/// Body of `POST /create` and `POST /edit/{id}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ItemForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// ListQuery
///
/// Query string of the public listing. `page` is kept as raw text: anything that
/// is not a positive integer falls back to the first page instead of rejecting
/// the request.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListQuery {
    pub page: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> u64 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_navigation_facts() {
        let page = Page::new(vec![1, 2, 3, 4, 5, 6], 1, 6, 13);
        assert_eq!(page.pages, 3);
        assert!(!page.has_prev);
        assert!(page.has_next);
        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.prev_page, None);

        let last = Page::new(vec![13], 3, 6, 13);
        assert!(last.has_prev);
        assert!(!last.has_next);
        assert_eq!(last.prev_page, Some(2));
    }

    #[test]
    fn test_empty_listing_has_no_pages() {
        let page: Page<i32> = Page::new(vec![], 1, 6, 0);
        assert_eq!(page.pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn test_page_past_the_end_points_back_to_last_page() {
        let beyond: Page<i32> = Page::new(vec![], 9, 6, 13);
        assert!(beyond.has_prev);
        assert_eq!(beyond.prev_page, Some(3));
        assert!(!beyond.has_next);

        let nothing: Page<i32> = Page::new(vec![], 4, 6, 0);
        assert!(!nothing.has_prev);
        assert_eq!(nothing.prev_page, None);
    }

    #[test]
    fn test_list_query_page_fallbacks() {
        let parse = |raw: Option<&str>| ListQuery { page: raw.map(str::to_string) }.page();
        assert_eq!(parse(None), 1);
        assert_eq!(parse(Some("3")), 3);
        assert_eq!(parse(Some("abc")), 1);
        assert_eq!(parse(Some("0")), 1);
        assert_eq!(parse(Some("-2")), 1);
    }

    #[test]
    fn test_admin_hash_not_serialized() {
        let admin = Admin {
            id: 1,
            username: "root".to_string(),
            password_hash: "$argon2id$secret".to_string(),
        };
        let json = serde_json::to_string(&admin).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
    }
}
