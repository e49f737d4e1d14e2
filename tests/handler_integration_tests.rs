use argon2::{Algorithm, Argon2, Params, Version};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use async_trait::async_trait;
use item_showcase::{
    AppConfig, AppState, CredentialStore, MemoryRepository,
    auth::SESSION_COOKIE,
    create_router,
    models::{Admin, AdminId, Item, ItemDraft, ItemId},
    repository::{Repository, RepositoryError, RepositoryState},
};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use tower::ServiceExt;

// --- TEST UTILITIES ---

/// Argon2 parameters low enough to keep debug-mode tests fast.
fn cheap_hasher() -> Argon2<'static> {
    Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(1024, 1, 1, None).unwrap(),
    )
}

struct TestResponse {
    status: StatusCode,
    location: Option<String>,
    body: Value,
}

impl TestResponse {
    fn view(&self) -> &str {
        self.body["view"].as_str().unwrap_or_default()
    }

    fn notices(&self) -> Vec<String> {
        self.body["notices"]
            .as_array()
            .map(|notices| {
                notices
                    .iter()
                    .map(|n| n["message"].as_str().unwrap().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn titles(&self) -> Vec<String> {
        self.body["data"]["listing"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["title"].as_str().unwrap().to_string())
            .collect()
    }
}

/// A router over an in-memory repository plus a minimal cookie store, so each
/// test plays the part of one browser.
struct TestApp {
    router: Router,
    repo: Arc<MemoryRepository>,
    cookies: BTreeMap<String, String>,
}

impl TestApp {
    fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let shared = repo.clone() as RepositoryState;
        let mut state = AppState::new(shared.clone(), AppConfig::default());
        state.credentials = CredentialStore::with_hasher(shared, cheap_hasher());

        TestApp {
            router: create_router(state),
            repo,
            cookies: BTreeMap::new(),
        }
    }

    async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post_form(&mut self, uri: &str, form: &str) -> TestResponse {
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        self.send(request).await
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookies.is_empty() {
            let cookie_header = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let raw = set_cookie.to_str().unwrap();
            let pair = raw.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                if value.is_empty() {
                    self.cookies.remove(name.trim());
                } else {
                    self.cookies
                        .insert(name.trim().to_string(), value.to_string());
                }
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|value| value.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            location,
            body,
        }
    }

    async fn login_as_new_admin(&mut self) {
        let response = self
            .post_form("/admin/register", "username=admin&password=hunter2")
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        let response = self
            .post_form("/admin/login", "username=admin&password=hunter2")
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert!(self.cookies.contains_key("session"));
    }

    async fn seed_item(&self, title: &str) -> i64 {
        self.repo
            .insert_item(&ItemDraft {
                title: title.to_string(),
                description: None,
            })
            .await
            .unwrap()
            .id
    }
}

/// A repository whose database is unreachable.
struct UnreachableRepository;

fn pool_timeout() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl Repository for UnreachableRepository {
    async fn find_admin_by_username(&self, _username: &str) -> Result<Option<Admin>, RepositoryError> {
        Err(pool_timeout())
    }
    async fn get_admin(&self, _id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        Err(pool_timeout())
    }
    async fn insert_admin(&self, _username: &str, _password_hash: &str) -> Result<Admin, RepositoryError> {
        Err(pool_timeout())
    }
    async fn count_admins(&self) -> Result<i64, RepositoryError> {
        Err(pool_timeout())
    }
    async fn insert_item(&self, _draft: &ItemDraft) -> Result<Item, RepositoryError> {
        Err(pool_timeout())
    }
    async fn get_item(&self, _id: ItemId) -> Result<Option<Item>, RepositoryError> {
        Err(pool_timeout())
    }
    async fn update_item(&self, _id: ItemId, _draft: &ItemDraft) -> Result<Option<Item>, RepositoryError> {
        Err(pool_timeout())
    }
    async fn delete_item(&self, _id: ItemId) -> Result<bool, RepositoryError> {
        Err(pool_timeout())
    }
    async fn count_items(&self) -> Result<i64, RepositoryError> {
        Err(pool_timeout())
    }
    async fn list_items(&self, _limit: i64, _offset: i64) -> Result<Vec<Item>, RepositoryError> {
        Err(pool_timeout())
    }
}

// --- PUBLIC ROUTES ---

#[tokio::test]
async fn test_health_check() {
    let mut app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_empty_listing_for_anonymous_visitor() {
    let mut app = TestApp::new();
    let response = app.get("/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.view(), "list");
    assert!(response.titles().is_empty());
    assert_eq!(response.body["data"]["admin"], false);
    assert_eq!(response.body["data"]["listing"]["page"], 1);
}

#[tokio::test]
async fn test_item_detail_and_not_found() {
    let mut app = TestApp::new();
    let id = app.seed_item("Brass lamp").await;

    let response = app.get(&format!("/item/{}", id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.view(), "detail");
    assert_eq!(response.body["data"]["item"]["title"], "Brass lamp");
    assert!(response.body["data"]["item"]["description"].is_null());

    let missing = app.get("/item/999").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.view(), "404");

    let malformed = app.get("/item/not-a-number").await;
    assert_eq!(malformed.status, StatusCode::NOT_FOUND);

    let unknown_route = app.get("/no/such/page").await;
    assert_eq!(unknown_route.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown_route.view(), "404");
}

// --- AUTHORIZATION GATE ---

#[tokio::test]
async fn test_anonymous_create_redirects_to_login_with_notice() {
    let mut app = TestApp::new();

    let response = app.get("/create").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/admin/login"));

    // The notice is shown once on the login page, then consumed.
    let login_page = app.get("/admin/login").await;
    assert_eq!(login_page.view(), "admin_login");
    assert_eq!(login_page.notices(), vec!["Please log in as admin."]);

    let again = app.get("/admin/login").await;
    assert!(again.notices().is_empty());
}

#[tokio::test]
async fn test_anonymous_delete_removes_nothing() {
    let mut app = TestApp::new();
    let id = app.seed_item("Keep me").await;

    let response = app.post_form(&format!("/delete/{}", id), "").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/admin/login"));
    assert_eq!(app.repo.count_items().await.unwrap(), 1);
}

#[tokio::test]
async fn test_anonymous_edit_of_missing_item_still_redirects() {
    // The gate runs before the item lookup.
    let mut app = TestApp::new();
    let response = app.post_form("/edit/999", "title=x").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/admin/login"));
}

#[tokio::test]
async fn test_tampered_session_cookie_is_anonymous() {
    let mut app = TestApp::new();
    app.cookies
        .insert("session".to_string(), "eyJhbGciOiJIUzI1NiJ9.forged.sig".to_string());

    let response = app.get("/create").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/admin/login"));
}

#[tokio::test]
async fn test_session_check_during_outage_is_internal_error() {
    let state = AppState::new(Arc::new(UnreachableRepository), AppConfig::default());
    let token = state.sessions.begin(1).unwrap();
    let router = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/delete/1")
        .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    // An outage must not look like an expired session.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::LOCATION).is_none());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["view"], "500");
}

// --- REGISTRATION & LOGIN ---

#[tokio::test]
async fn test_register_duplicate_username() {
    let mut app = TestApp::new();

    let first = app
        .post_form("/admin/register", "username=alice&password=one")
        .await;
    assert_eq!(first.status, StatusCode::SEE_OTHER);
    assert_eq!(first.location.as_deref(), Some("/admin/login"));

    let second = app
        .post_form("/admin/register", "username=alice&password=two")
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.view(), "admin_register");
    assert_eq!(second.body["data"]["username"], "alice");
    assert!(
        second
            .notices()
            .contains(&"Username already taken.".to_string())
    );

    assert_eq!(app.repo.count_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn test_register_blank_fields_rejected() {
    let mut app = TestApp::new();

    let response = app
        .post_form("/admin/register", "username=+++&password=")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.view(), "admin_register");
    assert_eq!(response.notices(), vec!["Username and password required."]);

    // Missing fields entirely behave like blank ones.
    let response = app.post_form("/admin/register", "").await;
    assert_eq!(response.notices(), vec!["Username and password required."]);

    assert_eq!(app.repo.count_admins().await.unwrap(), 0);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let mut app = TestApp::new();
    app.post_form("/admin/register", "username=alice&password=right")
        .await;
    // Consume the registration notice.
    app.get("/admin/login").await;

    let wrong_password = app
        .post_form("/admin/login", "username=alice&password=wrong")
        .await;
    let unknown_user = app
        .post_form("/admin/login", "username=mallory&password=wrong")
        .await;

    assert_eq!(wrong_password.status, unknown_user.status);
    assert_eq!(wrong_password.view(), "admin_login");
    assert_eq!(wrong_password.view(), unknown_user.view());
    assert_eq!(wrong_password.notices(), vec!["Invalid username or password."]);
    assert_eq!(wrong_password.notices(), unknown_user.notices());
    assert_eq!(wrong_password.body["data"]["username"], "alice");
    assert!(!app.cookies.contains_key("session"));
}

#[tokio::test]
async fn test_login_logout_cycle() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;

    let home = app.get("/").await;
    assert_eq!(home.body["data"]["admin"], true);
    assert!(
        home.notices()
            .contains(&"Logged in successfully.".to_string())
    );

    let create_page = app.get("/create").await;
    assert_eq!(create_page.status, StatusCode::OK);
    assert_eq!(create_page.view(), "create");

    let logout = app.get("/admin/logout").await;
    assert_eq!(logout.status, StatusCode::SEE_OTHER);
    assert_eq!(logout.location.as_deref(), Some("/"));
    assert!(!app.cookies.contains_key("session"));

    // Logging out twice is harmless.
    let logout = app.get("/admin/logout").await;
    assert_eq!(logout.status, StatusCode::SEE_OTHER);

    let create_page = app.get("/create").await;
    assert_eq!(create_page.status, StatusCode::SEE_OTHER);
    assert_eq!(create_page.location.as_deref(), Some("/admin/login"));
}

// --- ITEM LIFECYCLE ---

#[tokio::test]
async fn test_create_item_normalizes_description() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;

    let response = app
        .post_form("/create", "title=+Lamp+&description=+++")
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/"));

    let home = app.get("/").await;
    assert_eq!(home.titles(), vec!["Lamp"]);
    assert!(home.body["data"]["listing"]["items"][0]["description"].is_null());
    assert!(
        home.notices()
            .contains(&"Item created successfully.".to_string())
    );
}

#[tokio::test]
async fn test_create_blank_title_preserves_input() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;

    let response = app
        .post_form("/create", "title=+++&description=polished+brass")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.view(), "create");
    assert_eq!(response.body["data"]["description"], "polished brass");
    assert!(response.notices().contains(&"Title is required.".to_string()));
    assert_eq!(app.repo.count_items().await.unwrap(), 0);
}

#[tokio::test]
async fn test_listing_order_and_pagination() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;

    for title in ["A", "B", "C"] {
        app.post_form("/create", &format!("title={}", title)).await;
    }
    let home = app.get("/").await;
    assert_eq!(home.titles(), vec!["C", "B", "A"]);

    for title in ["D", "E", "F"] {
        app.post_form("/create", &format!("title={}", title)).await;
    }

    let first = app.get("/?page=1").await;
    assert_eq!(first.titles().len(), 6);
    assert_eq!(first.body["data"]["listing"]["pages"], 1);
    assert_eq!(first.body["data"]["listing"]["has_next"], false);

    // Past the last page: empty, not an error.
    let second = app.get("/?page=2").await;
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.titles().is_empty());

    let garbage = app.get("/?page=abc").await;
    assert_eq!(garbage.status, StatusCode::OK);
    assert_eq!(garbage.body["data"]["listing"]["page"], 1);
    assert_eq!(garbage.titles().len(), 6);
}

#[tokio::test]
async fn test_edit_round_trip_keeps_created_at() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;
    app.post_form("/create", "title=Original&description=first")
        .await;
    let before = app.repo.get_item(1).await.unwrap().unwrap();

    let form = app.get("/edit/1").await;
    assert_eq!(form.status, StatusCode::OK);
    assert_eq!(form.view(), "edit");
    assert_eq!(form.body["data"]["title"], "Original");
    assert_eq!(form.body["data"]["description"], "first");

    let response = app
        .post_form("/edit/1", "title=Renamed&description=second")
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/item/1"));

    let detail = app.get("/item/1").await;
    assert_eq!(detail.body["data"]["item"]["title"], "Renamed");
    assert_eq!(detail.body["data"]["item"]["description"], "second");
    assert!(detail.notices().contains(&"Item updated.".to_string()));

    let after = app.repo.get_item(1).await.unwrap().unwrap();
    assert_eq!(after.created_at, before.created_at);
}

#[tokio::test]
async fn test_update_with_blank_title_writes_nothing() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;
    let id = app.seed_item("Untouched").await;

    let response = app
        .post_form(&format!("/edit/{}", id), "title=&description=new")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.view(), "edit");
    assert_eq!(response.body["data"]["item"]["title"], "Untouched");
    assert_eq!(response.body["data"]["description"], "new");
    assert!(response.notices().contains(&"Title is required.".to_string()));

    let stored = app.repo.get_item(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Untouched");
    assert_eq!(stored.description, None);
}

#[tokio::test]
async fn test_edit_missing_item_is_not_found() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;

    assert_eq!(app.get("/edit/999").await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.post_form("/edit/999", "title=x").await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let mut app = TestApp::new();
    app.login_as_new_admin().await;
    let id = app.seed_item("Doomed").await;

    let first = app.post_form(&format!("/delete/{}", id), "").await;
    assert_eq!(first.status, StatusCode::SEE_OTHER);
    assert_eq!(first.location.as_deref(), Some("/"));
    assert_eq!(app.repo.count_items().await.unwrap(), 0);

    let second = app.post_form(&format!("/delete/{}", id), "").await;
    assert_eq!(second.status, StatusCode::NOT_FOUND);
}
