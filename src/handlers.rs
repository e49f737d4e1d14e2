use crate::{
    AppState,
    auth::{AdminSession, AuthContext},
    credentials::CredentialError,
    error::AppError,
    flash::{Flash, Notice},
    items::ItemError,
    models::{CredentialsForm, ItemForm, ItemId, ListQuery},
    views::Reply,
};
use axum::{
    Form,
    extract::{FromRequestParts, Path, Query, State, rejection::QueryRejection},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use serde_json::json;

/// Fixed page size of the public listing.
pub const ITEMS_PER_PAGE: u32 = 6;

// --- Extractors ---

/// ItemPath
///
/// The `{id}` path segment of item routes. A segment that is not an integer can
/// never name an item, so it is a 404 rather than a 400.
#[derive(Debug, Clone, Copy)]
pub struct ItemPath(pub ItemId);

impl<S> FromRequestParts<S> for ItemPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<ItemId>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| ItemPath(id))
            .map_err(|_| AppError::NotFound)
    }
}

// --- Admin Account Handlers ---

/// register_form
///
/// [Public Route] Empty registration form.
pub async fn register_form(flash: Flash) -> Reply {
    Reply::view("admin_register", json!({ "username": "" })).with_flash(flash)
}

/// register
///
/// [Public Route] Creates an admin account, then sends the client to the login
/// form. Blank fields and taken usernames re-render the form with the username
/// that was typed.
pub async fn register(
    State(state): State<AppState>,
    flash: Flash,
    Form(form): Form<CredentialsForm>,
) -> Result<Reply, AppError> {
    let rerender = |message: &str| {
        Reply::view("admin_register", json!({ "username": form.username.trim() }))
            .with_flash(flash.clone())
            .notice(Notice::error(message))
    };

    match state.credentials.register(&form.username, &form.password).await {
        Ok(_) => Ok(Reply::redirect("/admin/login")
            .notice(Notice::success("Admin registered successfully."))),
        Err(CredentialError::InvalidInput) => Ok(rerender("Username and password required.")),
        Err(CredentialError::DuplicateUsername) => Ok(rerender("Username already taken.")),
        Err(e) => Err(e.into()),
    }
}

/// login_form
///
/// [Public Route] Empty login form. Reachable while anonymous by design.
pub async fn login_form(flash: Flash) -> Reply {
    Reply::view("admin_login", json!({ "username": "" })).with_flash(flash)
}

/// login
///
/// [Public Route] Verifies the credentials and, on success, begins a session by
/// attaching the signed session cookie. Unknown usernames and wrong passwords
/// get the same notice.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    flash: Flash,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Reply), AppError> {
    match state.credentials.authenticate(&form.username, &form.password).await {
        Ok(admin_id) => {
            let token = state.sessions.begin(admin_id)?;
            tracing::info!(admin_id, "admin logged in");
            Ok((
                state.sessions.attach(jar, token),
                Reply::redirect("/").notice(Notice::success("Logged in successfully.")),
            ))
        }
        Err(CredentialError::InvalidCredentials) => {
            tracing::warn!(username = %form.username.trim(), "failed admin login");
            Ok((
                jar,
                Reply::view("admin_login", json!({ "username": form.username.trim() }))
                    .with_flash(flash)
                    .notice(Notice::error("Invalid username or password.")),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// logout
///
/// [Public Route] Ends the session. Safe to call without one.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Reply) {
    (
        state.sessions.end(jar),
        Reply::redirect("/").notice(Notice::info("Logged out.")),
    )
}

// --- Public Item Handlers ---

/// list_items
///
/// [Public Route] Newest-first listing, `ITEMS_PER_PAGE` per page. A page past
/// the end renders an empty listing instead of failing.
pub async fn list_items(
    State(state): State<AppState>,
    auth: AuthContext,
    flash: Flash,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Reply, AppError> {
    let page = query.map(|Query(q)| q.page()).unwrap_or(1);
    let listing = state.items.list(page, ITEMS_PER_PAGE).await?;

    Ok(Reply::view(
        "list",
        json!({ "listing": listing, "admin": auth.is_authenticated() }),
    )
    .with_flash(flash))
}

/// item_detail
///
/// [Public Route] A single item, or the 404 view.
pub async fn item_detail(
    State(state): State<AppState>,
    auth: AuthContext,
    flash: Flash,
    ItemPath(id): ItemPath,
) -> Result<Reply, AppError> {
    let item = state.items.get(id).await?;
    Ok(Reply::view("detail", json!({ "item": item, "admin": auth.is_authenticated() }))
        .with_flash(flash))
}

// --- Protected Item Handlers ---

/// create_form
///
/// [Protected Route] Empty item form.
pub async fn create_form(_admin: AdminSession, flash: Flash) -> Reply {
    Reply::view("create", json!({ "title": "", "description": "" })).with_flash(flash)
}

/// create_item
///
/// [Protected Route] Creates an item and returns to the listing. A blank title
/// re-renders the form with what was entered.
pub async fn create_item(
    admin: AdminSession,
    State(state): State<AppState>,
    flash: Flash,
    Form(form): Form<ItemForm>,
) -> Result<Reply, AppError> {
    match state
        .items
        .create(&form.title, form.description.as_deref())
        .await
    {
        Ok(item) => {
            tracing::info!(admin_id = admin.id, item_id = item.id, "item created");
            Ok(Reply::redirect("/").notice(Notice::success("Item created successfully.")))
        }
        Err(ItemError::InvalidInput) => Ok(Reply::view("create", form_values(&form))
            .with_flash(flash)
            .notice(Notice::error("Title is required."))),
        Err(e) => Err(e.into()),
    }
}

/// edit_form
///
/// [Protected Route] Item form pre-filled with the stored values.
pub async fn edit_form(
    _admin: AdminSession,
    State(state): State<AppState>,
    flash: Flash,
    ItemPath(id): ItemPath,
) -> Result<Reply, AppError> {
    let item = state.items.get(id).await?;
    let description = item.description.clone().unwrap_or_default();
    Ok(Reply::view(
        "edit",
        json!({ "item": item, "title": item.title, "description": description }),
    )
    .with_flash(flash))
}

/// update_item
///
/// [Protected Route] Rewrites title and description, then shows the item.
/// Missing items are a 404 before any validation happens.
pub async fn update_item(
    admin: AdminSession,
    State(state): State<AppState>,
    flash: Flash,
    ItemPath(id): ItemPath,
    Form(form): Form<ItemForm>,
) -> Result<Reply, AppError> {
    let item = state.items.get(id).await?;

    match state
        .items
        .update(id, &form.title, form.description.as_deref())
        .await
    {
        Ok(updated) => {
            tracing::info!(admin_id = admin.id, item_id = updated.id, "item updated");
            Ok(Reply::redirect(format!("/item/{}", updated.id)).notice(Notice::success("Item updated.")))
        }
        Err(ItemError::InvalidInput) => {
            let mut data = form_values(&form);
            data["item"] = json!(item);
            Ok(Reply::view("edit", data)
                .with_flash(flash)
                .notice(Notice::error("Title is required.")))
        }
        Err(e) => Err(e.into()),
    }
}

/// delete_item
///
/// [Protected Route] Removes an item; a second delete of the same id is a 404.
pub async fn delete_item(
    admin: AdminSession,
    State(state): State<AppState>,
    ItemPath(id): ItemPath,
) -> Result<Reply, AppError> {
    state.items.delete(id).await?;
    tracing::info!(admin_id = admin.id, item_id = id, "item deleted");
    Ok(Reply::redirect("/").notice(Notice::info("Item deleted.")))
}

/// not_found
///
/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Submitted form values, trimmed, for re-rendering a rejected form.
fn form_values(form: &ItemForm) -> serde_json::Value {
    json!({
        "title": form.title.trim(),
        "description": form.description.as_deref().map(str::trim).unwrap_or_default(),
    })
}
