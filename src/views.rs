use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::Value;

use crate::flash::{DeferredNotices, Flash, Notice, NoticesShown};

/// Reply
///
/// What a handler produces: either a named view with its data, or a redirect,
/// plus the notices to surface. Rendering the view is left to whatever sits in
/// front of this service; here a view is serialized as a JSON document:
///
/// ```json
/// { "view": "edit", "data": { "title": "" }, "notices": [{ "level": "error", "message": "Title is required." }] }
/// ```
#[derive(Debug)]
pub struct Reply {
    target: Target,
    notices: Vec<Notice>,
    consumed_flash: bool,
}

#[derive(Debug)]
enum Target {
    View {
        name: &'static str,
        status: StatusCode,
        data: Value,
    },
    Redirect(String),
}

#[derive(Serialize)]
struct ViewDocument<'a> {
    view: &'a str,
    data: &'a Value,
    notices: &'a [Notice],
}

impl Reply {
    pub fn view(name: &'static str, data: Value) -> Self {
        Self {
            target: Target::View {
                name,
                status: StatusCode::OK,
                data,
            },
            notices: Vec::new(),
            consumed_flash: false,
        }
    }

    /// A `303 See Other` redirect. Notices attached to it are shown on the page
    /// the client lands on.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            target: Target::Redirect(location.into()),
            notices: Vec::new(),
            consumed_flash: false,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        if let Target::View { status: current, .. } = &mut self.target {
            *current = status;
        }
        self
    }

    pub fn notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }

    /// Shows the pending flash notices ahead of this reply's own notices.
    pub fn with_flash(mut self, flash: Flash) -> Self {
        let mut notices = flash.into_notices();
        notices.append(&mut self.notices);
        self.notices = notices;
        self.consumed_flash = true;
        self
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.target {
            Target::View { name, status, data } => {
                let document = ViewDocument {
                    view: name,
                    data: &data,
                    notices: &self.notices,
                };
                let mut response = (status, Json(document)).into_response();
                if self.consumed_flash {
                    response.extensions_mut().insert(NoticesShown);
                }
                response
            }
            Target::Redirect(location) => {
                let mut response = Redirect::to(&location).into_response();
                if !self.notices.is_empty() {
                    response
                        .extensions_mut()
                        .insert(DeferredNotices(self.notices));
                }
                response
            }
        }
    }
}
