use crate::error::{AppError, Result};
use crate::model::{CreatedLink, SubmitForm};
use crate::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};
use tracing::info;

/// Header carrying the identity established by the authenticating proxy.
pub const OWNER_HEADER: &str = "x-authenticated-user";

pub async fn submit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SubmitForm>,
) -> Result<(StatusCode, Json<CreatedLink>)> {
    let owner = headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .ok_or(AppError::Unauthenticated)?;

    let short_link = state.store().add_url(&form.url, owner).await?;
    info!(short_link = %short_link, owner, "Created short link");

    Ok((
        StatusCode::CREATED,
        Json(CreatedLink {
            short_link,
            url: form.url,
        }),
    ))
}
