use crate::state::{AppState, NUM_NOTFOUNDS, NUM_REDIRECTS, NUM_REQUESTS};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use shortn_core::ShortCode;
use tracing::{debug, warn};

/// Requests for the bare root carry no code and get an empty answer.
pub async fn index_handler(State(state): State<AppState>) -> StatusCode {
    state.counters().add(NUM_REQUESTS, 1);
    StatusCode::OK
}

/// Redirects `/{code}` to its destination.
///
/// Unknown codes, malformed codes, failed lookups and stored URLs that
/// cannot be sent as a `Location` header all answer 404.
pub async fn redirect_handler(
    Path(segment): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let counters = state.counters();
    counters.add(NUM_REQUESTS, 1);

    let Ok(code) = ShortCode::parse(segment) else {
        counters.add(NUM_NOTFOUNDS, 1);
        return not_found(None);
    };

    let destination = match state.store().lookup_url(&code).await {
        Ok(destination) => destination,
        Err(e) => {
            debug!(code = %code, error = %e, "Lookup failed, answering not found");
            None
        }
    };

    let location = destination.and_then(|url| {
        HeaderValue::try_from(url.as_str())
            .inspect_err(|e| {
                warn!(code = %code, error = %e, "Stored URL is not a valid header value");
            })
            .ok()
    });

    match location {
        Some(location) => {
            counters.add(NUM_REDIRECTS, 1);
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        None => {
            counters.add(NUM_NOTFOUNDS, 1);
            not_found(Some(&code))
        }
    }
}

fn not_found(code: Option<&ShortCode>) -> Response {
    let detail = match code {
        Some(code) => format!("There is no link called <code>{code}</code>."),
        None => "That is not a valid short link.".to_string(),
    };
    let body = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Link not found</title></head>\n\
         <body>\n<h1>Link not found</h1>\n<p>{detail}</p>\n</body>\n</html>\n"
    );
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}
