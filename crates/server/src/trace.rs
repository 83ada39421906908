use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";
const INBOUND_TRACE_HEADERS: [&str; 2] = [TRACE_ID_HEADER, "x-request-id"];

tokio::task_local! {
    /// Trace id of the request being served on this task.
    pub static TRACE_ID: String;
}

/// Trace id for the current request, or a fresh one outside a request scope.
pub fn current_trace_id() -> String {
    TRACE_ID.try_with(|t| t.clone()).unwrap_or_else(|_| new_trace_id())
}

fn new_trace_id() -> String { Uuid::new_v4().simple().to_string() }

/// Inbound ids are echoed only when they look like ids.
fn accept_inbound(v: &str) -> bool {
    !v.is_empty() && v.len() <= 128 && v.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Outermost app middleware: pick the trace id, scope it for the request and
/// stamp it on every response.
pub async fn trace_id(req: Request, next: Next) -> Response {
    let id = INBOUND_TRACE_HEADERS
        .iter()
        .find_map(|h| req.headers().get(*h).and_then(|v| v.to_str().ok()).filter(|v| accept_inbound(v)))
        .map(str::to_string)
        .unwrap_or_else(new_trace_id);

    let span = info_span!("trace", trace_id = %id);
    let mut res = TRACE_ID.scope(id.clone(), next.run(req).instrument(span)).await;
    if let Ok(v) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(TRACE_ID_HEADER, v);
    }
    res
}
