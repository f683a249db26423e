use std::{fmt::Display, future::Future, net::SocketAddr};

use axum::{Router, http::StatusCode, response::IntoResponse};
use common::BoxResult;
use serde_json::json;

pub type BoxRequestError = Box<dyn RequestError>;

/// Error type for HTTP request handlers.
///
/// Implementors map each error variant to a stable machine-readable code and
/// an HTTP status; the JSON body is rendered uniformly by the blanket
/// [`IntoResponse`] impl on [`BoxRequestError`].
pub trait RequestError: Display + Send + Sync + 'static {
    fn error_code(&self) -> &'static str;
    fn status_code(&self) -> StatusCode;
}

impl IntoResponse for BoxRequestError {
    fn into_response(self) -> axum::response::Response {
        let res = json!({
            "error_code": self.error_code(),
            "error_message": self.to_string(),
        });

        (self.status_code(), res.to_string()).into_response()
    }
}

impl<E: RequestError> From<E> for BoxRequestError {
    fn from(e: E) -> Self {
        Box::new(e)
    }
}

/// Binds the given address and returns the bound address together with a
/// future that serves the router until the listener fails.
pub async fn serve_at(
    at: SocketAddr,
    app: Router,
) -> BoxResult<(SocketAddr, impl Future<Output = BoxResult<()>>)> {
    let listener = tokio::net::TcpListener::bind(at).await?;
    let local_addr = listener.local_addr()?;
    let fut = async move {
        axum::serve(listener, app).await?;
        Ok(())
    };
    Ok((local_addr, fut))
}
