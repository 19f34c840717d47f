// Axum adapter: the only async code in the crate. The engine's `respond`
// stays synchronous; this module converts requests and responses at the
// edge.
use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Json, Path, Query};
use axum::http::{Method as HttpMethod, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Extension, Router};
use serde_json::Value;

use crate::endpoint::{ApiResponse, Caller, Endpoint, Request, Serializer};

impl<S: Serializer> Endpoint<S> {
    /// Mount this endpoint at `path` (axum syntax, e.g. `/todos/:id`).
    ///
    /// Every HTTP method is routed; the dispatcher answers 405 for verbs
    /// the endpoint config does not bind. An authenticated caller is read
    /// from a [`Caller`] request extension when auth middleware provides
    /// one.
    pub fn into_router(self, path: &str) -> Router {
        let endpoint = Arc::new(self);
        let handler = move |method: HttpMethod,
                            path_params: Option<Path<HashMap<String, String>>>,
                            Query(query_params): Query<Vec<(String, String)>>,
                            caller: Option<Extension<Caller>>,
                            body: Option<Json<Value>>| {
            let endpoint = endpoint.clone();
            async move {
                let mut request = Request::new(method.as_str());
                if let Some(Path(params)) = path_params {
                    for (name, value) in params {
                        request = request.with_path_param(name, value);
                    }
                }
                for (name, value) in query_params {
                    request = request.with_query_param(name, value);
                }
                if let Some(Extension(caller)) = caller {
                    request = request.with_caller(caller);
                }
                if let Some(Json(data)) = body {
                    request = request.with_data(data);
                }

                match endpoint.respond(request) {
                    Ok(response) => to_response(response),
                    Err(err) => {
                        tracing::error!(endpoint = %endpoint.name(), error = %err,
                            "endpoint contract violation");
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }
            }
        };
        Router::new().route(path, any(handler))
    }
}

fn to_response(response: ApiResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if response.body.is_null() {
        status.into_response()
    } else {
        (status, Json(response.body)).into_response()
    }
}

/// Bind and serve until shutdown.
pub async fn serve(router: Router, port: u16) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
