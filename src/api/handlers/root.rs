use axum::response::IntoResponse;

// Plain banner for load balancers and the curious.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
