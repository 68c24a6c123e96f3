use axum::routing::get;

pub const LIVENESS_BODY: &str = "Bot is alive!";

pub fn router() -> axum::Router {
    axum::Router::new().route("/", get(get_liveness))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_liveness() -> &'static str {
    LIVENESS_BODY
}
