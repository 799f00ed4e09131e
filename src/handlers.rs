use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    error::RelayError,
    models::HealthResponse,
    state::AppState,
    upload::{read_image, IMAGE_FIELD},
};

const INDEX_HTML: &str = include_str!("../static/index.html");

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse { ok: true })
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

pub async fn classify(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, RelayError> {
    let span = info_span!("classify", request_id = %Uuid::new_v4());

    async move {
        let image = read_image(payload, IMAGE_FIELD, state.config.max_upload_bytes)
            .await
            .inspect_err(|e| warn!("Rejected upload: {e}"))?;

        info!(
            "Received {:?} ({} bytes)",
            image.file_name.as_deref().unwrap_or("unnamed"),
            image.bytes.len()
        );

        let result = state.upstream.predict(image).await?;

        match result.top() {
            Some(top) => info!(
                "Top prediction: {} ({}) out of {}",
                top.tag_name,
                top.percentage(),
                result.predictions.len()
            ),
            None => info!("Upstream returned no predictions"),
        }

        Ok::<_, RelayError>(HttpResponse::Ok().json(result))
    }
    .instrument(span)
    .await
}
