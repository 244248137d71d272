//! Highlight endpoints.
//!
//! Both endpoints block until the run finishes and answer with the clip as
//! an MP4 attachment. The run's files are removed once the body has been
//! streamed out, or when the client goes away first.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use hclip_media::fs_utils::remove_file_best_effort;
use hclip_media::{ByteStream, StoreError};
use hclip_models::{HighlightRequest, VideoAsset};
use hclip_pipeline::{CleanupObligation, HighlightOutput, PipelineError};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const UPLOAD_CHANNEL_DEPTH: usize = 8;

/// Fields shared by both endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct HighlightForm {
    pub youtube_url: Option<String>,
    pub target_duration: Option<String>,
    pub prompt: Option<String>,
}

impl HighlightForm {
    /// Build the pipeline request; a missing or blank duration takes `default`.
    fn to_request(&self, default_duration: f64) -> ApiResult<HighlightRequest> {
        let target_duration = match self.target_duration.as_deref().map(str::trim) {
            None | Some("") => default_duration,
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| ApiError::bad_request("target_duration must be a number"))?,
        };
        Ok(HighlightRequest::new(target_duration, self.prompt.clone()))
    }
}

/// `POST /highlight/process`: multipart upload.
pub async fn process_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut form = HighlightForm::default();
    let mut input: Option<VideoAsset> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard(input.take()).await;
                return Err(ApiError::bad_request(format!("Malformed multipart body: {}", e)));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("video") if input.is_none() => {
                let file_name = field.file_name().map(str::to_string);
                input = Some(store_field(&state, field, file_name.as_deref()).await?);
            }
            Some(key @ ("target_duration" | "prompt")) => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => {
                        discard(input.take()).await;
                        return Err(ApiError::bad_request(format!("Unreadable field {}: {}", key, e)));
                    }
                };
                if key == "target_duration" {
                    form.target_duration = Some(value);
                } else {
                    form.prompt = Some(value);
                }
            }
            _ => {}
        }
    }

    let Some(input) = input else {
        return Err(PipelineError::from(StoreError::MissingFilename).into());
    };

    let request = match form.to_request(state.pipeline.config().default_target_duration) {
        Ok(request) => request,
        Err(e) => {
            discard(Some(input)).await;
            return Err(e);
        }
    };

    info!(
        input = %input.file_name(),
        original_name = input.original_name.as_deref().unwrap_or(""),
        target_duration = request.target_duration,
        "Processing uploaded video"
    );
    let output = state.pipeline.run(input, &request).await?;
    clip_response(output).await
}

/// `POST /highlight/process-url`: urlencoded form or multipart.
pub async fn process_url(State(state): State<AppState>, request: Request) -> ApiResult<Response> {
    let form = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_text_fields(multipart).await?
    } else {
        Form::<HighlightForm>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
            .0
    };

    let url = form
        .youtube_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("youtube_url is required"))?
        .to_string();
    let request = form.to_request(state.pipeline.config().default_target_duration)?;

    info!(url = %url, target_duration = request.target_duration, "Processing video URL");
    let output = state.pipeline.process_url(&url, request).await?;
    clip_response(output).await
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_text_fields(mut multipart: Multipart) -> ApiResult<HighlightForm> {
    let mut form = HighlightForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let slot = match field.name() {
            Some("youtube_url") => &mut form.youtube_url,
            Some("target_duration") => &mut form.target_duration,
            Some("prompt") => &mut form.prompt,
            _ => continue,
        };
        *slot = Some(
            field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Unreadable field: {}", e)))?,
        );
    }
    Ok(form)
}

/// Stream one multipart field into the asset store.
///
/// The field borrows the multipart body, so chunks are relayed through a
/// channel to give the store an owned stream.
async fn store_field(
    state: &AppState,
    mut field: axum::extract::multipart::Field<'_>,
    file_name: Option<&str>,
) -> ApiResult<VideoAsset> {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(UPLOAD_CHANNEL_DEPTH);
    let stream: ByteStream = Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }));

    let relay = async move {
        loop {
            let item = match field.chunk().await {
                Ok(Some(chunk)) => Ok(chunk),
                Ok(None) => break,
                Err(e) => Err(io::Error::other(e.to_string())),
            };
            let failed = item.is_err();
            // The store stopped reading
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    };

    let store = state.pipeline.store();
    let (_, stored) = tokio::join!(relay, store.store(stream, file_name));
    stored.map_err(|e| ApiError::from(PipelineError::from(e)))
}

async fn discard(input: Option<VideoAsset>) {
    if let Some(input) = input {
        if !remove_file_best_effort(input.path()).await {
            warn!(path = %input.path().display(), "Failed to remove rejected upload");
        }
    }
}

/// 200 response streaming the clip; cleanup runs once the body is done.
async fn clip_response(output: HighlightOutput) -> ApiResult<Response> {
    let HighlightOutput { clip, cleanup, .. } = output;

    let file = match tokio::fs::File::open(clip.path()).await {
        Ok(file) => file,
        Err(e) => {
            cleanup.discharge().await;
            return Err(ApiError::internal(format!(
                "Failed to open clip {}: {}",
                clip.path().display(),
                e
            )));
        }
    };
    let length = file.metadata().await.ok().map(|m| m.len());

    let disposition = format!("attachment; filename=\"{}\"", clip.file_name());
    let mut response = Body::from_stream(HandoffStream {
        inner: ReaderStream::new(file),
        cleanup: Some(cleanup),
    })
    .into_response();

    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok(response)
}

/// Body stream that discharges the run's cleanup after the last chunk.
///
/// Dropping it early (client disconnect) drops the obligation, which
/// schedules the removal itself.
struct HandoffStream {
    inner: ReaderStream<tokio::fs::File>,
    cleanup: Option<CleanupObligation>,
}

impl Stream for HandoffStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let next = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(None) = next {
            if let Some(cleanup) = this.cleanup.take() {
                tokio::spawn(async move {
                    cleanup.discharge().await;
                });
            }
        }
        next
    }
}
