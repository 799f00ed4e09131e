use actix_multipart::{Field, Multipart, MultipartError};
use bytes::BytesMut;
use futures_util::StreamExt;
use tracing::debug;

use crate::{error::RelayError, models::UploadedImage};

/// Multipart field the client sends the image in.
pub const IMAGE_FIELD: &str = "image";

/// Room for headers of extra form fields on top of the image limit.
pub const FIELD_ALLOWANCE: usize = 64 * 1024;

/// Reads the image field of a multipart upload into memory.
///
/// Only the first field called `field_name` is kept; every other field is
/// drained and dropped. The image is rejected as soon as it grows past
/// `max_bytes`, and the whole form once all fields together pass
/// `max_bytes + FIELD_ALLOWANCE`, without buffering the remainder.
pub async fn read_image(
    mut payload: Multipart,
    field_name: &str,
    max_bytes: usize,
) -> Result<UploadedImage, RelayError> {
    let mut image = None;
    let mut budget = FormBudget::new(max_bytes.saturating_add(FIELD_ALLOWANCE));

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(invalid)?;

        let disposition = field.content_disposition();
        let name = disposition.get_name().map(str::to_owned);
        let file_name = disposition.get_filename().map(str::to_owned);

        if image.is_some() || name.as_deref() != Some(field_name) {
            debug!("Skipping multipart field {name:?}");
            drain(&mut field, &mut budget).await?;
            continue;
        }

        let content_type = field.content_type().map(|mime| mime.to_string());
        let mut buffer = BytesMut::new();

        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(invalid)?;
            budget.take(data.len())?;
            if buffer.len() + data.len() > max_bytes {
                return Err(RelayError::PayloadTooLarge { limit: max_bytes });
            }
            buffer.extend_from_slice(&data);
        }

        image = Some(UploadedImage {
            bytes: buffer.freeze(),
            content_type,
            file_name,
        });
    }

    match image {
        Some(image) if !image.bytes.is_empty() => Ok(image),
        _ => Err(RelayError::MissingImage),
    }
}

struct FormBudget {
    limit: usize,
    received: usize,
}

impl FormBudget {
    fn new(limit: usize) -> Self {
        Self { limit, received: 0 }
    }

    fn take(&mut self, len: usize) -> Result<(), RelayError> {
        self.received += len;
        if self.received > self.limit {
            return Err(RelayError::UploadTooLarge { limit: self.limit });
        }
        Ok(())
    }
}

async fn drain(field: &mut Field, budget: &mut FormBudget) -> Result<(), RelayError> {
    while let Some(chunk) = field.next().await {
        budget.take(chunk.map_err(invalid)?.len())?;
    }
    Ok(())
}

fn invalid(e: MultipartError) -> RelayError {
    RelayError::InvalidUpload(e.to_string())
}
