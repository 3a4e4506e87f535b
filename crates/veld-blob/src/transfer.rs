//! Shared object transfer plumbing.
//!
//! Downloads pull objects in 10 MiB ranged parts so a band raster never has
//! to fit in memory at once; uploads above one part go through a multipart
//! upload. Both buckets' adapters use these helpers.

use std::path::Path;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use veld_core::error::{Error, Result};

/// Transfer part size: 10 MiB.
pub(crate) const PART_SIZE: i64 = 10 * 1024 * 1024;

/// Downloads an object to a local file in ranged parts.
///
/// Returns the number of bytes written. A missing key surfaces as
/// [`Error::NotFound`].
pub(crate) async fn download_to_file(
    client: &Client,
    bucket: &str,
    key: &str,
    local_path: &Path,
) -> Result<u64> {
    let head = client
        .head_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|err| {
            let service_err = err.into_service_error();
            if service_err.is_not_found() {
                Error::NotFound(format!("object not found: {bucket}/{key}"))
            } else {
                Error::blob_with_source(format!("head {bucket}/{key}"), service_err)
            }
        })?;
    let total = head.content_length().unwrap_or(0);

    let mut file = tokio::fs::File::create(local_path).await?;
    let mut offset: i64 = 0;
    while offset < total {
        let end = (offset + PART_SIZE - 1).min(total - 1);
        let part = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={offset}-{end}"))
            .send()
            .await
            .map_err(|err| {
                Error::blob_with_source(format!("get {bucket}/{key}"), err.into_service_error())
            })?;
        let bytes = part
            .body
            .collect()
            .await
            .map_err(|err| Error::blob_with_source(format!("read {bucket}/{key}"), err))?
            .into_bytes();
        file.write_all(&bytes).await?;
        offset = end + 1;
    }
    file.flush().await?;

    Ok(u64::try_from(total).unwrap_or(0))
}

/// Uploads a local file, switching to a multipart upload above one part.
pub(crate) async fn upload_file(
    client: &Client,
    bucket: &str,
    key: &str,
    local_path: &Path,
) -> Result<()> {
    let size = i64::try_from(tokio::fs::metadata(local_path).await?.len())
        .map_err(|_| Error::blob(format!("file too large to upload: {}", local_path.display())))?;

    if size <= PART_SIZE {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|err| Error::blob_with_source("open upload body", err))?;
        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                Error::blob_with_source(format!("put {bucket}/{key}"), err.into_service_error())
            })?;
        return Ok(());
    }

    let created = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|err| {
            Error::blob_with_source(
                format!("create multipart {bucket}/{key}"),
                err.into_service_error(),
            )
        })?;
    let upload_id = created
        .upload_id()
        .ok_or_else(|| Error::blob("multipart upload returned no id"))?
        .to_string();

    match upload_parts(client, bucket, key, &upload_id, local_path, size).await {
        Ok(parts) => {
            client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .map_err(|err| {
                    Error::blob_with_source(
                        format!("complete multipart {bucket}/{key}"),
                        err.into_service_error(),
                    )
                })?;
            Ok(())
        }
        Err(err) => {
            // Drop the partial upload so the bucket does not accumulate
            // orphaned parts; the original error is the one worth surfacing.
            if let Err(abort_err) = client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(
                    bucket = bucket,
                    key = key,
                    error = %aws_sdk_s3::error::DisplayErrorContext(&abort_err),
                    "failed to abort multipart upload"
                );
            }
            Err(err)
        }
    }
}

async fn upload_parts(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    local_path: &Path,
    size: i64,
) -> Result<Vec<CompletedPart>> {
    let mut file = tokio::fs::File::open(local_path).await?;
    let mut parts = Vec::new();
    let mut remaining = size;
    let mut part_number = 1;

    while remaining > 0 {
        let this_part = remaining.min(PART_SIZE);
        let mut buffer = vec![0u8; usize::try_from(this_part).unwrap_or_default()];
        file.read_exact(&mut buffer).await?;

        let uploaded = client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(buffer))
            .send()
            .await
            .map_err(|err| {
                Error::blob_with_source(
                    format!("upload part {part_number} of {bucket}/{key}"),
                    err.into_service_error(),
                )
            })?;

        parts.push(
            CompletedPart::builder()
                .set_e_tag(uploaded.e_tag().map(str::to_string))
                .part_number(part_number)
                .build(),
        );
        remaining -= this_part;
        part_number += 1;
    }

    Ok(parts)
}
