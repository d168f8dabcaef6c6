use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::client::storage::{ObjectStore, ObjectSummary, StagedUpload, StorageError};
use crate::types::transfer::BlockId;

/// S3 caps multipart uploads at this many parts.
const MAX_PART_NUMBER: u64 = 10_000;

/// Object store backed by an S3 bucket. Staged uploads are multipart uploads and
/// every block is one part, numbered after its block index.
#[derive(Clone, Debug)]
pub struct AWSS3 {
    pub(crate) client: Arc<Client>,
    bucket_name: String,
    region: Option<String>,
}

impl AWSS3 {
    /// Creates a new instance of AWSS3 for `bucket_identifier`, a bucket name or ARN.
    /// A region embedded in the ARN overrides the one of `aws_config`.
    pub fn new(aws_config: &SdkConfig, bucket_identifier: &str) -> Result<Self, StorageError> {
        let (bucket_name, region) = Self::parse_bucket_identifier(bucket_identifier);
        if bucket_name.is_empty() {
            return Err(StorageError::InvalidBucketName(bucket_identifier.to_string()));
        }

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(aws_config);
        if let Some(region) = &region {
            s3_config_builder = s3_config_builder.region(Region::new(region.clone()));
        }
        s3_config_builder = s3_config_builder.use_arn_region(true).force_path_style(true);

        let client = Client::from_conf(s3_config_builder.build());
        Ok(Self { client: Arc::new(client), bucket_name, region })
    }

    /// Parse a bucket identifier (name or ARN) into bucket name and optional region
    pub(crate) fn parse_bucket_identifier(identifier: &str) -> (String, Option<String>) {
        let Some(arn) = identifier.strip_prefix("arn:aws:s3:") else {
            return (identifier.to_string(), None);
        };

        // region:account:resource
        let parts: Vec<&str> = arn.splitn(3, ':').collect();
        if parts.len() < 3 {
            return (identifier.to_string(), None);
        }
        let region = Some(parts[0]).filter(|region| !region.is_empty()).map(str::to_string);
        let resource = parts[2];
        let bucket_name = match resource.split_once('/') {
            Some(("bucket", name)) if !name.is_empty() => name.to_string(),
            _ => resource.to_string(),
        };
        (bucket_name, region)
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Returns the region extracted from ARN, if available
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub(crate) fn part_number(block_id: &BlockId) -> Result<i32, StorageError> {
        block_id
            .index()
            .and_then(|index| index.checked_add(1))
            .filter(|number| *number <= MAX_PART_NUMBER)
            .and_then(|number| i32::try_from(number).ok())
            .ok_or_else(|| StorageError::InvalidBlockId(block_id.to_string()))
    }

    /// ETags of every uploaded part, keyed by part number.
    async fn uploaded_parts(&self, upload: &StagedUpload) -> Result<HashMap<i32, String>, StorageError> {
        let mut parts = HashMap::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_parts()
                .bucket(&self.bucket_name)
                .key(&upload.key)
                .upload_id(&upload.upload_id)
                .set_part_number_marker(marker.take())
                .send()
                .await?;

            for part in output.parts() {
                if let (Some(number), Some(e_tag)) = (part.part_number(), part.e_tag()) {
                    parts.insert(number, e_tag.to_string());
                }
            }

            match (output.is_truncated(), output.next_part_number_marker()) {
                (Some(true), Some(next)) => marker = Some(next.to_string()),
                _ => return Ok(parts),
            }
        }
    }
}

#[async_trait]
impl ObjectStore for AWSS3 {
    async fn begin_staged_upload(&self, key: &str) -> Result<StagedUpload, StorageError> {
        let output = self.client.create_multipart_upload().bucket(&self.bucket_name).key(key).send().await?;
        let upload_id = output.upload_id().ok_or_else(|| StorageError::MissingUploadId(key.to_string()))?;
        debug!(key = %key, upload_id = %upload_id, "Started multipart upload");
        Ok(StagedUpload { key: key.to_string(), upload_id: upload_id.to_string() })
    }

    async fn put_staged_block(
        &self,
        upload: &StagedUpload,
        block_id: &BlockId,
        data: Bytes,
    ) -> Result<(), StorageError> {
        let part_number = Self::part_number(block_id)?;
        self.client
            .upload_part()
            .bucket(&self.bucket_name)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn commit_blocks(&self, upload: &StagedUpload, block_ids: &[BlockId]) -> Result<(), StorageError> {
        // S3 refuses to complete a multipart upload without parts.
        if block_ids.is_empty() {
            self.abort_staged_upload(upload).await?;
            return self.put_object(&upload.key, Bytes::new()).await;
        }

        let mut uploaded = self.uploaded_parts(upload).await?;
        let parts = block_ids
            .iter()
            .map(|block_id| {
                let part_number = Self::part_number(block_id)?;
                let e_tag =
                    uploaded.remove(&part_number).ok_or_else(|| StorageError::MissingBlock(block_id.to_string()))?;
                Ok(CompletedPart::builder().part_number(part_number).e_tag(e_tag).build())
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        if !uploaded.is_empty() {
            warn!(key = %upload.key, extra_parts = uploaded.len(), "Committing upload with uncommitted parts");
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket_name)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await?;
        Ok(())
    }

    async fn abort_staged_upload(&self, upload: &StagedUpload) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket_name)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await?;
        Ok(())
    }

    async fn object_length(&self, key: &str) -> Result<u64, StorageError> {
        let output = match self.client.head_object().bucket(&self.bucket_name).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                return Err(StorageError::ObjectNotFound(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(output.content_length().and_then(|length| u64::try_from(length).ok()).unwrap_or_default())
    }

    async fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Bytes, StorageError> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let output = self.client.get_object().bucket(&self.bucket_name).key(key).range(range).send().await?;
        let data = output.body.collect().await.map_err(|e| StorageError::ObjectStreamError(e.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await?;

            objects.extend(output.contents().iter().filter_map(|object| {
                let key = object.key()?;
                // folder placeholders
                if key.ends_with('/') {
                    return None;
                }
                let size = object.size().and_then(|size| u64::try_from(size).ok()).unwrap_or_default();
                Some(ObjectSummary { key: key.to_string(), size })
            }));

            match (output.is_truncated(), output.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => return Ok(objects),
            }
        }
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.client.put_object().bucket(&self.bucket_name).key(key).body(data.into()).send().await?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket_name, key)
    }
}
