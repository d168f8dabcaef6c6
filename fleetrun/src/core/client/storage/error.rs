use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadError;
use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadError;
use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::operation::list_parts::ListPartsError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::operation::upload_part::UploadPartError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),
    #[error("Unknown staged upload: {0}")]
    UnknownUpload(String),
    #[error("Block {0} was never staged")]
    MissingBlock(String),
    #[error("Block id {0} cannot be mapped to a part number")]
    InvalidBlockId(String),
    #[error("Storage did not return an upload id for {0}")]
    MissingUploadId(String),
    #[error("Failed to stream object: {0}")]
    ObjectStreamError(String),
    #[error("Invalid Bucket Name is given: {0}")]
    InvalidBucketName(String),
    /// AWS S3 errors
    #[error("Failed to create multipart upload: {0}")]
    CreateMultipartUploadError(#[from] SdkError<CreateMultipartUploadError>),
    #[error("Failed to upload part: {0}")]
    UploadPartError(#[from] SdkError<UploadPartError>),
    #[error("Failed to list parts: {0}")]
    ListPartsError(#[from] SdkError<ListPartsError>),
    #[error("Failed to complete multipart upload: {0}")]
    CompleteMultipartUploadError(#[from] SdkError<CompleteMultipartUploadError>),
    #[error("Failed to abort multipart upload: {0}")]
    AbortMultipartUploadError(#[from] SdkError<AbortMultipartUploadError>),
    #[error("Failed to head object: {0}")]
    HeadObjectError(#[from] SdkError<HeadObjectError>),
    #[error("Failed to get data from S3: {0}")]
    GetObjectError(#[from] SdkError<GetObjectError>),
    #[error("Failed to list objects: {0}")]
    ListObjectsError(#[from] SdkError<ListObjectsV2Error>),
    #[error("Failed to put object : {0}")]
    UnableToPutObject(#[from] SdkError<PutObjectError>),
}
