use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::job::JobError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableStep {
    pub path: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl ExecutableStep {
    pub fn new(path: impl Into<String>, arguments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { path: path.into(), arguments: arguments.into_iter().map(Into::into).collect() }
    }
}

/// Unit of work carried by one queue message.
///
/// File lists are relative to the worker's scratch directory and double as the
/// object keys below the data and output prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(default)]
    pub steps: Vec<ExecutableStep>,
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default)]
    pub output_files: Vec<String>,
    #[serde(default)]
    pub files_to_remove: Vec<String>,
}

impl JobDescriptor {
    pub fn to_message(&self) -> Result<String, JobError> {
        serde_json::to_string(self).map_err(JobError::Encode)
    }

    /// Decodes and validates a queue message body.
    pub fn from_message(body: &str) -> Result<Self, JobError> {
        let descriptor: Self = serde_json::from_str(body).map_err(JobError::MalformedMessage)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Every file path must stay inside the scratch directory.
    pub fn validate(&self) -> Result<(), JobError> {
        self.input_files
            .iter()
            .chain(&self.output_files)
            .chain(&self.files_to_remove)
            .try_for_each(|file| ensure_relative(file))
    }
}

pub(crate) fn ensure_relative(file: &str) -> Result<(), JobError> {
    let path = Path::new(file);
    let escapes = path.components().any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if file.is_empty() || escapes {
        return Err(JobError::UnsafePath(file.to_string()));
    }
    Ok(())
}
