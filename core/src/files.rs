use crate::error::ApiError;
use crate::invoker::{decode, Invoker};
use crate::request::{MultipartPayload, RequestDescriptor};
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const UPLOAD_FAILED: &str = "Upload failed.";
const LIST_FAILED: &str = "Failed to fetch files.";

/// A file picked for upload, with the media type its source declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, declaring `application/pdf` for `.pdf` files
    /// and `application/octet-stream` otherwise.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        let media_type = if is_pdf {
            PDF_MEDIA_TYPE
        } else {
            "application/octet-stream"
        };
        Ok(Self::new(name, media_type, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Analyzing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub media_type: Option<String>,
    pub upload_date: Option<String>,
    pub status: DocumentStatus,
    pub analysis_id: String,
    pub summary: Value,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    doc_id: Value,
    #[serde(default)]
    meta: Option<UploadMeta>,
    #[serde(default)]
    summary: Value,
}

#[derive(Debug, Default, Deserialize)]
struct UploadMeta {
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    documents: Vec<RemoteDocument>,
}

#[derive(Debug, Deserialize)]
struct RemoteDocument {
    doc_id: Value,
    #[serde(default)]
    doc_name: Option<String>,
    #[serde(default)]
    upload_date: Value,
    #[serde(default)]
    summary: Value,
}

/// Checks run before any network call, in order, stopping at the first failure.
pub fn validate_upload(file: Option<&UploadFile>) -> Result<&UploadFile, ApiError> {
    let file = file.ok_or_else(|| ApiError::validation("No file provided."))?;
    if file.media_type != PDF_MEDIA_TYPE {
        return Err(ApiError::validation("Only PDF files are allowed."));
    }
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ApiError::validation("File size must be less than 10MB."));
    }
    Ok(file)
}

#[derive(Clone)]
pub struct FileService {
    invoker: Invoker,
}

impl FileService {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    pub async fn upload_document(
        &self,
        file: Option<&UploadFile>,
        user_id: &str,
    ) -> Result<DocumentRecord, ApiError> {
        let file = validate_upload(file)?;
        let payload = MultipartPayload::new()
            .file("file", &file.name, &file.media_type, file.bytes.clone())
            .text("user_id", user_id);
        let response = self
            .invoker
            .invoke(RequestDescriptor::post("/documents/upload").multipart(payload))
            .await
            .map_err(|err| err.or_message(UPLOAD_FAILED))?;

        let UploadResponse {
            doc_id,
            meta,
            summary,
        } = decode(response)?;
        let id = id_string(doc_id);
        let name = meta
            .and_then(|meta| meta.filename)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| file.name.clone());
        tracing::info!(document_id = %id, size = file.size(), "document uploaded");
        Ok(DocumentRecord {
            analysis_id: id.clone(),
            id,
            name,
            size: file.size() as u64,
            media_type: Some(file.media_type.clone()),
            upload_date: Some(Utc::now().to_rfc3339()),
            status: DocumentStatus::Uploaded,
            summary,
        })
    }

    /// Lists the user's documents. The endpoint does not report sizes, so
    /// every record carries a size of zero.
    pub async fn list_user_documents(&self, user_id: &str) -> Result<Vec<DocumentRecord>, ApiError> {
        let path = format!("/documents/user/{}", urlencoding::encode(user_id));
        let response = self
            .invoker
            .invoke(RequestDescriptor::get(path))
            .await
            .map_err(|err| err.or_message(LIST_FAILED))?;
        let DocumentList { documents } = decode(response)?;
        Ok(documents.into_iter().map(into_record).collect())
    }
}

fn into_record(remote: RemoteDocument) -> DocumentRecord {
    let id = id_string(remote.doc_id);
    let upload_date = match remote.upload_date {
        Value::Null => None,
        Value::String(date) => Some(date),
        other => Some(other.to_string()),
    };
    DocumentRecord {
        analysis_id: id.clone(),
        id,
        name: remote.doc_name.unwrap_or_default(),
        size: 0,
        media_type: None,
        upload_date,
        status: DocumentStatus::Completed,
        summary: remote.summary,
    }
}

pub(crate) fn id_string(id: Value) -> String {
    match id {
        Value::String(id) => id,
        other => other.to_string(),
    }
}
