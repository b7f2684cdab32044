use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use reqwest::blocking::Client;
use time::OffsetDateTime;
use url::Url;

use crate::{
    error::{ContextError, ErrorKind},
    record::{GradingRecord, GradingUpdate},
};

/// The services a grading session relies on: reading documents, storing new ones and
/// keeping the grading records.
pub trait PersistenceGateway {
    /// Retrieves the bytes of the document at `url`.
    fn fetch_document(&self, url: &str) -> Result<Vec<u8>, ContextError>;

    /// Stores a new document and returns the URL it can be fetched from.
    fn upload_document(&self, file_name: &str, pdf_bytes: &[u8]) -> Result<String, ContextError>;

    fn load_record(&self, submission_id: &str) -> Result<GradingRecord, ContextError>;

    /// Persists a review and returns the record as stored.
    fn update_record(
        &self,
        submission_id: &str,
        update: &GradingUpdate,
        reviewer: &str,
        reviewed_at: OffsetDateTime,
    ) -> Result<GradingRecord, ContextError>;
}

/// A gateway keeping everything under one directory: the uploaded documents in `files/`
/// and the records in `records.json`. Documents can be fetched from `file://` URLs, plain
/// paths, or over HTTP.
#[derive(Debug, Clone)]
pub struct LocalGateway {
    storage_directory: PathBuf,
}

impl LocalGateway {
    pub fn new(storage_directory: impl Into<PathBuf>) -> Self {
        LocalGateway {
            storage_directory: storage_directory.into(),
        }
    }

    pub fn storage_directory(&self) -> &Path {
        &self.storage_directory
    }

    /// Creates the record of a new submission, refusing to overwrite an existing one.
    pub fn register_submission(
        &self,
        submission_id: &str,
        pdf_url: &str,
    ) -> Result<GradingRecord, ContextError> {
        let mut records = self.read_records()?;
        if records.contains_key(submission_id) {
            return Err(ContextError::with_context(
                ErrorKind::InvalidInput,
                format!("The submission {:?} is already registered", submission_id),
            ));
        }

        let record = GradingRecord::submitted(submission_id, pdf_url);
        records.insert(submission_id.to_string(), record.clone());
        self.write_records(&records)?;
        log::info!("Registered the submission {:?} for {}", submission_id, pdf_url);

        Ok(record)
    }

    fn files_directory(&self) -> PathBuf {
        self.storage_directory.join("files")
    }

    fn records_path(&self) -> PathBuf {
        self.storage_directory.join("records.json")
    }

    fn read_records(&self) -> Result<BTreeMap<String, GradingRecord>, ContextError> {
        let records_path = self.records_path();
        if !records_path.exists() {
            return Ok(BTreeMap::new());
        }

        let records_content = std::fs::read(&records_path).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Persistence,
                format!("Unable to read the records {:?}", records_path),
                &error,
            )
        })?;
        serde_json::from_slice(&records_content).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Persistence,
                format!("Unable to parse the records {:?}", records_path),
                &error,
            )
        })
    }

    /// Writes the records next to their final location first, so a failed write never leaves
    /// a truncated record store behind.
    fn write_records(&self, records: &BTreeMap<String, GradingRecord>) -> Result<(), ContextError> {
        let persistence_error = |context: String, error: &dyn std::error::Error| {
            ContextError::with_error(ErrorKind::Persistence, context, error)
        };

        std::fs::create_dir_all(&self.storage_directory).map_err(|error| {
            persistence_error(
                format!("Unable to create the storage directory {:?}", self.storage_directory),
                &error,
            )
        })?;
        let records_content = serde_json::to_vec_pretty(records)
            .map_err(|error| persistence_error("Unable to serialize the records".into(), &error))?;

        let records_path = self.records_path();
        let swap_path = records_path.with_extension("json.swp");
        std::fs::write(&swap_path, records_content).map_err(|error| {
            persistence_error(format!("Unable to write the records {:?}", swap_path), &error)
        })?;
        std::fs::rename(&swap_path, &records_path).map_err(|error| {
            persistence_error(format!("Unable to replace the records {:?}", records_path), &error)
        })
    }
}

impl PersistenceGateway for LocalGateway {
    fn fetch_document(&self, url: &str) -> Result<Vec<u8>, ContextError> {
        match Url::parse(url) {
            Ok(parsed_url) if parsed_url.scheme() == "file" => {
                let path = parsed_url.to_file_path().map_err(|_| {
                    ContextError::with_context(
                        ErrorKind::Transport,
                        format!("The URL {:?} is not a valid file path", url),
                    )
                })?;
                read_file(&path)
            }
            Ok(parsed_url) if matches!(parsed_url.scheme(), "http" | "https") => {
                fetch_over_http(parsed_url)
            }
            // Windows drive letters parse as single letter schemes
            Ok(parsed_url) if parsed_url.scheme().len() > 1 => Err(ContextError::with_context(
                ErrorKind::Transport,
                format!("Unsupported scheme {:?} in {:?}", parsed_url.scheme(), url),
            )),
            _ => read_file(Path::new(url)),
        }
    }

    fn upload_document(&self, file_name: &str, pdf_bytes: &[u8]) -> Result<String, ContextError> {
        let files_directory = self.files_directory();
        std::fs::create_dir_all(&files_directory).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Transport,
                format!("Unable to create the files directory {:?}", files_directory),
                &error,
            )
        })?;

        // Every upload gets its own file, the way a remote storage hands out a new URL per upload
        let file_path = files_directory.join(unique_file_name(file_name));
        std::fs::write(&file_path, pdf_bytes).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Transport,
                format!("Unable to write the document {:?}", file_path),
                &error,
            )
        })?;
        log::info!("Stored {} bytes in {:?}", pdf_bytes.len(), file_path);

        file_url(&file_path)
    }

    fn load_record(&self, submission_id: &str) -> Result<GradingRecord, ContextError> {
        self.read_records()?.remove(submission_id).ok_or_else(|| {
            ContextError::with_context(
                ErrorKind::NotFound,
                format!("Unable to find the submission {:?}", submission_id),
            )
        })
    }

    fn update_record(
        &self,
        submission_id: &str,
        update: &GradingUpdate,
        reviewer: &str,
        reviewed_at: OffsetDateTime,
    ) -> Result<GradingRecord, ContextError> {
        let mut records = self.read_records()?;
        let record = records.get_mut(submission_id).ok_or_else(|| {
            ContextError::with_context(
                ErrorKind::NotFound,
                format!("Unable to find the submission {:?}", submission_id),
            )
        })?;
        record.apply(update, reviewer, reviewed_at);
        let record = record.clone();

        self.write_records(&records)?;
        Ok(record)
    }
}

/// Converts a path into an absolute `file://` URL.
pub fn file_url(path: &Path) -> Result<String, ContextError> {
    let absolute_path = std::fs::canonicalize(path).map_err(|error| {
        ContextError::with_error(
            ErrorKind::Transport,
            format!("Unable to resolve the path {:?}", path),
            &error,
        )
    })?;
    Url::from_file_path(&absolute_path)
        .map(String::from)
        .map_err(|_| {
            ContextError::with_context(
                ErrorKind::Transport,
                format!("Unable to express {:?} as a URL", absolute_path),
            )
        })
}

fn read_file(path: &Path) -> Result<Vec<u8>, ContextError> {
    std::fs::read(path).map_err(|error| {
        ContextError::with_error(
            ErrorKind::Transport,
            format!("Unable to read the document {:?}", path),
            &error,
        )
    })
}

fn fetch_over_http(url: Url) -> Result<Vec<u8>, ContextError> {
    let transport_error = |error: reqwest::Error| {
        ContextError::with_error(ErrorKind::Transport, "Unable to download the document", &error)
    };

    let client = Client::builder()
        .user_agent(concat!("gradeink/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(transport_error)?;
    let response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(transport_error)?;
    let pdf_bytes = response.bytes().map_err(transport_error)?;

    Ok(pdf_bytes.to_vec())
}

/// Keeps the name safe for the file system and makes it unique with the current time.
fn unique_file_name(file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|character| match character {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => character,
            _ => '_',
        })
        .collect();
    let path = Path::new(&sanitized);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("document");
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or("pdf");

    format!(
        "{}-{}.{}",
        stem,
        OffsetDateTime::now_utc().unix_timestamp_nanos(),
        extension
    )
}
