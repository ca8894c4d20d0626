use skein_core::model::RecordId;
use skein_ingest::IngestError;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
}
