use snafu::Snafu;

use crate::internal_sink::InternalSinkError;
use crate::queue::QueueError;
use crate::sinks::SinkError;
use crate::uploader::UploadError;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("queue error: {source}"))]
    Queue { source: QueueError },

    #[snafu(display("sink error: {source}"))]
    Sink { source: SinkError },

    #[snafu(display("configuration error: {message}"))]
    Config { message: String },

    #[snafu(display("database error: {source}"))]
    Database { source: sqlx::Error },

    #[snafu(display("internal sink error: {source}"))]
    InternalSink { source: InternalSinkError },

    #[snafu(display("upload error: {source}"))]
    Upload { source: UploadError },
}

impl From<QueueError> for Error {
    fn from(source: QueueError) -> Self {
        Error::Queue { source }
    }
}

impl From<SinkError> for Error {
    fn from(source: SinkError) -> Self {
        Error::Sink { source }
    }
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Error::Database { source }
    }
}

impl From<InternalSinkError> for Error {
    fn from(source: InternalSinkError) -> Self {
        Error::InternalSink { source }
    }
}

impl From<UploadError> for Error {
    fn from(source: UploadError) -> Self {
        Error::Upload { source }
    }
}
