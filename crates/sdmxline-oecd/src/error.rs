//! Error taxonomy for decoding and materializing SDMX-JSON datasets

use std::path::PathBuf;

use sdmxline_core::RowError;

/// Everything that can go wrong between the dataflow fetch and a finished record.
///
/// [`Error::is_fatal`] splits the taxonomy: fatal errors abort the whole
/// dataset retrieval, the rest fail one partition or one series.
#[derive(Debug)]
pub enum Error {
    /// A required array/object is absent from a document
    MissingSection { section: String },
    /// First observation dimension of a data payload is not `TIME_PERIOD`
    TimeDimensionMissing { found: Option<String> },
    /// Positional index (or id) with no codelist entry
    UnresolvedCode { key: String, code: String },
    /// Period label does not match its frequency's lexical form
    MalformedPeriod { period: String, frequency: String },
    /// Series frequency outside the supported set
    RejectFrequency {
        provider: String,
        dataset: String,
        frequency: String,
    },
    /// Series without observations (no start/end date)
    EmptySeries { key: String },
    /// 4xx on one partition
    PartitionHttpClientError {
        partition: String,
        url: String,
        status: u16,
        reason: String,
    },
    /// 5xx on one partition
    PartitionHttpServerError {
        partition: String,
        url: String,
        status: u16,
        reason: String,
    },
    /// No HTTP response at all for one partition
    PartitionTransport {
        partition: String,
        url: String,
        message: String,
    },
    /// Successful response with zero series: the partitioning assumption is wrong
    EmptyPayloadFatal { url: String },
    /// Configured filter dimension is not a dimension of the dataflow
    UnknownFilterDimension { dataset: String, dimension: String },
    /// Structural document could not be retrieved
    DataflowUnavailable {
        url: String,
        status: Option<u16>,
        reason: String,
    },
    /// Shutdown requested between partitions
    Interrupted { dataset: String },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSection { section } => write!(f, "missing section '{section}'"),
            Self::TimeDimensionMissing { found: Some(id) } => {
                write!(f, "first observation dimension is '{id}', not TIME_PERIOD")
            }
            Self::TimeDimensionMissing { found: None } => {
                write!(f, "data payload has no observation dimension")
            }
            Self::UnresolvedCode { key, code } => {
                write!(f, "unresolved code '{code}' for '{key}'")
            }
            Self::MalformedPeriod { period, frequency } => {
                write!(f, "malformed period '{period}' for frequency {frequency}")
            }
            Self::RejectFrequency {
                provider,
                dataset,
                frequency,
            } => write!(
                f,
                "rejected frequency '{frequency}' for provider[{provider}] - dataset[{dataset}]"
            ),
            Self::EmptySeries { key } => write!(f, "series '{key}' has no observations"),
            Self::PartitionHttpClientError {
                partition,
                url,
                status,
                reason,
            }
            | Self::PartitionHttpServerError {
                partition,
                url,
                status,
                reason,
            } => write!(
                f,
                "partition[{partition}] - url[{url}] - code[{status}] - reason[{reason}]"
            ),
            Self::PartitionTransport {
                partition,
                url,
                message,
            } => write!(f, "partition[{partition}] - url[{url}] - {message}"),
            Self::EmptyPayloadFatal { url } => {
                write!(f, "no series in successful response for url[{url}]")
            }
            Self::UnknownFilterDimension { dataset, dimension } => write!(
                f,
                "filter dimension '{dimension}' is not a dimension of dataset {dataset}"
            ),
            Self::DataflowUnavailable {
                url,
                status: Some(status),
                reason,
            } => write!(f, "dataflow url[{url}] - code[{status}] - reason[{reason}]"),
            Self::DataflowUnavailable {
                url,
                status: None,
                reason,
            } => write!(f, "dataflow url[{url}] - {reason}"),
            Self::Interrupted { dataset } => write!(f, "{dataset}: interrupted by shutdown"),
            Self::Json { path, source } => write!(f, "invalid JSON in {}: {source}", path.display()),
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Error {
    /// Whether this error aborts the whole dataset retrieval
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MissingSection { .. }
            | Self::TimeDimensionMissing { .. }
            | Self::EmptyPayloadFatal { .. }
            | Self::UnknownFilterDimension { .. }
            | Self::DataflowUnavailable { .. }
            | Self::Interrupted { .. }
            | Self::Json { .. }
            | Self::Io { .. } => true,
            Self::UnresolvedCode { .. }
            | Self::MalformedPeriod { .. }
            | Self::RejectFrequency { .. }
            | Self::EmptySeries { .. }
            | Self::PartitionHttpClientError { .. }
            | Self::PartitionHttpServerError { .. }
            | Self::PartitionTransport { .. } => false,
        }
    }

    pub(crate) fn unresolved(key: &str, code: impl ToString) -> Self {
        Self::UnresolvedCode {
            key: key.to_string(),
            code: code.to_string(),
        }
    }

    pub(crate) fn missing(section: &str) -> Self {
        Self::MissingSection {
            section: section.to_string(),
        }
    }
}

impl RowError for Error {
    fn is_fatal(&self) -> bool {
        Error::is_fatal(self)
    }
}
