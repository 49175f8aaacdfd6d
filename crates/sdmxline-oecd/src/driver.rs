//! Partitioned retrieval: one data request per code of the filter dimension.
//!
//! The driver is a plain [`Iterator`] and fetches lazily: a partition is
//! requested only once every series of the previous one has been pulled,
//! so dropping the iterator cancels everything not yet started.
//!
//! Failure handling per partition:
//!
//! | outcome                         | effect                          |
//! |---------------------------------|---------------------------------|
//! | 4xx                             | warn, skip partition            |
//! | 5xx / no response               | error, skip partition           |
//! | success with zero series        | fatal, iteration ends           |
//! | payload structure broken        | fatal, iteration ends           |
//! | one series fails to decode      | `Err` item, iteration continues |

use std::path::PathBuf;

use indicatif::ProgressBar;
use sdmxline_core::{Downloader, FetchRequest, is_shutdown_requested};

use crate::api::{OecdApi, SDMX_DATA_HEADERS, data_filename, read_json};
use crate::compact::{IntermediateSeries, decode_data};
use crate::dataflow::DataflowStructure;
use crate::error::Error;
use crate::registry::PROVIDER;

/// Key selecting one partition: `n_dims` dot-joined segments, all
/// wildcards except `value` at `position`.
pub fn partition_key(n_dims: usize, position: usize, value: &str) -> String {
    (0..n_dims)
        .map(|i| if i == position { value } else { "" })
        .collect::<Vec<_>>()
        .join(".")
}

/// Lazy, single-pass sequence of intermediate series for one dataset
pub struct PartitionedRetrieval<'a, D: Downloader + ?Sized> {
    api: &'a OecdApi,
    dataset: String,
    structure: &'a DataflowStructure,
    downloader: &'a D,
    filter_position: usize,
    pending: std::vec::IntoIter<String>,
    current: std::vec::IntoIter<Result<IntermediateSeries, Error>>,
    partition_count: usize,
    fetched: usize,
    skipped: Vec<Error>,
    downloads: Vec<PathBuf>,
    progress: ProgressBar,
    done: bool,
}

impl<'a, D: Downloader + ?Sized> PartitionedRetrieval<'a, D> {
    /// Prepare a retrieval partitioned on `filter`. Nothing is fetched yet.
    pub fn new(
        api: &'a OecdApi,
        dataset: &str,
        structure: &'a DataflowStructure,
        downloader: &'a D,
        filter: &str,
    ) -> Result<Self, Error> {
        let filter_position =
            structure
                .dimension_position(filter)
                .ok_or_else(|| Error::UnknownFilterDimension {
                    dataset: dataset.to_string(),
                    dimension: filter.to_string(),
                })?;
        let values: Vec<String> = structure
            .codelists
            .get(filter)
            .map(|codes| codes.keys().cloned().collect())
            .unwrap_or_default();

        Ok(Self {
            api,
            dataset: dataset.to_string(),
            structure,
            downloader,
            filter_position,
            partition_count: values.len(),
            pending: values.into_iter(),
            current: Vec::new().into_iter(),
            fetched: 0,
            skipped: Vec::new(),
            downloads: Vec::new(),
            progress: ProgressBar::hidden(),
            done: false,
        })
    }

    /// Tick `progress` once per finished partition
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Partitions requested so far, skipped ones included
    pub fn partitions_fetched(&self) -> usize {
        self.fetched
    }

    /// Partition failures that were skipped
    pub fn skipped(&self) -> &[Error] {
        &self.skipped
    }

    /// Downloaded documents, for cleanup
    pub fn take_downloads(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.downloads)
    }

    fn fetch_partition(
        &mut self,
        value: &str,
    ) -> Result<Vec<Result<IntermediateSeries, Error>>, Error> {
        let key = partition_key(
            self.structure.dimension_keys.len(),
            self.filter_position,
            value,
        );
        let url = self.api.data_url(&self.dataset, &key);
        let filename = data_filename(&self.dataset, value);
        self.fetched += 1;
        self.progress.set_message(value.to_string());

        let fetched = self
            .downloader
            .fetch(&FetchRequest {
                url: &url,
                filename: &filename,
                headers: SDMX_DATA_HEADERS,
            })
            .map_err(|e| Error::PartitionTransport {
                partition: value.to_string(),
                url: url.clone(),
                message: e.to_string(),
            })?;

        match fetched.status {
            400..=499 => {
                return Err(Error::PartitionHttpClientError {
                    partition: value.to_string(),
                    url,
                    status: fetched.status,
                    reason: fetched.reason,
                });
            }
            500.. => {
                return Err(Error::PartitionHttpServerError {
                    partition: value.to_string(),
                    url,
                    status: fetched.status,
                    reason: fetched.reason,
                });
            }
            _ => {}
        }
        self.downloads.push(fetched.path.clone());

        let doc = read_json(&fetched.path)?;
        let rows = decode_data(&doc, self.structure)?;
        if rows.is_empty() {
            return Err(Error::EmptyPayloadFatal { url });
        }
        log::debug!("{}: partition {value} → {} series", self.dataset, rows.len());
        Ok(rows)
    }

    fn skip(&mut self, err: Error) {
        match err {
            Error::PartitionHttpClientError { .. } => log::warn!(
                "http error for provider[{}] - dataset[{}] - {err}",
                PROVIDER.name,
                self.dataset
            ),
            _ => log::error!(
                "http error for provider[{}] - dataset[{}] - {err}",
                PROVIDER.name,
                self.dataset
            ),
        }
        self.skipped.push(err);
    }
}

impl<D: Downloader + ?Sized> Iterator for PartitionedRetrieval<'_, D> {
    type Item = Result<IntermediateSeries, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(item) = self.current.next() {
                return Some(item);
            }
            let Some(value) = self.pending.next() else {
                self.done = true;
                self.progress.set_message("");
                return None;
            };
            if is_shutdown_requested() {
                self.done = true;
                return Some(Err(Error::Interrupted {
                    dataset: self.dataset.clone(),
                }));
            }

            let outcome = self.fetch_partition(&value);
            self.progress.inc(1);
            match outcome {
                Ok(rows) => self.current = rows.into_iter(),
                Err(e) if e.is_fatal() => {
                    self.done = true;
                    return Some(Err(e));
                }
                Err(e) => self.skip(e),
            }
        }
    }
}
