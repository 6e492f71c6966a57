//! The `arrayLines` result format.
//!
//! A successful response body is a sequence of lines:
//!
//! ```text
//! ["__time","channel","added"]            header: column names
//! ["2016-06-27T00:00:11.080Z","#en",17]   zero or more rows
//!                                          blank trailer line
//! ```
//!
//! The trailer is the only proof that the engine finished the result set. A
//! body that ends without it was cut short and is reported as truncated, even
//! if every line that did arrive parsed cleanly.
//!
//! [`ResultDecoder`] holds the whole protocol state and never performs I/O.
//! [`ResultSet`] drives it from a blocking line iterator and
//! [`AsyncResultSet`] from a line [`Stream`].
use crate::description::Description;
use crate::error::{DruidError, DruidErrorKind};
use crate::row::{Columns, Row};

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;


pub(crate) type LineIter = Box<dyn Iterator<Item = Result<String, DruidError>> + Send>;
pub(crate) type LineStream = Pin<Box<dyn Stream<Item = Result<String, DruidError>> + Send>>;


#[derive(Debug)]
pub(crate) struct ResultDecoder {
    columns: Arc<Columns>,
    description: Description,
    complete: bool,
    buffered: Option<VecDeque<Row>>,
}

impl ResultDecoder {
    /// Start decoding from the first line of the body, `None` if the body
    /// had no lines at all.
    pub(crate) fn from_header(line: Option<&str>) -> Result<Self, DruidError> {
        let line = line.ok_or(DruidErrorKind::MissingHeader)?;
        let names: Vec<String> = serde_json::from_str(line)?;
        tracing::debug!(columns = ?names, "Received result header");

        let columns = Arc::new(Columns::new(names));
        let description = Description::from_columns(&columns);

        Ok(Self {
            columns,
            description,
            complete: false,
            buffered: None,
        })
    }

    pub(crate) fn description(&self) -> &Description {
        &self.description
    }

    /// Whether the decoder wants another line for the next row.
    pub(crate) fn wants_line(&self) -> bool {
        self.buffered.is_none() && !self.complete
    }

    /// Next row from the materialized buffer, if the set was materialized.
    pub(crate) fn next_buffered(&mut self) -> Option<Option<Row>> {
        self.buffered.as_mut().map(VecDeque::pop_front)
    }

    /// Decode the next line, `None` meaning the line source is exhausted.
    ///
    /// Any error ends the result set: later calls return `Ok(None)` rather
    /// than reading past a failure.
    pub(crate) fn decode(
        &mut self,
        line: Option<Result<String, DruidError>>,
    ) -> Result<Option<Row>, DruidError> {
        if self.complete {
            return Ok(None);
        }

        let result = self.decode_line(line);
        if !matches!(result, Ok(Some(_))) {
            self.complete = true;
        }
        if let Ok(Some(row)) = &result {
            self.description.observe(row);
        }
        result
    }

    fn decode_line(
        &self,
        line: Option<Result<String, DruidError>>,
    ) -> Result<Option<Row>, DruidError> {
        let line = match line {
            Some(line) => line?,
            None => return Err(DruidErrorKind::Truncated.into()),
        };

        if line.trim().is_empty() {
            tracing::debug!("Reached result trailer");
            return Ok(None);
        }

        tracing::trace!(line = %line, "Decoding row");
        let values: Vec<Value> = serde_json::from_str(&line)?;
        if values.len() != self.columns.len() {
            return Err(DruidErrorKind::RowWidth {
                expected: self.columns.len(),
                found: values.len(),
            }.into());
        }

        Ok(Some(Row::new(self.columns.clone(), values)))
    }

    /// Replace the remaining stream with an in-memory buffer of `rows`.
    pub(crate) fn rewrap(&mut self, rows: VecDeque<Row>) -> usize {
        let n = rows.len();
        self.complete = true;
        self.buffered = Some(rows);
        n
    }

    pub(crate) fn buffered_len(&self) -> Option<usize> {
        self.buffered.as_ref().map(VecDeque::len)
    }
}


/// A single-pass result set read from a blocking line source.
pub(crate) struct ResultSet {
    decoder: ResultDecoder,
    lines: LineIter,
}

impl ResultSet {
    /// Read the header line and return without touching any row.
    pub(crate) fn open(mut lines: LineIter) -> Result<Self, DruidError> {
        let header = lines.next().transpose()?;
        let decoder = ResultDecoder::from_header(header.as_deref())?;
        Ok(Self { decoder, lines })
    }

    pub(crate) fn description(&self) -> &Description {
        self.decoder.description()
    }

    pub(crate) fn next_row(&mut self) -> Result<Option<Row>, DruidError> {
        if let Some(row) = self.decoder.next_buffered() {
            return Ok(row);
        }
        if !self.decoder.wants_line() {
            return Ok(None);
        }
        let line = self.lines.next();
        self.decoder.decode(line)
    }

    /// Drain the remaining rows into memory and keep serving them from there.
    ///
    /// Returns the number of rows still available.
    pub(crate) fn materialize(&mut self) -> Result<usize, DruidError> {
        if let Some(n) = self.decoder.buffered_len() {
            return Ok(n);
        }
        let mut rows = VecDeque::new();
        while let Some(row) = self.next_row()? {
            rows.push_back(row);
        }
        Ok(self.decoder.rewrap(rows))
    }
}


/// A single-pass result set read from an asynchronous line stream.
///
/// Rows decoded for a batch are parked in `pending` until the batch is
/// handed out, so dropping a fetch future between two lines loses nothing:
/// the next fetch starts from the parked rows.
pub(crate) struct AsyncResultSet {
    decoder: ResultDecoder,
    lines: LineStream,
    pending: VecDeque<Row>,
}

impl AsyncResultSet {
    /// Await the header line and return without touching any row.
    pub(crate) async fn open(mut lines: LineStream) -> Result<Self, DruidError> {
        let header = lines.next().await.transpose()?;
        let decoder = ResultDecoder::from_header(header.as_deref())?;
        Ok(Self { decoder, lines, pending: VecDeque::new() })
    }

    pub(crate) fn description(&self) -> &Description {
        self.decoder.description()
    }

    pub(crate) async fn next_row(&mut self) -> Result<Option<Row>, DruidError> {
        if let Some(row) = self.pending.pop_front() {
            return Ok(Some(row));
        }
        self.pull_row().await
    }

    async fn pull_row(&mut self) -> Result<Option<Row>, DruidError> {
        if let Some(row) = self.decoder.next_buffered() {
            return Ok(row);
        }
        if !self.decoder.wants_line() {
            return Ok(None);
        }
        let line = self.lines.next().await;
        self.decoder.decode(line)
    }

    /// Up to `size` rows, or every remaining row when `size` is `None`.
    ///
    /// A failure discards the batch gathered so far, as the blocking cursor does.
    pub(crate) async fn next_batch(&mut self, size: Option<usize>) -> Result<Vec<Row>, DruidError> {
        while size.is_none_or(|n| self.pending.len() < n) {
            match self.pull_row().await {
                Ok(Some(row)) => self.pending.push_back(row),
                Ok(None) => break,
                Err(e) => {
                    self.pending.clear();
                    return Err(e);
                }
            }
        }

        let n = size.map_or(self.pending.len(), |n| n.min(self.pending.len()));
        Ok(self.pending.drain(..n).collect())
    }

    pub(crate) async fn materialize(&mut self) -> Result<usize, DruidError> {
        if self.decoder.buffered_len().is_none() {
            let rows = self.next_batch(None).await?;
            self.decoder.rewrap(rows.into());
        }
        Ok(self.pending.len() + self.decoder.buffered_len().unwrap_or(0))
    }
}
