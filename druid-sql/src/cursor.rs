//! DB-API style cursors.
//!
//! A cursor runs one query at a time and hands out its rows incrementally.
//! [`execute`](Cursor::execute) returns as soon as the header line has been
//! read, so [`description`](Cursor::description) is available before any row
//! is fetched. Rows are then pulled off the response body on demand.
//!
//! ```no_run
//! use druid_sql::{connect, params, ConnectOptions};
//!
//! # fn main() -> Result<(), druid_sql::DruidError> {
//! let mut conn = connect(ConnectOptions::new().host("broker"))?;
//! let mut cursor = conn.cursor()?;
//!
//! cursor.execute(
//!     "SELECT channel, COUNT(*) AS edits FROM wikipedia WHERE added > %(min)s GROUP BY 1",
//!     Some(&params! { "min" => 100 }),
//! )?;
//!
//! for row in cursor.rows() {
//!     let row = row?;
//!     println!("{} {}", row[0], row[1]);
//! }
//! # Ok(())
//! # }
//! ```
use crate::config::ConnectOptions;
use crate::description::Description;
use crate::error::{DruidError, DruidErrorKind};
use crate::params::{apply_parameters, Parameters};
use crate::protocol::{AsyncResultSet, ResultSet};
use crate::row::Row;
use crate::transport::{self, Endpoint};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;


const EXECUTEMANY_UNSUPPORTED: &str = "`executemany` is not supported, use `execute` instead";

fn batch_size(size: Option<usize>, arraysize: usize) -> usize {
    match size {
        None | Some(0) => arraysize,
        Some(n) => n,
    }
}


/// Blocking cursor.
///
/// Usage errors follow a fixed order: a closed cursor fails with
/// `Cursor already closed` before anything else is checked, and fetching
/// before a successful [`execute`](Self::execute) fails with
/// ``Called before `execute` ``.
pub struct Cursor {
    endpoint: Endpoint,
    client: reqwest::blocking::Client,
    closed: Arc<AtomicBool>,
    arraysize: usize,
    results: Option<ResultSet>,
}

impl Cursor {
    /// Standalone cursor, not tied to any [`Connection`](crate::Connection).
    pub fn new(options: &ConnectOptions) -> Result<Self, DruidError> {
        options.validate()?;
        let endpoint = Endpoint::from_options(options)?;
        let client = transport::blocking_client(options)?;
        Ok(Self::from_parts(endpoint, client, Arc::new(AtomicBool::new(false))))
    }

    pub(crate) fn from_parts(
        endpoint: Endpoint,
        client: reqwest::blocking::Client,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            endpoint,
            client,
            closed,
            arraysize: 1,
            results: None,
        }
    }

    fn check_closed(&mut self) -> Result<(), DruidError> {
        if self.closed.load(Ordering::SeqCst) {
            // Closed from the connection: release the response now.
            self.results = None;
            return Err(DruidErrorKind::Closed("Cursor").into());
        }
        Ok(())
    }

    fn results(&mut self) -> Result<&mut ResultSet, DruidError> {
        self.check_closed()?;
        self.results.as_mut().ok_or_else(|| DruidErrorKind::NotExecuted.into())
    }

    /// Run `operation`, replacing any previous result set.
    ///
    /// On failure the cursor is left without a result set.
    pub fn execute(
        &mut self,
        operation: &str,
        parameters: Option<&Parameters>,
    ) -> Result<&mut Self, DruidError> {
        self.check_closed()?;
        self.results = None;

        let query = apply_parameters(operation, parameters)?;
        self.results = Some(transport::stream_query_blocking(&self.client, &self.endpoint, &query)?);
        Ok(self)
    }

    /// Always fails; only single statements are supported.
    pub fn executemany(
        &mut self,
        _operation: &str,
        _seq_of_parameters: &[Parameters],
    ) -> Result<&mut Self, DruidError> {
        self.check_closed()?;
        Err(DruidErrorKind::NotSupported(EXECUTEMANY_UNSUPPORTED.to_string()).into())
    }

    /// Column descriptions of the current result set, `None` before a
    /// successful `execute`.
    pub fn description(&self) -> Option<&Description> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.results.as_ref().map(ResultSet::description)
    }

    /// Number of rows not fetched yet.
    ///
    /// Reads the rest of the response into memory; fetching afterwards
    /// serves the same rows from there.
    pub fn rowcount(&mut self) -> Result<usize, DruidError> {
        self.results()?.materialize()
    }

    pub fn fetchone(&mut self) -> Result<Option<Row>, DruidError> {
        self.results()?.next_row()
    }

    /// Up to `size` rows; `None` or zero means [`arraysize`](Self::arraysize).
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>, DruidError> {
        let size = batch_size(size, self.arraysize);
        let results = self.results()?;

        let mut rows = Vec::new();
        while rows.len() < size {
            match results.next_row()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    pub fn fetchall(&mut self) -> Result<Vec<Row>, DruidError> {
        let results = self.results()?;

        let mut rows = Vec::new();
        while let Some(row) = results.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Iterate over the remaining rows. The iterator stops after the first
    /// error.
    pub fn rows(&mut self) -> Rows<'_> {
        Rows { cursor: self, done: false }
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, arraysize: usize) {
        self.arraysize = arraysize;
    }

    pub fn setinputsizes(&mut self, _sizes: &[usize]) -> Result<(), DruidError> {
        self.check_closed()
    }

    pub fn setoutputsizes(&mut self, _size: usize, _column: Option<usize>) -> Result<(), DruidError> {
        self.check_closed()
    }

    /// Close the cursor and drop its result set. Closing twice is an error.
    pub fn close(&mut self) -> Result<(), DruidError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            self.results = None;
            return Err(DruidErrorKind::Closed("Cursor").into());
        }
        self.results = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Iterator returned by [`Cursor::rows`].
pub struct Rows<'a> {
    cursor: &'a mut Cursor,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row, DruidError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.cursor.fetchone().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}


/// Asynchronous cursor with the same semantics as [`Cursor`].
///
/// The response body is consumed chunk by chunk; every `await` is a point
/// where the task may be suspended without losing or repeating a row.
pub struct AsyncCursor {
    endpoint: Endpoint,
    client: reqwest::Client,
    closed: Arc<AtomicBool>,
    arraysize: usize,
    results: Option<AsyncResultSet>,
}

impl AsyncCursor {
    pub fn new(options: &ConnectOptions) -> Result<Self, DruidError> {
        options.validate()?;
        let endpoint = Endpoint::from_options(options)?;
        let client = transport::async_client(options)?;
        Ok(Self::from_parts(endpoint, client, Arc::new(AtomicBool::new(false))))
    }

    pub(crate) fn from_parts(
        endpoint: Endpoint,
        client: reqwest::Client,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            endpoint,
            client,
            closed,
            arraysize: 1,
            results: None,
        }
    }

    fn check_closed(&mut self) -> Result<(), DruidError> {
        if self.closed.load(Ordering::SeqCst) {
            self.results = None;
            return Err(DruidErrorKind::Closed("Cursor").into());
        }
        Ok(())
    }

    fn results(&mut self) -> Result<&mut AsyncResultSet, DruidError> {
        self.check_closed()?;
        self.results.as_mut().ok_or_else(|| DruidErrorKind::NotExecuted.into())
    }

    pub async fn execute(
        &mut self,
        operation: &str,
        parameters: Option<&Parameters>,
    ) -> Result<&mut Self, DruidError> {
        self.check_closed()?;
        self.results = None;

        let query = apply_parameters(operation, parameters)?;
        self.results = Some(transport::stream_query(&self.client, &self.endpoint, &query).await?);
        Ok(self)
    }

    pub fn executemany(
        &mut self,
        _operation: &str,
        _seq_of_parameters: &[Parameters],
    ) -> Result<&mut Self, DruidError> {
        self.check_closed()?;
        Err(DruidErrorKind::NotSupported(EXECUTEMANY_UNSUPPORTED.to_string()).into())
    }

    pub fn description(&self) -> Option<&Description> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.results.as_ref().map(AsyncResultSet::description)
    }

    pub async fn rowcount(&mut self) -> Result<usize, DruidError> {
        self.results()?.materialize().await
    }

    pub async fn fetchone(&mut self) -> Result<Option<Row>, DruidError> {
        self.results()?.next_row().await
    }

    /// Same as [`fetchone`](Self::fetchone), for `while let` loops.
    pub async fn next_row(&mut self) -> Result<Option<Row>, DruidError> {
        self.fetchone().await
    }

    /// Cancel-safe: rows read by a dropped call are returned by the next fetch.
    pub async fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>, DruidError> {
        let size = batch_size(size, self.arraysize);
        self.results()?.next_batch(Some(size)).await
    }

    pub async fn fetchall(&mut self) -> Result<Vec<Row>, DruidError> {
        self.results()?.next_batch(None).await
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, arraysize: usize) {
        self.arraysize = arraysize;
    }

    pub fn setinputsizes(&mut self, _sizes: &[usize]) -> Result<(), DruidError> {
        self.check_closed()
    }

    pub fn setoutputsizes(&mut self, _size: usize, _column: Option<usize>) -> Result<(), DruidError> {
        self.check_closed()
    }

    pub fn close(&mut self) -> Result<(), DruidError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            self.results = None;
            return Err(DruidErrorKind::Closed("Cursor").into());
        }
        self.results = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
