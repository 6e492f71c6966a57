//! Connections: cursor factories that own the cursors' lifecycle.
//!
//! A connection performs no I/O of its own. It validates the options once,
//! builds the HTTP client, and hands out cursors that share it. Closing the
//! connection, or dropping it while open, closes every cursor it created
//! that is still alive.
use crate::config::ConnectOptions;
use crate::cursor::{AsyncCursor, Cursor};
use crate::error::{DruidError, DruidErrorKind};
use crate::params::Parameters;
use crate::transport::{self, Endpoint};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};


/// Open a blocking connection.
///
/// Fails with a configuration error when the options are invalid, e.g. when
/// the column header was disabled.
pub fn connect(options: ConnectOptions) -> Result<Connection, DruidError> {
    Connection::new(options)
}

/// Open an asynchronous connection. Nothing is sent until a query runs.
pub fn async_connect(options: ConnectOptions) -> Result<AsyncConnection, DruidError> {
    AsyncConnection::new(options)
}


/// Close flags of the cursors handed out by a connection.
#[derive(Debug, Default)]
struct CursorRegistry {
    flags: Vec<Weak<AtomicBool>>,
}

impl CursorRegistry {
    fn register(&mut self) -> Arc<AtomicBool> {
        // Forget cursors that were dropped.
        self.flags.retain(|flag| flag.strong_count() > 0);

        let flag = Arc::new(AtomicBool::new(false));
        self.flags.push(Arc::downgrade(&flag));
        flag
    }

    /// Mark every live cursor closed, whether or not it already was.
    fn close_all(&mut self) {
        let mut closed = 0;
        for flag in self.flags.drain(..).filter_map(|f| f.upgrade()) {
            flag.store(true, Ordering::SeqCst);
            closed += 1;
        }
        tracing::debug!(cursors = closed, "Closed connection cursors");
    }

    fn live(&self) -> usize {
        self.flags.iter().filter(|f| f.strong_count() > 0).count()
    }
}


pub struct Connection {
    endpoint: Endpoint,
    client: reqwest::blocking::Client,
    cursors: CursorRegistry,
    closed: bool,
}

impl Connection {
    pub fn new(options: ConnectOptions) -> Result<Self, DruidError> {
        options.validate()?;
        let endpoint = Endpoint::from_options(&options)?;
        let client = transport::blocking_client(&options)?;
        tracing::debug!(url = %endpoint.url(), "Opened connection");

        Ok(Self {
            endpoint,
            client,
            cursors: CursorRegistry::default(),
            closed: false,
        })
    }

    fn check_closed(&self) -> Result<(), DruidError> {
        if self.closed {
            return Err(DruidErrorKind::Closed("Connection").into());
        }
        Ok(())
    }

    /// New cursor sharing this connection's endpoint, credentials, context
    /// and HTTP client.
    pub fn cursor(&mut self) -> Result<Cursor, DruidError> {
        self.check_closed()?;
        let closed = self.cursors.register();
        Ok(Cursor::from_parts(self.endpoint.clone(), self.client.clone(), closed))
    }

    /// Shortcut for [`cursor`](Self::cursor) followed by [`Cursor::execute`].
    pub fn execute(
        &mut self,
        operation: &str,
        parameters: Option<&Parameters>,
    ) -> Result<Cursor, DruidError> {
        let mut cursor = self.cursor()?;
        cursor.execute(operation, parameters)?;
        Ok(cursor)
    }

    /// Transactions are not supported, so there is never anything to commit.
    pub fn commit(&self) -> Result<(), DruidError> {
        self.check_closed()
    }

    /// Close the connection and every cursor it created.
    ///
    /// Cursors closed earlier are skipped silently; closing the connection
    /// a second time is an error.
    pub fn close(&mut self) -> Result<(), DruidError> {
        self.check_closed()?;
        self.closed = true;
        self.cursors.close_all();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of cursors created by this connection that are still alive.
    pub fn open_cursors(&self) -> usize {
        self.cursors.live()
    }
}

/// Dropping an open connection closes its cursors, as [`close`](Connection::close) does.
impl Drop for Connection {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cursors.close_all();
        }
    }
}


pub struct AsyncConnection {
    endpoint: Endpoint,
    client: reqwest::Client,
    cursors: CursorRegistry,
    closed: bool,
}

impl AsyncConnection {
    pub fn new(options: ConnectOptions) -> Result<Self, DruidError> {
        options.validate()?;
        let endpoint = Endpoint::from_options(&options)?;
        let client = transport::async_client(&options)?;
        tracing::debug!(url = %endpoint.url(), "Opened async connection");

        Ok(Self {
            endpoint,
            client,
            cursors: CursorRegistry::default(),
            closed: false,
        })
    }

    fn check_closed(&self) -> Result<(), DruidError> {
        if self.closed {
            return Err(DruidErrorKind::Closed("Connection").into());
        }
        Ok(())
    }

    pub fn cursor(&mut self) -> Result<AsyncCursor, DruidError> {
        self.check_closed()?;
        let closed = self.cursors.register();
        Ok(AsyncCursor::from_parts(self.endpoint.clone(), self.client.clone(), closed))
    }

    pub async fn execute(
        &mut self,
        operation: &str,
        parameters: Option<&Parameters>,
    ) -> Result<AsyncCursor, DruidError> {
        let mut cursor = self.cursor()?;
        cursor.execute(operation, parameters).await?;
        Ok(cursor)
    }

    pub fn commit(&self) -> Result<(), DruidError> {
        self.check_closed()
    }

    pub fn close(&mut self) -> Result<(), DruidError> {
        self.check_closed()?;
        self.closed = true;
        self.cursors.close_all();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn open_cursors(&self) -> usize {
        self.cursors.live()
    }
}

impl Drop for AsyncConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cursors.close_all();
        }
    }
}
