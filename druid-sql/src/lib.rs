/*!
# druid-sql

<b>A streaming, DB-API style Rust client for the Apache Druid SQL endpoint.</b>

This crate posts SQL queries to a Druid broker or router over HTTP and reads
the newline-delimited `arrayLines` result format back one row at a time, so
result sets of any size can be consumed without buffering them in memory.

## ✨ Features

- 🔌 **Blocking and async cursors** with the same semantics, on top of `reqwest`;
- 🌊 **Streaming results**: rows are decoded as the response body arrives;
- 🧩 **Parameterized queries** with `%(name)s` placeholders;
- 🛑 **Truncation detection**: a result set that lacks its trailer line is an error;
- 🧾 **Column descriptions** with types inferred from the first row.

## Getting Started

```no_run
use druid_sql::{connect, params, ConnectOptions};

# fn main() -> Result<(), druid_sql::DruidError> {
// 1️⃣ Connect to a broker
let mut conn = connect(ConnectOptions::new().host("localhost").port(8082))?;

// 2️⃣ Execute a query; the header is read before `execute` returns
let mut cursor = conn.execute(
    "SELECT page, added FROM wikipedia WHERE channel = %(channel)s LIMIT 5",
    Some(&params! { "channel" => "#en.wikipedia" }),
)?;

for column in cursor.description().into_iter().flat_map(|d| d.columns()) {
    println!("column {}", column.name);
}

// 3️⃣ Pull rows off the stream
while let Some(row) = cursor.fetchone()? {
    println!("{} {}", row[0], row[1]);
}
# Ok(())
# }
```

## 🪶 Async

```no_run
use druid_sql::{async_connect, ConnectOptions};

# #[tokio::main]
# async fn main() -> Result<(), druid_sql::DruidError> {
let mut conn = async_connect(ConnectOptions::from_url("http://localhost:8082/druid/v2/sql/")?)?;
let mut cursor = conn.execute("SELECT COUNT(*) FROM wikipedia", None).await?;

while let Some(row) = cursor.next_row().await? {
    println!("{}", row[0]);
}
# Ok(())
# }
```

## 🧠 Concepts

- <b>[`Connection`]</b> / <b>[`AsyncConnection`]</b>: cursor factories; closing
  one closes every cursor it created.
- <b>[`Cursor`]</b> / <b>[`AsyncCursor`]</b>: run a query and fetch its rows with
  `fetchone`, `fetchmany` and `fetchall`.
- <b>[`Row`]</b>: one result row, indexable by position or column name.
- <b>[`Description`]</b>: the seven DB-API fields per column.
- <b>[`ConnectOptions`]</b>: endpoint, credentials, TLS, proxies, timeout and
  default query context.
- <b>[`Lines`]</b>: reassembles NDJSON lines from arbitrarily chunked bodies.

## 📘 Learn More

- [Druid SQL API](https://druid.apache.org/docs/latest/api-reference/sql-api);
- [Python DB-API 2.0 (PEP 249)](https://peps.python.org/pep-0249/).

## Disclaimer:

This project is not affiliated with, endorsed by, or sponsored by the Apache Software Foundation.
“Apache” and “Apache Druid” are trademarks of the Apache Software Foundation.
*/

mod config;
mod connection;
mod cursor;
mod description;
mod error;
mod framing;
mod params;
mod protocol;
mod row;
mod transport;

pub use config::ConnectOptions;
pub use connection::{async_connect, connect, AsyncConnection, Connection};
pub use cursor::{AsyncCursor, Cursor, Rows};
pub use description::{Column, Description, Type};
pub use error::{translate_http_error, DruidError, DruidErrorKind};
pub use framing::{LineReassembler, Lines};
pub use params::{apply_parameters, Parameter, Parameters};
pub use row::{Columns, Row};

#[cfg(test)]
mod test_utils;
