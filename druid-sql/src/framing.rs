//! Reassembly of newline-delimited lines from arbitrarily chunked bodies.
//!
//! The asynchronous transport hands out the response body as raw byte
//! chunks whose boundaries follow the network, not the NDJSON framing. A
//! single row may be split across several chunks and one chunk may hold many
//! rows. [`LineReassembler`] is the sans-io core; [`Lines`] drives it over a
//! chunk [`Stream`] and yields one decoded line per item.
//!
//! ```
//! use bytes::Bytes;
//! use druid_sql::{DruidError, Lines};
//! use futures_util::{stream, TryStreamExt};
//!
//! # tokio_test::block_on(async {
//! let chunks = stream::iter(vec![
//!     Ok::<_, DruidError>(Bytes::from_static(b"[\"na")),
//!     Ok(Bytes::from_static(b"me\"]\r")),
//!     Ok(Bytes::from_static(b"\n[\"alice\"]\n\n")),
//! ]);
//! let lines: Vec<String> = Lines::new(chunks).try_collect().await.unwrap();
//! assert_eq!(lines, vec!["[\"name\"]", "[\"alice\"]", ""]);
//! # });
//! ```
use crate::error::DruidError;

use bytes::{Bytes, BytesMut};
use futures_util::{ready, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};


/// Splits a sequence of byte chunks into complete lines.
///
/// Lines are terminated by `\n`; a `\r` directly before the terminator is
/// dropped, even when the two bytes arrive in different chunks. Emitted lines
/// never contain their terminator.
#[derive(Debug, Default)]
pub struct LineReassembler {
    pending: BytesMut,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line it completes, in order.
    ///
    /// Bytes after the last terminator are held back until a later chunk
    /// completes them or [`finish`](Self::finish) is called.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut lines = Vec::new();
        let mut scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        while let Some(offset) = self.pending[scan_from..].iter().position(|b| *b == b'\n') {
            let mut line = self.pending.split_to(scan_from + offset + 1);
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            lines.push(line.freeze());
            scan_from = 0;
        }

        lines
    }

    /// Flush the trailing partial line of a body that did not end with a
    /// terminator.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.split().freeze())
        }
    }

    /// Number of buffered bytes not yet emitted as a line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}


/// A [`Stream`] of UTF-8 lines reassembled from a stream of byte chunks.
///
/// All state lives in the struct, so polling may be suspended at any chunk
/// boundary and resumed without losing or repeating a line. Dropping it
/// drops the underlying chunk stream.
pub struct Lines<S> {
    chunks: S,
    reassembler: LineReassembler,
    ready: VecDeque<Bytes>,
    exhausted: bool,
}

impl<S> Lines<S> {
    pub fn new(chunks: S) -> Self {
        Self {
            chunks,
            reassembler: LineReassembler::new(),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<S, E> Stream for Lines<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<DruidError>,
{
    type Item = Result<String, DruidError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(line) = this.ready.pop_front() {
                let decoded = String::from_utf8(line.to_vec()).map_err(DruidError::from);
                return Poll::Ready(Some(decoded));
            }

            if this.exhausted {
                return Poll::Ready(None);
            }

            match ready!(this.chunks.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    tracing::trace!(bytes = chunk.len(), "Received body chunk");
                    this.ready.extend(this.reassembler.push(&chunk));
                }
                Some(Err(e)) => {
                    this.exhausted = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => {
                    this.exhausted = true;
                    this.ready.extend(this.reassembler.finish());
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use futures_util::TryStreamExt;
    use proptest::prelude::*;

    const BODY: &[u8] = b"[\"name\",\"city\"]\n[\"alice\",\"Lisboa\"]\n[\"bob\",null]\n\n";

    fn reassemble(chunks: &[&[u8]]) -> Vec<Bytes> {
        let mut reassembler = LineReassembler::new();
        let mut lines: Vec<Bytes> = chunks.iter().flat_map(|c| reassembler.push(c)).collect();
        lines.extend(reassembler.finish());
        lines
    }

    fn unsplit_lines(body: &[u8]) -> Vec<Bytes> {
        reassemble(&[body])
    }

    fn chunked(chunks: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, DruidError>> + Unpin {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    #[test]
    fn single_chunk_with_many_lines() {
        let lines = reassemble(&[b"a\nb\nc\n"]);
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn line_split_across_chunks() {
        let lines = reassemble(&[b"[\"al", b"ice\"]\n[\"b", b"ob\"]\n"]);
        assert_eq!(lines, vec!["[\"alice\"]", "[\"bob\"]"]);
    }

    #[test]
    fn chunks_that_are_only_terminators() {
        let lines = reassemble(&[b"a", b"\n", b"\n"]);
        assert_eq!(lines, vec!["a", ""]);
    }

    #[test]
    fn empty_chunks_keep_the_pending_line() {
        let lines = reassemble(&[b"ab", b"", b"c", b"", b"\n"]);
        assert_eq!(lines, vec!["abc"]);
    }

    #[test]
    fn chunk_ending_on_a_boundary_leaves_nothing_pending() {
        let mut reassembler = LineReassembler::new();
        assert_eq!(reassembler.push(b"x\ny\n"), vec!["x", "y"]);
        assert_eq!(reassembler.pending_len(), 0);
        assert_eq!(reassembler.finish(), None);
    }

    #[test]
    fn unterminated_tail_is_flushed_at_the_end() {
        let lines = reassemble(&[b"a\nb", b"c"]);
        assert_eq!(lines, vec!["a", "bc"]);
    }

    #[test]
    fn crlf_split_between_chunks_is_one_terminator() {
        let lines = reassemble(&[b"a\r", b"\nb\r\n"]);
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn no_chunks_no_lines() {
        assert!(reassemble(&[]).is_empty());
    }

    #[tokio::test]
    async fn stream_splits_multibyte_characters_safely() {
        let body = "[\"café\"]\n".as_bytes().to_vec();
        let (left, right) = body.split_at(5);
        let lines: Vec<String> = Lines::new(chunked(vec![left.to_vec(), right.to_vec()]))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(lines, vec!["[\"café\"]"]);
    }

    #[tokio::test]
    async fn stream_propagates_chunk_errors() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"a\nb")),
            Err(DruidError::from(std::io::Error::new(std::io::ErrorKind::Other, "reset"))),
        ]);
        let mut lines = Lines::new(chunks);

        assert_eq!(lines.next().await.unwrap().unwrap(), "a");
        assert!(lines.next().await.unwrap().is_err());
        assert!(lines.next().await.is_none());
    }

    #[test]
    fn every_two_way_split_matches_the_unsplit_stream() {
        let expected = unsplit_lines(BODY);
        for i in 0..=BODY.len() {
            let (a, b) = BODY.split_at(i);
            assert_eq!(reassemble(&[a, b]), expected, "split at {i}");
        }
    }

    proptest! {
        /// Property: any partition of the body yields the same lines
        #[test]
        fn chunk_boundaries_do_not_change_lines(
            cuts in prop::collection::vec(0..=BODY.len(), 0..12)
        ) {
            let mut cuts = cuts;
            cuts.sort_unstable();

            let mut chunks: Vec<&[u8]> = Vec::new();
            let mut start = 0;
            for cut in cuts {
                chunks.push(&BODY[start..cut]);
                start = cut;
            }
            chunks.push(&BODY[start..]);

            prop_assert_eq!(reassemble(&chunks), unsplit_lines(BODY));
        }

        /// Property: reinserting terminators reconstructs the original bytes
        #[test]
        fn lines_reconstruct_the_body(body in "[a-z\\[\\]\",\n]{0,64}", cut in 0usize..64) {
            let bytes = body.as_bytes();
            let cut = cut.min(bytes.len());
            let lines = reassemble(&[&bytes[..cut], &bytes[cut..]]);

            let mut rebuilt: Vec<u8> = Vec::new();
            for line in &lines {
                rebuilt.extend_from_slice(line);
                rebuilt.push(b'\n');
            }
            if !bytes.ends_with(b"\n") && !lines.is_empty() {
                rebuilt.pop();
            }

            prop_assert_eq!(rebuilt, bytes.to_vec());
        }
    }
}
