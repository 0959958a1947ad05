//! Stream workers
//!
//! Each worker owns one byte stream of the child and forwards the events it
//! yields into the run's channel. Lines are read byte-wise with no length cap
//! and decoded lossily, so oversized or non-UTF-8 output never aborts a run.

use crate::parser::StreamParser;
use insight_core::Event;
use std::borrow::Cow;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Drain the primary stream through a parser; returns the number of events forwarded.
pub async fn pump_primary<R>(
    reader: R,
    mut parser: StreamParser,
    tx: mpsc::Sender<Event>,
) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    pump(reader, tx, move |line| parser.feed_line(line)).await
}

/// Drain the diagnostic stream; every non-blank line is a `log` event.
pub async fn pump_diagnostic<R>(reader: R, tx: mpsc::Sender<Event>) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    pump(reader, tx, |line| {
        (!line.trim().is_empty()).then(|| Event::log(line))
    })
    .await
}

async fn pump<R, F>(reader: R, tx: mpsc::Sender<Event>, mut on_line: F) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str) -> Option<Event>,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(4096);
    let mut forwarded = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = decode_line(&buf);
        let Some(event) = on_line(&*line) else {
            continue;
        };
        if tx.send(event).await.is_err() {
            // Run abandoned; stop reading so the child sees a closed pipe.
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    String::from_utf8_lossy(&buf[..end])
}
