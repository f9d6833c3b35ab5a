// src/exec/tail.rs

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};

use crate::engine::instance::TaskInstance;
use crate::output::Stream;

/// Longest line kept in one piece; anything longer is split into capped
/// chunks flagged as truncated.
pub(crate) const MAX_LINE_BYTES: usize = 4096;

/// Spawn a worker that tails one output stream of an instance into its
/// output buffer.
///
/// The worker exits silently on clean end-of-stream (the usual case when the
/// process dies); any other read error is recorded as a per-task system line
/// first. It writes only to the instance's independently-locked output
/// buffer and never goes near the control loop.
pub(crate) fn spawn_tailer<R>(instance: Arc<TaskInstance>, stream: Stream, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        loop {
            match read_line_capped(&mut reader, MAX_LINE_BYTES).await {
                Ok(None) => return,
                Ok(Some((text, truncated))) => instance.append_output(stream, text, truncated),
                Err(err) => {
                    instance.system_line(&format!("{stream} pipe closed: {err}"));
                    return;
                }
            }
        }
    });
}

/// Read the next line, up to `cap` bytes.
///
/// Returns `None` at end of input, otherwise the decoded text and whether it
/// was cut short of a terminator (the remainder is picked up by the next
/// call). A trailing `\r` before the newline is stripped.
async fn read_line_capped<R>(reader: &mut R, cap: usize) -> std::io::Result<Option<(String, bool)>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line: Vec<u8> = Vec::new();
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            // End of stream: flush whatever is buffered as a final line.
            if line.is_empty() {
                return Ok(None);
            }
            return Ok(Some((decode(line), false)));
        }

        let room = cap - line.len();
        let window = &chunk[..chunk.len().min(room)];
        if let Some(pos) = window.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&window[..pos]);
            reader.consume(pos + 1);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(Some((decode(line), false)));
        }

        let taken = window.len();
        line.extend_from_slice(window);
        reader.consume(taken);
        if line.len() == cap {
            return Ok(Some((decode(line), true)));
        }
    }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}
