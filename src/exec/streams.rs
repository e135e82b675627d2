// src/exec/streams.rs

//! Byte pumps between child pipes and consumer endpoints.

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tracing::{debug, warn};

use crate::types::TaskId;

/// Buffer size of each in-memory stream endpoint.
pub const STREAM_CAPACITY: usize = 64 * 1024;

/// Consumer-facing ends handed out through `StreamSource`.
#[derive(Debug, Default)]
pub(crate) struct ConsumerEnds {
    pub stdout: Option<DuplexStream>,
    pub stderr: Option<DuplexStream>,
    pub stdin: Option<DuplexStream>,
}

/// Engine-facing ends, used once by `run`.
#[derive(Debug)]
pub(crate) struct EngineEnds {
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
    pub stdin: DuplexStream,
}

/// Create connected endpoint pairs for the three standard streams.
pub(crate) fn stream_pairs() -> (ConsumerEnds, EngineEnds) {
    let (out_consumer, out_engine) = tokio::io::duplex(STREAM_CAPACITY);
    let (err_consumer, err_engine) = tokio::io::duplex(STREAM_CAPACITY);
    let (in_consumer, in_engine) = tokio::io::duplex(STREAM_CAPACITY);

    let consumer = ConsumerEnds {
        stdout: Some(out_consumer),
        stderr: Some(err_consumer),
        stdin: Some(in_consumer),
    };
    let engine = EngineEnds {
        stdout: out_engine,
        stderr: err_engine,
        stdin: in_engine,
    };
    (consumer, engine)
}

/// Copy `reader` into `writer` (and optionally `tee`) until EOF.
///
/// A writer that fails (its consumer went away) is dropped and the rest of
/// the input is still drained, so the child never blocks on a full pipe.
/// Returns the number of bytes read.
pub(crate) async fn pump<R, W>(
    mut reader: R,
    writer: Option<W>,
    mut tee: Option<File>,
    task_id: TaskId,
    stream: &'static str,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut writer = writer;
    let mut buf = vec![0u8; 8192];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(task_id, stream, error = %e, "stream read error; stopping pump");
                break;
            }
        };
        total += n as u64;

        if let Some(w) = writer.as_mut() {
            if let Err(e) = w.write_all(&buf[..n]).await {
                debug!(task_id, stream, error = %e, "consumer gone; discarding remaining output");
                writer = None;
            }
        }

        if let Some(file) = tee.as_mut() {
            if let Err(e) = file.write_all(&buf[..n]).await {
                warn!(task_id, stream, error = %e, "cannot save output; disabling tee");
                tee = None;
            }
        }
    }

    if let Some(mut w) = writer {
        let _ = w.shutdown().await;
    }
    if let Some(mut file) = tee {
        let _ = file.flush().await;
    }

    debug!(task_id, stream, bytes = total, "stream closed");
    total
}
