use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN, Serialize};

/// The sending end of a framed channel.
///
/// Every frame is its body length as a big-endian `LenType` followed by the body. The owned
/// part of a message is staged in a reused buffer; its borrowed tail (e.g. weights) is written
/// straight from the caller's memory.
pub struct OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    frame: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    /// Creates a new `OnoSender` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            frame: Vec::new(),
        }
    }

    /// Writes `msg` as a single frame and flushes it.
    ///
    /// # Arguments
    /// * `msg` - A serializable object.
    ///
    /// # Returns
    /// An `io::Error` if encoding or writing fails, or `InvalidInput` if the frame would be
    /// larger than the receiving end accepts.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        self.frame.clear();
        self.frame.resize(LEN_TYPE_SIZE, 0);

        let tail = msg.serialize(&mut self.frame)?;
        let body_len = self.frame.len() - LEN_TYPE_SIZE + tail.map_or(0, <[u8]>::len);

        if body_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {body_len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
            ));
        }

        self.frame[..LEN_TYPE_SIZE].copy_from_slice(&(body_len as LenType).to_be_bytes());
        self.tx.write_all(&self.frame).await?;

        if let Some(tail) = tail {
            self.tx.write_all(tail).await?;
        }

        self.tx.flush().await
    }

    /// Flushes and closes the underlying writer, the peer reads an end of stream afterwards.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.tx.shutdown().await
    }
}
