mod codec;
pub mod msg;
mod receiver;
mod sender;
pub mod specs;

use tokio::io::{AsyncRead, AsyncWrite};

pub use codec::{Deserialize, Serialize};
pub use receiver::OnoReceiver;
pub use sender::OnoSender;

/// Frame bodies are prefixed by their length as a big-endian `u64`.
type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// Frames larger than this are neither sent nor received.
const MAX_FRAME_LEN: usize = 1 << 30;

/// Wraps the two halves of a byte stream into a framed channel.
///
/// # Arguments
/// * `rx` - The half frames are read from.
/// * `tx` - The half frames are written to.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
