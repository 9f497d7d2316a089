use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Deserialize, LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN};

/// The receiving end of a framed channel.
///
/// Frames are read into a caller owned buffer of `u32`s, so the body always starts 4 byte
/// aligned and weights can be borrowed from it as `f32`s without a copy.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self { rx }
    }

    async fn frame_len(&mut self) -> io::Result<usize> {
        let mut header = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut header).await?;

        match usize::try_from(LenType::from_be_bytes(header)) {
            Ok(len) if len <= MAX_FRAME_LEN => Ok(len),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("announced frame exceeds the {MAX_FRAME_LEN} bytes limit"),
            )),
        }
    }

    /// Waits for the next frame and decodes it.
    ///
    /// # Arguments
    /// * `buf` - Storage for the frame body, the returned `T` borrows from it.
    ///
    /// # Returns
    /// The decoded message, `UnexpectedEof` if the peer closed the stream or `InvalidData` if
    /// the frame is oversized or malformed.
    pub async fn recv_into<'buf, T>(&mut self, buf: &'buf mut Vec<u32>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
    {
        let len = self.frame_len().await?;

        buf.clear();
        buf.resize(len.div_ceil(size_of::<u32>()), 0);

        let body = &mut bytemuck::cast_slice_mut::<u32, u8>(buf)[..len];
        self.rx.read_exact(body).await?;

        T::deserialize(body)
    }
}
