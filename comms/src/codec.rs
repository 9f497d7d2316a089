use std::io;

/// Types that can be written into a frame.
pub trait Serialize<'a> {
    /// Writes the owned part of the message into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The frame buffer, already holding the length prefix.
    ///
    /// # Returns
    /// An optional borrowed tail that is written right after `buf` without copying it, or an
    /// error if the message could not be encoded.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}

/// Types that can be decoded from a received frame body, possibly borrowing from it.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
