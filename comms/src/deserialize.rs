use std::io;

/// Types that can be rebuilt from the body of a frame.
pub trait Deserialize: Sized {
    /// Decodes an instance from the entire `buf`, trailing bytes are an error.
    fn deserialize(buf: &[u8]) -> io::Result<Self>;
}
