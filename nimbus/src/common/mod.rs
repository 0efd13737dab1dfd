pub(crate) mod bit_buffer2;
pub(crate) mod buffer2;
pub(crate) mod parallel;

pub use bit_buffer2::BitBuffer2;
pub use buffer2::Buffer2;
