//! Text primitives shared by the engine and its clients: the growable
//! character container, the fragment stream the renderer assembles output
//! with, and the decimal number codecs.

mod buffer;
pub mod number;
mod stream;

pub use buffer::{Buffer, soft_trim};
pub use stream::Stream;
