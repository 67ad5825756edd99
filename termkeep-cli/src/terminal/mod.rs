//! Local terminal handling for `termkeep attach`

mod keys;
mod raw;

pub use keys::{KeyInput, encode_key};
pub use raw::RawTerminal;
