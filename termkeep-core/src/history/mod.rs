//! Durable per-pane scrollback history

mod error;
mod meta;
mod store;
mod writer;

pub use error::HistoryError;
pub use meta::HistoryMeta;
pub use store::{HistoryStore, OpenedHistory};
pub use writer::HistoryWriter;
