//! Append-only segmented key-value store: a durable map from string keys to
//! typed values (text or 64-bit signed integer) built on a per-segment
//! append log, an in-memory offset index, and size-triggered compaction.
//!
//! ```no_run
//! use kvstore::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::new("/tmp/my-store"))?;
//! store.put("k", "v")?;
//! assert_eq!(store.get("k")?, "v");
//! # Ok::<(), kvstore::Error>(())
//! ```

mod error;
mod record;
mod segment;
mod store;

pub use error::{Error, Result};
pub use record::TypeTag;
pub use store::{Store, StoreConfig};
