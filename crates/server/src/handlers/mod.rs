//! Request handlers, one module per endpoint family.

mod compat;
mod download;
mod index;
mod metadata;
mod status;

pub use compat::{compat_map, compat_search, compat_set};
pub use download::download;
pub use index::index;
pub use metadata::{beatmap, refresh_set, search, set, set_by_md5};
pub use status::status;
