//! Archive extraction with path sanitization and root-folder collapsing.
//!
//! - `format.rs` - Format detection from magic bytes
//! - `sanitize.rs` - Path sanitization (zip-slip prevention)
//! - `extract.rs` - Zip and tar(.gz) extraction
//! - `normalize.rs` - Placement of the extracted tree, collapsing a single
//!   wrapping directory

pub use error::{Error, Result};
pub use extract::{ExtractReport, extract_file};
pub use format::{ArchiveFormat, TarCompress, detect_format};
pub use normalize::{Placement, collapse_into, extract_into_empty};
pub use sanitize::sanitize_path;

mod error;
mod extract;
mod format;
mod normalize;
mod sanitize;
