mod compression;
mod render;
mod sharding;

pub use compression::{gzip_file, ungzip_file, CompressionError};
pub use render::{xml_index, xml_map};
pub use sharding::{save_index, save_map, SaveReport, SavedFile, WriteError};
