pub mod xlights;

pub use xlights::{parse_layout_file, parse_layout_reader, parse_layout_str, ParsedLayout};
