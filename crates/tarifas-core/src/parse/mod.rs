pub mod header;
pub mod table;
pub mod values;

pub use header::build_header_grid;
pub use table::{extract_table, looks_like_tariff_table};
pub use values::{parse_amount, parse_axles, parse_length_km};
