pub mod formats;
pub mod html;
pub mod json;
pub mod shape;
pub mod sql;
pub mod tabular;
pub mod toml;
pub mod xml;
pub mod yaml;

pub use formats::{
    convert_formats, convert_formats_with, format_content, list_formats, FormatDescriptor,
    FormatId,
};
