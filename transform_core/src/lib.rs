//! Conversion engine behind the transform tools UI.
//!
//! Structured documents (JSON, XML, YAML, TOML, CSV, TSV, SQL inserts) are read
//! into one [`value::Value`] model and written back out in any target format;
//! byte and text encodings (Base16/32/58/64, URL, HTML entities, UTF-8
//! escapes) run through [`encode`]. The `#[wasm_bindgen]` functions below are
//! the surface the web UI calls; native callers use the modules directly.
use console_error_panic_hook::set_once as set_panic_hook;
use wasm_bindgen::prelude::*;

pub mod config;
pub mod convert;
pub mod encode;
pub mod error;
pub mod value;

pub use config::{ConvertOptions, SqlDialect};
pub use convert::{convert_formats, convert_formats_with, format_content, FormatDescriptor, FormatId};
pub use encode::{apply_encoding_bytes, list_schemes, EncodingScheme, SchemeId};
pub use error::{ConversionError, ErrorReport};
pub use value::{Number, Record, Value};

#[wasm_bindgen(start)]
pub fn wasm_start() {
    set_panic_hook();
}

/// Errors cross into JavaScript as the serialized [`ErrorReport`] object.
fn to_js_error(err: ConversionError) -> JsValue {
    serde_wasm_bindgen::to_value(&err.report()).unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn convert_format(from: &str, to: &str, input: &str) -> Result<String, JsValue> {
    convert_formats(from, to, input).map_err(to_js_error)
}

/// Same as [`convert_format`] with a partial options object, e.g.
/// `{ pretty: false, sqlDialect: "mysql" }`. `undefined` means defaults.
#[wasm_bindgen]
pub fn convert_format_with_options(
    from: &str,
    to: &str,
    input: &str,
    options: JsValue,
) -> Result<String, JsValue> {
    let options = options_from_js(from, to, options)?;
    convert_formats_with(from, to, input, &options).map_err(to_js_error)
}

fn options_from_js(from: &str, to: &str, options: JsValue) -> Result<ConvertOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(ConvertOptions::default());
    }
    serde_wasm_bindgen::from_value(options).map_err(|err| {
        to_js_error(ConversionError::new(
            error::Stage::Resolve,
            from,
            to,
            error::ErrorDetail::InvalidOptions {
                message: err.to_string(),
            },
        ))
    })
}

#[wasm_bindgen]
pub fn format_content_text(format: &str, input: &str, minify: bool) -> Result<String, JsValue> {
    format_content(format, input, minify).map_err(to_js_error)
}

#[wasm_bindgen]
pub fn apply_encoding(scheme: &str, direction: &str, input: &str) -> Result<String, JsValue> {
    encode::apply_encoding(scheme, direction, input).map_err(to_js_error)
}

/// Binary variant of [`apply_encoding`] for payloads that are not UTF-8.
#[wasm_bindgen]
pub fn apply_encoding_to_bytes(scheme: &str, direction: &str, input: &[u8]) -> Result<Vec<u8>, JsValue> {
    apply_encoding_bytes(scheme, direction, input).map_err(to_js_error)
}

#[wasm_bindgen]
pub fn list_formats() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&convert::list_formats()).map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn list_encodings() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&list_schemes()).map_err(|err| JsValue::from_str(&err.to_string()))
}
