use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::image_processor::sniff_mime_type;

/// Inline `data:` URI for the given bytes, tagged with the sniffed mime type.
pub fn to_data_uri(data: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime_type(data), STANDARD.encode(data))
}
