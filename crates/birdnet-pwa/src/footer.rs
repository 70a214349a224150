//! Footer data-source line.

use birdnet_dom::Document;
use tracing::trace;

/// Id of the footer element holding the data-source text.
pub const DATA_SOURCE_ID: &str = "dataSource";

/// Set the footer data-source text. Pages without the element are left alone.
pub fn set_footer_data_source_text(document: &Document, text: &str) -> bool {
    match document.get_element_by_id(DATA_SOURCE_ID) {
        Some(element) => {
            element.set_text_content(text);
            true
        }
        None => {
            trace!("No data source element");
            false
        }
    }
}
