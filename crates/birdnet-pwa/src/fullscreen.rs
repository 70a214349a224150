//! Fullscreen toggle button.

use std::rc::Rc;

use birdnet_dom::{Document, Element};
use tracing::{debug, warn};

/// Label shown on the button in both states.
pub const FULLSCREEN_LABEL: &str = "⛶";

/// Button title while fullscreen.
pub const EXIT_TITLE: &str = "Exit Fullscreen";

/// Button title while not fullscreen.
pub const ENTER_TITLE: &str = "Enter Fullscreen";

/// Drives one fullscreen button.
#[derive(Debug, Clone)]
pub struct FullscreenController {
    document: Rc<Document>,
    button: Rc<Element>,
}

/// Wire the fullscreen button with id `button_id`.
///
/// Returns `None` when the page has no such button.
pub fn setup_fullscreen(document: &Rc<Document>, button_id: &str) -> Option<FullscreenController> {
    let button = document.get_element_by_id(button_id)?;
    debug!(button = button_id, "Fullscreen toggle ready");
    Some(FullscreenController {
        document: document.clone(),
        button,
    })
}

impl FullscreenController {
    /// The button element.
    pub fn button(&self) -> &Rc<Element> {
        &self.button
    }

    /// Button click: enter fullscreen, or leave it when already fullscreen.
    ///
    /// A refused request is logged and leaves the state unchanged.
    pub fn toggle(&self) {
        if !self.document.is_fullscreen() {
            if let Err(e) = self.document.request_fullscreen() {
                warn!("Error attempting to enable fullscreen: {}", e);
            }
        } else if let Err(e) = self.document.exit_fullscreen() {
            debug!(error = %e, "Exit fullscreen failed");
        }
    }

    /// `fullscreenchange`: refresh the button label and title.
    pub fn sync(&self) {
        self.button.set_text_content(FULLSCREEN_LABEL);
        if self.document.is_fullscreen() {
            self.button.set_title(EXIT_TITLE);
        } else {
            self.button.set_title(ENTER_TITLE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use birdnet_dom::DocumentEvent;

    fn document() -> Rc<Document> {
        Rc::new(Document::new().with_element(Element::new("button", "fullscreenBtn")))
    }

    #[test]
    fn test_missing_button() {
        assert!(setup_fullscreen(&document(), "other").is_none());
    }

    #[test]
    fn test_toggle_enters_and_exits() {
        let document = document();
        let controller = setup_fullscreen(&document, "fullscreenBtn").unwrap();

        controller.toggle();
        assert!(document.is_fullscreen());
        controller.sync();
        assert_eq!(controller.button().title().as_deref(), Some(EXIT_TITLE));
        assert_eq!(controller.button().text_content(), FULLSCREEN_LABEL);

        controller.toggle();
        assert!(!document.is_fullscreen());
        controller.sync();
        assert_eq!(controller.button().title().as_deref(), Some(ENTER_TITLE));

        assert_eq!(
            document.take_events(),
            vec![DocumentEvent::FullscreenChange, DocumentEvent::FullscreenChange]
        );
    }

    #[test]
    fn test_refused_request_leaves_state() {
        let document = document();
        document.set_fullscreen_enabled(false);
        let controller = setup_fullscreen(&document, "fullscreenBtn").unwrap();

        controller.toggle();

        assert!(!document.is_fullscreen());
        assert!(document.take_events().is_empty());
        assert!(controller.button().title().is_none());
    }

    #[test]
    fn test_sync_follows_external_exit() {
        let document = document();
        let controller = setup_fullscreen(&document, "fullscreenBtn").unwrap();
        controller.toggle();
        controller.sync();

        // Escape key
        document.exit_fullscreen().unwrap();
        controller.sync();

        assert_eq!(controller.button().title().as_deref(), Some(ENTER_TITLE));
    }
}
