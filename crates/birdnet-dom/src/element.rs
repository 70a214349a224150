//! Elements addressed by id.

use std::cell::RefCell;
use std::collections::HashMap;

/// An element the page helpers can find by id and mutate.
#[derive(Debug)]
pub struct Element {
    /// Value of the `id` attribute.
    id: String,
    /// Lower-case tag name.
    tag_name: String,
    /// Attributes other than `class`.
    attributes: RefCell<HashMap<String, String>>,
    /// Class list in document order.
    classes: RefCell<Vec<String>>,
    /// Text content.
    text: RefCell<String>,
}

impl Element {
    /// Create an element.
    pub fn new(tag_name: &str, id: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("id".to_string(), id.to_string());
        Self {
            id: id.to_string(),
            tag_name: tag_name.to_ascii_lowercase(),
            attributes: RefCell::new(attributes),
            classes: RefCell::new(Vec::new()),
            text: RefCell::new(String::new()),
        }
    }

    /// Builder: set an attribute.
    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: set the text content.
    pub fn with_text(self, text: &str) -> Self {
        self.set_text_content(text);
        self
    }

    /// The element id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The tag name.
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Get an attribute value.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        if name == "class" {
            let classes = self.classes.borrow();
            return (!classes.is_empty()).then(|| classes.join(" "));
        }
        self.attributes.borrow().get(name).cloned()
    }

    /// Set an attribute value.
    pub fn set_attribute(&self, name: &str, value: &str) {
        if name == "class" {
            *self.classes.borrow_mut() = value.split_whitespace().map(str::to_string).collect();
            return;
        }
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    /// `title` attribute (tooltip).
    pub fn title(&self) -> Option<String> {
        self.get_attribute("title")
    }

    /// Set the `title` attribute.
    pub fn set_title(&self, title: &str) {
        self.set_attribute("title", title);
    }

    /// Text content.
    pub fn text_content(&self) -> String {
        self.text.borrow().clone()
    }

    /// Replace the text content.
    pub fn set_text_content(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
    }

    /// `classList.contains()`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.borrow().iter().any(|c| c == class)
    }

    /// `classList.add()`.
    pub fn add_class(&self, class: &str) {
        if !self.has_class(class) {
            self.classes.borrow_mut().push(class.to_string());
        }
    }

    /// `classList.remove()`.
    pub fn remove_class(&self, class: &str) {
        self.classes.borrow_mut().retain(|c| c != class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_list() {
        let el = Element::new("div", "installPrompt").with_attribute("class", "banner hidden");
        assert!(el.has_class("banner"));

        el.add_class("show");
        el.add_class("show");
        assert_eq!(el.get_attribute("class").as_deref(), Some("banner hidden show"));

        el.remove_class("hidden");
        el.remove_class("missing");
        assert_eq!(el.get_attribute("class").as_deref(), Some("banner show"));
    }

    #[test]
    fn test_attributes_and_text() {
        let el = Element::new("BUTTON", "fullscreenBtn").with_text("⛶");
        assert_eq!(el.tag_name(), "button");
        assert_eq!(el.get_attribute("id").as_deref(), Some("fullscreenBtn"));
        assert!(el.title().is_none());

        el.set_title("Enter Fullscreen");
        assert_eq!(el.title().as_deref(), Some("Enter Fullscreen"));
        assert_eq!(el.text_content(), "⛶");
    }
}
