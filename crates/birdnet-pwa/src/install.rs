//! "Install this app" prompt.
//!
//! The browser offers installation through a deferred `beforeinstallprompt`
//! event. The controller keeps it in an explicit state machine:
//!
//! ```text
//!            beforeinstallprompt
//!   Idle ─────────────────────────► Armed
//!    ▲                                │ install click
//!    │ dismissed                      ▼
//!    └──────────────────────── user choice ── accepted ──► Resolved
//!
//!   appinstalled (any state) ──► Resolved
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use birdnet_dom::{Document, Element};
use tracing::{debug, info};

/// Class that makes the prompt container visible.
pub const SHOW_CLASS: &str = "show";

/// Outcome of the browser's install dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserChoice {
    Accepted,
    Dismissed,
}

/// A captured `beforeinstallprompt` event.
#[async_trait(?Send)]
pub trait DeferredPrompt {
    /// Suppress the browser's own install infobar.
    fn prevent_default(&self);

    /// Show the browser's install dialog.
    fn prompt(&self);

    /// Wait for the user to answer the dialog.
    async fn user_choice(&self) -> UserChoice;
}

/// Install prompt state.
pub enum InstallState {
    /// No prompt available.
    Idle,
    /// A deferred prompt is held and the UI is shown.
    Armed(Rc<dyn DeferredPrompt>),
    /// The app was installed.
    Resolved,
}

impl fmt::Debug for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::Idle => f.write_str("Idle"),
            InstallState::Armed(_) => f.write_str("Armed"),
            InstallState::Resolved => f.write_str("Resolved"),
        }
    }
}

/// Drives the install prompt container and its button.
#[derive(Debug)]
pub struct InstallPromptController {
    prompt: Rc<Element>,
    button: Rc<Element>,
    state: RefCell<InstallState>,
}

/// Wire the install prompt container `prompt_id` and its button `button_id`.
///
/// Returns `None` when either element is missing.
pub fn setup_install_prompt(
    document: &Document,
    prompt_id: &str,
    button_id: &str,
) -> Option<InstallPromptController> {
    let prompt = document.get_element_by_id(prompt_id)?;
    let button = document.get_element_by_id(button_id)?;
    debug!(prompt = prompt_id, button = button_id, "Install prompt ready");
    Some(InstallPromptController {
        prompt,
        button,
        state: RefCell::new(InstallState::Idle),
    })
}

impl InstallPromptController {
    /// The prompt container.
    pub fn prompt_element(&self) -> &Rc<Element> {
        &self.prompt
    }

    /// The install button.
    pub fn button(&self) -> &Rc<Element> {
        &self.button
    }

    /// No install prompt held.
    pub fn is_idle(&self) -> bool {
        matches!(*self.state.borrow(), InstallState::Idle)
    }

    /// A deferred prompt is held and the UI is shown.
    pub fn is_armed(&self) -> bool {
        matches!(*self.state.borrow(), InstallState::Armed(_))
    }

    /// The user accepted or the app was installed.
    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.borrow(), InstallState::Resolved)
    }

    /// `beforeinstallprompt`: keep the event for later and show the UI.
    pub fn on_before_install_prompt(&self, event: Rc<dyn DeferredPrompt>) {
        event.prevent_default();
        self.prompt.add_class(SHOW_CLASS);
        *self.state.borrow_mut() = InstallState::Armed(event);
        debug!("Install prompt armed");
    }

    /// Install button click. Does nothing unless a prompt is held.
    pub async fn on_install_click(&self) {
        let deferred = match &*self.state.borrow() {
            InstallState::Armed(deferred) => deferred.clone(),
            _ => return,
        };

        deferred.prompt();
        let choice = deferred.user_choice().await;
        debug!(?choice, "Install prompt answered");

        // The prompt is single-use whatever the answer.
        let mut state = self.state.borrow_mut();
        if choice == UserChoice::Accepted {
            self.prompt.remove_class(SHOW_CLASS);
            *state = InstallState::Resolved;
        } else if matches!(*state, InstallState::Armed(_)) {
            *state = InstallState::Idle;
        }
    }

    /// `appinstalled`: hide the UI and drop any held prompt.
    pub fn on_app_installed(&self) {
        self.prompt.remove_class(SHOW_CLASS);
        *self.state.borrow_mut() = InstallState::Resolved;
        info!("App installed");
    }
}
