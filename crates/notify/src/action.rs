use crate::NotifyError;

/// A button offered on a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostAction {
    /// Open the printer's web interface.
    OpenBrowser { url: String },
}

impl PostAction {
    /// Stable identifier hosts use to report which button was pressed.
    pub fn id(&self) -> &'static str {
        match self {
            PostAction::OpenBrowser { .. } => "open_browser",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PostAction::OpenBrowser { .. } => "Open Browser",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PostAction::OpenBrowser { .. } => "globe",
        }
    }

    pub fn tooltip(&self) -> &'static str {
        match self {
            PostAction::OpenBrowser { .. } => "Open browser to OctoPrint.",
        }
    }

    /// Runs the action against `handler`.
    pub fn perform(&self, handler: &dyn ActionHandler) -> Result<(), NotifyError> {
        match self {
            PostAction::OpenBrowser { url } => handler.open_url(url),
        }
    }
}

/// Host integration for notification actions.
pub trait ActionHandler {
    /// Opens `url` in the user's browser.
    fn open_url(&self, url: &str) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<String>>);

    impl ActionHandler for Recorder {
        fn open_url(&self, url: &str) -> Result<(), NotifyError> {
            self.0.borrow_mut().push(url.to_string());
            Ok(())
        }
    }

    #[test]
    fn open_browser_metadata() {
        let action = PostAction::OpenBrowser {
            url: "http://octopi.local".into(),
        };
        assert_eq!(action.id(), "open_browser");
        assert_eq!(action.label(), "Open Browser");
        assert_eq!(action.icon(), "globe");
    }

    #[test]
    fn perform_dispatches_url() {
        let handler = Recorder(RefCell::new(Vec::new()));
        PostAction::OpenBrowser {
            url: "http://octopi.local".into(),
        }
        .perform(&handler)
        .unwrap();
        assert_eq!(*handler.0.borrow(), vec!["http://octopi.local".to_string()]);
    }
}
