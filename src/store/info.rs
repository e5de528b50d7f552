use std::sync::{Arc, Mutex};

use crate::broadcast::ChangeSignal;

pub const DEFAULT_STATUS_TEXT: &str = "No treasury info yet.";

/// The freeform status text shown on the dashboard. A degenerate data source:
/// no history, just the current value, replaced wholesale by the
/// administrative endpoint. Every replacement fires the change signal so the
/// hub pushes a fresh snapshot.
#[derive(Clone)]
pub struct InfoRegister {
    text: Arc<Mutex<String>>,
    changed: ChangeSignal,
}

impl InfoRegister {
    pub fn new(changed: ChangeSignal) -> Self {
        Self {
            text: Arc::new(Mutex::new(DEFAULT_STATUS_TEXT.to_string())),
            changed,
        }
    }

    pub fn set(&self, text: String) {
        *self.text.lock().unwrap() = text;
        self.changed.notify();
    }

    pub fn get(&self) -> String {
        self.text.lock().unwrap().clone()
    }
}
