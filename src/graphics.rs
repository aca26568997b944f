//! Graphics device abstraction and render targets.

use std::{borrow::Cow, fmt};

pub mod device;
pub mod software;
pub mod target;

/// Error produced by the graphics layer.
#[derive(Clone, Debug)]
pub struct RenderingError {
    message: Cow<'static, str>,
}

impl RenderingError {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_error<E: fmt::Display>(front_message: &'static str, error: E) -> Self {
        Self {
            message: Cow::from(format!("{}{}", front_message, error)),
        }
    }

    pub(crate) fn from_string(message: String) -> Self {
        Self {
            message: Cow::from(message),
        }
    }

    pub(crate) fn from_str(message: &'static str) -> Self {
        Self {
            message: Cow::from(message),
        }
    }
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
