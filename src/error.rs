//! Error handling.

use crate::{graphics::RenderingError, network::NetworkError};
use std::{error::Error, fmt};

/// Common error enum for the Volren library.
#[derive(Debug)]
pub enum VolrenError {
    RenderingError(RenderingError),
    NetworkError(NetworkError),
}

pub type VolrenResult<T> = Result<T, VolrenError>;

impl fmt::Display for VolrenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            VolrenError::RenderingError(ref error) => write!(f, "{}", error.message()),
            VolrenError::NetworkError(ref error) => write!(f, "{}", error.message()),
        }
    }
}

impl Error for VolrenError {}
