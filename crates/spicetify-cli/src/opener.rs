//! Hands URIs to the platform's URL handler.

use std::io;

/// Opens URIs outside the process.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait UrlOpener {
    /// Opens `uri` without waiting for the handler to exit.
    fn open(&self, uri: &str) -> io::Result<()>;
}

/// Opener backed by the desktop's registered handlers.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, uri: &str) -> io::Result<()> {
        open::that_detached(uri)
    }
}
