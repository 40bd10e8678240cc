//! Opening the hosted login page

use std::io;

/// Something that can show the user a URL
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

impl<F> BrowserLauncher for F
where
    F: Fn(&str) -> io::Result<()> + Send + Sync,
{
    fn open(&self, url: &str) -> io::Result<()> {
        self(url)
    }
}

/// Launches the platform's default browser.
///
/// The launcher process is detached and reaped by the `open` crate, so no
/// child is left behind for the lifetime of the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        open::that_detached(url)
    }
}
