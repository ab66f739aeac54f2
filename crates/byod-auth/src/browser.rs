//! Opening the sign-in page in the user's browser

use tracing::debug;

use crate::error::LaunchError;

/// URL of the sign-in page for a listener bound on `port`
pub fn signin_url(port: u16) -> String {
    format!("http://localhost:{}/signin", port)
}

/// Something that can show a URL to the user
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), LaunchError>;
}

/// The operating system's default URL handler
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), LaunchError> {
        debug!(url, "Opening default browser");
        open::that(url).map_err(|e| LaunchError {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
