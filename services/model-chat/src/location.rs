//! Terminal implementation of the session's page location.
//!
//! A command run plays the part of one page load: `href` is the URL the
//! session inspects for a returned code, `assign` prints the authorization
//! URL for the user to open, and `reload` just ends the run.

use std::sync::Mutex;

use aps_auth::Location;
use tracing::{debug, info};
use url::Url;

pub struct CliLocation {
    href: Mutex<Url>,
}

impl CliLocation {
    pub fn new(href: Url) -> Self {
        Self {
            href: Mutex::new(href),
        }
    }
}

impl Location for CliLocation {
    fn href(&self) -> Url {
        match self.href.lock() {
            Ok(href) => href.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn clear_query(&self) {
        let mut href = match self.href.lock() {
            Ok(href) => href,
            Err(poisoned) => poisoned.into_inner(),
        };
        href.set_query(None);
        debug!(href = %href, "cleared redirect query");
    }

    fn assign(&self, url: &Url) {
        info!(
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            "opening authorization page"
        );
        println!("Open this URL in your browser to sign in:\n\n  {url}\n");
    }

    fn reload(&self) {
        debug!("session reset");
    }
}
