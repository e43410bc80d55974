//! Bootstraps one browser session: launches Chromium, opens a page, and
//! attaches any configured pre-auth cookies before the first navigation.

use promptqa_driver::{ChromiumDriver, ChromiumPage, DriverPage};

use crate::config::{parse_cookie_string, AuthConfig};
use crate::errors::PromptQaError;

/// Owns the launched browser and its single page for the lifetime of one
/// run. `page()` hands out the trait-object view the loops consume.
pub struct Session {
    driver: ChromiumDriver,
    page: ChromiumPage,
}

impl Session {
    /// Launches Chromium, opens one page, and attaches cookies parsed from
    /// `auth.cookie` (if set) against `base_url`.
    pub async fn bootstrap(headless: bool, base_url: &str, auth: &AuthConfig) -> Result<Self, PromptQaError> {
        let driver = ChromiumDriver::launch(headless).await?;
        let page = driver.new_page().await?;

        if let Some(cookie_string) = &auth.cookie {
            let cookies = parse_cookie_string(cookie_string)?;
            page.add_cookies(&cookies, base_url).await?;
        }

        Ok(Self { driver, page })
    }

    pub fn page(&self) -> &dyn DriverPage {
        &self.page
    }

    pub async fn close(self) -> Result<(), PromptQaError> {
        self.driver.close().await?;
        Ok(())
    }
}
