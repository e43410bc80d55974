use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use promptqa_schema::{CaptureFrame, InteractiveElement, SelectorHint};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::capture::CaptureCollector;
use crate::driver::DriverPage;
use crate::errors::DriverError;
use crate::selector_resolver;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Owns the chromiumoxide browser process and its event-handling task.
///
/// Dropping this keeps the child process and handler task running; callers
/// must call [`ChromiumDriver::close`] to shut down cleanly.
pub struct ChromiumDriver {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    pub async fn launch(headless: bool) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(|err| DriverError::Cdp(err.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::Crashed(err.to_string()))?;

        let task = tokio::spawn(async move {
            use futures::StreamExt;
            while handler.next().await.is_some() {}
        });

        Ok(Self { browser, handler: task })
    }

    pub async fn new_page(&self) -> Result<ChromiumPage, DriverError> {
        let page = self.browser.new_page("about:blank").await.map_err(|err| DriverError::Crashed(err.to_string()))?;
        let capture = CaptureCollector::attach(&page).await?;
        Ok(ChromiumPage { page, capture })
    }

    pub async fn close(mut self) -> Result<(), DriverError> {
        self.browser.close().await.map_err(|err| DriverError::Crashed(err.to_string()))?;
        self.handler.abort();
        Ok(())
    }
}

/// One tab, paired with the capture collector attached to it.
pub struct ChromiumPage {
    page: Page,
    capture: CaptureCollector,
}

#[async_trait]
impl DriverPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|err| DriverError::NavigationFailed { url: url.to_string(), message: err.to_string() })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|err| DriverError::NavigationFailed { url: url.to_string(), message: err.to_string() })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.page
            .url()
            .await
            .map_err(|err| DriverError::Cdp(err.to_string()))?
            .ok_or_else(|| DriverError::Cdp("page has no url".into()))
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.page.get_title().await.map_err(|err| DriverError::Cdp(err.to_string()))?.unwrap_or_default())
    }

    async fn visible_text(&self) -> Result<String, DriverError> {
        evaluate_string(&self.page, "document.body ? document.body.innerText : ''").await
    }

    async fn meta_description(&self) -> Result<Option<String>, DriverError> {
        let text = evaluate_string(
            &self.page,
            "(document.querySelector('meta[name=\"description\"]') || {}).content || ''",
        )
        .await?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    async fn interactive_elements(&self) -> Result<Vec<InteractiveElement>, DriverError> {
        let raw = self
            .page
            .evaluate(INTERACTIVE_ELEMENTS_SCRIPT)
            .await
            .map_err(|err| DriverError::Cdp(err.to_string()))?
            .into_value::<Vec<InteractiveElement>>()
            .map_err(|err| DriverError::Cdp(err.to_string()))?;
        Ok(raw)
    }

    async fn click(&self, hint: &SelectorHint) -> Result<(), DriverError> {
        let element = selector_resolver::resolve(&self.page, hint).await?;
        element.scroll_into_view().await.map_err(|err| DriverError::Cdp(err.to_string()))?;
        element
            .click()
            .await
            .map_err(|_| DriverError::ActionNoEffect { description: format!("click on {hint:?}") })?;
        Ok(())
    }

    async fn type_text(&self, hint: &SelectorHint, text: &str) -> Result<(), DriverError> {
        let element = selector_resolver::resolve(&self.page, hint).await?;
        element.click().await.map_err(|err| DriverError::Cdp(err.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|_| DriverError::ActionNoEffect { description: format!("type into {hint:?}") })?;
        Ok(())
    }

    async fn select(&self, hint: &SelectorHint, value: &str) -> Result<(), DriverError> {
        let element = selector_resolver::resolve(&self.page, hint).await?;
        element
            .select(vec![value])
            .await
            .map_err(|_| DriverError::ActionNoEffect { description: format!("select {value} in {hint:?}") })?;
        Ok(())
    }

    async fn set_input_files(&self, hint: &SelectorHint, path: &str) -> Result<(), DriverError> {
        let element = selector_resolver::resolve(&self.page, hint).await?;
        element
            .set_file_input_files(vec![PathBuf::from(path)])
            .await
            .map_err(|_| DriverError::ActionNoEffect { description: format!("upload {path} to {hint:?}") })?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        self.page
            .keyboard()
            .press_key(key)
            .await
            .map_err(|err| DriverError::Cdp(err.to_string()))?;
        Ok(())
    }

    async fn wait_for(&self, hint: Option<&SelectorHint>, timeout_ms: u64) -> Result<(), DriverError> {
        match hint {
            Some(hint) => poll_until(timeout_ms, || async {
                selector_resolver::resolve(&self.page, hint).await.is_ok()
            })
            .await
            .ok_or_else(|| DriverError::Timeout { what: format!("{hint:?}"), timeout_ms }),
            None => {
                sleep(Duration::from_millis(timeout_ms)).await;
                Ok(())
            }
        }
    }

    async fn expect_text(&self, hint: Option<&SelectorHint>, needle: &str, timeout_ms: u64) -> Result<(), DriverError> {
        let needle = needle.to_string();
        poll_until(timeout_ms, || async {
            let haystack = match hint {
                Some(hint) => match selector_resolver::resolve(&self.page, hint).await {
                    Ok(element) => element.inner_text().await.ok().flatten().unwrap_or_default(),
                    Err(_) => return false,
                },
                None => self.visible_text().await.unwrap_or_default(),
            };
            haystack.contains(&needle)
        })
        .await
        .ok_or_else(|| DriverError::Timeout { what: format!("text {needle:?}"), timeout_ms })
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        let params = ScreenshotParams::builder().format(CaptureScreenshotFormat::Png).full_page(true).build();
        self.page.screenshot(params).await.map_err(|err| DriverError::Cdp(err.to_string()))
    }

    async fn add_cookies(&self, cookies: &[(String, String)], url: &str) -> Result<(), DriverError> {
        let params = cookies
            .iter()
            .map(|(name, value)| {
                CookieParam::builder()
                    .name(name.clone())
                    .value(value.clone())
                    .url(url.to_string())
                    .build()
                    .map_err(|err| DriverError::Cdp(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.page.set_cookies(params).await.map_err(|err| DriverError::Cdp(err.to_string()))?;
        Ok(())
    }

    async fn flush_capture(&self) -> CaptureFrame {
        self.capture.flush()
    }
}

async fn evaluate_string(page: &Page, script: &str) -> Result<String, DriverError> {
    let value = page
        .evaluate(script)
        .await
        .map_err(|err| DriverError::Cdp(err.to_string()))?
        .into_value::<String>()
        .map_err(|err| DriverError::Cdp(err.to_string()))?;
    Ok(value)
}

/// Polls `check` every [`POLL_INTERVAL`] until it returns `true` or
/// `timeout_ms` elapses.
async fn poll_until<F, Fut>(timeout_ms: u64, mut check: F) -> Option<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if check().await {
            return Some(());
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Walks the DOM for buttons, links, inputs, selects and textareas, plus
/// anything carrying `data-testid` or `role`, mirroring the fields captured
/// in [`InteractiveElement`].
const INTERACTIVE_ELEMENTS_SCRIPT: &str = r#"
(() => {
  const nodes = document.querySelectorAll(
    "button, a, input, select, textarea, [data-testid], [role]"
  );
  return Array.from(nodes).slice(0, 300).map((el) => ({
    tag: el.tagName.toLowerCase(),
    type: el.getAttribute("type") || undefined,
    text: (el.innerText || el.value || "").trim().slice(0, 200) || undefined,
    testId: el.getAttribute("data-testid") || undefined,
    name: el.getAttribute("name") || undefined,
    placeholder: el.getAttribute("placeholder") || undefined,
    href: el.getAttribute("href") || undefined,
    options: el.tagName.toLowerCase() === "select"
      ? Array.from(el.options).map((o) => o.value)
      : undefined,
    disabled: !!el.disabled,
    readOnly: !!el.readOnly,
    classList: el.className ? el.className.toString().split(/\s+/).filter(Boolean) : undefined,
    ariaBusy: el.getAttribute("aria-busy") === "true",
  }));
})()
"#;
