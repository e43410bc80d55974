use chromiumoxide::element::Element;
use chromiumoxide::Page;
use promptqa_schema::{SelectorHint, SelectorStrategy};

use crate::errors::DriverError;

/// Candidate tags scanned for the `text` and `role` strategies. Kept small
/// and interaction-shaped rather than scanning the whole document, since a
/// page can have thousands of `div`s carrying no semantic meaning.
const CANDIDATE_SELECTOR: &str =
    "button, a, [role], label, li, span, input[type='submit'], input[type='button'], input[type='checkbox'], input[type='radio']";

/// Turns a [`SelectorHint`] into a concrete chromiumoxide [`Element`].
///
/// `testid` and `css` resolve directly through CSS queries; `role` and
/// `text` fall back to scanning [`CANDIDATE_SELECTOR`] because chromiumoxide
/// has no accessibility-tree query of its own.
pub async fn resolve(page: &Page, hint: &SelectorHint) -> Result<Element, DriverError> {
    match hint.strategy {
        SelectorStrategy::Testid => {
            let css = format!("[data-testid='{}']", escape_attr(&hint.value));
            find_one(page, &css).await
        }
        SelectorStrategy::Css => find_one(page, &hint.value).await,
        SelectorStrategy::Role => {
            let role = hint.role.as_deref().unwrap_or_default();
            find_by_predicate(page, |element_role, element_text| {
                element_role.map(|r| r.eq_ignore_ascii_case(role)).unwrap_or(false)
                    && hint.name.as_deref().map(|name| element_text.trim() == name).unwrap_or(true)
            })
            .await
        }
        SelectorStrategy::Text => {
            let needle = hint.value.trim();
            find_by_predicate(page, |_role, element_text| element_text.trim() == needle).await
        }
    }
}

async fn find_one(page: &Page, css: &str) -> Result<Element, DriverError> {
    page.find_element(css).await.map_err(|_| DriverError::ElementNotFound { selector: css.to_string() })
}

async fn find_by_predicate(
    page: &Page,
    matches: impl Fn(Option<&str>, &str) -> bool,
) -> Result<Element, DriverError> {
    let candidates = page
        .find_elements(CANDIDATE_SELECTOR)
        .await
        .map_err(|err| DriverError::Cdp(err.to_string()))?;

    for element in candidates {
        let role = element.attribute("role").await.ok().flatten();
        let text = element.inner_text().await.ok().flatten().unwrap_or_default();
        if matches(role.as_deref(), &text) {
            return Ok(element);
        }
    }

    Err(DriverError::ElementNotFound { selector: CANDIDATE_SELECTOR.to_string() })
}

fn escape_attr(value: &str) -> String {
    value.replace('\'', "\\'")
}
