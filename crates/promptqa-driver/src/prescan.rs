use promptqa_schema::PageSnapshot;

use crate::driver::DriverPage;
use crate::errors::DriverError;

/// Cap on the `body.innerText` read the prescan routine performs, applied
/// before the text ever reaches [`PageSnapshot::new`] (which separately
/// enforces the wider 8000-character snapshot cap).
const PRESCAN_VISIBLE_TEXT_CHARS: usize = 4_000;

/// Navigates to `url` and builds the initial [`PageSnapshot`] the planner
/// sees before it produces a plan.
pub async fn run(page: &dyn DriverPage, url: &str) -> Result<PageSnapshot, DriverError> {
    page.goto(url).await?;
    current(page).await
}

/// Re-snapshots the current page without navigating. Used by the agent loop
/// after every step, and by the plan-once loop's failure diagnostics.
pub async fn current(page: &dyn DriverPage) -> Result<PageSnapshot, DriverError> {
    let (url, title, visible_text, meta_description, elements) = tokio::try_join!(
        page.current_url(),
        page.title(),
        page.visible_text(),
        page.meta_description(),
        page.interactive_elements(),
    )?;

    let mut snapshot = PageSnapshot::new(url, title, truncate_chars(&visible_text, PRESCAN_VISIBLE_TEXT_CHARS));
    snapshot.elements = elements;
    snapshot.meta_description = meta_description;
    Ok(snapshot)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_visible_text_to_four_thousand_chars() {
        let long = "x".repeat(PRESCAN_VISIBLE_TEXT_CHARS + 200);
        let truncated = truncate_chars(&long, PRESCAN_VISIBLE_TEXT_CHARS);
        assert_eq!(truncated.chars().count(), PRESCAN_VISIBLE_TEXT_CHARS);
    }
}
