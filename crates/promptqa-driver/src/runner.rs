use promptqa_schema::{Step, StepExecutionResult, StepKind, MAX_VISIBLE_TEXT_CHARS};

use crate::driver::DriverPage;
use crate::errors::DriverError;

/// Default wait used by `wait`/`expect_text` steps that don't carry an
/// explicit timeout.
const DEFAULT_STEP_TIMEOUT_MS: u64 = 8_000;

/// Executes one [`Step`] against a live page and builds the
/// [`StepExecutionResult`] the planner loop records, including a fresh
/// screenshot and the capture frame accumulated while the action ran.
///
/// Evaluation is left `None` here; the caller (plan-once loop or agent
/// loop) attaches it after consulting the judge.
pub async fn execute_step(
    page: &dyn DriverPage,
    step: &Step,
    step_index: usize,
    screenshot_dir: Option<&std::path::Path>,
) -> Result<StepExecutionResult, DriverError> {
    // Flush stale capture before running the action so this step's frame
    // only reflects what happened while it executed.
    let _ = page.flush_capture().await;

    let timeout_ms = step.timeout.unwrap_or(DEFAULT_STEP_TIMEOUT_MS);
    let outcome = run_action(page, step, timeout_ms).await;
    let success = outcome.is_ok();

    if let Err(err) = &outcome {
        tracing::warn!(step = step_index, kind = step.type_name(), error = %err, "step failed");
    }

    // Screenshot is best-effort: a crashed page must not prevent the
    // result from being recorded.
    let screenshot_path = match screenshot_dir {
        Some(dir) => match save_screenshot(page, dir, step_index).await {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(step = step_index, error = %err, "screenshot capture failed");
                None
            }
        },
        None => None,
    };

    // Re-read current URL and visible text directly (not through the
    // prescan routine, whose 4000-character cap is specific to building a
    // planner-facing snapshot); this step-local read is capped at the
    // wider MAX_VISIBLE_TEXT_CHARS instead.
    let url = match page.current_url().await {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(step = step_index, error = %err, "post-step url read failed");
            String::new()
        }
    };
    let visible_text = match page.visible_text().await {
        Ok(text) => truncate_chars(&text, MAX_VISIBLE_TEXT_CHARS),
        Err(err) => {
            tracing::warn!(step = step_index, error = %err, "post-step visible text read failed");
            String::new()
        }
    };
    let capture = page.flush_capture().await;

    Ok(StepExecutionResult {
        step_index,
        step: step.clone(),
        success,
        url,
        screenshot_path,
        visible_text,
        capture,
        evaluation: None,
    })
}

async fn run_action(page: &dyn DriverPage, step: &Step, timeout_ms: u64) -> Result<(), DriverError> {
    match &step.kind {
        StepKind::Goto { value } => page.goto(value).await,
        StepKind::Click { selector, .. } => page.click(selector).await,
        StepKind::Type { selector, value } => {
            page.type_text(selector, value.as_deref().unwrap_or_default()).await
        }
        StepKind::Select { selector, value } => {
            page.select(selector, value.as_deref().unwrap_or_default()).await
        }
        StepKind::Upload { selector, value } => {
            page.set_input_files(selector, value.as_deref().unwrap_or_default()).await
        }
        StepKind::PressKey { value } => page.press_key(value).await,
        StepKind::Wait { selector, .. } => page.wait_for(selector.as_ref(), timeout_ms).await,
        StepKind::ExpectText { selector, value } => page.expect_text(selector.as_ref(), value, timeout_ms).await,
    }
}

async fn save_screenshot(
    page: &dyn DriverPage,
    dir: &std::path::Path,
    step_index: usize,
) -> Result<String, DriverError> {
    let bytes = page.screenshot_png().await?;
    let path = dir.join(format!("step-{step_index}.png"));
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, &bytes).await?;
    Ok(path.to_string_lossy().into_owned())
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
    fn truncates_to_max_visible_text_chars() {
        let long = "y".repeat(MAX_VISIBLE_TEXT_CHARS + 10);
        assert_eq!(truncate_chars(&long, MAX_VISIBLE_TEXT_CHARS).chars().count(), MAX_VISIBLE_TEXT_CHARS);
    }
}
