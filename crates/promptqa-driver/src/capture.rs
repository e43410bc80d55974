use std::collections::HashMap;
use std::sync::Arc;

use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::browser_protocol::network::{EventRequestWillBeSent, EventResponseReceived};
use chromiumoxide_cdp::cdp::js_protocol::runtime::{
    ConsoleApiCalledEventType, EventConsoleApiCalled, EventExceptionThrown,
};
use futures::StreamExt;
use parking_lot::Mutex;
use promptqa_schema::{CaptureFrame, ConsoleEntry, ConsoleLevel, NetworkFailure, PageError};
use tokio::task::JoinHandle;

/// Subscribes to a page's console, network and runtime-exception CDP events
/// and accumulates them into a [`CaptureFrame`] that the runner flushes
/// after each step.
///
/// Three background tasks run for the lifetime of the page; they are
/// aborted when the collector is dropped.
pub struct CaptureCollector {
    frame: Arc<Mutex<CaptureFrame>>,
    request_methods: Arc<Mutex<HashMap<String, String>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CaptureCollector {
    /// Spawns the listener tasks. Fails only if the page's event stream
    /// cannot be established, which in practice means the session is gone.
    pub async fn attach(page: &Page) -> Result<Self, crate::errors::DriverError> {
        let frame = Arc::new(Mutex::new(CaptureFrame::default()));
        let request_methods: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));

        let mut console_events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(|err| crate::errors::DriverError::Cdp(err.to_string()))?;
        let console_frame = frame.clone();
        let console_task = tokio::spawn(async move {
            while let Some(event) = console_events.next().await {
                let level = match event.r#type {
                    ConsoleApiCalledEventType::Error => Some(ConsoleLevel::Error),
                    ConsoleApiCalledEventType::Warning => Some(ConsoleLevel::Warn),
                    _ => None,
                };
                let Some(level) = level else { continue };
                let text = event
                    .args
                    .iter()
                    .filter_map(|arg| arg.value.as_ref().map(|v| v.to_string()).or_else(|| arg.description.clone()))
                    .collect::<Vec<_>>()
                    .join(" ");
                console_frame.lock().console_entries.push(ConsoleEntry { level, text });
            }
        });

        let mut request_events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|err| crate::errors::DriverError::Cdp(err.to_string()))?;
        let methods_for_requests = request_methods.clone();
        let request_task = tokio::spawn(async move {
            while let Some(event) = request_events.next().await {
                methods_for_requests
                    .lock()
                    .insert(event.request_id.inner().to_string(), event.request.method.clone());
            }
        });

        let mut response_events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|err| crate::errors::DriverError::Cdp(err.to_string()))?;
        let response_frame = frame.clone();
        let methods_for_responses = request_methods.clone();
        let response_task = tokio::spawn(async move {
            while let Some(event) = response_events.next().await {
                let status = event.response.status as u16;
                if status < 400 {
                    continue;
                }
                let method = methods_for_responses
                    .lock()
                    .get(event.request_id.inner())
                    .cloned()
                    .unwrap_or_else(|| "GET".to_string());
                response_frame.lock().network_failures.push(NetworkFailure {
                    url: event.response.url.clone(),
                    status,
                    status_text: event.response.status_text.clone(),
                    method,
                });
            }
        });

        let mut exception_events = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(|err| crate::errors::DriverError::Cdp(err.to_string()))?;
        let exception_frame = frame.clone();
        let exception_task = tokio::spawn(async move {
            while let Some(event) = exception_events.next().await {
                let message = event
                    .exception_details
                    .exception
                    .as_ref()
                    .and_then(|ex| ex.description.clone())
                    .unwrap_or_else(|| event.exception_details.text.clone());
                exception_frame.lock().page_errors.push(PageError { message });
            }
        });

        Ok(Self {
            frame,
            request_methods,
            tasks: vec![console_task, request_task, response_task, exception_task],
        })
    }

    /// Drain everything accumulated since the last flush, applying the
    /// per-category caps, and reset the buffer for the next step.
    pub fn flush(&self) -> CaptureFrame {
        let mut guard = self.frame.lock();
        let mut frame = std::mem::take(&mut *guard);
        frame.truncate();
        // Keep the request-id -> method map from growing unbounded across a
        // long run; it is only needed to correlate in-flight responses.
        if self.request_methods.lock().len() > 500 {
            self.request_methods.lock().clear();
        }
        frame
    }
}

impl Drop for CaptureCollector {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
