//! Browser session ownership.
//!
//! [`PageDriver`] is the blocking seam the runner drives. [`ChromeSession`] backs it with a
//! headless Chromium reached over CDP; the async client is pumped on a private tokio runtime
//! so every call returns only once the browser has finished the action.

use std::fmt::Display;
use std::io;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::BrowserOptions;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start browser runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("invalid browser configuration: {0}")]
    Config(String),
    #[error("failed to launch browser: {0}")]
    Launch(#[source] CdpError),
    #[error("failed to open page: {0}")]
    NewPage(#[source] CdpError),
    #[error("failed to navigate to {url}: {source}")]
    Navigate {
        url: String,
        #[source]
        source: CdpError,
    },
    #[error("failed to evaluate `{expression}`: {source}")]
    Evaluate {
        expression: String,
        #[source]
        source: CdpError,
    },
    #[error("failed to capture screenshot: {0}")]
    Screenshot(#[source] CdpError),
    #[error("failed to build {key} key event: {message}")]
    KeyEvent { key: &'static str, message: String },
    #[error("failed to dispatch {key} key event: {source}")]
    Input {
        key: &'static str,
        #[source]
        source: CdpError,
    },
    #[error("browser session already closed")]
    Closed,
    #[error("failed to close browser: {0}")]
    Close(#[source] CdpError),
}

/// Keys the harness knows how to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Escape,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

impl Key {
    pub fn parse(name: &str) -> Option<Self> {
        let key = match name.trim() {
            "Space" | "space" | " " => Key::Space,
            "Enter" | "enter" => Key::Enter,
            "Escape" | "escape" | "Esc" => Key::Escape,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            _ => return None,
        };
        Some(key)
    }

    /// DOM `KeyboardEvent.code`.
    pub fn code(self) -> &'static str {
        match self {
            Key::Space => "Space",
            Key::Enter => "Enter",
            Key::Escape => "Escape",
            Key::ArrowLeft => "ArrowLeft",
            Key::ArrowRight => "ArrowRight",
            Key::ArrowUp => "ArrowUp",
            Key::ArrowDown => "ArrowDown",
        }
    }

    /// DOM `KeyboardEvent.key`.
    fn key_value(self) -> &'static str {
        match self {
            Key::Space => " ",
            other => other.code(),
        }
    }

    fn text(self) -> Option<&'static str> {
        match self {
            Key::Space => Some(" "),
            Key::Enter => Some("\r"),
            _ => None,
        }
    }

    fn virtual_key_code(self) -> i64 {
        match self {
            Key::Space => 32,
            Key::Enter => 13,
            Key::Escape => 27,
            Key::ArrowLeft => 37,
            Key::ArrowUp => 38,
            Key::ArrowRight => 39,
            Key::ArrowDown => 40,
        }
    }

    fn event(self, kind: DispatchKeyEventType) -> Result<DispatchKeyEventParams, SessionError> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(self.key_value())
            .code(self.code())
            .windows_virtual_key_code(self.virtual_key_code())
            .native_virtual_key_code(self.virtual_key_code());
        if kind == DispatchKeyEventType::KeyDown {
            if let Some(text) = self.text() {
                builder = builder.text(text).unmodified_text(text);
            }
        }
        builder.build().map_err(|message| SessionError::KeyEvent {
            key: self.code(),
            message,
        })
    }
}

/// Blocking browser-automation surface used by the runner.
pub trait PageDriver {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;
    fn screenshot_png(&mut self) -> Result<Vec<u8>, SessionError>;
    /// Evaluates `expression` in the page and returns its JSON value (`null` for `undefined`).
    fn evaluate(&mut self, expression: &str) -> Result<Value, SessionError>;
    fn press_key(&mut self, key: Key) -> Result<(), SessionError>;
    /// Releases the browser. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), SessionError>;
}

pub struct ChromeSession {
    runtime: Runtime,
    browser: Option<Browser>,
    page: Page,
    handler: Option<JoinHandle<usize>>,
}

impl ChromeSession {
    pub fn launch(options: &BrowserOptions) -> Result<Self, SessionError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("cdp")
            .enable_all()
            .build()
            .map_err(SessionError::Runtime)?;

        let mut builder = BrowserConfig::builder()
            .window_size(options.window_width, options.window_height)
            .launch_timeout(options.launch_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(SessionError::Config)?;

        let (browser, handler) = runtime
            .block_on(Browser::launch(config))
            .map_err(SessionError::Launch)?;
        let handler = runtime.spawn(drain_cdp_events(handler));

        let page = match runtime.block_on(browser.new_page("about:blank")) {
            Ok(page) => page,
            Err(error) => {
                let mut browser = browser;
                let _ = runtime.block_on(browser.close());
                handler.abort();
                return Err(SessionError::NewPage(error));
            }
        };

        info!(
            headless = options.headless,
            sandbox = options.sandbox,
            window_width = options.window_width,
            window_height = options.window_height,
            "browser_launched"
        );

        Ok(Self {
            runtime,
            browser: Some(browser),
            page,
            handler: Some(handler),
        })
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.browser.is_some() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }
}

impl PageDriver for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.runtime
            .block_on(self.page.goto(url))
            .map_err(|source| SessionError::Navigate {
                url: url.to_string(),
                source,
            })?;
        Ok(())
    }

    fn screenshot_png(&mut self) -> Result<Vec<u8>, SessionError> {
        self.ensure_open()?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.runtime
            .block_on(self.page.screenshot(params))
            .map_err(SessionError::Screenshot)
    }

    fn evaluate(&mut self, expression: &str) -> Result<Value, SessionError> {
        self.ensure_open()?;
        let result = self
            .runtime
            .block_on(self.page.evaluate_expression(EvaluateParams::new(expression)))
            .map_err(|source| SessionError::Evaluate {
                expression: expression.to_string(),
                source,
            })?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    fn press_key(&mut self, key: Key) -> Result<(), SessionError> {
        self.ensure_open()?;
        let down = key.event(DispatchKeyEventType::KeyDown)?;
        let up = key.event(DispatchKeyEventType::KeyUp)?;
        self.runtime.block_on(async {
            self.page
                .execute(down)
                .await
                .map_err(|source| SessionError::Input {
                    key: key.code(),
                    source,
                })?;
            self.page
                .execute(up)
                .await
                .map_err(|source| SessionError::Input {
                    key: key.code(),
                    source,
                })?;
            Ok::<_, SessionError>(())
        })
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        let closed = self.runtime.block_on(async {
            browser.close().await?;
            if let Err(error) = browser.wait().await {
                warn!(error = %error, "browser_wait_failed");
            }
            Ok::<_, CdpError>(())
        });
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        closed.map_err(SessionError::Close)?;
        info!("browser_closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            if let Err(error) = self.close() {
                warn!(error = %error, "browser_close_on_drop_failed");
            }
        }
    }
}

/// Pumps the CDP connection until the browser side hangs up.
///
/// chromiumoxide yields an `Err` for each message it cannot decode; those are skipped so
/// an unknown event from a newer Chrome does not cut the session.
async fn drain_cdp_events<S, T, E>(mut events: S) -> usize
where
    S: Stream<Item = Result<T, E>> + Unpin,
    E: Display,
{
    let mut skipped = 0usize;
    while let Some(event) = events.next().await {
        if let Err(error) = event {
            skipped += 1;
            debug!(error = %error, "cdp_event_skipped");
        }
    }
    debug!(skipped, "cdp_handler_finished");
    skipped
}
