//! Chromium-backed fetcher. One browser process per session, each with a
//! persistent profile directory per target so cookies survive restarts.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use dashmap::DashMap;
use dropwatch_core_types::{PageSnapshot, SessionId, Target};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::errors::FetchError;
use crate::fetcher::Fetcher;
use crate::session::{AcquireOptions, SessionHandle};

const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(250);

const SESSION_LOST_HINTS: &[&str] = &[
    "target closed",
    "detached",
    "no target with given id",
    "session with given id not found",
    "not attached",
    "connection closed",
];

struct ChromiumSession {
    options: AcquireOptions,
    page: Page,
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl ChromiumSession {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn classify(&self, err: CdpError) -> FetchError {
        classify(err, self.is_alive(), self.options.timeout)
    }
}

fn classify(err: CdpError, alive: bool, deadline: Duration) -> FetchError {
    if !alive {
        return FetchError::SessionLost(format!("browser connection closed: {err}"));
    }
    if matches!(err, CdpError::Timeout) {
        return FetchError::Timeout(deadline);
    }
    if matches!(
        err,
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse
    ) {
        return FetchError::SessionLost(err.to_string());
    }
    let text = err.to_string();
    let lower = text.to_lowercase();
    if SESSION_LOST_HINTS.iter().any(|hint| lower.contains(hint)) {
        FetchError::SessionLost(text)
    } else {
        FetchError::Protocol(text)
    }
}

pub struct ChromiumFetcher {
    config: FetcherConfig,
    sessions: DashMap<SessionId, Arc<ChromiumSession>>,
}

impl ChromiumFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, handle: &SessionHandle) -> Result<Arc<ChromiumSession>, FetchError> {
        self.sessions
            .get(&handle.id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FetchError::SessionLost(format!("no open session {}", handle.id)))
    }

    fn browser_config(&self, target: &Target) -> Result<BrowserConfig, FetchError> {
        let profile_dir = self.config.profile_root.join(target.id.as_str());
        fs::create_dir_all(&profile_dir).map_err(|err| {
            FetchError::Launch(format!(
                "failed to create profile dir {}: {err}",
                profile_dir.display()
            ))
        })?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(self.config.request_timeout)
            .launch_timeout(self.config.launch_timeout);

        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.disable_sandbox {
            builder = builder.no_sandbox();
        }

        let mut args: Vec<String> = [
            "--disable-background-timer-throttling",
            "--disable-breakpad",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--use-mock-keychain",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        if self.config.headless {
            args.push("--headless=new".into());
            args.push("--mute-audio".into());
        }
        args.extend(self.config.extra_args.iter().cloned());
        builder = builder.args(args);

        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable.clone());
        }
        builder
            .user_data_dir(profile_dir)
            .build()
            .map_err(|err| FetchError::Launch(format!("browser config error: {err}")))
    }

    async fn open(
        &self,
        target: &Target,
        options: &AcquireOptions,
    ) -> Result<ChromiumSession, FetchError> {
        let config = self.browser_config(target)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| FetchError::Launch(err.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = alive.clone();
        let target_id = target.id.clone();
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "page-fetcher", target_id = %target_id, ?err, "cdp handler stopped");
                    break;
                }
            }
            handler_alive.store(false, Ordering::Relaxed);
        });

        let page = match Self::prepare_page(&browser, target, options).await {
            Ok(page) => page,
            Err(err) => {
                handler.abort();
                return Err(classify(err, alive.load(Ordering::Relaxed), options.timeout));
            }
        };

        Ok(ChromiumSession {
            options: options.clone(),
            page,
            browser: Mutex::new(browser),
            handler,
            alive,
        })
    }

    async fn prepare_page(
        browser: &Browser,
        target: &Target,
        options: &AcquireOptions,
    ) -> Result<Page, CdpError> {
        let page = browser.new_page("about:blank").await?;
        if let Some(user_agent) = &options.user_agent {
            page.set_user_agent(SetUserAgentOverrideParams::new(user_agent.clone()))
                .await?;
        }
        if !options.headers.is_empty() {
            let headers = serde_json::to_value(&options.headers).unwrap_or_default();
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await?;
        }
        page.goto(target.url.as_str()).await?;
        Ok(page)
    }

    async fn capture(&self, session: &ChromiumSession, url: &str) -> Result<PageSnapshot, FetchError> {
        session
            .page
            .reload()
            .await
            .map_err(|err| session.classify(err))?;
        session
            .page
            .wait_for_navigation()
            .await
            .map_err(|err| session.classify(err))?;

        if let Some(marker) = &session.options.marker {
            if !self
                .poll_marker(session, &marker.selector, marker.timeout, false)
                .await?
            {
                return Err(FetchError::MarkerNotFound(marker.selector.clone()));
            }
        }

        let markup = session
            .page
            .content()
            .await
            .map_err(|err| session.classify(err))?;
        let source = session
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        Ok(PageSnapshot::captured_now(markup, source))
    }

    /// Polls for `selector` until it appears or `limit` passes. Only a lost
    /// session is an error; lookup failures mean "not there yet".
    async fn poll_marker(
        &self,
        session: &ChromiumSession,
        selector: &str,
        limit: Duration,
        cancellable: bool,
    ) -> Result<bool, FetchError> {
        let deadline = Instant::now() + limit;
        loop {
            match session.page.find_element(selector).await {
                Ok(_) => return Ok(true),
                Err(err) => {
                    let err = session.classify(err);
                    if err.is_session_lost() {
                        return Err(err);
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            if cancellable {
                tokio::select! {
                    _ = session.options.cancel.cancelled() => return Ok(false),
                    _ = sleep(MARKER_POLL_INTERVAL) => {}
                }
            } else {
                sleep(MARKER_POLL_INTERVAL).await;
            }
        }
    }
}

impl Default for ChromiumFetcher {
    fn default() -> Self {
        Self::new(FetcherConfig::default())
    }
}

#[async_trait]
impl Fetcher for ChromiumFetcher {
    async fn acquire(
        &self,
        target: &Target,
        options: &AcquireOptions,
    ) -> Result<SessionHandle, FetchError> {
        info!(target: "page-fetcher", target_id = %target.id, url = %target.url, "launching browser session");
        let launch = timeout(self.config.launch_timeout + options.timeout, self.open(target, options));
        let session = tokio::select! {
            _ = options.cancel.cancelled() => return Err(FetchError::Cancelled),
            outcome = launch => match outcome {
                Ok(result) => result?,
                Err(_) => return Err(FetchError::Timeout(self.config.launch_timeout + options.timeout)),
            },
        };

        let handle = SessionHandle::new(target.clone());
        self.sessions.insert(handle.id.clone(), Arc::new(session));
        info!(target: "page-fetcher", session = %handle, "session ready");
        Ok(handle)
    }

    async fn fetch(&self, handle: &SessionHandle) -> Result<PageSnapshot, FetchError> {
        let session = self.session(handle)?;
        if !session.is_alive() {
            return Err(FetchError::SessionLost("browser handler exited".into()));
        }
        let deadline = session.options.timeout;
        match timeout(deadline, self.capture(&session, &handle.target.url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(deadline)),
        }
    }

    async fn await_marker(
        &self,
        handle: &SessionHandle,
        marker: &str,
        limit: Duration,
    ) -> Result<bool, FetchError> {
        let session = self.session(handle)?;
        self.poll_marker(&session, marker, limit, true).await
    }

    async fn close(&self, handle: SessionHandle) {
        let Some((_, session)) = self.sessions.remove(&handle.id) else {
            debug!(target: "page-fetcher", session = %handle, "close on unknown session");
            return;
        };
        {
            let mut browser = session.browser.lock().await;
            if session.is_alive() {
                if let Err(err) = browser.close().await {
                    warn!(target: "page-fetcher", session = %handle, ?err, "browser close failed");
                }
            }
            if let Err(err) = browser.wait().await {
                warn!(target: "page-fetcher", session = %handle, ?err, "browser process wait failed");
            }
        }
        session.handler.abort();
        info!(target: "page-fetcher", session = %handle, "session closed");
    }
}
