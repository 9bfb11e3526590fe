//! In-memory browser and oracle for driving the session loop without Chrome.

#![allow(dead_code)]

use async_trait::async_trait;
use goal_driven_test::browser::elements::ENUMERATE_CLICKABLE_SCRIPT;
use goal_driven_test::error::Result;
use goal_driven_test::oracle::{DialogueHistory, Message, Oracle, OracleError};
use goal_driven_test::browser::DeviceProfile;
use goal_driven_test::{BrowserError, BrowserSession, ElementRecord, Point, Viewport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Everything the scripted browser was asked to do
#[derive(Debug, Clone, Default)]
pub struct BrowserLog {
    pub navigations: Vec<String>,
    pub viewport_set: Option<(u32, u32)>,
    pub emulated: Option<String>,
    pub clicks: Vec<(f64, f64)>,
    pub scrolls: Vec<(Option<Point>, f64, f64)>,
    pub scripts_run: usize,
    pub screenshots: usize,
    pub closed: bool,
}

pub struct ScriptedBrowser {
    log: Arc<Mutex<BrowserLog>>,
    elements: Vec<ElementRecord>,
    viewport: Viewport,
    screenshot: Option<Vec<u8>>,
    fail_navigation: bool,
    fail_clicks: bool,
    reject_scrolls: bool,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(BrowserLog::default())),
            elements: Vec::new(),
            viewport: Viewport::new(800, 600),
            screenshot: None,
            fail_navigation: false,
            fail_clicks: false,
            reject_scrolls: false,
        }
    }

    pub fn with_elements(mut self, elements: Vec<ElementRecord>) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Return these bytes from every screenshot instead of a placeholder
    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn failing_clicks(mut self) -> Self {
        self.fail_clicks = true;
        self
    }

    pub fn rejecting_scrolls(mut self) -> Self {
        self.reject_scrolls = true;
        self
    }

    /// Shared handle to the call log; stays valid after the browser is boxed
    pub fn log_handle(&self) -> Arc<Mutex<BrowserLog>> {
        self.log.clone()
    }

    pub fn log(&self) -> BrowserLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserSession for ScriptedBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        if self.fail_navigation {
            return Err(BrowserError::NavigationFailed(format!("{}: connection refused", url)));
        }
        self.log.lock().unwrap().navigations.push(url.to_string());
        Ok(())
    }

    async fn set_viewport_size(&self, width: u32, height: u32) -> Result<()> {
        self.log.lock().unwrap().viewport_set = Some((width, height));
        Ok(())
    }

    async fn emulate_device(&self, device: &DeviceProfile) -> Result<()> {
        self.log.lock().unwrap().emulated = Some(device.name.to_string());
        Ok(())
    }

    async fn execute_script(&self, source: &str) -> Result<String> {
        self.log.lock().unwrap().scripts_run += 1;
        if source == ENUMERATE_CLICKABLE_SCRIPT {
            serde_json::to_string(&self.elements).map_err(|e| BrowserError::ScriptFailed(e.to_string()))
        } else {
            Ok(r#"["complete",10,2]"#.to_string())
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let mut log = self.log.lock().unwrap();
        log.screenshots += 1;
        match &self.screenshot {
            Some(png) => Ok(png.clone()),
            None => Ok(format!("png-{}", log.screenshots).into_bytes()),
        }
    }

    async fn pointer_click(&self, x: f64, y: f64) -> Result<()> {
        if self.fail_clicks {
            return Err(BrowserError::InputFailed("target detached".to_string()));
        }
        self.log.lock().unwrap().clicks.push((x, y));
        Ok(())
    }

    async fn scroll_from_origin(&self, origin: Option<Point>, dx: f64, dy: f64) -> Result<()> {
        if self.reject_scrolls {
            return Err(BrowserError::InputFailed("nothing to scroll".to_string()));
        }
        self.log.lock().unwrap().scrolls.push((origin, dx, dy));
        Ok(())
    }

    async fn viewport_size(&self) -> Result<Viewport> {
        Ok(self.viewport)
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://example.test/".to_string())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

enum Answer {
    Text(String),
    Unavailable,
    Hang,
}

/// Oracle answering from a fixed script
pub struct ScriptedOracle {
    answers: VecDeque<Answer>,
    prompts: Arc<Mutex<Vec<(usize, String)>>>,
}

impl ScriptedOracle {
    pub fn new<S: Into<String>>(answers: Vec<S>) -> Self {
        Self {
            answers: answers.into_iter().map(|a| Answer::Text(a.into())).collect(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer `answers`, then fail as if the service were down
    pub fn then_unavailable(mut self) -> Self {
        self.answers.push_back(Answer::Unavailable);
        self
    }

    /// Answer `answers`, then never answer again
    pub fn then_hang(mut self) -> Self {
        self.answers.push_back(Answer::Hang);
        self
    }

    /// (history length, prompt text) of every request received
    pub fn prompts_handle(&self) -> Arc<Mutex<Vec<(usize, String)>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&mut self, history: &DialogueHistory, prompt: &Message) -> std::result::Result<String, OracleError> {
        self.prompts
            .lock()
            .unwrap()
            .push((history.len(), prompt.joined_text()));

        match self.answers.pop_front() {
            Some(Answer::Text(text)) => Ok(text),
            Some(Answer::Unavailable) => Err(OracleError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            }),
            Some(Answer::Hang) => std::future::pending().await,
            None => Err(OracleError::PlaybackExhausted(0)),
        }
    }
}

pub fn button(index: usize, x: f64, y: f64, width: f64, height: f64) -> ElementRecord {
    ElementRecord {
        index,
        x,
        y,
        width,
        height,
        kind: "button".to_string(),
    }
}

pub fn click_answer(element: i64, achieved: bool) -> String {
    serde_json::json!({
        "description": format!("Click element {}", element),
        "action": {"actionType": "click", "elementNumber": element},
        "expectation": "Something happens",
        "expectationSatisfied": true,
        "achieved": achieved,
        "goal": "Find the contact page",
        "frustrationLevel": 1,
        "frustrationLevelReason": "None yet"
    })
    .to_string()
}

pub fn scroll_answer(direction: &str, distance: &str) -> String {
    serde_json::json!({
        "description": "Scroll to see more",
        "action": {"actionType": "scroll", "direction": direction, "distance": distance},
        "expectation": "More content appears",
        "expectationSatisfied": false,
        "achieved": false,
        "goal": "Find the contact page",
        "frustrationLevel": 3,
        "frustrationLevelReason": "Content is below the fold"
    })
    .to_string()
}
