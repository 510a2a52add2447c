//! Scripted in-memory session for resolver and orchestrator tests.

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{BrowserError, BrowserSession, Cookie, ElementRef, PerfLogEntry};
use crate::resolver::ProbeStrategy;

/// Probe rounds that include `strategy` start answering `url` once they have
/// been evaluated `after` times.
struct ProbeAnswer {
    strategy: ProbeStrategy,
    after: usize,
    url: String,
    seen: usize,
}

#[derive(Default)]
pub(crate) struct FakeSession {
    elements: HashMap<String, ElementRef>,
    scans: HashMap<String, Vec<ElementRef>>,
    attributes: HashMap<(ElementRef, String), String>,
    children: HashMap<(ElementRef, String), ElementRef>,
    probe: RefCell<Option<ProbeAnswer>>,
    stale_log: RefCell<Vec<PerfLogEntry>>,
    log_on_click: Vec<PerfLogEntry>,
    cookies: Vec<Cookie>,
    fail_pause: bool,
    fail_everything: bool,
    clicked: RefCell<Vec<ElementRef>>,
    pauses: Cell<usize>,
    evaluations: Cell<usize>,
    focuses: Cell<usize>,
}

impl FakeSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_element(mut self, selector: &str, id: &str) -> Self {
        self.elements.insert(selector.to_string(), ElementRef(id.to_string()));
        self
    }

    pub(crate) fn with_scan(mut self, selector: &str, ids: &[&str]) -> Self {
        self.scans.insert(
            selector.to_string(),
            ids.iter().map(|id| ElementRef(id.to_string())).collect(),
        );
        self
    }

    pub(crate) fn with_attribute(mut self, element: &str, name: &str, value: &str) -> Self {
        self.attributes
            .insert((ElementRef(element.to_string()), name.to_string()), value.to_string());
        self
    }

    pub(crate) fn with_child(mut self, parent: &str, selector: &str, child: &str) -> Self {
        self.children.insert(
            (ElementRef(parent.to_string()), selector.to_string()),
            ElementRef(child.to_string()),
        );
        self
    }

    pub(crate) fn with_player_url(self, strategy: ProbeStrategy, after: usize, url: &str) -> Self {
        *self.probe.borrow_mut() = Some(ProbeAnswer {
            strategy,
            after,
            url: url.to_string(),
            seen: 0,
        });
        self
    }

    /// Entries already in the log before playback is triggered.
    pub(crate) fn with_stale_request(self, url: &str) -> Self {
        let ts = self.stale_log.borrow().len() as i64;
        self.stale_log
            .borrow_mut()
            .push(PerfLogEntry::request_will_be_sent(url, ts));
        self
    }

    /// Requests the page issues once a click happens, oldest first.
    pub(crate) fn with_request_on_click(mut self, url: &str) -> Self {
        let ts = 1000 + self.log_on_click.len() as i64;
        self.log_on_click.push(PerfLogEntry::request_will_be_sent(url, ts));
        self
    }

    pub(crate) fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(Cookie::new(name, value));
        self
    }

    pub(crate) fn failing_pause(mut self) -> Self {
        self.fail_pause = true;
        self
    }

    /// Every call fails as if the window had been closed.
    pub(crate) fn closed(mut self) -> Self {
        self.fail_everything = true;
        self
    }

    pub(crate) fn clicked(&self) -> Vec<ElementRef> {
        self.clicked.borrow().clone()
    }

    pub(crate) fn pause_count(&self) -> usize {
        self.pauses.get()
    }

    pub(crate) fn evaluation_count(&self) -> usize {
        self.evaluations.get()
    }

    pub(crate) fn focus_count(&self) -> usize {
        self.focuses.get()
    }

    fn check_open(&self) -> Result<(), BrowserError> {
        if self.fail_everything {
            Err(BrowserError::Protocol {
                status: 404,
                error: "invalid session id".to_string(),
                message: "session deleted because of page crash".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Position of `strategy` among the strategies bundled into `script`.
fn round_index(script: &str, strategy: ProbeStrategy) -> Option<usize> {
    let mut present: Vec<(usize, ProbeStrategy)> = ProbeStrategy::ALL
        .iter()
        .filter_map(|s| script.find(s.script()).map(|pos| (pos, *s)))
        .collect();
    present.sort_by_key(|(pos, _)| *pos);
    present.iter().position(|(_, s)| *s == strategy)
}

impl BrowserSession for FakeSession {
    fn find_element(&self, selector: &str) -> Result<Option<ElementRef>, BrowserError> {
        self.check_open()?;
        Ok(self.elements.get(selector).cloned())
    }

    fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError> {
        self.check_open()?;
        Ok(self.scans.get(selector).cloned().unwrap_or_default())
    }

    fn find_child(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, BrowserError> {
        self.check_open()?;
        Ok(self
            .children
            .get(&(parent.clone(), selector.to_string()))
            .cloned())
    }

    fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>, BrowserError> {
        self.check_open()?;
        Ok(self
            .attributes
            .get(&(element.clone(), name.to_string()))
            .cloned())
    }

    fn click(&self, element: &ElementRef) -> Result<(), BrowserError> {
        self.check_open()?;
        self.clicked.borrow_mut().push(element.clone());
        self.stale_log
            .borrow_mut()
            .extend(self.log_on_click.iter().cloned());
        Ok(())
    }

    fn evaluate_script(&self, script: &str, _args: &[Value]) -> Result<Value, BrowserError> {
        self.check_open()?;
        self.evaluations.set(self.evaluations.get() + 1);
        if script.contains(".pause()") {
            self.pauses.set(self.pauses.get() + 1);
            if self.fail_pause {
                return Err(BrowserError::Protocol {
                    status: 500,
                    error: "javascript error".to_string(),
                    message: "player is gone".to_string(),
                });
            }
            return Ok(Value::Null);
        }
        let mut probe = self.probe.borrow_mut();
        if let Some(answer) = probe.as_mut() {
            if let Some(index) = round_index(script, answer.strategy) {
                answer.seen += 1;
                if answer.seen >= answer.after {
                    return Ok(json!([index, answer.url]));
                }
            }
        }
        Ok(Value::Null)
    }

    fn performance_log(&self) -> Result<Vec<PerfLogEntry>, BrowserError> {
        self.check_open()?;
        Ok(std::mem::take(&mut *self.stale_log.borrow_mut()))
    }

    fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        self.check_open()?;
        Ok(self.cookies.clone())
    }

    fn navigate(&self, _url: &str) -> Result<(), BrowserError> {
        self.check_open()
    }

    fn focus(&self) -> Result<(), BrowserError> {
        self.check_open()?;
        self.focuses.set(self.focuses.get() + 1);
        Ok(())
    }
}
