//! Scripted browser for orchestrator tests: every navigation lands on a fixed
//! location, and launches / closes are counted.

use std::cell::RefCell;
use std::rc::Rc;

use pagegrab_core::resolver::{BrowserError, BrowserLauncher, BrowserSession};

#[derive(Debug, Default)]
pub struct BrowserLog {
    pub launches: Vec<String>,
    pub navigated: Vec<String>,
    pub closes: u32,
}

#[derive(Clone)]
pub struct FakeLauncher {
    /// Where navigation lands; `None` means the browser reports no location.
    lands_on: Option<String>,
    fail_launch: bool,
    log: Rc<RefCell<BrowserLog>>,
}

impl FakeLauncher {
    /// Browser that ends up at `location` whatever page it is sent to.
    pub fn landing_on(location: &str) -> Self {
        Self {
            lands_on: Some(location.to_string()),
            fail_launch: false,
            log: Rc::default(),
        }
    }

    /// Browser that never reports a location.
    pub fn lost() -> Self {
        Self {
            lands_on: None,
            fail_launch: false,
            log: Rc::default(),
        }
    }

    /// Launcher whose sessions never start.
    pub fn broken() -> Self {
        Self {
            lands_on: None,
            fail_launch: true,
            log: Rc::default(),
        }
    }

    pub fn log(&self) -> Rc<RefCell<BrowserLog>> {
        Rc::clone(&self.log)
    }
}

impl BrowserLauncher for FakeLauncher {
    fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.log.borrow_mut().launches.push(user_agent.to_string());
        if self.fail_launch {
            return Err(BrowserError::Driver {
                error: "session not created".to_string(),
                message: "no browser binary".to_string(),
            });
        }
        Ok(Box::new(FakeSession {
            lands_on: self.lands_on.clone(),
            location: None,
            log: Rc::clone(&self.log),
        }))
    }
}

struct FakeSession {
    lands_on: Option<String>,
    location: Option<String>,
    log: Rc<RefCell<BrowserLog>>,
}

impl BrowserSession for FakeSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.log.borrow_mut().navigated.push(url.to_string());
        self.location = self.lands_on.clone();
        Ok(())
    }

    fn current_url(&mut self) -> Result<Option<String>, BrowserError> {
        Ok(self.location.clone())
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        self.log.borrow_mut().closes += 1;
        Ok(())
    }
}
