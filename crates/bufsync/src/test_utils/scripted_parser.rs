//! Structure parser whose timing and outcome tests control.
//!
//! Behaviour is keyed on markers: a parse whose content contains a held
//! marker blocks until the hold is released, a failing marker makes the parse
//! fail, a panicking marker makes it panic. Anything else goes to the real Go
//! parser.

use std::sync::{Arc, Condvar, Mutex};

use tree_sitter::Tree;

use crate::structure::{GoStructureParser, ParseError, StructureParser};

#[derive(Debug, Default)]
struct HoldSignal {
    released: Mutex<bool>,
    condvar: Condvar,
}

impl HoldSignal {
    fn wait(&self) {
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.condvar.wait(released).unwrap();
        }
    }

    fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

/// Blocks matching parses until released. Releases on drop so a failed test
/// never leaves blocking threads behind.
#[derive(Debug)]
pub struct Hold(Arc<HoldSignal>);

impl Hold {
    pub fn release(&self) {
        self.0.release();
    }
}

impl Drop for Hold {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[derive(Debug, Default)]
pub struct ScriptedParser {
    held: Mutex<Vec<(String, Arc<HoldSignal>)>>,
    failing: Mutex<Vec<String>>,
    panicking: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, marker: &str) -> Hold {
        let signal = Arc::new(HoldSignal::default());
        self.held
            .lock()
            .unwrap()
            .push((marker.to_string(), signal.clone()));
        Hold(signal)
    }

    pub fn fail_on(&self, marker: &str) {
        self.failing.lock().unwrap().push(marker.to_string());
    }

    pub fn panic_on(&self, marker: &str) {
        self.panicking.lock().unwrap().push(marker.to_string());
    }

    /// Names of every document parsed so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn matches(markers: &Mutex<Vec<String>>, content: &str) -> bool {
        markers
            .lock()
            .unwrap()
            .iter()
            .any(|marker| content.contains(marker.as_str()))
    }
}

impl StructureParser for ScriptedParser {
    fn parse(&self, name: &str, content: &str) -> Result<Tree, ParseError> {
        self.calls.lock().unwrap().push(name.to_string());

        let hold = self
            .held
            .lock()
            .unwrap()
            .iter()
            .find(|(marker, _)| content.contains(marker.as_str()))
            .map(|(_, signal)| signal.clone());
        if let Some(signal) = hold {
            signal.wait();
        }

        if Self::matches(&self.failing, content) {
            return Err(ParseError::Rejected(format!("scripted failure for {name}")));
        }
        let panics = Self::matches(&self.panicking, content);
        if panics {
            panic!("scripted panic for {name}");
        }
        GoStructureParser.parse(name, content)
    }
}
