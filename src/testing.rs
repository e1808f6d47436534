//! Scripted [`Host`] for tests: canned command responses, a fake search path,
//! served documents, and a log of everything the pipeline asked for.
use crate::host::{CommandOutput, CommandSpec, Host};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;

type Responder = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput>>;

#[derive(Default)]
pub struct FakeHost {
    responders: RefCell<Vec<(String, Responder)>>,
    programs: RefCell<BTreeMap<String, PathBuf>>,
    documents: RefCell<BTreeMap<String, String>>,
    calls: RefCell<Vec<String>>,
    fetches: RefCell<Vec<String>>,
    opened: RefCell<Vec<String>>,
    fail_open: RefCell<bool>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose display line contains `needle`. Later
    /// registrations win over earlier ones.
    pub fn on<F>(&self, needle: &str, responder: F)
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput> + 'static,
    {
        self.responders
            .borrow_mut()
            .push((needle.to_string(), Box::new(responder)));
    }

    pub fn add_program(&self, name: &str) {
        self.programs
            .borrow_mut()
            .insert(name.to_string(), PathBuf::from("/usr/bin").join(name));
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.documents
            .borrow_mut()
            .insert(url.to_string(), body.to_string());
    }

    pub fn fail_open(&self) {
        *self.fail_open.borrow_mut() = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.contains(needle))
            .count()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.borrow().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.calls.borrow_mut().clear();
        self.fetches.borrow_mut().clear();
        self.opened.borrow_mut().clear();
    }
}

impl Host for FakeHost {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let line = command.display();
        self.calls.borrow_mut().push(line.clone());
        let responders = self.responders.borrow();
        let responder = responders
            .iter()
            .rev()
            .find(|(needle, _)| line.contains(needle.as_str()));
        match responder {
            Some((_, respond)) => respond(command),
            None => Err(anyhow!("spawn {}: No such file or directory", command.program)),
        }
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        self.programs.borrow().get(name).cloned()
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetches.borrow_mut().push(url.to_string());
        self.documents
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("fetch {url}: http status: 404"))
    }

    fn open_url(&self, url: &str) -> Result<()> {
        self.opened.borrow_mut().push(url.to_string());
        if *self.fail_open.borrow() {
            return Err(anyhow!("open {url}: no handler"));
        }
        Ok(())
    }
}

impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        Self {
            status_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        Self {
            status_code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}
