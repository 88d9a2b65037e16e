// Scripted roles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use crewloop::crew::{DevelopmentLoop, LoopResult, ProgressEvent};
use crewloop::providers::RoleCallError;
use crewloop::roles::Role;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What a scripted role does on one call
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail(u16),
    Sleep(Duration),
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

/// Plays back replies in order; the last reply repeats once the queue is
/// down to one entry.
pub struct ScriptedRole {
    name: String,
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    finished: AtomicUsize,
}

impl ScriptedRole {
    pub fn new(name: &str, replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    pub fn texts(name: &str, replies: &[&str]) -> Arc<Self> {
        Self::new(name, replies.iter().map(|r| text(r)).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion rather than being dropped mid-flight
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap_or(Reply::Text(String::new()))
        }
    }
}

#[async_trait]
impl Role for ScriptedRole {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, RoleCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let outcome = match self.next_reply() {
            Reply::Text(text) => Ok(text),
            Reply::Fail(status) => Err(RoleCallError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            Reply::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(String::new())
            }
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

/// Developer that numbers its candidates: "candidate 1", "candidate 2", ...
pub struct CountingDeveloper {
    calls: AtomicUsize,
}

impl CountingDeveloper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Role for CountingDeveloper {
    fn name(&self) -> &str {
        "developer"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, RoleCallError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("candidate {n}"))
    }
}

/// Run to completion and collect every event.
pub async fn run_collect(
    runner: &DevelopmentLoop,
    requirements: &str,
    max_iterations: u32,
) -> (LoopResult, Vec<ProgressEvent>) {
    let (tx, mut rx) = mpsc::channel(1024);
    let result = runner
        .run(requirements, max_iterations, &tx, &CancellationToken::new())
        .await;
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

/// Events end with exactly one terminal event and progress never goes
/// backwards before it.
pub fn assert_well_formed(events: &[ProgressEvent]) {
    assert!(!events.is_empty(), "no events emitted");
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "expected exactly one terminal event");
    assert!(
        events.last().unwrap().is_terminal(),
        "terminal event must be last"
    );

    let before_terminal = &events[..events.len() - 1];
    for pair in before_terminal.windows(2) {
        assert!(
            pair[1].progress >= pair[0].progress,
            "progress went backwards: {} ({}) -> {} ({})",
            pair[0].progress,
            pair[0].message,
            pair[1].progress,
            pair[1].message
        );
    }
    for event in events {
        assert!(event.progress <= 100);
        assert_eq!(event.result.is_some(), event.is_terminal());
    }
}
