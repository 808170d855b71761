use super::Destination;
use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("channel rejected message #{0}")]
pub struct Rejected(pub usize);

/// Records every message; optionally fails on the n-th send (1-based).
#[derive(Default)]
pub struct Recorder {
    sent: Mutex<Vec<String>>,
    calls: Mutex<usize>,
    fail_on: Option<usize>,
}

impl Recorder {
    pub fn failing_on(n: usize) -> Self {
        Self { fail_on: Some(n), ..Default::default() }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Destination for Recorder {
    type Error = Rejected;

    async fn send(&self, content: &str) -> Result<(), Rejected> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.fail_on == Some(call) {
            return Err(Rejected(call));
        }
        self.sent.lock().unwrap().push(content.to_string());
        Ok(())
    }
}
