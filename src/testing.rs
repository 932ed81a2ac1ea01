//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::{Network, Request, Response};

/// A network that serves canned responses and records every URL it is asked for.
///
/// Unknown URLs fail the way an unreachable host would.
#[derive(Default)]
pub struct StubNetwork {
    responses: HashMap<String, Response>,
    calls: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: &'static str) -> Self {
        self.with_response(url, Response::new(200).with_body(body))
    }

    pub fn with_response(mut self, url: &str, response: Response) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.calls.lock().unwrap().push(request.url.clone());
        self.responses
            .get(&request.url)
            .cloned()
            .ok_or_else(|| Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("no route to {}", request.url),
            )))
    }
}
