use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::agent::{Agent, AgentReply, AgentRequest};
use crate::error::AgentError;

/// Pre-programmed outcome for one [`MockAgent`] call.
#[derive(Clone, Debug)]
pub enum MockReply {
    Reply(AgentReply),
    Error(AgentError),
    /// Wait, then resolve the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self::Reply(AgentReply::text(text))
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Agent that serves pre-programmed replies in order and records every
/// request it receives.
#[derive(Default)]
pub struct MockAgent {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl MockAgent {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, request: &AgentRequest) -> Result<AgentReply, AgentError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len()
        };
        let next = self.replies.lock().pop_front();
        let Some(mut current) = next else {
            return Err(AgentError::Failed(format!(
                "MockAgent: no reply configured for call {call}"
            )));
        };
        loop {
            match current {
                MockReply::Reply(reply) => return Ok(reply),
                MockReply::Error(e) => return Err(e),
                MockReply::Delay(duration, inner) => {
                    tokio::time::sleep(duration).await;
                    current = *inner;
                }
            }
        }
    }
}

/// Offline stand-in used when no agent endpoint is configured: answers with
/// the turn's query.
#[derive(Default)]
pub struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&self, request: &AgentRequest) -> Result<AgentReply, AgentError> {
        let query = request
            .content
            .rsplit_once("\n\nUser: ")
            .map_or(request.content.as_str(), |(_, q)| q);
        Ok(AgentReply::text(format!("echo: {query}")))
    }
}
