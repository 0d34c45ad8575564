pub mod agent;
pub mod error;
pub mod http;
pub mod mock;
pub mod prompt;

pub use agent::{Agent, AgentReply, AgentRequest};
pub use error::AgentError;
pub use http::HttpAgent;
pub use mock::{EchoAgent, MockAgent, MockReply};
pub use prompt::build_prompt;
