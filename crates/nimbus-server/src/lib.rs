pub mod api;
pub mod chat;
pub mod server;

pub use api::{ApiError, ChatRequest, ChatResponse, HealthResponse};
pub use chat::ChatService;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
