use config::Config;
use llm::GeminiClient;

pub mod config;
pub mod error;
pub mod llm;
pub mod middleware;
pub mod narration;
pub mod router;
pub mod routes;
pub mod session;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub llm: GeminiClient,
}
