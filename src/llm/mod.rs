// LLM abstraction layer

pub mod agent_service;
pub mod assistants;
pub mod chat_agents;
pub mod openai;
pub mod provider;

pub use agent_service::*;
pub use provider::*;
