// LLM abstraction layer

pub mod provider;
pub mod openai;
pub mod groq;
pub mod openrouter;

pub use provider::*;
