pub mod ollama;
pub mod openai;
pub mod sse;
