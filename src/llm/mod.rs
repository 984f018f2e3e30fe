pub mod chat_stream;
pub mod consumer;
pub mod prompt;
