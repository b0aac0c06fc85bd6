pub mod export;
pub mod illustrator;
pub mod llm;
pub mod notify;
pub mod pagination;
pub mod pipeline;
pub mod projector;
pub mod setup;
pub mod story;
