pub mod history_file;
pub mod openai_model;

pub use history_file::JsonFileHistorySource;
pub use openai_model::{GenerationSettings, OpenAiChatModel, OpenAiModelLoader};
