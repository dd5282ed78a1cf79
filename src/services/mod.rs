pub mod catalog;
pub mod export;
pub mod gateway;
pub mod llm_gateway;
pub mod llm_provider;
pub mod orchestrator;
pub mod settings;
pub mod simulated_gateway;
pub mod word_input;
pub mod word_record;
