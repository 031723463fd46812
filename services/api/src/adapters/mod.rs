pub mod completion_llm;
pub mod db;
pub mod payment;

pub use completion_llm::OpenAiCompletionAdapter;
pub use db::PgStore;
pub use payment::SnapGateway;
