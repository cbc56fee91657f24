pub mod agent;
pub mod builder;
pub mod gateway;
pub mod prompt;
pub mod query;
pub mod source;

pub use agent::{OpenAiTableAgent, TabularAgent};
pub use builder::{BuildOptions, DatasetBuilder};
pub use gateway::QuestionGateway;
pub use query::{execute, QueryError, QueryResult, TableQuery};
pub use source::{ArchiveSource, HttpArchiveSource, StaticArchive};
