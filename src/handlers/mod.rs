pub mod health;
pub mod logs;
pub mod personas;
pub mod photos;
pub mod rag;
pub mod sql_executor;
pub mod sql_query;
