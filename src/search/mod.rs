pub mod fanout;
pub mod store;
