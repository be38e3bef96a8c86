pub mod admin;
pub mod evaluate;
