pub mod auth;
pub mod chat;
pub mod documents;
pub mod employees;
pub mod notifications;
