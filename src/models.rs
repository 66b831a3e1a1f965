pub mod auth;
pub mod chat;
pub mod employee;
pub mod notification;
