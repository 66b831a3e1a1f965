pub mod auth;
pub mod chat_fallback;
pub mod chat_service;
pub mod fanout;
pub mod identity_service;
pub mod notification_service;
pub mod permission;
pub mod storage_service;
