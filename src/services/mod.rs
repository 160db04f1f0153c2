pub mod auth_service;
pub mod emails;
pub mod oauth;
