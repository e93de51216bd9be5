//! Human-in-the-loop escalation core: a knowledge base answered by exact
//! match, and a help-request lifecycle for the questions it cannot answer.
//! Both stores sit on a shared key/value backend (Redis in production).

pub mod config;
pub mod errors;
pub mod escalation;
pub mod knowledge;
pub mod models;
pub mod notify;
pub mod requests;
pub mod routes;
pub mod sanitize;
pub mod state;
pub mod store;
