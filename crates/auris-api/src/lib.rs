pub mod account;
pub mod auth;
pub mod discovery;
pub mod error;
pub mod middleware;
pub mod reactions;
pub mod view;
pub mod whispers;
