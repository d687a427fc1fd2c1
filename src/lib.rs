pub mod alert;
pub mod auth;
pub mod config;
pub mod cycle;
pub mod error;
pub mod grades;
pub mod output;
pub mod portal;
pub mod snapshot;
