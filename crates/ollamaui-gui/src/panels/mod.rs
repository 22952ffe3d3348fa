pub mod chat;
pub mod components;
pub mod create;
pub mod models;
pub mod settings;
pub mod terminal;
