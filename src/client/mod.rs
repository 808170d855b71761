pub mod auth;
pub mod error;
pub mod files;
pub mod models;
pub mod rest;
pub mod vision;
