pub mod api;
pub mod config;
pub mod data_models;
pub mod db;
pub mod error;
pub mod memory_store;
pub mod supabase;
