pub mod config;
pub mod files;
pub mod humanize;
pub mod observability;
pub mod pool;
pub mod service;
pub mod storage;
pub mod transfer;
