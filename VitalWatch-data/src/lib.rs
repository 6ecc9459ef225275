// VitalWatch Data
// This crate owns the storage models and the repository seams the monitoring
// core reads from and writes to.

// Environment-driven configuration helpers
pub mod env;

// Database connection management
pub mod database;

// Repository traits and implementations for data access
pub mod repository;

// Data storage models
pub mod models;
