// Keyed hashing, random tokens, credential extraction
pub mod auth;

// Runtime configuration
pub mod config;

// Posts and comments
pub mod content;

// Request identity resolution
pub mod identity;

// External sign-in flows
pub mod oauth;

// Account reconciliation and session credentials
pub mod session;

// User accounts and storage
pub mod users;

// HTTP API
pub mod api;
