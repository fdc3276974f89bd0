pub mod chunkserver_impl;
pub mod chunkserver_service;
pub mod client_service;
pub mod config;
pub mod error;
pub mod master_impl;
pub mod master_service;
pub mod types;
pub mod util;
