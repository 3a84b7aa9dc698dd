pub mod analysis;
pub mod backup;
pub mod db;
pub mod entries;
pub mod error;
pub mod goals;
pub mod models;
pub mod numeric;
pub mod scaling;
pub mod service;
pub mod session;
