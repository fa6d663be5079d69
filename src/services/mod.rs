//! Business logic services

pub mod column_mapper;
pub mod decoder;
pub mod import_orchestrator;
pub mod lead_api;
pub mod normalizer;
pub mod reporter;
pub mod validator;
