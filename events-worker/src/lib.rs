pub mod config;
pub mod elasticsearch;
pub mod error;
pub mod genderize;
pub mod identities;
pub mod mappings;
pub mod metrics;
pub mod pipeline;
pub mod projects;
pub mod stages;
