//! Application services: request resolution and the contracts it depends on.

pub mod error;
pub mod observe;
pub mod payload;
pub mod repos;
pub mod resolver;
