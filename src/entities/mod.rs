//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod aggregate_error;

// Re-export specific types to avoid conflicts
pub use aggregate_error::{
    Column as AggregateErrorColumn, Entity as AggregateError, Model as AggregateErrorModel,
};
