pub mod contribution;
pub mod corpus;
pub mod defense;
pub mod engine;
pub mod entries;
pub mod errors;
pub mod field_probe;
pub mod lambda_select;
pub mod opr;
pub mod options;
