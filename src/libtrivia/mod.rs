pub mod db;
pub mod error;
pub mod interchange;
pub mod pagination;
pub mod payload;
pub mod quiz;
