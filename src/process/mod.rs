pub mod enrich;
pub mod table;
