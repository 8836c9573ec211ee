pub mod evaluate;
pub mod table;
