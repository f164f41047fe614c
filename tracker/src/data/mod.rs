// Price-list parsing and CSV persistence
pub mod csv_store;
pub mod price_list;
