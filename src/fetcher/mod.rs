pub mod csv_fetcher;

pub use csv_fetcher::*;
