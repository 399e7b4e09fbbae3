pub mod aqi;
pub mod canonical;
pub mod csv_io;
pub mod error;
pub mod features;
pub mod merge;
pub mod resample;
