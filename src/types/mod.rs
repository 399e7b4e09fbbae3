pub mod calendar;
pub mod columns;
pub mod feature_vector;
pub mod timestamp;
