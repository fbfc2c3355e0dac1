// Roel Kluin, 2023, GPL v3

pub mod offset;
pub mod twobit;
