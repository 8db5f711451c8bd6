pub mod check;
pub mod tautology;
pub mod versions;
