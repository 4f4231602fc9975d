mod baseline;
mod compare;
mod heal;

pub use baseline::run_baseline;
pub use compare::run_compare;
pub use heal::run_heal;
