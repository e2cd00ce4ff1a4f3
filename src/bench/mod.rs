//! Test bench collaborators: the script catalogue and the report browser

mod reports;
mod scripts;

pub use reports::*;
pub use scripts::*;
