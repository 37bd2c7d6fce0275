pub mod portfolio;
pub mod sub_portfolio;

pub use portfolio::*;
pub use sub_portfolio::*;

#[cfg(test)]
mod tests;
