pub mod optimize;
pub mod portfolio;
