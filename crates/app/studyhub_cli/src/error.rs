use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Provisioning failed: {}", .0)]
    Provision(#[from] studyhub_core::auth::ProvisionError),

    #[error("Database: {}", .0)]
    Db(#[from] studyhub_core::db::DbError),
}
