use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("unable to prepare working directories")]
    Bootstrap,
    #[display("unable to initialize logging")]
    Logging,
    #[display("unable to open the dedup index")]
    Index,
    #[display("pipeline run failed")]
    Run,
}
