use thiserror::Error;

pub type TnResult<T> = Result<T, TnError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TnError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown unit '{symbol}'")]
    UnknownUnit { symbol: String },

    #[error("Unit {unit} cannot express {kind}")]
    UnitMismatch { unit: String, kind: &'static str },
}
