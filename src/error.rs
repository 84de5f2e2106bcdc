use thiserror::Error;

/// Reason a Xex header was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum XexFault {
    #[error("XEX2 was not found at the start of the file")]
    BadMagic,

    #[error("starting address of Xex code is beyond the end of the file")]
    CodeBeyondEnd,

    #[error("Xex certificate offset is beyond the starting address of Xex code")]
    CertificateBeyondCode,

    #[error("Xex optional header table spills over into the Xex code")]
    HeaderTableSpill,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error reading binary structure: {0}")]
    Binary(#[from] binrw::Error),

    #[error("Original Xbox ISO format not supported")]
    OriginalXbox,

    #[error("Unsupported XISO format")]
    UnknownFormat,

    #[error("Corrupt directory table: {0}")]
    CorruptDirectory(String),

    #[error("default.xex not found")]
    DefaultXexNotFound,

    #[error("Invalid Xex: {0}")]
    InvalidXex(XexFault),

    #[error("Xex has no execution info header")]
    MissingExecutionInfo,

    #[error("Error reading game name table: {0}")]
    Lookup(#[from] csv::Error),

    #[error("Error downloading game name table: {0}")]
    Download(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
