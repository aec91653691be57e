#![forbid(unsafe_code)]

//! EBICS return codes.
//!
//! Every response carries two codes: the technical code in the header
//! (did the host process the message at all) and the bank code in the
//! body (did the business order succeed).  The technical code is always
//! evaluated first; when it is not OK the bank code is meaningless.

use skeppsbron_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbicsReturnCode {
    Ok,
    DownloadPostprocessDone,
    DownloadPostprocessSkipped,
    TxSegmentNumberUnderrun,
    InvalidUserOrUserState,
    ProcessingError,
    NoDownloadDataAvailable,
}

impl EbicsReturnCode {
    /// Look up a wire code.  Unknown codes are a structural error: the
    /// reply cannot be interpreted.
    pub fn lookup(code: &str) -> Result<Self, Error> {
        match code {
            "000000" => Ok(Self::Ok),
            "011000" => Ok(Self::DownloadPostprocessDone),
            "011001" => Ok(Self::DownloadPostprocessSkipped),
            "011101" => Ok(Self::TxSegmentNumberUnderrun),
            "091002" => Ok(Self::InvalidUserOrUserState),
            "091116" => Ok(Self::ProcessingError),
            "090005" => Ok(Self::NoDownloadDataAvailable),
            other => Err(Error::XmlStructure(format!("unknown EBICS return code: {other}"))),
        }
    }

    /// The six-digit wire form.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ok => "000000",
            Self::DownloadPostprocessDone => "011000",
            Self::DownloadPostprocessSkipped => "011001",
            Self::TxSegmentNumberUnderrun => "011101",
            Self::InvalidUserOrUserState => "091002",
            Self::ProcessingError => "091116",
            Self::NoDownloadDataAvailable => "090005",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Error for a technical code that is not OK.
    pub fn as_technical_error(&self, context: &str) -> Error {
        Error::TechnicalProtocol {
            code: self.code().to_owned(),
            reason: context.to_owned(),
        }
    }

    /// Error for a bank code that is not OK.
    pub fn as_bank_error(&self) -> Error {
        Error::BankBusiness { code: self.code().to_owned() }
    }
}

impl std::fmt::Display for EbicsReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
