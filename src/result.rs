//! Result codes, operation outcomes and the crate error type.
//!
//! The directory server reports the outcome of every operation as a numeric
//! [result code](https://tools.ietf.org/html/rfc4511#appendix-A.1). The tool
//! carries that code all the way to the process exit status, so this module
//! keeps the numeric form in [`ResultCode`], and wraps the different ways an
//! invocation can end in the tagged [`Outcome`].

use std::fmt;
use std::io;

use ldap3::result::LdapError;
use thiserror::Error;

/// Type alias for the crate-level `Result`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the tool itself, as opposed to those coming from the
/// directory or the protocol library.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was absent or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The command line could not be turned into a usable configuration.
    #[error("{0}")]
    Config(String),
    /// Writing to an output channel failed.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Numeric LDAP result code.
///
/// Codes below 80 are sent by the server. Codes from 80 upwards are
/// client-side codes for conditions detected locally, numbered the way
/// the common LDAP SDKs number them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const SUCCESS: ResultCode = ResultCode(0);
    pub const CONSTRAINT_VIOLATION: ResultCode = ResultCode(19);
    pub const INVALID_CREDENTIALS: ResultCode = ResultCode(49);
    pub const UNWILLING_TO_PERFORM: ResultCode = ResultCode(53);
    pub const OTHER: ResultCode = ResultCode(80);
    pub const SERVER_DOWN: ResultCode = ResultCode(81);
    pub const LOCAL_ERROR: ResultCode = ResultCode(82);
    pub const DECODING_ERROR: ResultCode = ResultCode(84);
    pub const TIMEOUT: ResultCode = ResultCode(85);
    pub const PARAM_ERROR: ResultCode = ResultCode(89);
    pub const CONNECT_ERROR: ResultCode = ResultCode(91);

    /// Symbolic name of the code.
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "success",
            1 => "operationsError",
            2 => "protocolError",
            3 => "timeLimitExceeded",
            4 => "sizeLimitExceeded",
            5 => "compareFalse",
            6 => "compareTrue",
            7 => "authMethodNotSupported",
            8 => "strongerAuthRequired",
            10 => "referral",
            11 => "adminLimitExceeded",
            12 => "unavailableCriticalExtension",
            13 => "confidentialityRequired",
            14 => "saslBindInProgress",
            16 => "noSuchAttribute",
            17 => "undefinedAttributeType",
            18 => "inappropriateMatching",
            19 => "constraintViolation",
            20 => "attributeOrValueExists",
            21 => "invalidAttributeSyntax",
            32 => "noSuchObject",
            33 => "aliasProblem",
            34 => "invalidDNSyntax",
            36 => "aliasDereferencingProblem",
            48 => "inappropriateAuthentication",
            49 => "invalidCredentials",
            50 => "insufficientAccessRights",
            51 => "busy",
            52 => "unavailable",
            53 => "unwillingToPerform",
            54 => "loopDetect",
            64 => "namingViolation",
            65 => "objectClassViolation",
            66 => "notAllowedOnNonLeaf",
            67 => "notAllowedOnRDN",
            68 => "entryAlreadyExists",
            69 => "objectClassModsProhibited",
            71 => "affectsMultipleDSAs",
            80 => "other",
            81 => "serverDown",
            82 => "localError",
            83 => "encodingError",
            84 => "decodingError",
            85 => "timeout",
            88 => "abandoned",
            89 => "paramError",
            91 => "connectError",
            92 => "notSupported",
            _ => "unknown",
        }
    }

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    /// Value suitable for `std::process::exit()`.
    pub fn exit_status(&self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

impl From<&LdapError> for ResultCode {
    fn from(e: &LdapError) -> ResultCode {
        match e {
            LdapError::LdapResult { result } => ResultCode(result.rc),
            LdapError::Timeout { .. } => ResultCode::TIMEOUT,
            LdapError::Io { .. } | LdapError::NativeTLS { .. } => ResultCode::CONNECT_ERROR,
            LdapError::OpSend { .. } | LdapError::ResultRecv { .. } => ResultCode::SERVER_DOWN,
            LdapError::EndOfStream => ResultCode::DECODING_ERROR,
            LdapError::UrlParsing { .. }
            | LdapError::UnknownScheme(_)
            | LdapError::FilterParsing => ResultCode::PARAM_ERROR,
            _ => ResultCode::LOCAL_ERROR,
        }
    }
}

/// Whether an outcome is announced on the exception bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Deliver an exception event to the registered listeners, then report.
    Publish,
    /// Only report the final result code.
    ReportOnly,
}

/// How a single tool invocation ended.
#[derive(Debug)]
pub enum Outcome {
    /// The password was changed. If the server generated the new password,
    /// it's returned here.
    Success { generated_password: Option<String> },
    /// Bad or missing command line argument; no connection was attempted.
    ConfigurationError { message: String },
    /// The connection (including the bind) couldn't be established.
    ConnectionError { code: ResultCode, message: String },
    /// The library failed while sending the request or reading the response.
    ProtocolFailure { code: ResultCode, message: String },
    /// The server doesn't advertise the extended operation.
    UnsupportedFeature { oid: String },
    /// The server processed the request and rejected it.
    OperationFailure { code: ResultCode, text: String },
}

impl Outcome {
    pub fn result_code(&self) -> ResultCode {
        match self {
            Outcome::Success { .. } => ResultCode::SUCCESS,
            Outcome::ConfigurationError { .. } => ResultCode::PARAM_ERROR,
            Outcome::UnsupportedFeature { .. } => ResultCode::UNWILLING_TO_PERFORM,
            Outcome::ConnectionError { code, .. }
            | Outcome::ProtocolFailure { code, .. }
            | Outcome::OperationFailure { code, .. } => *code,
        }
    }

    /// Publication policy: transport and protocol level failures are
    /// announced to listeners, everything else is only reported.
    pub fn disposition(&self) -> Disposition {
        match self {
            Outcome::ConnectionError { .. } | Outcome::ProtocolFailure { .. } => {
                Disposition::Publish
            }
            Outcome::Success { .. }
            | Outcome::ConfigurationError { .. }
            | Outcome::UnsupportedFeature { .. }
            | Outcome::OperationFailure { .. } => Disposition::ReportOnly,
        }
    }
}
