use std::{
    borrow::Cow,
    error::Error as StdError,
    fmt::{self, Display, Formatter},
};

use http::StatusCode;

/// Canonical status codes of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Code {
    /// The call completed successfully.
    Ok = 0,
    /// The call was cancelled, typically by the caller.
    Cancelled = 1,
    /// Unknown error.
    Unknown = 2,
    /// The client specified an invalid argument.
    InvalidArgument = 3,
    /// The deadline expired before the call could complete.
    DeadlineExceeded = 4,
    /// Some requested entity was not found.
    NotFound = 5,
    /// The entity a client attempted to create already exists.
    AlreadyExists = 6,
    /// The caller does not have permission to execute the call.
    PermissionDenied = 7,
    /// Some resource has been exhausted.
    ResourceExhausted = 8,
    /// The system is not in a state required for the call's execution.
    FailedPrecondition = 9,
    /// The call was aborted.
    Aborted = 10,
    /// The call was attempted past the valid range.
    OutOfRange = 11,
    /// The call is not implemented or not supported.
    Unimplemented = 12,
    /// Internal error.
    Internal = 13,
    /// The service is currently unavailable.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl Code {
    /// All codes, ordered by their numeric value.
    pub const ALL: [Code; 17] = [
        Code::Ok,
        Code::Cancelled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    /// Numeric value of this code.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get a code from its numeric value, if it is a known code.
    pub fn from_i32(value: i32) -> Option<Code> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Get a code from its numeric value, mapping unknown values to [`Code::Unknown`].
    pub fn from_i32_lossy(value: i32) -> Code {
        Self::from_i32(value).unwrap_or(Code::Unknown)
    }

    /// Upper snake case name of this code.
    pub const fn description(self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// The HTTP status the JSON gateway answers with for this code.
    pub fn http_status(self) -> StatusCode {
        match self {
            Code::Ok => StatusCode::OK,
            // nginx's "client closed request"
            Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
            Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
                StatusCode::BAD_REQUEST
            }
            Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Code::NotFound => StatusCode::NOT_FOUND,
            Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
            Code::PermissionDenied => StatusCode::FORBIDDEN,
            Code::Unauthenticated => StatusCode::UNAUTHORIZED,
            Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Best effort code for a HTTP status, used when a gateway response
    /// carries no status of its own.
    pub fn from_http_status(status: StatusCode) -> Code {
        match status.as_u16() {
            200 => Code::Ok,
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            408 => Code::Cancelled,
            409 => Code::Aborted,
            429 => Code::ResourceExhausted,
            501 => Code::Unimplemented,
            503 => Code::Unavailable,
            504 => Code::DeadlineExceeded,
            _ => Code::Internal,
        }
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> Self {
        code.as_i32()
    }
}

/// Terminal outcome of a call: a [`Code`] and a human readable message.
///
/// Every call ends with a status, successful ones included. Handlers
/// return it as their error value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    code: Code,
    message: Cow<'static, str>,
}

macro_rules! status_ctors {
    ($($(#[$attr:meta])* $name:ident => $code:ident,)+) => {
        $(
            $(#[$attr])*
            pub fn $name(message: impl Into<Cow<'static, str>>) -> Self {
                Self::new(Code::$code, message)
            }
        )+
    };
}

impl Status {
    /// Create a new status.
    pub fn new(code: Code, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The successful status, with an empty message.
    pub const fn ok() -> Self {
        Self {
            code: Code::Ok,
            message: Cow::Borrowed(""),
        }
    }

    status_ctors! {
        /// Create a [`Code::Cancelled`] status.
        cancelled => Cancelled,
        /// Create a [`Code::Unknown`] status.
        unknown => Unknown,
        /// Create a [`Code::InvalidArgument`] status.
        invalid_argument => InvalidArgument,
        /// Create a [`Code::DeadlineExceeded`] status.
        deadline_exceeded => DeadlineExceeded,
        /// Create a [`Code::NotFound`] status.
        not_found => NotFound,
        /// Create a [`Code::AlreadyExists`] status.
        already_exists => AlreadyExists,
        /// Create a [`Code::PermissionDenied`] status.
        permission_denied => PermissionDenied,
        /// Create a [`Code::ResourceExhausted`] status.
        resource_exhausted => ResourceExhausted,
        /// Create a [`Code::FailedPrecondition`] status.
        failed_precondition => FailedPrecondition,
        /// Create a [`Code::Aborted`] status.
        aborted => Aborted,
        /// Create a [`Code::OutOfRange`] status.
        out_of_range => OutOfRange,
        /// Create a [`Code::Unimplemented`] status.
        unimplemented => Unimplemented,
        /// Create a [`Code::Internal`] status.
        internal => Internal,
        /// Create a [`Code::Unavailable`] status.
        unavailable => Unavailable,
        /// Create a [`Code::DataLoss`] status.
        data_loss => DataLoss,
        /// Create a [`Code::Unauthenticated`] status.
        unauthenticated => Unauthenticated,
    }

    /// Code of this status.
    #[inline]
    pub fn code(&self) -> Code {
        self.code
    }

    /// Message of this status.
    #[inline]
    pub fn message(&self) -> &str {
        self.message.as_ref()
    }

    /// Whether this status denotes success.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "status {}", self.code)
        } else {
            write!(f, "status {}: {}", self.code, self.message)
        }
    }
}

impl StdError for Status {}

impl From<Code> for Status {
    fn from(code: Code) -> Self {
        Status::new(code, "")
    }
}

impl From<(Code, &'static str)> for Status {
    fn from((code, message): (Code, &'static str)) -> Self {
        Status::new(code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_numbers() {
        for (idx, code) in Code::ALL.iter().enumerate() {
            assert_eq!(code.as_i32(), idx as i32);
            assert_eq!(Code::from_i32(idx as i32), Some(*code));
        }
        assert_eq!(Code::from_i32(17), None);
        assert_eq!(Code::from_i32(-1), None);
        assert_eq!(Code::from_i32_lossy(99), Code::Unknown);
    }

    #[test]
    fn http_mapping() {
        assert_eq!(Code::Ok.http_status(), StatusCode::OK);
        assert_eq!(Code::Cancelled.http_status().as_u16(), 499);
        assert_eq!(Code::InvalidArgument.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Code::DeadlineExceeded.http_status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(Code::Aborted.http_status(), StatusCode::CONFLICT);
        assert_eq!(Code::Unimplemented.http_status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(Code::Unauthenticated.http_status(), StatusCode::UNAUTHORIZED);

        // codes with a dedicated HTTP status map back to themselves
        for code in [
            Code::Ok,
            Code::InvalidArgument,
            Code::DeadlineExceeded,
            Code::NotFound,
            Code::PermissionDenied,
            Code::ResourceExhausted,
            Code::Aborted,
            Code::Unimplemented,
            Code::Unavailable,
            Code::Unauthenticated,
        ] {
            assert_eq!(Code::from_http_status(code.http_status()), code);
        }
        assert_eq!(Code::from_http_status(StatusCode::IM_A_TEAPOT), Code::Internal);
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::ok().to_string(), "status OK");
        assert_eq!(
            Status::aborted("123123123").to_string(),
            "status ABORTED: 123123123"
        );
        assert!(Status::default().is_ok());
        assert_eq!(Status::from(Code::NotFound).code(), Code::NotFound);
    }
}
