//! Call records captured at interception time.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TraceError};

/// Maximum number of arguments recorded for a single call.
pub const MAX_ARGUMENTS: usize = 20;

/// ODBC functions the tracer knows about.
///
/// Anything else is carried as `Other` with its raw `SQL_API_*` id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionId {
    Fetch,
    FreeStmt,
    MoreResults,
    CloseCursor,
    Prepare,
    ExecDirect,
    Other(u16),
}

impl FunctionId {
    /// Returns the `SQL_API_*` id from `sqlext.h`.
    pub fn api_id(&self) -> u16 {
        match self {
            FunctionId::Fetch => 13,
            FunctionId::FreeStmt => 16,
            FunctionId::MoreResults => 61,
            FunctionId::CloseCursor => 1003,
            FunctionId::Prepare => 19,
            FunctionId::ExecDirect => 11,
            FunctionId::Other(id) => *id,
        }
    }

    /// Maps an `SQL_API_*` id back to a function.
    pub fn from_api_id(id: u16) -> Self {
        match id {
            13 => FunctionId::Fetch,
            16 => FunctionId::FreeStmt,
            61 => FunctionId::MoreResults,
            1003 => FunctionId::CloseCursor,
            19 => FunctionId::Prepare,
            11 => FunctionId::ExecDirect,
            other => FunctionId::Other(other),
        }
    }

    /// Canonical ODBC function name, or `None` for unnamed ids.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            FunctionId::Fetch => Some("SQLFetch"),
            FunctionId::FreeStmt => Some("SQLFreeStmt"),
            FunctionId::MoreResults => Some("SQLMoreResults"),
            FunctionId::CloseCursor => Some("SQLCloseCursor"),
            FunctionId::Prepare => Some("SQLPrepare"),
            FunctionId::ExecDirect => Some("SQLExecDirect"),
            FunctionId::Other(_) => None,
        }
    }

    /// Functions that end a unit of work and flush a log line.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FunctionId::FreeStmt | FunctionId::MoreResults | FunctionId::CloseCursor
        )
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "SQL_API_{}", self.api_id()),
        }
    }
}

impl FromStr for FunctionId {
    type Err = TraceError;

    /// Accepts both `SQLFetch` and the wide `SQLPrepareW` spelling.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        let name = name.strip_suffix('W').unwrap_or(name);
        match name {
            "SQLFetch" => Ok(FunctionId::Fetch),
            "SQLFreeStmt" => Ok(FunctionId::FreeStmt),
            "SQLMoreResults" => Ok(FunctionId::MoreResults),
            "SQLCloseCursor" => Ok(FunctionId::CloseCursor),
            "SQLPrepare" => Ok(FunctionId::Prepare),
            "SQLExecDirect" => Ok(FunctionId::ExecDirect),
            _ => Err(TraceError::UnknownFunction(s.to_string())),
        }
    }
}

/// Kind of opaque ODBC handle passed as an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Env,
    Dbc,
    Stmt,
    Desc,
    Wnd,
    Generic,
}

/// Value of one captured argument.
///
/// Strings are copied when the call is intercepted; `None` stands for a null pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Integer(i64),
    Handle(HandleKind, usize),
    Pointer(usize),
    OutPointer(usize),
    NarrowText(Option<String>),
    WideText(Option<Vec<u16>>),
}

impl ArgValue {
    /// Narrow SQL text, if this is a non-null narrow string.
    pub fn narrow_text(&self) -> Option<&str> {
        match self {
            ArgValue::NarrowText(Some(text)) => Some(text),
            _ => None,
        }
    }

    /// Wide SQL text as UTF-16 code units, if this is a non-null wide string.
    pub fn wide_text(&self) -> Option<&[u16]> {
        match self {
            ArgValue::WideText(Some(units)) => Some(units),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceArgument {
    pub name: &'static str,
    pub value: ArgValue,
}

/// SQL return code (`SQLRETURN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlReturn(pub i16);

impl SqlReturn {
    pub const SUCCESS: SqlReturn = SqlReturn(0);
    pub const SUCCESS_WITH_INFO: SqlReturn = SqlReturn(1);
    pub const NO_DATA: SqlReturn = SqlReturn(100);
    pub const ERROR: SqlReturn = SqlReturn(-1);
    pub const INVALID_HANDLE: SqlReturn = SqlReturn(-2);

    /// True only for plain `SQL_SUCCESS`; `SQL_SUCCESS_WITH_INFO` does not count.
    pub fn is_strict_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

/// One intercepted ODBC call waiting for its return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub function: FunctionId,
    arguments: Vec<TraceArgument>,
    pub return_code: Option<SqlReturn>,
}

impl CallRecord {
    pub fn new(function: FunctionId) -> Self {
        Self {
            function,
            arguments: Vec::new(),
            return_code: None,
        }
    }

    /// Append an argument, failing once `MAX_ARGUMENTS` are recorded.
    pub fn push_argument(&mut self, name: &'static str, value: ArgValue) -> Result<()> {
        if self.arguments.len() >= MAX_ARGUMENTS {
            return Err(TraceError::TooManyArguments {
                function: self.function,
                max: MAX_ARGUMENTS,
            });
        }
        self.arguments.push(TraceArgument { name, value });
        Ok(())
    }

    /// Builder form of [`push_argument`](Self::push_argument).
    ///
    /// Arguments past the cap are dropped with a warning.
    pub fn with_argument(mut self, name: &'static str, value: ArgValue) -> Self {
        if let Err(e) = self.push_argument(name, value) {
            tracing::warn!(error = %e, argument = name, "Dropping call argument");
        }
        self
    }

    /// Arguments in call-site order.
    pub fn arguments(&self) -> &[TraceArgument] {
        &self.arguments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_id_round_trip_for_known_functions() {
        for function in [
            FunctionId::Fetch,
            FunctionId::FreeStmt,
            FunctionId::MoreResults,
            FunctionId::CloseCursor,
            FunctionId::Prepare,
            FunctionId::ExecDirect,
        ] {
            assert_eq!(FunctionId::from_api_id(function.api_id()), function);
        }
        assert_eq!(FunctionId::from_api_id(40), FunctionId::Other(40));
        // SQLExecute has no wrapper of its own.
        assert_eq!(FunctionId::from_api_id(12), FunctionId::Other(12));
    }

    #[test]
    fn test_terminal_functions() {
        assert!(FunctionId::FreeStmt.is_terminal());
        assert!(FunctionId::MoreResults.is_terminal());
        assert!(FunctionId::CloseCursor.is_terminal());
        assert!(!FunctionId::Fetch.is_terminal());
        assert!(!FunctionId::Prepare.is_terminal());
    }

    #[test]
    fn test_parse_function_names() {
        assert_eq!("SQLFetch".parse::<FunctionId>().unwrap(), FunctionId::Fetch);
        assert_eq!(
            "SQLExecDirectW".parse::<FunctionId>().unwrap(),
            FunctionId::ExecDirect
        );
        assert!("SQLTables".parse::<FunctionId>().is_err());
        assert!("SQLExecute".parse::<FunctionId>().is_err());
    }

    #[test]
    fn test_display_uses_odbc_name() {
        assert_eq!(FunctionId::CloseCursor.to_string(), "SQLCloseCursor");
        assert_eq!(FunctionId::Other(54).to_string(), "SQL_API_54");
    }

    #[test]
    fn test_argument_cap() {
        let mut call = CallRecord::new(FunctionId::Other(40));
        for _ in 0..MAX_ARGUMENTS {
            call.push_argument("n", ArgValue::Integer(1)).unwrap();
        }
        let err = call.push_argument("extra", ArgValue::Integer(2)).unwrap_err();
        assert!(matches!(err, TraceError::TooManyArguments { max: MAX_ARGUMENTS, .. }));

        let call = call.with_argument("dropped", ArgValue::Integer(3));
        assert_eq!(call.arguments().len(), MAX_ARGUMENTS);
    }

    #[test]
    fn test_text_accessors() {
        let narrow = ArgValue::NarrowText(Some("SELECT 1".into()));
        assert_eq!(narrow.narrow_text(), Some("SELECT 1"));
        assert_eq!(narrow.wide_text(), None);
        assert_eq!(ArgValue::NarrowText(None).narrow_text(), None);

        let wide = ArgValue::WideText(Some("x".encode_utf16().collect()));
        assert_eq!(wide.wide_text(), Some(&[0x78u16][..]));
    }

    #[test]
    fn test_strict_success() {
        assert!(SqlReturn::SUCCESS.is_strict_success());
        assert!(!SqlReturn::SUCCESS_WITH_INFO.is_strict_success());
        assert!(!SqlReturn::NO_DATA.is_strict_success());
    }
}
