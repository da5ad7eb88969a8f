//! Entry points exported to the ODBC driver manager.
//!
//! The driver manager calls `TraceSQLxxx` before the real driver call and
//! treats the returned `RETCODE` as an opaque token it hands back to
//! [`TraceReturn`] together with the real return code. Nothing here may fail
//! or unwind into the caller.

#![allow(non_snake_case)]

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;

use crate::call::{ArgValue, CallRecord, FunctionId, HandleKind, SqlReturn};
use crate::config::TraceConfig;
use crate::registry::CallHandle;
use crate::tracer::Tracer;

/// Trace interface version reported to the driver manager.
pub const TRACE_VERSION: u32 = 1000;

/// Length value meaning "nul-terminated".
pub const SQL_NTS: i32 = -3;

static TRACER: Lazy<Tracer> = Lazy::new(Tracer::new);

pub type SqlHStmt = *mut c_void;
pub type RetCode = i16;

fn shielded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(fallback)
}

/// Copy a narrow SQL string.
///
/// # Safety
/// `ptr` must be null or point to `len` readable bytes, or to a
/// nul-terminated string when `len` is negative.
pub unsafe fn narrow_text(ptr: *const u8, len: i32) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let bytes = match usize::try_from(len) {
        Ok(len) => unsafe { std::slice::from_raw_parts(ptr, len) },
        Err(_) => unsafe { CStr::from_ptr(ptr as *const c_char) }.to_bytes(),
    };
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Copy a wide (UTF-16) SQL string.
///
/// # Safety
/// `ptr` must be null or point to `len` readable code units, or to a
/// nul-terminated sequence when `len` is negative.
pub unsafe fn wide_text(ptr: *const u16, len: i32) -> Option<Vec<u16>> {
    if ptr.is_null() {
        return None;
    }
    let len = match usize::try_from(len) {
        Ok(len) => len,
        Err(_) => {
            let mut n = 0;
            while unsafe { *ptr.add(n) } != 0 {
                n += 1;
            }
            n
        }
    };
    Some(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
}

fn stmt_call(function: FunctionId, hstmt: SqlHStmt) -> CallRecord {
    CallRecord::new(function)
        .with_argument("hstmt", ArgValue::Handle(HandleKind::Stmt, hstmt as usize))
}

fn sql_text_call(function: FunctionId, hstmt: SqlHStmt, text: ArgValue, len: i32) -> CallRecord {
    stmt_call(function, hstmt)
        .with_argument("szSqlStr", text)
        .with_argument("cbSqlStr", ArgValue::Integer(len.into()))
}

fn register(tracer: &Tracer, record: CallRecord) -> RetCode {
    tracer.trace_call(record).as_raw()
}

/// Start tracing to the log file at `path` (UTF-16, nul-terminated).
pub fn open_log_file(tracer: &Tracer, path: &[u16]) {
    let path = String::from_utf16_lossy(path);
    tracer.open(TraceConfig::from_log_path(path));
}

#[no_mangle]
pub unsafe extern "system" fn TraceOpenLogFile(
    file_name: *const u16,
    _output_message: *mut u16,
    _message_buffer_len: u32,
) -> RetCode {
    shielded(0, || {
        if let Some(path) = unsafe { wide_text(file_name, SQL_NTS) } {
            open_log_file(&TRACER, &path);
        }
        0
    })
}

#[no_mangle]
pub extern "system" fn TraceCloseLogFile() -> RetCode {
    shielded(0, || {
        TRACER.close();
        0
    })
}

#[no_mangle]
pub extern "system" fn TraceVersion() -> u32 {
    TRACE_VERSION
}

#[no_mangle]
pub extern "system" fn TraceReturn(handle: RetCode, retcode: RetCode) {
    shielded((), || {
        TRACER.trace_return(CallHandle::from_raw(handle), SqlReturn(retcode))
    })
}

#[no_mangle]
pub extern "system" fn TraceSQLFetch(hstmt: SqlHStmt) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        register(&TRACER, stmt_call(FunctionId::Fetch, hstmt))
    })
}

#[no_mangle]
pub extern "system" fn TraceSQLFreeStmt(hstmt: SqlHStmt, option: u16) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        let record = stmt_call(FunctionId::FreeStmt, hstmt)
            .with_argument("fOption", ArgValue::Integer(option.into()));
        register(&TRACER, record)
    })
}

#[no_mangle]
pub extern "system" fn TraceSQLMoreResults(hstmt: SqlHStmt) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        register(&TRACER, stmt_call(FunctionId::MoreResults, hstmt))
    })
}

#[no_mangle]
pub extern "system" fn TraceSQLCloseCursor(hstmt: SqlHStmt) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        register(&TRACER, stmt_call(FunctionId::CloseCursor, hstmt))
    })
}

/// # Safety
/// `sql` must satisfy the contract of [`narrow_text`].
#[no_mangle]
pub unsafe extern "system" fn TraceSQLPrepare(
    hstmt: SqlHStmt,
    sql: *const u8,
    len: i32,
) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        let text = ArgValue::NarrowText(unsafe { narrow_text(sql, len) });
        register(&TRACER, sql_text_call(FunctionId::Prepare, hstmt, text, len))
    })
}

/// # Safety
/// `sql` must satisfy the contract of [`wide_text`].
#[no_mangle]
pub unsafe extern "system" fn TraceSQLPrepareW(
    hstmt: SqlHStmt,
    sql: *const u16,
    len: i32,
) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        let text = ArgValue::WideText(unsafe { wide_text(sql, len) });
        register(&TRACER, sql_text_call(FunctionId::Prepare, hstmt, text, len))
    })
}

/// # Safety
/// `sql` must satisfy the contract of [`narrow_text`].
#[no_mangle]
pub unsafe extern "system" fn TraceSQLExecDirect(
    hstmt: SqlHStmt,
    sql: *const u8,
    len: i32,
) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        let text = ArgValue::NarrowText(unsafe { narrow_text(sql, len) });
        register(&TRACER, sql_text_call(FunctionId::ExecDirect, hstmt, text, len))
    })
}

/// # Safety
/// `sql` must satisfy the contract of [`wide_text`].
#[no_mangle]
pub unsafe extern "system" fn TraceSQLExecDirectW(
    hstmt: SqlHStmt,
    sql: *const u16,
    len: i32,
) -> RetCode {
    shielded(CallHandle::INVALID.as_raw(), || {
        let text = ArgValue::WideText(unsafe { wide_text(sql, len) });
        register(&TRACER, sql_text_call(FunctionId::ExecDirect, hstmt, text, len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::sync::Arc;

    #[test]
    fn test_narrow_text_lengths() {
        let sql = b"SELECT 1 FROM t\0garbage";
        assert_eq!(
            unsafe { narrow_text(sql.as_ptr(), SQL_NTS) }.as_deref(),
            Some("SELECT 1 FROM t")
        );
        assert_eq!(unsafe { narrow_text(sql.as_ptr(), 8) }.as_deref(), Some("SELECT 1"));
        assert_eq!(unsafe { narrow_text(std::ptr::null(), SQL_NTS) }, None);
    }

    #[test]
    fn test_wide_text_lengths() {
        let mut sql: Vec<u16> = "SELECT 2".encode_utf16().collect();
        sql.push(0);
        assert_eq!(
            unsafe { wide_text(sql.as_ptr(), SQL_NTS) },
            Some("SELECT 2".encode_utf16().collect())
        );
        assert_eq!(unsafe { wide_text(sql.as_ptr(), 6) }.map(|u| u.len()), Some(6));
        assert_eq!(unsafe { wide_text(std::ptr::null(), 4) }, None);
    }

    #[test]
    fn test_wrapper_records_exec_direct_wide() {
        let tracer = Tracer::new();
        let sink = Arc::new(MemorySink::new());
        tracer.open_with_sink(TraceConfig::default(), sink.clone());

        let mut sql: Vec<u16> = "SELECT *\r\nFROM wide".encode_utf16().collect();
        sql.push(0);
        let text = ArgValue::WideText(unsafe { wide_text(sql.as_ptr(), SQL_NTS) });
        let record = sql_text_call(FunctionId::ExecDirect, std::ptr::null_mut(), text, SQL_NTS);
        let handle = register(&tracer, record);
        tracer.trace_return(CallHandle::from_raw(handle), SqlReturn::SUCCESS);

        let handle = register(&tracer, stmt_call(FunctionId::CloseCursor, std::ptr::null_mut()));
        tracer.trace_return(CallHandle::from_raw(handle), SqlReturn::SUCCESS);

        assert!(sink.lines()[0].ends_with("0 Recs SELECT * FROM wide"));
    }

    #[test]
    fn test_open_log_file_applies_marker() {
        let tracer = Tracer::new();
        let path: Vec<u16> = "C:\\logs\\odbc_nc.log".encode_utf16().collect();
        open_log_file(&tracer, &path);
        assert_eq!(tracer.with_aggregator(|a| a.records_row_counts()), Some(false));
    }

    #[test]
    fn test_shielded_swallows_panics() {
        assert_eq!(shielded(-1, || panic!("boom")), -1);
        assert_eq!(shielded(-1, || 7), 7);
    }

    #[test]
    fn test_exported_prepared_statement_cycle() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("exported.log");
        let mut wide_path: Vec<u16> = path.to_string_lossy().encode_utf16().collect();
        wide_path.push(0);

        unsafe {
            assert_eq!(TraceOpenLogFile(wide_path.as_ptr(), std::ptr::null_mut(), 0), 0);
            let hstmt = 0x42 as SqlHStmt;
            let sql = b"SELECT * FROM t\0";
            TraceReturn(TraceSQLPrepare(hstmt, sql.as_ptr(), SQL_NTS), 0);
            // SQLExecute runs here; the driver manager has no wrapper to call for it.
            for _ in 0..3 {
                TraceReturn(TraceSQLFetch(hstmt), 0);
            }
            TraceReturn(TraceSQLFetch(hstmt), SqlReturn::NO_DATA.0);
            TraceReturn(TraceSQLCloseCursor(hstmt), 0);
        }
        TraceCloseLogFile();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.ends_with("ms 3 Recs SELECT * FROM t\n"));
    }

    #[test]
    fn test_trace_version() {
        assert_eq!(TraceVersion(), 1000);
    }
}
