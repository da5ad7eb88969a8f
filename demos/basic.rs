//! Basic example replaying an ODBC call sequence through the tracer.
//!
//! Run with: cargo run --example basic

use odbc_call_tracer::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn traced(tracer: &Tracer, record: CallRecord, rc: SqlReturn) {
    let handle = tracer.trace_call(record);
    tracer.trace_return(handle, rc);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,odbc_call_tracer=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let log_file = std::env::var("ODBC_TRACE_FILE")
        .unwrap_or_else(|_| std::env::temp_dir().join("odbctrace.log").display().to_string());

    // Same path the driver manager would pass to TraceOpenLogFile.
    // Add "_nc" to the file name to leave row counts out.
    let tracer = Tracer::new();
    tracer.open(TraceConfig::from_log_path(&log_file));

    let sql = "SELECT id, name\r\nFROM customers\r\nWHERE active = 1";
    let prepare = CallRecord::new(FunctionId::Prepare)
        .with_argument("szSqlStr", ArgValue::NarrowText(Some(sql.to_string())));
    traced(&tracer, prepare, SqlReturn::SUCCESS);

    for _ in 0..1_500 {
        traced(&tracer, CallRecord::new(FunctionId::Fetch), SqlReturn::SUCCESS);
    }
    traced(&tracer, CallRecord::new(FunctionId::Fetch), SqlReturn::NO_DATA);
    traced(&tracer, CallRecord::new(FunctionId::CloseCursor), SqlReturn::SUCCESS);

    tracing::info!(log_file = %log_file, "Trace line written");
    print!("{}", std::fs::read_to_string(&log_file)?);

    Ok(())
}
