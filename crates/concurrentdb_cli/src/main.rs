//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `concurrentdb_core` linkage.
//! - Run one create/read round trip through the publisher adapter against a
//!   throwaway in-memory store.
//!
//! Set `CONCURRENTDB_LOG_DIR` to an absolute path to capture core logs.

use concurrentdb_core::{
    init_logging, Entity, LoggingConfig, PrimaryKey, ReactiveDatabaseService, StoreConfig,
};
use futures::executor::block_on;
use log::info;
use serde::{Deserialize, Serialize};
use std::process::ExitCode;
use uuid::Uuid;

const LOG_DIR_ENV: &str = "CONCURRENTDB_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProbeRecord {
    id: String,
    note: String,
}

impl Entity for ProbeRecord {
    const ENTITY_TYPE: &'static str = "probe_record";

    fn primary_key(&self) -> PrimaryKey {
        self.id.clone()
    }
}

fn main() -> ExitCode {
    println!(
        "concurrentdb_core version={}",
        concurrentdb_core::core_version()
    );

    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        if let Err(err) = init_logging(&LoggingConfig::with_default_level(log_dir)) {
            eprintln!("logging disabled: {err}");
        }
    }

    match round_trip() {
        Ok(()) => {
            println!("concurrentdb_core round_trip=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("concurrentdb_core round_trip=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let service = ReactiveDatabaseService::open(StoreConfig::ephemeral())?;
    let record = ProbeRecord {
        id: Uuid::new_v4().to_string(),
        note: "probe".to_string(),
    };

    block_on(service.create(record.clone()))?;
    let loaded: ProbeRecord = block_on(service.read(record.id.clone()))?;
    if loaded != record {
        return Err(format!("read back {loaded:?}, expected {record:?}").into());
    }

    info!("event=cli_probe module=cli status=ok");
    Ok(())
}
