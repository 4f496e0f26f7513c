use casedash::config::DashboardConfig;
use casedash::data::manifest::{analyze_csv, default_manifest_path, now_epoch, validate_schema};
use casedash::data::EXPECTED_COLUMNS;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let cfg = DashboardConfig::from_env();
    let path = PathBuf::from(env::args().nth(1).unwrap_or(cfg.data_path));

    let schema = match validate_schema(&path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("schema check failed: {}", err);
            std::process::exit(1);
        }
    };

    if !schema.ok {
        eprintln!("schema mismatch: {}", schema.message);
        eprintln!("expected columns: {:?}", EXPECTED_COLUMNS);
        std::process::exit(2);
    }

    let manifest = match analyze_csv(&path, cfg.manifest_ttl_secs, now_epoch()) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("analysis failed: {}", err);
            std::process::exit(3);
        }
    };

    let payload = serde_json::json!({
        "schema": schema,
        "manifest": manifest,
    });
    let text = match serde_json::to_string_pretty(&payload) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("failed to encode manifest: {}", err);
            std::process::exit(4);
        }
    };
    let out_path = default_manifest_path(&path);
    if let Err(err) = fs::write(&out_path, &text) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!("{}", text);
    eprintln!("wrote manifest {}", out_path.display());
}
