use buildplot::store::RecordStore;
use serde_json::json;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn default_manifest_path(store_path: &Path) -> PathBuf {
    let mut p = store_path.to_path_buf();
    let fname = store_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("store.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: store_manifest <store.csv>");
        std::process::exit(1);
    };
    let path = PathBuf::from(path);

    let summary = match RecordStore::new(&path).summarize() {
        Ok(s) => s,
        Err(err) => {
            eprintln!("summary failed: {}", err);
            std::process::exit(3);
        }
    };
    if !summary.exists {
        eprintln!("no record store at {}", path.display());
        std::process::exit(2);
    }

    let out_path = default_manifest_path(&path);
    let payload = json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "summary": summary,
    });
    let body = match serde_json::to_string_pretty(&payload) {
        Ok(b) => b,
        Err(err) => {
            eprintln!("failed to encode manifest: {}", err);
            std::process::exit(4);
        }
    };
    if let Err(err) = fs::write(&out_path, body) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!("wrote manifest {}", out_path.display());
}
