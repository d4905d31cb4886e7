#![no_main]

use libfuzzer_sys::fuzz_target;
use pagemerge::ingest::{Ingestor, RawFile};
use pagemerge::storage::ScratchStorage;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Runtime};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static STORAGE: OnceLock<ScratchStorage> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Builder::new_current_thread().enable_all().build().unwrap())
}

fn storage() -> &'static ScratchStorage {
    STORAGE.get_or_init(|| {
        let dir = std::env::temp_dir().join("pagemerge-fuzz");
        runtime().block_on(ScratchStorage::open(dir)).unwrap()
    })
}

fuzz_target!(|data: &[u8]| {
    let ingestor = Ingestor::new(storage().clone(), 1);
    let report = runtime().block_on(ingestor.ingest(vec![RawFile::new("fuzz.pdf", data.to_vec())]));

    // Every upload is either accepted or rejected, never both or neither.
    assert_eq!(report.files.len() + report.rejected.len(), 1);

    // Accepted files are left in storage; do not let the corpus fill the disk.
    for file in &report.files {
        runtime().block_on(storage().remove(&file.storage_key)).unwrap();
    }
});
