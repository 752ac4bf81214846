use std::sync::atomic::{AtomicU64, Ordering};

use chatdeck_core::now_unix_millis;

/// Generates `<prefix>_<unix-millis>_<seq>` ids, unique per generator.
#[derive(Debug, Default)]
pub struct IdGenerator {
    seq: AtomicU64,
}

impl IdGenerator {
    pub fn next(&self, prefix: &str) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", prefix, now_unix_millis(), seq)
    }
}
