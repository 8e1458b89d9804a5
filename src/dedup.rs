//! URL deduplication via a Bloom filter
//!
//! The crawler must answer "have I seen this URL?" for millions of URLs in
//! bounded memory. A Bloom filter trades exactness for that bound: it may
//! occasionally report a never-seen URL as seen (a false positive, so the
//! page is skipped), but never the reverse.

use std::sync::Mutex;

/// Thread-safe approximate-membership filter over URL strings.
pub struct BloomDedup {
    inner: Mutex<Filter>,
}

struct Filter {
    words: Vec<u64>,
    bit_count: u64,
    hashes: u32,
    count: u64,
}

// Two independent seeds drive double hashing; the k probe positions are
// g_i = h1 + i*h2 (mod m).
const HASH_SEEDS: [u64; 2] = [0x517c_c1b7_2722_0a95, 0x9e37_79b1_85eb_ca87];

impl BloomDedup {
    /// Creates a filter sized for `expected_items` insertions at roughly
    /// `fp_rate` false positives, using the optimal Bloom parameters
    /// m = -n*ln(p)/(ln 2)^2 and k = (m/n)*ln 2.
    pub fn new(expected_items: usize, fp_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = fp_rate.clamp(f64::MIN_POSITIVE, 0.5);

        let ln2 = std::f64::consts::LN_2;
        let bits = (-n * p.ln() / (ln2 * ln2)).ceil().max(64.0);
        let hashes = ((bits / n) * ln2).round().max(1.0);

        let word_count = (bits as usize).div_ceil(64);

        Self {
            inner: Mutex::new(Filter {
                words: vec![0u64; word_count],
                bit_count: word_count as u64 * 64,
                hashes: hashes as u32,
                count: 0,
            }),
        }
    }

    /// Atomically tests membership and inserts on absence.
    ///
    /// # Returns
    ///
    /// * `true` - The URL was already present (or collided with earlier
    ///   insertions)
    /// * `false` - The URL was new and has now been added
    pub fn seen_or_add(&self, url: &str) -> bool {
        let mut filter = self.inner.lock().expect("dedup lock poisoned");

        let mut inserted = false;
        for idx in filter.bit_indices(url.as_bytes()) {
            let word = (idx / 64) as usize;
            let mask = 1u64 << (idx % 64);
            if filter.words[word] & mask == 0 {
                filter.words[word] |= mask;
                inserted = true;
            }
        }

        if inserted {
            filter.count += 1;
        }
        !inserted
    }

    /// Tests membership without inserting.
    pub fn seen(&self, url: &str) -> bool {
        let filter = self.inner.lock().expect("dedup lock poisoned");

        filter.bit_indices(url.as_bytes()).all(|idx| {
            let word = (idx / 64) as usize;
            let mask = 1u64 << (idx % 64);
            filter.words[word] & mask != 0
        })
    }

    /// Number of successful insertions so far.
    pub fn count(&self) -> u64 {
        self.inner.lock().expect("dedup lock poisoned").count
    }
}

impl Filter {
    fn bit_indices(&self, data: &[u8]) -> impl Iterator<Item = u64> {
        let h1 = mix_hash(data, HASH_SEEDS[0]);
        let h2 = mix_hash(data, HASH_SEEDS[1]) | 1;
        let bit_count = self.bit_count;
        (0..self.hashes as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % bit_count)
    }
}

fn mix_hash(data: &[u8], seed: u64) -> u64 {
    let mut hash = seed ^ data.len() as u64;
    for &byte in data {
        hash ^= (byte as u64).wrapping_mul(0x100_0000_01b3);
        hash = hash.rotate_left(13).wrapping_mul(0xff51_afd7_ed55_8ccd);
    }
    hash ^ (hash >> 33)
}
