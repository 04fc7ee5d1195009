//! Round-robin pool of API keys.
//! The index only ever moves forward (wrapping) and is never reset between calls,
//! so a key that just failed is the last one tried on the next scan.

#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    keys: Vec<String>,
    index: usize,
}

impl CredentialPool {
    /// Builds a pool from configured keys, dropping blank entries.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys, index: 0 }
    }

    pub fn current(&self) -> Option<&str> {
        self.keys.get(self.index).map(String::as_str)
    }

    /// Moves to the next key, wrapping to the first. No-op on an empty pool.
    pub fn advance(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.keys.len();
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
