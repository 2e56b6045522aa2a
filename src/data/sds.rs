//! Simple Dynamic String with Small String Optimization (SSO)
//!
//! Strings ≤23 bytes are stored inline without heap allocation.
//! This matches Redis's approach and significantly reduces allocator pressure
//! since most Redis keys are short (e.g., "user:123", "session:abc").

use serde::{Deserialize, Serialize};

/// Small String Optimization threshold - strings up to this size are stored inline
const SSO_MAX_LEN: usize = 23;

/// Simple Dynamic String with Small String Optimization (SSO)
#[derive(Clone, Debug)]
pub enum SDS {
    /// Inline storage for small strings (no heap allocation)
    Inline { len: u8, data: [u8; SSO_MAX_LEN] },
    /// Heap storage for larger strings
    Heap(Vec<u8>),
}

impl SDS {
    /// Verify all invariants hold for this SDS
    #[cfg(debug_assertions)]
    fn verify_invariants(&self) {
        match self {
            SDS::Inline { len, data: _ } => {
                // Invariant 1: Inline len must be <= SSO_MAX_LEN
                debug_assert!(
                    (*len as usize) <= SSO_MAX_LEN,
                    "Invariant violated: inline len {} exceeds SSO_MAX_LEN {}",
                    len,
                    SSO_MAX_LEN
                );
                // Invariant 2: len() must be consistent
                debug_assert_eq!(
                    self.len(),
                    *len as usize,
                    "Invariant violated: len() must equal stored len"
                );
            }
            SDS::Heap(_data) => {
                // Invariant: Heap strings should be > SSO_MAX_LEN
                // (unless created via append that didn't optimize)
                // This is a soft invariant - we don't enforce it for simplicity
            }
        }

        // Invariant 3: is_empty() iff len() == 0
        debug_assert_eq!(
            self.is_empty(),
            self.len() == 0,
            "Invariant violated: is_empty() must equal len() == 0"
        );

        // Invariant 4: as_bytes().len() must equal len()
        debug_assert_eq!(
            self.as_bytes().len(),
            self.len(),
            "Invariant violated: as_bytes().len() must equal len()"
        );
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn verify_invariants(&self) {}

    /// Create SDS from bytes, using inline storage for small strings
    #[inline]
    pub fn new(data: Vec<u8>) -> Self {
        let sds = if data.len() <= SSO_MAX_LEN {
            let mut inline_data = [0u8; SSO_MAX_LEN];
            inline_data[..data.len()].copy_from_slice(&data);
            SDS::Inline {
                len: data.len() as u8,
                data: inline_data,
            }
        } else {
            SDS::Heap(data)
        };

        // TigerStyle: Postcondition - verify construction succeeded
        sds.verify_invariants();
        sds
    }

    /// Create SDS from string slice, using inline storage for small strings
    #[inline]
    pub fn from_str(s: &str) -> Self {
        let bytes = s.as_bytes();
        let sds = if bytes.len() <= SSO_MAX_LEN {
            let mut inline_data = [0u8; SSO_MAX_LEN];
            inline_data[..bytes.len()].copy_from_slice(bytes);
            SDS::Inline {
                len: bytes.len() as u8,
                data: inline_data,
            }
        } else {
            SDS::Heap(bytes.to_vec())
        };

        // TigerStyle: Postconditions
        debug_assert_eq!(
            sds.len(),
            s.len(),
            "Postcondition violated: SDS len must equal source string len"
        );

        sds.verify_invariants();
        sds
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            SDS::Inline { len, .. } => *len as usize,
            SDS::Heap(data) => data.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SDS::Inline { len, data } => &data[..*len as usize],
            SDS::Heap(data) => data,
        }
    }

    pub fn to_string(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).to_string()
    }

    /// Grow or shrink to exactly `new_len` bytes, zero-padding on growth.
    pub fn resize(&mut self, new_len: usize) {
        #[cfg(debug_assertions)]
        let old_len = self.len();

        if new_len <= SSO_MAX_LEN {
            match self {
                SDS::Inline { len, data } => {
                    if new_len > *len as usize {
                        data[*len as usize..new_len].fill(0);
                    }
                    *len = new_len as u8;
                }
                SDS::Heap(data) => {
                    data.resize(new_len, 0);
                    if new_len <= SSO_MAX_LEN {
                        let mut inline_data = [0u8; SSO_MAX_LEN];
                        inline_data[..new_len].copy_from_slice(&data[..new_len]);
                        *self = SDS::Inline {
                            len: new_len as u8,
                            data: inline_data,
                        };
                    }
                }
            }
        } else {
            let mut data = self.as_bytes().to_vec();
            data.resize(new_len, 0);
            *self = SDS::Heap(data);
        }

        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(
                self.len(),
                new_len,
                "Postcondition violated: len must equal requested new_len after resize"
            );
            if new_len > old_len {
                debug_assert!(
                    self.as_bytes()[old_len..].iter().all(|&b| b == 0),
                    "Postcondition violated: grown region must be zero-padded"
                );
            }
        }

        self.verify_invariants();
    }

    /// Mutable access to the raw bytes, for in-place bit/byte editing (SETBIT, SETRANGE).
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self {
            SDS::Inline { len, data } => &mut data[..*len as usize],
            SDS::Heap(data) => data,
        }
    }

    /// Overwrite the bytes starting at `offset`, growing (zero-padded) if needed.
    pub fn set_range(&mut self, offset: usize, value: &[u8]) {
        let required_len = offset.checked_add(value.len()).expect("offset + value.len() overflow");
        if self.len() < required_len {
            self.resize(required_len);
        }
        self.as_bytes_mut()[offset..offset + value.len()].copy_from_slice(value);

        #[cfg(debug_assertions)]
        debug_assert!(
            self.len() >= required_len,
            "Postcondition violated: set_range must leave string at least as long as offset + value.len()"
        );

        self.verify_invariants();
    }

    pub fn append(&mut self, other: &SDS) {
        // TigerStyle: Preconditions - capture state for postcondition check
        #[cfg(debug_assertions)]
        let pre_len = self.len();
        #[cfg(debug_assertions)]
        let other_len = other.len();

        let new_len = self.len() + other.len();

        // If result fits in inline, stay inline; otherwise convert to heap
        if new_len <= SSO_MAX_LEN {
            // Can stay inline
            match self {
                SDS::Inline { len, data } => {
                    let current_len = *len as usize;
                    data[current_len..current_len + other.len()].copy_from_slice(other.as_bytes());
                    *len = new_len as u8;
                }
                SDS::Heap(data) => {
                    // Heap but small enough - just extend
                    data.extend_from_slice(other.as_bytes());
                }
            }
        } else {
            // Need heap storage
            let mut new_data = Vec::with_capacity(new_len);
            new_data.extend_from_slice(self.as_bytes());
            new_data.extend_from_slice(other.as_bytes());
            *self = SDS::Heap(new_data);
        }

        // TigerStyle: Postconditions
        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(
                self.len(),
                pre_len + other_len,
                "Postcondition violated: len must equal pre_len + other_len after append"
            );
        }

        self.verify_invariants();
    }
}

impl PartialEq for SDS {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SDS {}

impl std::hash::Hash for SDS {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

// Custom serialization to store as bytes (backwards compatible)
impl Serialize for SDS {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(self.as_bytes())
    }
}

impl<'de> Deserialize<'de> for SDS {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        Ok(SDS::new(bytes))
    }
}
