use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque identifier of a GPU object owned by one wrapper.
///
/// `Handle::NONE` marks a wrapper that owns nothing (default-constructed,
/// moved-from, or the on-screen render target).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Handle(u32);

static NEXT: AtomicU32 = AtomicU32::new(1);

impl Handle {
    pub const NONE: Handle = Handle(0);

    /// Allocates a fresh, process-unique, non-zero handle.
    pub(crate) fn allocate() -> Self {
        Handle(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_handles_are_unique_and_non_zero() {
        let a = Handle::allocate();
        let b = Handle::allocate();
        assert!(!a.is_none());
        assert!(!b.is_none());
        assert_ne!(a, b);
    }

    #[test]
    fn default_is_none() {
        assert!(Handle::default().is_none());
        assert_eq!(Handle::default(), Handle::NONE);
    }
}
