use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generates a monotonic serial-number newtype, the way the original source's
/// `co_serial_t`/`so_serial_t` counters work: a process-wide atomic counter
/// handing out ever-increasing values, with `0` reserved to mean "nobody".
macro_rules! make_serial {
    ($name:ident, $counter:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        static $counter: AtomicU64 = AtomicU64::new(1);

        impl $name {
            /// The sentinel meaning "no SA/connection owns this role".
            pub const NOBODY: Self = Self(0);

            pub fn next() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            pub const fn from_raw(v: u64) -> Self {
                Self(v)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }

            pub const fn is_nobody(self) -> bool {
                self.0 == 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NOBODY
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_nobody() {
                    write!(f, "#nobody")
                } else {
                    write!(f, "#{}", self.0)
                }
            }
        }
    };
}

make_serial!(ConnSerial, NEXT_CONN_SERIAL);
make_serial!(InstanceSerial, NEXT_INSTANCE_SERIAL);
make_serial!(IkeSaSerial, NEXT_IKE_SA_SERIAL);
make_serial!(ChildSaSerial, NEXT_CHILD_SA_SERIAL);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nobody_is_default_and_zero() {
        assert!(ConnSerial::default().is_nobody());
        assert_eq!(ConnSerial::NOBODY.raw(), 0);
    }

    #[test]
    fn next_is_monotonic_and_never_nobody() {
        let a = IkeSaSerial::next();
        let b = IkeSaSerial::next();
        assert!(b.raw() > a.raw());
        assert!(!a.is_nobody());
    }
}
