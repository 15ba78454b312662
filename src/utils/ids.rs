/// Declare an opaque, copyable handle type for an arena-stored object
///
/// Handles are never reused during the lifetime of the process, so a handle to a
/// destroyed object can never alias a newer one; looking it up simply fails.
macro_rules! id_type {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[allow(dead_code)]
            pub(crate) fn next() -> Self {
                static COUNTER: ::std::sync::atomic::AtomicU32 = ::std::sync::atomic::AtomicU32::new(1);
                $name(COUNTER.fetch_add(1, ::std::sync::atomic::Ordering::Relaxed))
            }

            /// The raw numeric value of this handle
            ///
            /// Stable for the lifetime of the object, suitable as a per-client resource key.
            pub fn as_raw(&self) -> u32 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, concat!($prefix, "@{}"), self.0)
            }
        }
    };
}

pub(crate) use id_type;
