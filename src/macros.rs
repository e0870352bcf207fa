/// Implements `From<T>` / `From<Wrapper> for T` for newtype wrappers around
/// primitive types, so identifier newtypes (`FileId`, `VenueId`, `SymbolId`, ...)
/// don't each need a hand-written conversion pair.
#[macro_export]
macro_rules! impl_from_primitive {
    ($wrapper:ident, $primitive:ty) => {
        impl From<$primitive> for $wrapper {
            fn from(value: $primitive) -> Self {
                Self(value)
            }
        }

        impl From<$wrapper> for $primitive {
            fn from(wrapper: $wrapper) -> Self {
                wrapper.0
            }
        }
    };
}
