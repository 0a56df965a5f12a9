/// Switch between rayon and sequential iteration.
///
/// With the `parallel` feature the rayon prelude is re-exported. Without it
/// (single-threaded targets), a stand-in trait maps `into_par_iter()` onto
/// `into_iter()`, so downstream `.map()`/`.flat_map()`/`.collect()` chains
/// resolve to the standard `Iterator` methods unchanged.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelIterator`.
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
