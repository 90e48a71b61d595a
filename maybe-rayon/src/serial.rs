use core::marker::Send;
use core::slice::ChunksMut;

pub trait IntoParallelIterator {
    type Iter: Iterator<Item = Self::Item>;
    type Item: Send;

    fn into_par_iter(self) -> Self::Iter;
}

impl<T: IntoIterator> IntoParallelIterator for T
where
    T::Item: Send,
{
    type Iter = T::IntoIter;
    type Item = T::Item;

    fn into_par_iter(self) -> Self::Iter {
        self.into_iter()
    }
}

pub trait ParallelSliceMut<T: Send> {
    /// Returns a plain mutable slice, which is used to implement the chunking methods.
    fn as_parallel_slice_mut(&mut self) -> &mut [T];

    fn par_chunks_mut(&mut self, chunk_size: usize) -> ChunksMut<'_, T> {
        self.as_parallel_slice_mut().chunks_mut(chunk_size)
    }
}

impl<T: Send> ParallelSliceMut<T> for [T] {
    #[inline]
    fn as_parallel_slice_mut(&mut self) -> &mut [T] {
        self
    }
}

pub trait ParIterExt: Iterator {
    /// Serial counterpart of rayon's `for_each_init`: `init` runs once for the whole iteration.
    fn for_each_init<T, INIT, OP>(self, init: INIT, op: OP)
    where
        Self: Sized,
        INIT: Fn() -> T,
        OP: Fn(&mut T, Self::Item);
}

impl<I: Iterator> ParIterExt for I {
    fn for_each_init<T, INIT, OP>(self, init: INIT, op: OP)
    where
        Self: Sized,
        INIT: Fn() -> T,
        OP: Fn(&mut T, Self::Item),
    {
        let mut state = init();
        self.for_each(|item| op(&mut state, item));
    }
}
