use std::marker::PhantomData;

use bytes::Bytes;

use crate::core::{major, TAG_ARRAY, TAG_COLLECTION, TAG_NULL};
use crate::number::read_compact;
use crate::{ReadContext, Registry, Result, TransferError, TransferType, TypeRef};

/// Decodes the elements of an encoded array or collection one at a time.
///
/// The iterator owns its own cursor over the input, so the caller's buffer is never
/// moved. Elements are decoded on demand; nothing is read ahead. Registry changes
/// made by an element are published once it decodes. An element that fails to
/// decode ends the iteration and leaves the registry untouched.
pub struct TransferIter<'r, T> {
    ctx: ReadContext<'r>,
    element: TypeRef,
    count: usize,
    consumed: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T: TransferType> TransferIter<'r, T> {
    pub(crate) fn open(registry: &'r Registry, bytes: Bytes) -> Result<Self> {
        let mut ctx = ReadContext::new(registry, bytes);
        let tag = ctx.read_tag()?;
        let count = match major(tag) {
            TAG_NULL => 0,
            TAG_ARRAY | TAG_COLLECTION => read_compact(ctx.reader())?,
            _ => {
                return Err(TransferError::UnexpectedTag {
                    expected: "ARRAY or COLLECTION",
                    found: tag,
                })
            }
        };
        Ok(Self {
            ctx,
            element: T::declared_type(),
            count,
            consumed: 0,
            _marker: PhantomData,
        })
    }

    /// Number of elements announced by the header.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn has_next(&self) -> bool {
        self.consumed < self.count
    }

    pub fn remaining(&self) -> usize {
        self.count - self.consumed
    }

    /// Decodes the next element.
    ///
    /// # Errors
    /// [`TransferError::IteratorExhausted`] once every element has been returned.
    pub fn next_element(&mut self) -> Result<T> {
        if !self.has_next() {
            return Err(TransferError::IteratorExhausted { count: self.count });
        }
        let decoded = self
            .ctx
            .read(&self.element)
            .and_then(T::from_value);
        match decoded {
            Ok(element) => {
                self.ctx.commit();
                self.consumed += 1;
                Ok(element)
            }
            Err(e) => {
                self.ctx.discard();
                self.consumed = self.count;
                Err(e)
            }
        }
    }
}

impl<T: TransferType> Iterator for TransferIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_element())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}
