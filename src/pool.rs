use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::ops::{Deref, DerefMut};

/// Objects that can be handed back to a pool after use.
pub trait Recycle {
    /// Reset to the pristine state a fresh borrower expects.
    fn recycle(&mut self);
}

/// A fixed population of preallocated objects. Borrowers take exclusive
/// ownership through a [`Pooled`] guard; dropping the guard recycles the
/// object and returns it, so the population is conserved no matter how
/// the borrower exits.
pub struct Pool<T: Recycle> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T: Recycle> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Pool {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T: Recycle> Pool<T> {
    /// Build a pool holding exactly `objects`.
    pub fn with_objects(objects: Vec<T>) -> Self {
        let (tx, rx) = bounded(objects.len());
        for obj in objects {
            // Cannot fail: the channel was sized to hold every object.
            let _ = tx.send(obj);
        }
        Pool { tx, rx }
    }

    /// Borrow an object, blocking until one is available.
    pub fn get(&self) -> Pooled<T> {
        // The pool owns a sender, so the channel can never disconnect.
        let item = self.rx.recv().ok();
        Pooled {
            item,
            home: self.tx.clone(),
        }
    }

    /// Borrow an object if one is free right now.
    pub fn try_get(&self) -> Option<Pooled<T>> {
        self.rx.try_recv().ok().map(|item| Pooled {
            item: Some(item),
            home: self.tx.clone(),
        })
    }

    /// Number of objects currently at rest in the pool.
    pub fn idle(&self) -> usize {
        self.rx.len()
    }
}

/// Exclusive borrow of a pooled object.
pub struct Pooled<T: Recycle> {
    item: Option<T>,
    home: Sender<T>,
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled object already returned")
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled object already returned")
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.recycle();
            match self.home.try_send(item) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                    // Pool gone or miscounted; the object is dropped instead.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl Recycle for Counter {
        fn recycle(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn population_is_conserved() {
        let pool = Pool::with_objects(vec![Counter(0), Counter(0), Counter(0)]);
        assert_eq!(pool.idle(), 3);
        {
            let mut a = pool.get();
            let _b = pool.get();
            a.0 = 42;
            assert_eq!(pool.idle(), 1);
        }
        assert_eq!(pool.idle(), 3);
    }

    #[test]
    fn objects_are_recycled_on_return() {
        let pool = Pool::with_objects(vec![Counter(0)]);
        {
            let mut a = pool.get();
            a.0 = 9;
        }
        let a = pool.get();
        assert_eq!(a.0, 0);
    }

    #[test]
    fn try_get_fails_when_exhausted() {
        let pool = Pool::with_objects(vec![Counter(0)]);
        let a = pool.try_get();
        assert!(a.is_some());
        assert!(pool.try_get().is_none());
        drop(a);
        assert!(pool.try_get().is_some());
    }
}
