use std::sync::Arc;

/// Optional, cheaply clonable callback.
///
/// Generic over the function signature `F`, e.g.
/// `SharedFn<dyn Fn(Progress) + Send + Sync>`.
pub enum SharedFn<F: ?Sized + Send + Sync + 'static> {
    None,
    Some(Arc<F>),
}

impl<F: ?Sized + Send + Sync + 'static> Clone for SharedFn<F> {
    fn clone(&self) -> Self {
        match self {
            SharedFn::None => SharedFn::None,
            SharedFn::Some(f) => SharedFn::Some(Arc::clone(f)),
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> Default for SharedFn<F> {
    fn default() -> Self {
        SharedFn::None
    }
}

impl<F: ?Sized + Send + Sync + 'static> SharedFn<F> {
    pub fn new(f: Arc<F>) -> Self {
        SharedFn::Some(f)
    }

    pub fn is_some(&self) -> bool {
        matches!(self, SharedFn::Some(_))
    }

    pub fn as_ref(&self) -> Option<&F> {
        match self {
            SharedFn::None => None,
            SharedFn::Some(f) => Some(f.as_ref()),
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> std::fmt::Debug for SharedFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SharedFn::None => write!(f, "SharedFn::None"),
            SharedFn::Some(_) => write!(f, "SharedFn::Some(..)"),
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> From<Arc<F>> for SharedFn<F> {
    fn from(f: Arc<F>) -> Self {
        SharedFn::Some(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_is_none() {
        let callback: SharedFn<dyn Fn(usize) + Send + Sync> = SharedFn::default();
        assert!(!callback.is_some());
        assert!(callback.as_ref().is_none());
    }

    #[test]
    fn test_clone_shares_callback() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let callback: SharedFn<dyn Fn(usize) + Send + Sync> =
            SharedFn::new(Arc::new(move |n| {
                counter_clone.fetch_add(n, Ordering::Relaxed);
            }));

        let other = callback.clone();
        (callback.as_ref().unwrap())(2);
        (other.as_ref().unwrap())(3);

        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }
}
