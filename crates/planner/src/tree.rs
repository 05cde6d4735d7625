//! Rewrite-result plumbing shared by expression and plan transforms.

/// Result of applying a rewrite to a tree node.
///
/// Carries the (possibly new) node plus whether anything in the subtree
/// actually changed. Transforms hand back the original `Arc` untouched when
/// nothing matched, so `changed == false` also means the caller still holds
/// the identical instance — which is what keeps fixed-point detection cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed<T> {
    /// The rewritten (or original) node.
    pub data: T,
    /// Whether any rewrite fired in the subtree.
    pub changed: bool,
}

impl<T> Transformed<T> {
    /// Wrap a node that was rewritten.
    pub fn yes(data: T) -> Self {
        Self {
            data,
            changed: true,
        }
    }

    /// Wrap a node that was left untouched.
    pub fn no(data: T) -> Self {
        Self {
            data,
            changed: false,
        }
    }

    /// Map the payload, keeping the changed flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Transformed<U> {
        Transformed {
            data: f(self.data),
            changed: self.changed,
        }
    }
}
