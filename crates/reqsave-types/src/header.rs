use std::collections::BTreeMap;

/// A header representation that can enumerate its `(key, value)` pairs.
///
/// Order is whatever the representation provides; nothing here makes it
/// canonical. A key carrying several values yields one pair per value, so
/// the same key may be reported more than once.
pub trait HeaderSource {
    /// Call `visit` once per `(key, value)` pair.
    fn for_each_pair(&self, visit: &mut dyn FnMut(&[u8], &[u8]));

    /// Collect all pairs into owned vectors, in visit order.
    fn pairs(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        self.for_each_pair(&mut |k, v| out.push((k.to_vec(), v.to_vec())));
        out
    }
}

/// An empty header set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoHeaders;

impl HeaderSource for NoHeaders {
    fn for_each_pair(&self, _visit: &mut dyn FnMut(&[u8], &[u8])) {}
}

impl<T: HeaderSource + ?Sized> HeaderSource for &T {
    fn for_each_pair(&self, visit: &mut dyn FnMut(&[u8], &[u8])) {
        (**self).for_each_pair(visit)
    }
}

impl<K: AsRef<[u8]>, V: AsRef<[u8]>> HeaderSource for [(K, V)] {
    fn for_each_pair(&self, visit: &mut dyn FnMut(&[u8], &[u8])) {
        for (k, v) in self {
            visit(k.as_ref(), v.as_ref());
        }
    }
}

impl<K: AsRef<[u8]>, V: AsRef<[u8]>> HeaderSource for Vec<(K, V)> {
    fn for_each_pair(&self, visit: &mut dyn FnMut(&[u8], &[u8])) {
        self.as_slice().for_each_pair(visit)
    }
}

/// Ordered multimap of header names to their values.
///
/// Names iterate in sorted order; values keep insertion order per name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMultiMap {
    inner: BTreeMap<String, Vec<String>>,
}

impl HeaderMultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.entry(name.into()).or_default().push(value.into());
    }

    /// Replace all values of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(name.into(), vec![value.into()]);
    }

    /// All values recorded for `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.inner.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first value recorded for `name`, or `""`.
    pub fn get(&self, name: &str) -> &str {
        self.get_all(name).first().map_or("", String::as_str)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderMultiMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (n, v) in iter {
            map.add(n, v);
        }
        map
    }
}

impl HeaderSource for HeaderMultiMap {
    fn for_each_pair(&self, visit: &mut dyn FnMut(&[u8], &[u8])) {
        for (name, values) in &self.inner {
            for value in values {
                visit(name.as_bytes(), value.as_bytes());
            }
        }
    }
}

/// The first element of a slice, or `T::default()` when it is empty.
pub fn first_or_default<T: Default + Clone>(values: &[T]) -> T {
    values.first().cloned().unwrap_or_default()
}
