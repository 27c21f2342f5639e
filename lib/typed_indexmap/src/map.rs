use std::fmt::Debug;
use std::hash::Hash;
use std::iter;
use std::marker::PhantomData;
use std::ops::Index;

use ahash::RandomState;
use indexmap::{Equivalent, IndexMap};

pub type Iter<'a, I, K, V> = iter::Map<
    iter::Enumerate<indexmap::map::Iter<'a, K, V>>,
    fn((usize, (&'a K, &'a V))) -> (I, (&'a K, &'a V)),
>;

/// An [`IndexMap`] that hands out typed indices instead of `usize` positions.
/// Entries are never removed so an index stays valid for the lifetime of the map.
#[repr(transparent)]
pub struct TiMap<I, K, V> {
    pub raw: IndexMap<K, V, RandomState>,
    _marker: PhantomData<fn(I) -> I>,
}

impl<I, K, V> Debug for TiMap<I, K, V>
where
    I: From<usize> + Debug,
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter_enumerated()).finish()
    }
}

impl<I, K: Clone, V: Clone> Clone for TiMap<I, K, V> {
    fn clone(&self) -> Self {
        Self { raw: self.raw.clone(), _marker: self._marker }
    }
}

impl<I, K, V> Default for TiMap<I, K, V> {
    fn default() -> Self {
        Self { raw: IndexMap::default(), _marker: PhantomData }
    }
}

impl<I, K, V> TiMap<I, K, V> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, K, V> {
        self.raw.iter()
    }
}

impl<I, K, V> TiMap<I, K, V>
where
    K: Eq + Hash,
    I: From<usize>,
{
    /// Inserts `val` under `key`. An existing entry keeps its index and
    /// its previous value is returned.
    pub fn insert_full(&mut self, key: K, val: V) -> (I, Option<V>) {
        let (pos, old) = self.raw.insert_full(key, val);
        (pos.into(), old)
    }
}

impl<I: From<usize>, K, V> TiMap<I, K, V> {
    pub fn iter_enumerated(&self) -> Iter<'_, I, K, V> {
        self.iter().enumerate().map(|(index, val)| (index.into(), val))
    }
}

impl<I, K, V> TiMap<I, K, V>
where
    I: From<usize> + Into<usize>,
    K: Eq + Hash,
{
    pub fn index<Q: ?Sized>(&self, key: &Q) -> Option<I>
    where
        Q: Hash + Equivalent<K>,
    {
        self.raw.get_index_of(key).map(I::from)
    }

    pub fn index_and_val<Q: ?Sized>(&self, key: &Q) -> Option<(I, &V)>
    where
        Q: Hash + Equivalent<K>,
    {
        self.raw.get_full(key).map(|(index, _, val)| (index.into(), val))
    }

    pub fn get_index(&self, index: I) -> Option<(&K, &V)> {
        self.raw.get_index(index.into())
    }
}

impl<I, K, V> Index<I> for TiMap<I, K, V>
where
    I: Into<usize>,
    K: Eq + Hash,
{
    type Output = V;

    fn index(&self, index: I) -> &Self::Output {
        &self.raw[index.into()]
    }
}

impl<I, K: Hash + Eq, V> FromIterator<(K, V)> for TiMap<I, K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { raw: iter.into_iter().collect(), _marker: PhantomData }
    }
}
