//! Insertion ordered containers.
//!
//! Variable order in a dataset is observable (downstream grouping relies on it) so datasets,
//! dimension tables and attributes are kept in these rather than in plain hash maps.

use std::{
    borrow::Borrow,
    collections::{HashMap, HashSet},
    fmt::Debug,
    hash::Hash,
};

/// A map that iterates in the order keys were first inserted.
///
/// Re-inserting an existing key replaces its value but keeps its position. Use `move_to_end`
/// to change position explicitly.
///
#[derive(Clone, Debug)]
pub struct OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    keys: Vec<K>,
    map: HashMap<K, V>,
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            keys: vec![],
            map: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_mut(key)
    }

    /// Insert a value, returning the previous value for `key` if there was one.
    ///
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.map.insert(key.clone(), value);
        if previous.is_none() {
            self.keys.push(key);
        }

        previous
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.map.remove(key)?;
        self.keys.retain(|k| k.borrow() != key);

        Some(value)
    }

    /// Move an existing entry to the last position. Does nothing if `key` is absent.
    ///
    pub fn move_to_end<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(position) = self.keys.iter().position(|k| k.borrow() == key) {
            let key = self.keys.remove(position);
            self.keys.push(key);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.keys.iter().filter_map(|k| self.map.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.keys
            .iter()
            .filter_map(|k| self.map.get_key_value(k))
    }

    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }
}

impl<K, V> Default for OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        let mut map = Self::new();
        map.extend(entries);

        map
    }
}

impl<K, V> IntoIterator for OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        let Self { keys, mut map } = self;
        keys.into_iter()
            .filter_map(|k| map.remove(&k).map(|v| (k, v)))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<K, V> PartialEq for OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq,
{
    /// Same entries, order is not considered.
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

/// A set that iterates in the order members were first inserted.
///
#[derive(Clone, Debug)]
pub struct OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    members: Vec<T>,
    lookup: HashSet<T>,
}

impl<T> OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            members: vec![],
            lookup: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains<Q>(&self, member: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup.contains(member)
    }

    /// Returns `true` if `member` was not already present.
    ///
    pub fn insert(&mut self, member: T) -> bool {
        if self.lookup.insert(member.clone()) {
            self.members.push(member);
            true
        } else {
            false
        }
    }

    pub fn remove<Q>(&mut self, member: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.lookup.remove(member) {
            self.members.retain(|m| m.borrow() != member);
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.members.iter()
    }

    pub fn extend<I>(&mut self, members: I)
    where
        I: IntoIterator<Item = T>,
    {
        for member in members {
            self.insert(member);
        }
    }

    /// Members of `self` that are also in `other`, in `self`'s order.
    ///
    pub fn intersection(&self, other: &Self) -> Self {
        self.iter()
            .filter(|m| other.contains(*m))
            .cloned()
            .collect()
    }

    /// Members of `self` that are not in `other`, in `self`'s order.
    ///
    pub fn difference(&self, other: &Self) -> Self {
        self.iter()
            .filter(|m| !other.contains(*m))
            .cloned()
            .collect()
    }

    /// All members of `self` followed by the members of `other` not already present.
    ///
    pub fn union(&self, other: &Self) -> Self {
        let mut union = self.clone();
        union.extend(other.iter().cloned());

        union
    }
}

impl<T> Default for OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    fn from_iter<I: IntoIterator<Item = T>>(members: I) -> Self {
        let mut set = Self::new();
        set.extend(members);

        set
    }
}

impl<T> PartialEq for OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Set equality, order is not considered.
    fn eq(&self, other: &Self) -> bool {
        self.lookup == other.lookup
    }
}
