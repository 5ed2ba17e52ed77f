//! Owned storage for the arrays of a container.
//!
//! Struct-array pointers refer to arrays by [ArrayId] rather than by reference so that arrays can
//! be shared by several pointers and outlive any single one of them.

use crate::types::{structure::StructDef, AnyEntity};
use std::sync::Arc;

/// Handle to an array stored in an [Arena].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArrayId(pub(crate) usize);

/// An array and the symbol it is written with.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayEntry {
    pub elements: Vec<AnyEntity>,
    pub symbol: Option<u16>,
}

/// What a parse learned about an array, keyed by the offset of its first element.
#[derive(Clone, Debug)]
pub struct ArrayInfo {
    pub id: ArrayId,
    pub len: usize,
    pub element: Option<Arc<StructDef>>,
}

/// Arrays in insertion order, which is also the order they are written in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arena {
    entries: Vec<ArrayEntry>,
}

impl Arena {
    /// Stores a new array without a symbol.
    pub fn push(&mut self, elements: Vec<AnyEntity>) -> ArrayId {
        self.push_with_symbol(elements, None)
    }

    pub fn push_with_symbol(&mut self, elements: Vec<AnyEntity>, symbol: Option<u16>) -> ArrayId {
        let id = ArrayId(self.entries.len());
        self.entries.push(ArrayEntry { elements, symbol });
        id
    }

    pub fn get(&self, id: ArrayId) -> Option<&ArrayEntry> {
        self.entries.get(id.0)
    }

    pub fn get_mut(&mut self, id: ArrayId) -> Option<&mut ArrayEntry> {
        self.entries.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArrayId, &ArrayEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (ArrayId(i), entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ArrayId, &mut ArrayEntry)> {
        self.entries
            .iter_mut()
            .enumerate()
            .map(|(i, entry)| (ArrayId(i), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::number::Number;

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut arena = Arena::default();
        let a = arena.push(vec![AnyEntity::Number(Number::I32(1))]);
        let b = arena.push_with_symbol(vec![AnyEntity::Number(Number::I32(2))], Some(0x20));
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b).unwrap().symbol, Some(0x20));
        assert_eq!(
            arena.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            vec![a, b]
        );

        arena.get_mut(a).unwrap().symbol = Some(0x16);
        assert_eq!(arena.get(a).unwrap().symbol, Some(0x16));

        arena.clear();
        assert!(arena.is_empty());
        assert!(arena.get(a).is_none());
    }
}
