#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FreelistIndex(pub usize);

/// Vector whose removed slots are reused by later pushes, so indices handed out
/// stay stable for the lifetime of the value.
#[derive(Debug)]
pub struct FreelistVec<T> {
    data: Vec<Option<T>>,
    freelist: Vec<usize>,
}

impl<T> FreelistVec<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            freelist: Vec::new(),
        }
    }

    pub fn push(&mut self, value: T) -> FreelistIndex {
        if let Some(index) = self.freelist.pop() {
            debug_assert!(self.data[index].is_none());
            self.data[index] = Some(value);
            FreelistIndex(index)
        } else {
            let index = self.data.len();
            self.data.push(Some(value));
            FreelistIndex(index)
        }
    }

    /// Removes the value, returning it. Removing an empty slot is a no-op.
    pub fn remove(&mut self, index: FreelistIndex) -> Option<T> {
        let value = self.data.get_mut(index.0)?.take()?;
        self.freelist.push(index.0);
        Some(value)
    }

    pub fn get(&self, index: FreelistIndex) -> Option<&T> {
        self.data.get(index.0)?.as_ref()
    }

    pub fn get_mut(&mut self, index: FreelistIndex) -> Option<&mut T> {
        self.data.get_mut(index.0)?.as_mut()
    }

    pub fn contains(&self, index: FreelistIndex) -> bool {
        self.get(index).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.data.len() - self.freelist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (FreelistIndex, &T)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| Some((FreelistIndex(idx), value.as_ref()?)))
    }
}

impl<T> Default for FreelistVec<T> {
    fn default() -> Self {
        Self::new()
    }
}
