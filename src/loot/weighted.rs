use crate::{error::LootError, rng::RandomSource};

/// Ordered list of positively weighted payloads.
///
/// Entry order is preserved from construction and is part of the draw: the
/// same random stream over the same table always yields the same payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTable<T> {
    entries: Vec<(u32, T)>,
    total: u64,
}

impl<T> Default for WeightedTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            total: 0,
        }
    }
}

impl<T> WeightedTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, refusing non-positive weights.
    pub fn push(&mut self, weight: i64, payload: T) -> Result<(), LootError> {
        let checked = u32::try_from(weight)
            .ok()
            .filter(|w| *w > 0)
            .ok_or(LootError::InvalidWeight { weight })?;
        self.total += u64::from(checked);
        self.entries.push((checked, payload));
        Ok(())
    }

    pub fn try_from_entries(
        entries: impl IntoIterator<Item = (i64, T)>,
    ) -> Result<Self, LootError> {
        let mut table = Self::new();
        for (weight, payload) in entries {
            table.push(weight, payload)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entries.iter().map(|(w, p)| (*w, p))
    }

    pub fn payloads(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, p)| p)
    }

    /// Keeps only the entries whose payload satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|(_, p)| keep(p));
        self.total = self.entries.iter().map(|(w, _)| u64::from(*w)).sum();
    }

    pub fn pick(&self, rng: &mut (impl RandomSource + ?Sized)) -> Result<&T, LootError> {
        pick(&self.entries, rng)
    }
}

/// Weighted draw over `(weight, payload)` pairs.
///
/// Draws `r` from `[0, total)` and walks the entries in order, subtracting
/// each weight until `r` falls inside one.
pub fn pick<'a, T>(
    entries: &'a [(u32, T)],
    rng: &mut (impl RandomSource + ?Sized),
) -> Result<&'a T, LootError> {
    let total: u64 = entries.iter().map(|(w, _)| u64::from(*w)).sum();
    if total == 0 {
        return Err(LootError::EmptyPool);
    }
    if let [(_, only)] = entries {
        return Ok(only);
    }
    let mut r = rng.uniform_int(0, total as i64 - 1).clamp(0, total as i64 - 1) as u64;
    for (weight, payload) in entries {
        let weight = u64::from(*weight);
        if r < weight {
            return Ok(payload);
        }
        r -= weight;
    }
    Err(LootError::EmptyPool)
}
