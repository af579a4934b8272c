//! Correlation of source and target entities by stable id

use std::collections::HashMap;

use crate::error::MigrationError;

/// Result of pairing two entity lists
#[derive(Debug)]
pub(crate) struct Correlation<'a, T> {
    /// (source, target) pairs sharing an id, in target order
    pub matched: Vec<(&'a T, &'a T)>,
    /// Source entities without a target counterpart
    pub removed: Vec<&'a T>,
    /// Target entities without a source counterpart
    pub added: Vec<&'a T>,
}

/// Pair entities whose ids are equal. Duplicate ids on either side make
/// the pairing ambiguous and are reported instead of guessed.
pub(crate) fn correlate<'a, T>(
    kind: &'static str,
    source: &'a [T],
    target: &'a [T],
    id: impl Fn(&T) -> &str,
    name: impl Fn(&T) -> &str,
) -> Result<Correlation<'a, T>, MigrationError> {
    let source_index = index_by_id(kind, source, &id, &name)?;
    index_by_id(kind, target, &id, &name)?;

    let mut matched = Vec::new();
    let mut added = Vec::new();
    let mut used = vec![false; source.len()];

    for item in target {
        match source_index.get(id(item)) {
            Some(&position) => {
                used[position] = true;
                matched.push((&source[position], item));
            }
            None => added.push(item),
        }
    }

    let removed = source
        .iter()
        .zip(used)
        .filter(|(_, used)| !used)
        .map(|(item, _)| item)
        .collect();

    Ok(Correlation {
        matched,
        removed,
        added,
    })
}

fn index_by_id<'a, T>(
    kind: &'static str,
    items: &'a [T],
    id: &impl Fn(&T) -> &str,
    name: &impl Fn(&T) -> &str,
) -> Result<HashMap<&'a str, usize>, MigrationError> {
    let mut index: HashMap<&'a str, usize> = HashMap::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        if let Some(&previous) = index.get(id(item)) {
            return Err(MigrationError::AmbiguousRename {
                kind,
                key: id(item).to_string(),
                candidates: vec![name(&items[previous]).to_string(), name(item).to_string()],
            });
        }
        index.insert(id(item), position);
    }
    Ok(index)
}
