use std::io::BufRead;

use tracing::debug;

use crate::error::{IoError, MeshError};
use crate::mesh::Grid;

/// Renames boundaries by regrouping name indices.
///
/// Each line of a translation file reads `new_name idx idx ...`: elements
/// carrying any of the listed name indices move to a surface name called
/// `new_name`. Indices that no line lists keep their name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTranslation {
    pub entries: Vec<(String, Vec<usize>)>,
}

impl NameTranslation {
    /// Parses a translation file. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError`] on read failures or when an index is not a
    /// non-negative integer.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, IoError> {
        let mut entries = Vec::new();
        for (k, line) in reader.lines().enumerate() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let Some(name) = tokens.next() else {
                continue;
            };
            let indices = tokens
                .map(|t| {
                    t.parse::<usize>()
                        .map_err(|_| IoError::parse(k + 1, format!("bad name index '{t}'")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            entries.push((name.to_string(), indices));
        }
        Ok(Self { entries })
    }

    /// Moves elements to their new names and drops names left unused.
    /// A new name that already exists in the grid is reused.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownName`] if an index is out of range for the
    /// grid's names; the grid is left untouched in that case.
    pub fn apply(&self, grid: &mut Grid) -> Result<(), MeshError> {
        let n_names = grid.names.len();
        if let Some(&name) = self
            .entries
            .iter()
            .flat_map(|(_, indices)| indices)
            .find(|&&i| i >= n_names)
        {
            return Err(MeshError::UnknownName { name, n_names });
        }

        let mut map: Vec<usize> = (0..n_names).collect();
        for (name, indices) in &self.entries {
            let target = match grid.find_name(name) {
                Some(existing) => existing,
                None => grid.add_name(2, name.as_str()),
            };
            for &i in indices {
                map[i] = target;
            }
        }
        for e in &mut grid.elements {
            if let Some(&m) = map.get(e.name) {
                e.name = m;
            }
        }
        grid.delete_empty_names();
        debug!(names = grid.names.len(), "applied name translation");
        Ok(())
    }
}
