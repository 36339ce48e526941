use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Blood group predicted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    A,
    B,
    AB,
    O,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 4] = [BloodGroup::A, BloodGroup::B, BloodGroup::AB, BloodGroup::O];

    pub fn as_str(self) -> &'static str {
        match self {
            BloodGroup::A => "A",
            BloodGroup::B => "B",
            BloodGroup::AB => "AB",
            BloodGroup::O => "O",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelTableError {
    #[error("label table is empty")]
    Empty,
    #[error("output index {0} is assigned twice")]
    DuplicateIndex(usize),
    #[error("blood group {0} appears twice")]
    DuplicateLabel(BloodGroup),
    #[error("output indices must be contiguous from 0; index {0} is missing")]
    MissingIndex(usize),
}

/// Maps model output indices back to blood groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelTable {
    // Indexed by model output position.
    by_index: Vec<BloodGroup>,
}

impl ClassLabelTable {
    pub fn new(entries: &[(BloodGroup, usize)]) -> Result<Self, LabelTableError> {
        if entries.is_empty() {
            return Err(LabelTableError::Empty);
        }
        let mut slots: Vec<Option<BloodGroup>> = vec![None; entries.len()];
        for &(group, index) in entries {
            if entries.iter().filter(|(g, _)| *g == group).count() > 1 {
                return Err(LabelTableError::DuplicateLabel(group));
            }
            // An index past the end means some lower index is left unassigned.
            let Some(slot) = slots.get_mut(index) else {
                let missing = (0..entries.len())
                    .find(|i| entries.iter().all(|(_, idx)| idx != i))
                    .unwrap_or(index);
                return Err(LabelTableError::MissingIndex(missing));
            };
            if slot.is_some() {
                return Err(LabelTableError::DuplicateIndex(index));
            }
            *slot = Some(group);
        }
        let by_index = slots
            .into_iter()
            .enumerate()
            .map(|(i, g)| g.ok_or(LabelTableError::MissingIndex(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { by_index })
    }

    pub fn get(&self, index: usize) -> Option<BloodGroup> {
        self.by_index.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

impl Default for ClassLabelTable {
    /// Output order the bundled model was trained with.
    fn default() -> Self {
        Self {
            by_index: BloodGroup::ALL.to_vec(),
        }
    }
}
