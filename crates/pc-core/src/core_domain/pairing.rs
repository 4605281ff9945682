use crate::core::{GenerationGroup, PreferencePair};

/// Response indices of one group split by the operator's "best" flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub chosen: Vec<usize>,
    pub rejected: Vec<usize>,
}

impl Selection {
    /// Partitions `0..active` by `flags`; missing flags count as unselected and
    /// flags at or beyond `active` are ignored.
    pub fn partition(active: usize, flags: &[bool]) -> Self {
        let (chosen, rejected): (Vec<usize>, Vec<usize>) =
            (0..active).partition(|&i| flags.get(i).copied().unwrap_or(false));
        Self { chosen, rejected }
    }

    /// Pairs exist only when both sides are non-empty.
    pub fn is_split(&self) -> bool {
        !self.chosen.is_empty() && !self.rejected.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        if self.is_split() {
            self.chosen.len() * self.rejected.len()
        } else {
            0
        }
    }
}

/// Builds one pair per element of `chosen × rejected`, chosen-major.
///
/// `edited` holds the texts as displayed at confirmation time; a slot with no
/// edited text falls back to the generated response.
pub fn extract_pairs(
    group: &GenerationGroup,
    edited: &[String],
    flags: &[bool],
) -> Vec<PreferencePair> {
    let selection = Selection::partition(group.responses.len(), flags);
    if !selection.is_split() {
        return Vec::new();
    }

    let mut pairs = Vec::with_capacity(selection.pair_count());
    for &chosen in &selection.chosen {
        for &rejected in &selection.rejected {
            pairs.push(PreferencePair::new(
                group.system.as_str(),
                group.user.as_str(),
                text_at(group, edited, chosen),
                text_at(group, edited, rejected),
            ));
        }
    }
    pairs
}

fn text_at<'a>(group: &'a GenerationGroup, edited: &'a [String], index: usize) -> &'a str {
    edited
        .get(index)
        .map(String::as_str)
        .unwrap_or(group.responses[index].as_str())
}
