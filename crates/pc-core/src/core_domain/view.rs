use serde::Serialize;

use crate::core::{PreferencePair, SessionSnapshot};

// ---------------------------------------------------------------------------
// ViewModel — what a front-end should show for a given session state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewModel {
    pub view: View,
    /// Pairs accumulated in this round, for the live preview.
    pub dataset: Vec<PreferencePair>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    Setup,
    Review(ReviewView),
    Complete(CompleteView),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewView {
    pub cursor: usize,
    pub total: usize,
    pub progress_text: String,
    pub system: String,
    pub user: String,
    pub slots: Vec<ResponseSlot>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseSlot {
    pub index: usize,
    pub label: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompleteView {
    pub groups_reviewed: usize,
    pub pairs_collected: usize,
}

/// Projects session state onto a view. Pure: the same state always renders
/// the same way, whether it was just generated or restored from disk.
pub fn render(state: Option<&SessionSnapshot>) -> ViewModel {
    let Some(snapshot) = state else {
        return ViewModel {
            view: View::Setup,
            dataset: Vec::new(),
        };
    };

    let total = snapshot.queue.len();
    let view = match snapshot.current_group() {
        None => View::Complete(CompleteView {
            groups_reviewed: total,
            pairs_collected: snapshot.dataset.len(),
        }),
        Some(group) => View::Review(ReviewView {
            cursor: snapshot.cursor,
            total,
            progress_text: format!("Reviewing group {} / {}", snapshot.cursor + 1, total),
            system: group.system.clone(),
            user: group.user.clone(),
            slots: group
                .responses
                .iter()
                .enumerate()
                .map(|(index, text)| ResponseSlot {
                    index,
                    label: format!("Response {}", index + 1),
                    text: text.clone(),
                })
                .collect(),
        }),
    };

    ViewModel {
        view,
        dataset: snapshot.dataset.clone(),
    }
}
