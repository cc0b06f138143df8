use super::types::Utterance;

/// Position in a [`TranscriptStore`] up to which a reader has consumed entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscriptCursor(usize);

impl TranscriptCursor {
    pub fn position(&self) -> usize {
        self.0
    }
}

/// Append-only display log of the conversation.
///
/// Owned by the UI thread. There is no removal or in-place edit; readers
/// walk it forward, optionally resuming from a [`TranscriptCursor`].
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    entries: Vec<Utterance>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, utterance: Utterance) {
        self.entries.push(utterance);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Utterance> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.entries.last()
    }

    /// Entries appended since `cursor`, advancing it to the end.
    pub fn read_from(&self, cursor: &mut TranscriptCursor) -> &[Utterance] {
        let start = cursor.0.min(self.entries.len());
        cursor.0 = self.entries.len();
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a TranscriptStore {
    type Item = &'a Utterance;
    type IntoIter = std::slice::Iter<'a, Utterance>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
