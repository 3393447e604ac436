use bevy::prelude::Entity;

/// Identifies who contributed an influence entry.
///
/// The grid never dereferences a source; it only compares them for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfluenceSource {
    /// Influence written directly into cells by static volumes rather than a live entity.
    Static,
    Entity(Entity),
}

impl InfluenceSource {
    pub fn is_static(self) -> bool {
        matches!(self, InfluenceSource::Static)
    }
}

impl From<Entity> for InfluenceSource {
    fn from(entity: Entity) -> Self {
        InfluenceSource::Entity(entity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfluenceEntry {
    pub source: InfluenceSource,
    pub strength: f32,
}

impl InfluenceEntry {
    pub fn new(source: InfluenceSource, strength: f32) -> Self {
        Self { source, strength }
    }
}

/// Per-cell storage: one entry list per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfluenceCell {
    channels: Vec<Vec<InfluenceEntry>>,
}

impl InfluenceCell {
    pub fn new(channel_count: usize) -> Self {
        let mut cell = Self::default();
        cell.init(channel_count);
        cell
    }

    /// Resize the channel array, keeping existing entries for surviving channels.
    pub fn init(&mut self, channel_count: usize) {
        if self.channels.len() != channel_count {
            self.channels.resize_with(channel_count, Vec::new);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn entries(&self, channel: usize) -> &[InfluenceEntry] {
        self.check_channel(channel);
        &self.channels[channel]
    }

    pub(crate) fn entries_mut(&mut self, channel: usize) -> &mut Vec<InfluenceEntry> {
        self.check_channel(channel);
        &mut self.channels[channel]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[InfluenceEntry]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub(crate) fn channels_mut(&mut self) -> impl Iterator<Item = &mut Vec<InfluenceEntry>> {
        self.channels.iter_mut()
    }

    pub fn total_influence(&self, channel: usize) -> f32 {
        self.entries(channel).iter().map(|entry| entry.strength).sum()
    }

    /// Sum of every channel. Used for overlays that collapse channels into one intensity.
    pub fn combined_influence(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .map(|entry| entry.strength)
            .sum()
    }

    /// Strongest entry in a channel; the earliest entry wins ties.
    pub fn strongest_source(&self, channel: usize) -> Option<&InfluenceEntry> {
        let mut strongest: Option<&InfluenceEntry> = None;
        for entry in self.entries(channel) {
            match strongest {
                Some(best) if entry.strength <= best.strength => {}
                _ => strongest = Some(entry),
            }
        }
        strongest
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(Vec::is_empty)
    }

    pub fn entry_count(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }

    #[inline]
    fn check_channel(&self, channel: usize) {
        assert!(
            channel < self.channels.len(),
            "influence channel {channel} out of range ({} channels)",
            self.channels.len()
        );
    }
}
