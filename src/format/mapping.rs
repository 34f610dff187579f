use std::collections::BTreeMap;

use crate::id::Pt;
use crate::stream::MediaKind;

use super::{Codec, Packetization, RtcpFeedback, VideoProfile};

/// One payload number bound to a codec configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadMapping {
    pub pt: Pt,
    pub codec: Codec,
    pub packetization: Packetization,
    pub profile: VideoProfile,
    pub clock_rate: u32,
    pub rtcp_fb: Vec<RtcpFeedback>,
    /// Retransmission payload for this one, if any.
    pub rtx_pt: Option<Pt>,
}

impl PayloadMapping {
    pub fn new(pt: Pt, codec: Codec, clock_rate: u32) -> Self {
        PayloadMapping {
            pt,
            codec,
            packetization: Packetization::Unknown,
            profile: VideoProfile::None,
            clock_rate,
            rtcp_fb: vec![],
            rtx_pt: None,
        }
    }
}

/// Symmetric payload table of a call.
///
/// Once a payload number is bound to a codec (by the peer or by us) it keeps
/// that meaning for the rest of the call, so that renegotiations and transfers
/// don't make the peers disagree on what a payload number is.
#[derive(Debug, Clone, Default)]
pub struct PayloadMappings {
    audio: BTreeMap<Pt, PayloadMapping>,
    video: BTreeMap<Pt, PayloadMapping>,
    text: BTreeMap<Pt, PayloadMapping>,
}

impl PayloadMappings {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: MediaKind) -> Option<&BTreeMap<Pt, PayloadMapping>> {
        match kind {
            MediaKind::Audio => Some(&self.audio),
            MediaKind::Video => Some(&self.video),
            MediaKind::Text => Some(&self.text),
            MediaKind::Unknown => None,
        }
    }

    fn table_mut(&mut self, kind: MediaKind) -> Option<&mut BTreeMap<Pt, PayloadMapping>> {
        match kind {
            MediaKind::Audio => Some(&mut self.audio),
            MediaKind::Video => Some(&mut self.video),
            MediaKind::Text => Some(&mut self.text),
            MediaKind::Unknown => None,
        }
    }

    pub fn get(&self, kind: MediaKind, pt: Pt) -> Option<&PayloadMapping> {
        self.table(kind)?.get(&pt)
    }

    pub fn get_mut(&mut self, kind: MediaKind, pt: Pt) -> Option<&mut PayloadMapping> {
        self.table_mut(kind)?.get_mut(&pt)
    }

    pub fn is_used(&self, kind: MediaKind, pt: Pt) -> bool {
        self.get(kind, pt).is_some()
    }

    /// Video mapping for codec, profile and packetization.
    pub fn find_video(
        &self,
        codec: Codec,
        profile: VideoProfile,
        packetization: Packetization,
    ) -> Option<&PayloadMapping> {
        self.video.values().find(|m| {
            m.codec == codec && m.profile == profile && m.packetization == packetization
        })
    }

    /// Audio mapping for codec, packetization and clock rate.
    pub fn find_audio(
        &self,
        codec: Codec,
        packetization: Packetization,
        clock_rate: u32,
    ) -> Option<&PayloadMapping> {
        self.audio.values().find(|m| {
            m.codec == codec && m.packetization == packetization && m.clock_rate == clock_rate
        })
    }

    /// Text mapping for codec and packetization.
    pub fn find_text(&self, codec: Codec, packetization: Packetization) -> Option<&PayloadMapping> {
        self.text
            .values()
            .find(|m| m.codec == codec && m.packetization == packetization)
    }

    /// The payload a RTX payload retransmits.
    pub fn rtx_primary(&self, rtx_pt: Pt) -> Option<Pt> {
        self.video
            .values()
            .find(|m| m.rtx_pt == Some(rtx_pt))
            .map(|m| m.pt)
    }

    /// Add a mapping. An existing mapping for the same number is kept.
    pub fn insert(&mut self, kind: MediaKind, mapping: PayloadMapping) -> bool {
        let Some(table) = self.table_mut(kind) else {
            return false;
        };
        if table.contains_key(&mapping.pt) {
            return false;
        }
        trace!(
            "Map {:?} payload {} to {} {:?} {:?}",
            kind,
            mapping.pt,
            mapping.codec,
            mapping.profile,
            mapping.packetization
        );
        table.insert(mapping.pt, mapping);
        true
    }

    /// First unused payload number of the dynamic range.
    pub fn allocate_dynamic(&self, kind: MediaKind) -> Option<Pt> {
        let table = self.table(kind)?;
        (Pt::DYNAMIC_START..=Pt::DYNAMIC_END)
            .map(Pt::from)
            .find(|pt| !table.contains_key(pt))
    }

    pub fn iter(&self, kind: MediaKind) -> impl Iterator<Item = &PayloadMapping> + '_ {
        self.table(kind).into_iter().flat_map(|t| t.values())
    }

    pub fn clear(&mut self) {
        self.audio.clear();
        self.video.clear();
        self.text.clear();
    }
}
