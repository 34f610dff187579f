//! Codecs, payload numbers and our codec preferences.

#![allow(missing_docs)]

mod codec;
pub use codec::{Codec, CodecParams, Packetization, ProfileSpec, RtcpFeedback, VideoProfile};

mod static_pt;
pub use static_pt::{static_payload, StaticPayload};

mod mapping;
pub use mapping::{PayloadMapping, PayloadMappings};

mod prefs;
pub use prefs::{CodecPreferences, PreferredMedia};

/// Payload number put on disabled m-lines that would otherwise have none.
///
/// Some peers reject an m-line without any payload.
pub const DUMMY_PT: crate::id::Pt = crate::id::Pt::new_with_value(42);
