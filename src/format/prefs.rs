use serde::{Deserialize, Serialize};

use crate::id::Pt;

use super::{Codec, Packetization, ProfileSpec, VideoProfile};

/// A codec we are willing to use, in the order we prefer them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredMedia {
    pub codec: Codec,
    /// Name used in `a=rtpmap`.
    pub encoding: String,
    /// Fixed payload number. `None` for codecs on dynamic numbers.
    pub pt: Option<Pt>,
    pub clock_rate: u32,
    /// Packetization schemes we accept, best first.
    pub packetizations: Vec<Packetization>,
    /// Profiles we accept, best first. Empty accepts any.
    pub profiles: Vec<ProfileSpec>,
}

impl PreferredMedia {
    pub fn new(codec: Codec, pt: Option<u8>, clock_rate: u32) -> Self {
        PreferredMedia {
            codec,
            encoding: codec.encoding_name().to_string(),
            pt: pt.map(Pt::from),
            clock_rate,
            packetizations: vec![],
            profiles: vec![],
        }
    }

    pub fn with_packetizations(mut self, p: &[Packetization]) -> Self {
        self.packetizations = p.to_vec();
        self
    }

    pub fn with_profiles(mut self, p: &[ProfileSpec]) -> Self {
        self.profiles = p.to_vec();
        self
    }

    /// Whether an offered payload is this codec. Dynamic codecs match on
    /// the encoding name, static ones on the number.
    pub fn matches(&self, encoding: &str, pt: Pt) -> bool {
        match self.pt {
            None => self.encoding.eq_ignore_ascii_case(encoding),
            Some(v) => v == pt,
        }
    }

    /// Whether an offered profile and packetization is acceptable.
    pub fn accepts(&self, profile: VideoProfile, packetization: Packetization) -> bool {
        let profile_ok =
            self.profiles.is_empty() || self.profiles.iter().any(|p| p.profile == profile);

        let packetization_ok = packetization == Packetization::Unknown
            || self.packetizations.contains(&packetization);

        profile_ok && packetization_ok
    }
}

/// Codec preference lists per media kind and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecPreferences {
    pub audio: Vec<PreferredMedia>,
    /// Codecs riding along with the audio codec, like DTMF.
    pub audio_features: Vec<PreferredMedia>,
    pub video_playback: Vec<PreferredMedia>,
    pub video_record: Vec<PreferredMedia>,
    pub text_playback: Vec<PreferredMedia>,
    pub text_record: Vec<PreferredMedia>,
}

impl CodecPreferences {
    /// First match in `list` for an offered payload.
    pub fn find<'a>(list: &'a [PreferredMedia], encoding: &str, pt: Pt) -> Option<&'a PreferredMedia> {
        list.iter().find(|p| p.matches(encoding, pt))
    }
}

impl Default for CodecPreferences {
    fn default() -> Self {
        // 0xe0 is constraint_set0..2, i.e. constrained baseline.
        let video = vec![
            PreferredMedia::new(Codec::H264, None, 90_000)
                .with_packetizations(&[
                    Packetization::H264NonInterleaved,
                    Packetization::H264SingleNal,
                ])
                .with_profiles(&[
                    ProfileSpec::new(VideoProfile::H264Main, 0),
                    ProfileSpec::new(VideoProfile::H264Baseline, 0xe0),
                ]),
            PreferredMedia::new(Codec::H263, Some(34), 90_000)
                .with_packetizations(&[Packetization::H263Rfc2190])
                .with_profiles(&[ProfileSpec::new(VideoProfile::H263Zero, 0)]),
        ];

        let text = vec![
            PreferredMedia::new(Codec::T140Red, None, 1000),
            PreferredMedia::new(Codec::T140, None, 1000),
        ];

        CodecPreferences {
            audio: vec![
                PreferredMedia::new(Codec::Pcmu, Some(0), 8000),
                PreferredMedia::new(Codec::Pcma, Some(8), 8000),
                PreferredMedia::new(Codec::G722, Some(9), 8000),
            ],
            audio_features: vec![PreferredMedia::new(Codec::TelephoneEvent, None, 8000)],
            video_playback: video.clone(),
            video_record: video,
            text_playback: text.clone(),
            text_record: text,
        }
    }
}
