use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::id::Pt;

/// A payload number with an IANA assigned meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPayload {
    pub pt: u8,
    pub encoding: &'static str,
    pub clock_rate: u32,
    /// The codec adapts its bit rate, so the signaled bandwidth is kept.
    pub variable: bool,
    /// Nominal bandwidth in kbps for fixed rate codecs.
    pub bandwidth: u32,
}

const fn sp(pt: u8, encoding: &'static str, clock_rate: u32, variable: bool, bandwidth: u32) -> StaticPayload {
    StaticPayload {
        pt,
        encoding,
        clock_rate,
        variable,
        bandwidth,
    }
}

// https://www.iana.org/assignments/rtp-parameters/rtp-parameters.xhtml
const WELL_KNOWN: &[StaticPayload] = &[
    sp(0, "PCMU", 8000, false, 64),
    sp(8, "PCMA", 8000, false, 64),
    sp(3, "GSM", 8000, true, 0),
    sp(9, "G722", 8000, false, 64),
    sp(4, "G723", 8000, false, 6),
    sp(15, "G728", 8000, false, 16),
    sp(18, "G729", 8000, false, 8),
    sp(5, "DVI4", 8000, false, 0),
    sp(6, "DVI4", 16000, false, 0),
    sp(16, "DVI4", 11025, false, 0),
    sp(17, "DVI4", 22050, false, 0),
    sp(10, "L16", 44100, false, 0),
    sp(11, "L16", 44100, false, 0),
    sp(12, "QCELP", 8000, true, 0),
    sp(13, "CN", 8000, true, 0),
    sp(14, "MPA", 90000, true, 0),
    sp(25, "CelB", 90000, true, 0),
    sp(26, "JPEG", 90000, true, 0),
    sp(28, "nv", 90000, true, 0),
    sp(31, "H261", 90000, true, 0),
    sp(32, "MPV", 90000, true, 0),
    sp(33, "MP2T", 90000, true, 0),
    sp(34, "H263", 90000, true, 0),
];

static TABLE: Lazy<HashMap<u8, StaticPayload>> =
    Lazy::new(|| WELL_KNOWN.iter().map(|s| (s.pt, *s)).collect());

/// Look up a static payload number.
pub fn static_payload(pt: Pt) -> Option<&'static StaticPayload> {
    TABLE.get(&*pt)
}

impl StaticPayload {
    /// Bandwidth for a payload using this entry. Fixed rate codecs use the
    /// signaled value, or the nominal one when nothing was signaled.
    pub fn bandwidth_for(&self, signaled: Option<u32>, stream: u32) -> u32 {
        if self.variable {
            stream
        } else {
            signaled.filter(|v| *v > 0).unwrap_or(self.bandwidth)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup() {
        let p = static_payload(0.into()).unwrap();
        assert_eq!(p.encoding, "PCMU");
        assert_eq!(p.clock_rate, 8000);

        assert_eq!(static_payload(34.into()).unwrap().encoding, "H263");
        assert!(static_payload(96.into()).is_none());
        assert!(static_payload(42.into()).is_none());
    }

    #[test]
    fn fixed_rate_bandwidth() {
        let pcmu = static_payload(0.into()).unwrap();
        assert_eq!(pcmu.bandwidth_for(None, 512), 64);
        assert_eq!(pcmu.bandwidth_for(Some(80), 512), 80);

        let h263 = static_payload(34.into()).unwrap();
        assert_eq!(h263.bandwidth_for(Some(80), 512), 512);
    }
}
