use std::fmt;

use serde::{Deserialize, Serialize};

use crate::call::Substate;
use crate::SdpRole;

/// Media direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Send only direction.
    SendOnly,
    /// Receive only direction.
    RecvOnly,
    /// Bi-directional. Also what a missing direction attribute means.
    #[default]
    SendRecv,
    /// Disabled direction.
    Inactive,
}

impl Direction {
    /// Change the direction to the opposite.
    ///
    /// `SendRecv` and `Inactive` are left unchanged.
    pub fn invert(&self) -> Self {
        match self {
            Direction::SendOnly => Direction::RecvOnly,
            Direction::RecvOnly => Direction::SendOnly,
            _ => *self,
        }
    }

    /// Whether this direction is a sending direction.
    pub fn is_sending(&self) -> bool {
        matches!(self, Direction::SendOnly | Direction::SendRecv)
    }

    /// Whether this direction is a receiving direction.
    pub fn is_receiving(&self) -> bool {
        matches!(self, Direction::RecvOnly | Direction::SendRecv)
    }

    /// Direction from what we are willing to receive and send.
    pub fn from_flags(inbound: bool, outbound: bool) -> Self {
        match (inbound, outbound) {
            (true, true) => Direction::SendRecv,
            (true, false) => Direction::RecvOnly,
            (false, true) => Direction::SendOnly,
            (false, false) => Direction::Inactive,
        }
    }
}

impl From<&str> for Direction {
    fn from(v: &str) -> Self {
        use Direction::*;
        match v {
            "sendonly" => SendOnly,
            "recvonly" => RecvOnly,
            "sendrecv" => SendRecv,
            _ => Inactive,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Direction::SendOnly => "sendonly",
                Direction::RecvOnly => "recvonly",
                Direction::SendRecv => "sendrecv",
                Direction::Inactive => "inactive",
            }
        )
    }
}

/// Everything the directionality of one outgoing m-line depends on.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DirectionInputs {
    pub role: SdpRole,
    /// What the remote offered, for answers.
    pub offer_direction: Direction,
    pub inbound: bool,
    pub outbound: bool,
    /// We can play what the peer sends.
    pub playback: bool,
    pub playback_privacy: bool,
    /// Record privacy is on for a non-audio stream towards an SVRS device.
    pub record_privacy: bool,
    /// Call is in local hold or both hold.
    pub local_hold: bool,
    /// Call is in remote hold or both hold.
    pub remote_hold: bool,
    pub substate: Substate,
    /// Connected with an MCU that is not an SVRS device.
    pub third_party_mcu: bool,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DirectionDecision {
    pub direction: Direction,
    /// Point RTP at the black hole address instead of signaling hold.
    pub redirect_rtp: bool,
}

impl From<Direction> for DirectionDecision {
    fn from(direction: Direction) -> Self {
        DirectionDecision {
            direction,
            redirect_rtp: false,
        }
    }
}

/// Choose the direction for an m-line from call state and media flags.
pub(crate) fn decide(i: &DirectionInputs) -> DirectionDecision {
    use Direction::*;

    match i.role {
        SdpRole::Answer => {
            let allow_out = i.outbound && matches!(i.offer_direction, RecvOnly | SendRecv);
            let allow_in = i.inbound && matches!(i.offer_direction, SendOnly | SendRecv);
            let remote_mute = !i.playback || !allow_in || i.playback_privacy;
            let local_mute = !allow_out || i.record_privacy;

            let remote_hold = (i.remote_hold && !i.substate.negotiating_remote_resume)
                || i.substate.negotiating_remote_hold;

            let direction = if remote_hold {
                if remote_mute || i.local_hold {
                    Inactive
                } else {
                    RecvOnly
                }
            } else if remote_mute {
                if local_mute {
                    Inactive
                } else {
                    SendOnly
                }
            } else if local_mute {
                if allow_in {
                    RecvOnly
                } else {
                    Inactive
                }
            } else if i.local_hold && !i.substate.negotiating_local_resume {
                if allow_out {
                    SendOnly
                } else {
                    Inactive
                }
            } else {
                Direction::from_flags(allow_in, allow_out)
            };

            direction.into()
        }

        SdpRole::Offer => {
            let local_mute = !i.outbound || i.record_privacy;

            let local_hold = (i.local_hold && !i.substate.negotiating_local_resume)
                || i.substate.negotiating_local_hold;

            if local_hold {
                if local_mute {
                    Inactive.into()
                } else if i.third_party_mcu {
                    // MCUs mishandle sendonly. Keep sendrecv and send the
                    // media nowhere.
                    DirectionDecision {
                        direction: SendRecv,
                        redirect_rtp: true,
                    }
                } else {
                    SendOnly.into()
                }
            } else if local_mute {
                if i.inbound {
                    RecvOnly.into()
                } else {
                    Inactive.into()
                }
            } else {
                Direction::from_flags(i.inbound, i.outbound).into()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn answer(offer_direction: Direction) -> DirectionInputs {
        DirectionInputs {
            role: SdpRole::Answer,
            offer_direction,
            inbound: true,
            outbound: true,
            playback: true,
            ..Default::default()
        }
    }

    fn offer() -> DirectionInputs {
        DirectionInputs {
            role: SdpRole::Offer,
            inbound: true,
            outbound: true,
            playback: true,
            ..Default::default()
        }
    }

    #[test]
    fn answer_mirrors_offer() {
        use Direction::*;
        assert_eq!(decide(&answer(SendRecv)).direction, SendRecv);
        assert_eq!(decide(&answer(SendOnly)).direction, RecvOnly);
        assert_eq!(decide(&answer(RecvOnly)).direction, SendOnly);
        assert_eq!(decide(&answer(Inactive)).direction, Inactive);
    }

    #[test]
    fn answer_remote_hold() {
        let mut i = answer(Direction::SendOnly);
        i.substate.negotiating_remote_hold = true;
        assert_eq!(decide(&i).direction, Direction::RecvOnly);

        // Both on hold.
        i.local_hold = true;
        assert_eq!(decide(&i).direction, Direction::Inactive);
    }

    #[test]
    fn answer_remote_hold_resuming() {
        let mut i = answer(Direction::SendRecv);
        i.remote_hold = true;
        i.substate.negotiating_remote_resume = true;
        assert_eq!(decide(&i).direction, Direction::SendRecv);
    }

    #[test]
    fn answer_playback_privacy_is_remote_mute() {
        let mut i = answer(Direction::SendRecv);
        i.playback_privacy = true;
        assert_eq!(decide(&i).direction, Direction::SendOnly);

        i.record_privacy = true;
        assert_eq!(decide(&i).direction, Direction::Inactive);
    }

    #[test]
    fn answer_record_privacy_is_local_mute() {
        let mut i = answer(Direction::SendRecv);
        i.record_privacy = true;
        assert_eq!(decide(&i).direction, Direction::RecvOnly);
    }

    #[test]
    fn answer_still_on_local_hold() {
        let mut i = answer(Direction::SendRecv);
        i.local_hold = true;
        assert_eq!(decide(&i).direction, Direction::SendOnly);

        i.substate.negotiating_local_resume = true;
        assert_eq!(decide(&i).direction, Direction::SendRecv);
    }

    #[test]
    fn offer_plain() {
        assert_eq!(decide(&offer()).direction, Direction::SendRecv);

        let mut i = offer();
        i.outbound = false;
        assert_eq!(decide(&i).direction, Direction::RecvOnly);

        i.inbound = false;
        assert_eq!(decide(&i).direction, Direction::Inactive);
    }

    #[test]
    fn offer_local_hold() {
        let mut i = offer();
        i.substate.negotiating_local_hold = true;
        assert_eq!(decide(&i), Direction::SendOnly.into());

        i.record_privacy = true;
        assert_eq!(decide(&i).direction, Direction::Inactive);
    }

    #[test]
    fn offer_local_hold_third_party_mcu() {
        let mut i = offer();
        i.local_hold = true;
        i.third_party_mcu = true;
        assert_eq!(
            decide(&i),
            DirectionDecision {
                direction: Direction::SendRecv,
                redirect_rtp: true
            }
        );
    }

    #[test]
    fn total_over_all_inputs() {
        use Direction::*;
        let dirs = [SendOnly, RecvOnly, SendRecv, Inactive];

        for bits in 0_u32..(1 << 12) {
            let b = |n: u32| bits & (1 << n) != 0;
            for role in [SdpRole::Offer, SdpRole::Answer] {
                for offer_direction in dirs {
                    let i = DirectionInputs {
                        role,
                        offer_direction,
                        inbound: b(0),
                        outbound: b(1),
                        playback: b(2),
                        playback_privacy: b(3),
                        record_privacy: b(4),
                        local_hold: b(5),
                        remote_hold: b(6),
                        substate: Substate {
                            negotiating_local_hold: b(7),
                            negotiating_local_resume: b(8),
                            negotiating_remote_hold: b(9),
                            negotiating_remote_resume: b(10),
                        },
                        third_party_mcu: b(11),
                    };
                    let d = decide(&i);

                    // Never send what we can't send, never receive what we can't receive.
                    if d.direction.is_sending() && !d.redirect_rtp {
                        assert!(i.outbound, "{:?}", i);
                    }
                    if d.direction.is_receiving() && !d.redirect_rtp {
                        assert!(i.inbound, "{:?}", i);
                    }
                    if role == SdpRole::Answer {
                        // An answer never exceeds the offer.
                        if d.direction.is_sending() {
                            assert!(offer_direction.is_receiving(), "{:?}", i);
                        }
                        if d.direction.is_receiving() {
                            assert!(offer_direction.is_sending(), "{:?}", i);
                        }
                    }
                    if d.redirect_rtp {
                        assert_eq!(role, SdpRole::Offer);
                    }
                }
            }
        }
    }
}
