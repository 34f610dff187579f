use std::net::SocketAddr;

use sdpneg::error::IceError;
use sdpneg::sdp::{MediaAttribute, SessionAttribute};
use sdpneg::{CallLeg, CallState, Calls, EndReason, IceRole, IceState, IceSupport};
use sdpneg::{MediaTransports, NegotiationConfig, NegotiationError, Output, PerKind, Sdp};
use sdpneg::SipMessage;

mod common;
use common::*;

fn ice_offer(ufrag: &str, pwd: &str, version: u64) -> Sdp {
    let ufrag = format!("ice-ufrag:{}", ufrag);
    let pwd = format!("ice-pwd:{}", pwd);
    let mut s = sdp(
        REMOTE_IP,
        &[&ufrag, &pwd],
        vec![audio_line(5000), video_line(5002)],
    );
    s.origin.version = version;
    s
}

/// The answer to our three line offer. We offer text, the peer doesn't take it.
fn ice_answer() -> Sdp {
    let mut s = ice_offer("rem1", "remotepassword0123456789", 1);
    s.media_lines.push(m("text", 0, "RTP/AVP", &[98], &[]));
    s
}

fn remote(port: u16) -> MediaTransports {
    let rtp: SocketAddr = format!("203.0.113.5:{}", port).parse().unwrap();
    let rtcp: SocketAddr = format!("203.0.113.5:{}", port + 1).parse().unwrap();
    MediaTransports { rtp, rtcp }
}

fn local_transports() -> PerKind<Option<MediaTransports>> {
    PerKind {
        audio: Some(transports(40000)),
        video: Some(transports(40002)),
        text: Some(transports(40004)),
    }
}

fn has_candidates(sdp: &Sdp) -> bool {
    sdp.media_lines
        .iter()
        .filter(|l| !l.is_disabled())
        .all(|l| l.attrs.iter().any(|a| matches!(a, MediaAttribute::Candidate(_))))
}

/// An incoming ICE call, answered, connected and nominated.
fn established(calls: &mut Calls) -> (CallLeg, FakeIce) {
    let (mut leg, _, ice) = ice_leg(calls, NegotiationConfig::new());

    let offer = ice_offer("rem1", "remotepassword0123456789", 1);
    leg.process_sdp(calls, SipMessage::Invite, Some(&offer))
        .unwrap();
    leg.ice_gathering_complete(calls).unwrap();
    leg.accept(calls).unwrap();
    leg.connected(calls).unwrap();
    leg.ice_nominations_complete(calls, true).unwrap();
    drain(&mut leg);

    (leg, ice)
}

#[test]
pub fn incoming_ice_call_rings_after_gathering() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, _, ice) = ice_leg(&mut calls, NegotiationConfig::new());

    let offer = ice_offer("rem1", "remotepassword0123456789", 1);
    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();

    // Nothing rings until our candidates are known.
    assert_eq!(drain(&mut leg), vec![Output::CapabilitiesChanged]);
    assert_eq!(ice.log.lock().unwrap().started, vec![IceRole::Answerer]);
    assert!(leg.remote_is_ice());

    leg.ice_gathering_complete(&mut calls).unwrap();
    assert_eq!(
        drain(&mut leg),
        vec![
            Output::Provisional {
                code: 180,
                sdp: None,
                reliable: false,
                sinfo: None
            },
            Output::AlertLocalUser,
        ]
    );
    assert_eq!(ice.log.lock().unwrap().proceeded, 1);

    leg.accept(&mut calls).unwrap();
    let out = drain(&mut leg);
    let Some(Output::Accept { sdp: Some(answer) }) = out.first() else {
        panic!("no answer: {:?}", out);
    };

    // The answer carries the gathered defaults and our candidates.
    assert_eq!(answer.media_lines[0].port, 40000);
    assert_eq!(answer.media_lines[1].port, 40002);
    assert!(has_candidates(answer));
    assert!(answer
        .attrs
        .contains(&SessionAttribute::IceUfrag("loc1".into())));
    assert!(leg.offer_answer_complete());

    ice.log.lock().unwrap().remote = PerKind {
        audio: Some(remote(7000)),
        video: Some(remote(7002)),
        text: None,
    };
    leg.ice_nominations_complete(&mut calls, true).unwrap();

    assert_eq!(
        drain(&mut leg),
        vec![
            Output::Transports {
                nominated: true,
                transports: local_transports(),
            },
            Output::ConfigureMedia { reply: false },
        ]
    );
    assert_eq!(leg.streams()[0].rtp_addr, remote(7000).rtp);
    assert_eq!(leg.streams()[1].rtcp_addr, remote(7002).rtcp);
    assert_eq!(leg.ice_state(), Some(IceState::Complete));
}

#[test]
pub fn same_credentials_do_not_restart() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, ice) = established(&mut calls);

    let offer = ice_offer("rem1", "remotepassword0123456789", 2);
    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();

    let out = drain(&mut leg);
    assert_eq!(out[0], Output::ConfigureMedia { reply: false });
    let Some(Output::Accept { sdp: Some(answer) }) = out.get(1) else {
        panic!("no answer: {:?}", out);
    };
    // ICE is done, so no new candidates.
    assert!(!has_candidates(answer));

    let log = ice.log.lock().unwrap();
    assert_eq!(log.started, vec![IceRole::Answerer]);
    assert_eq!(log.received, 0);
}

#[test]
pub fn changed_credentials_restart_ice() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, ice) = established(&mut calls);

    let offer = ice_offer("rem2", "otherpassword0123456789x", 2);
    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();

    // The answer waits for gathering.
    let out = drain(&mut leg);
    assert!(
        !out.iter().any(|o| matches!(o, Output::Accept { .. })),
        "{:?}",
        out
    );
    assert_eq!(ice.log.lock().unwrap().received, 1);
    assert_eq!(leg.next_ice_message(), SipMessage::InviteFinalResponse);

    ice.log.lock().unwrap().state = IceState::Gathering;
    leg.ice_gathering_complete(&mut calls).unwrap();

    let out = drain(&mut leg);
    let Some(Output::Accept { sdp: Some(answer) }) = out.first() else {
        panic!("no answer: {:?}", out);
    };
    assert!(has_candidates(answer));
    assert!(leg.offer_answer_complete());
}

#[test]
pub fn invalid_media_for_ice_ends_call() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, _, ice) = ice_leg(&mut calls, NegotiationConfig::new());
    ice.log.lock().unwrap().fail_start = Some(IceError::InvalidMedia("no usable m-line".into()));

    let offer = ice_offer("rem1", "remotepassword0123456789", 1);
    let err = leg
        .process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap_err();
    assert!(matches!(err, NegotiationError::UnsupportedMedia(_)));
    assert_eq!(err.sip_response(), Some(488));

    assert_eq!(
        drain(&mut leg),
        vec![Output::EndCall {
            reason: EndReason::InvalidMedia,
            sip_code: 488
        }]
    );
}

#[test]
pub fn non_ice_peer_gets_gathered_transports() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, _, ice) = ice_leg(&mut calls, NegotiationConfig::new());
    ice.log.lock().unwrap().support = IceSupport::NotSupported;

    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&basic_offer()))
        .unwrap();
    drain(&mut leg);

    {
        let log = ice.log.lock().unwrap();
        assert_eq!(log.started, vec![IceRole::Answerer, IceRole::Gatherer]);
        assert_eq!(log.ended, 1);
    }
    assert!(!leg.remote_is_ice());

    leg.ice_gathering_complete(&mut calls).unwrap();
    assert_eq!(
        drain(&mut leg),
        vec![
            Output::Transports {
                nominated: false,
                transports: local_transports(),
            },
            Output::ConfigureMedia { reply: true },
            Output::Provisional {
                code: 180,
                sdp: None,
                reliable: false,
                sinfo: None
            },
            Output::AlertLocalUser,
        ]
    );
    // The gatherer is not kept around.
    assert_eq!(leg.ice_state(), None);

    leg.accept(&mut calls).unwrap();
    let out = drain(&mut leg);
    let Some(Output::Accept { sdp: Some(answer) }) = out.first() else {
        panic!("no answer: {:?}", out);
    };
    assert_eq!(answer.media_lines[0].port, 40000);
    assert!(leg.offer_answer_complete());
}

#[test]
pub fn outgoing_ice_invite_waits_for_candidates() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, _, ice) = ice_leg(&mut calls, NegotiationConfig::new());

    leg.invite(&mut calls).unwrap();
    assert!(drain(&mut leg).is_empty());
    assert_eq!(ice.log.lock().unwrap().started, vec![IceRole::Offerer]);
    assert!(!leg.answer_pending());

    leg.ice_gathering_complete(&mut calls).unwrap();
    let out = drain(&mut leg);
    let Some(Output::Invite { sdp: offer }) = out.first() else {
        panic!("no INVITE: {:?}", out);
    };
    assert!(has_candidates(offer));
    assert_eq!(offer.media_lines[0].port, 40000);
    assert!(leg.answer_pending());

    ice.log.lock().unwrap().state = IceState::GatheringComplete;
    leg.process_sdp(&mut calls, SipMessage::InviteFinalResponse, Some(&ice_answer()))
        .unwrap();

    // Media waits for the nominations.
    let out = drain(&mut leg);
    assert_eq!(out[0], Output::Ack { sdp: None });
    assert!(!out
        .iter()
        .any(|o| matches!(o, Output::ConfigureMedia { .. })));
    assert_eq!(ice.log.lock().unwrap().proceeded, 1);
    assert_eq!(calls.get(leg.call_id()).unwrap().state, CallState::Connecting);

    leg.ice_nominations_complete(&mut calls, true).unwrap();
    assert_eq!(
        drain(&mut leg),
        vec![
            Output::Transports {
                nominated: true,
                transports: local_transports(),
            },
            Output::ConfigureMedia { reply: false },
        ]
    );

    // The offer with the nominated addresses waits for the call to connect.
    assert!(leg.send_offer_when_ready());
    leg.connected(&mut calls).unwrap();
    let out = drain(&mut leg);
    assert!(matches!(out.first(), Some(Output::ReInvite { .. })), "{:?}", out);
    assert!(!leg.send_offer_when_ready());
}

#[test]
pub fn failed_nominations_end_unreachable_call() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, _, ice) = ice_leg(&mut calls, NegotiationConfig::new());

    leg.invite(&mut calls).unwrap();
    leg.ice_gathering_complete(&mut calls).unwrap();
    ice.log.lock().unwrap().state = IceState::GatheringComplete;
    leg.process_sdp(&mut calls, SipMessage::InviteFinalResponse, Some(&ice_answer()))
        .unwrap();
    drain(&mut leg);

    leg.ice_nominations_complete(&mut calls, false).unwrap();
    assert_eq!(
        drain(&mut leg),
        vec![Output::EndCall {
            reason: EndReason::Unreachable,
            sip_code: 500
        }]
    );
    assert!(calls.get(leg.call_id()).unwrap().all_legs_failed_ice());
}

#[test]
pub fn ice_start_failure_falls_back_to_plain_invite() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, _, ice) = ice_leg(&mut calls, NegotiationConfig::new());
    ice.log.lock().unwrap().fail_start = Some(IceError::Start("no TURN server".into()));

    leg.invite(&mut calls).unwrap();
    let out = drain(&mut leg);
    let Some(Output::Invite { sdp: offer }) = out.first() else {
        panic!("no INVITE: {:?}", out);
    };
    assert_eq!(offer.media_lines[0].port, 30000);
    assert!(!has_candidates(offer));
    assert!(leg.answer_pending());
}
